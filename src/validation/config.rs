use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::issue::ValidationIssue;

/// 代理使用的模型與取樣參數。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// 供應商 ID，例如 `openai`。
    #[serde(default)]
    pub provider: String,
    /// 供應商使用的模型 ID，例如 `gpt-4o`。
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl ModelDescriptor {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub enabled: bool,
    pub min_steps: Option<u32>,
    pub max_steps: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub table_name: Option<String>,
    /// 記憶資料庫的連線字串。
    pub db_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub enabled: bool,
    pub urls: Vec<String>,
    pub pdf_paths: Vec<String>,
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub table_name: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    pub enabled: bool,
    pub respond_directly: bool,
    pub add_transfer_instructions: bool,
}

/// 代理的延伸設定。所有欄位皆為選填，缺少即代表關閉。
///
/// 不認得的欄位保留在 `extra`，設定讀入、修改再寫回時不會遺失內容。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<KnowledgeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_agentic_memory: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_knowledge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_chat_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_outputs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_response: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_json_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentConfig {
    /// 讀取設定檔，依副檔名（`.json`、`.toml`、`.yaml`/`.yml`）決定格式。
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("讀取代理設定失敗: {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let parsed = match extension.as_str() {
            "json" => serde_json::from_str(&raw).map_err(anyhow::Error::from),
            "toml" => toml::from_str(&raw).map_err(anyhow::Error::from),
            "yaml" | "yml" => serde_yaml::from_str(&raw).map_err(anyhow::Error::from),
            other => bail!("不支援的代理設定格式 '{}': {}", other, path.display()),
        };
        parsed.with_context(|| format!("解析代理設定失敗: {}", path.display()))
    }

    pub fn reasoning_enabled(&self) -> bool {
        self.reasoning.as_ref().is_some_and(|reasoning| reasoning.enabled)
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory.as_ref().is_some_and(|memory| memory.enabled)
    }

    /// 傳統記憶或代理式記憶任一啟用。
    pub fn uses_memory(&self) -> bool {
        self.memory_enabled() || flag(self.enable_agentic_memory)
    }

    pub fn knowledge_enabled(&self) -> bool {
        self.knowledge.as_ref().is_some_and(|knowledge| knowledge.enabled)
    }

    pub fn storage_enabled(&self) -> bool {
        self.storage.as_ref().is_some_and(|storage| storage.enabled)
    }

    pub fn team_enabled(&self) -> bool {
        self.team.as_ref().is_some_and(|team| team.enabled)
    }
}

/// `Some(true)` 為開啟；`None` 與 `Some(false)` 皆為關閉。
pub(crate) fn flag(value: Option<bool>) -> bool {
    value.unwrap_or(false)
}

/// 將建議的 `suggested_value` 寫入其欄位路徑。
///
/// 以 `model.` 開頭的路徑修改模型描述，其餘修改代理設定；缺少的中間區段會自動建立。
pub fn apply_suggestion(
    model: &mut ModelDescriptor,
    config: &mut AgentConfig,
    issue: &ValidationIssue,
) -> Result<()> {
    let value = issue
        .suggested_value
        .clone()
        .ok_or_else(|| anyhow!("'{}' 的問題沒有建議值", issue.field))?;

    if let Some(path) = issue.field.strip_prefix("model.") {
        *model = patched(&*model, path, value)?;
    } else {
        *config = patched(&*config, &issue.field, value)?;
    }
    Ok(())
}

fn patched<T>(current: &T, path: &str, value: Value) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut root = serde_json::to_value(current).context("序列化設定失敗")?;
    set_path(&mut root, path, value)?;
    serde_json::from_value(root).with_context(|| format!("無法在 '{path}' 套用建議值"))
}

fn set_path(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        bail!("欄位路徑為空");
    };
    if last.is_empty() {
        bail!("欄位路徑無效: '{path}'");
    }

    let mut current = root;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let object = current
            .as_object_mut()
            .ok_or_else(|| anyhow!("'{path}' 中的 '{segment}' 不是物件"))?;
        current = object.entry(segment.to_string()).or_insert(Value::Null);
    }
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    current
        .as_object_mut()
        .ok_or_else(|| anyhow!("'{path}' 的上層不是物件"))?
        .insert(last.to_string(), value);
    Ok(())
}
