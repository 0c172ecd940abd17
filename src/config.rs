use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 設定檔相對於工作區根目錄的位置。
pub const SETTINGS_FILE: &str = "config/agentdeck.toml";

/// 覆寫執行期位址的環境變數。
pub const RUNTIME_URL_ENV: &str = "AGENTDECK_RUNTIME_URL";

/// 控制面板設定的頂層結構，通常從 `config/agentdeck.toml` 載入。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    /// 代理執行期 HTTP API 的連線設定。
    #[serde(default)]
    pub runtime: RuntimeSettings,
    /// 日誌輸出設定。
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl PanelSettings {
    /// 從指定的工作區目錄讀取設定。
    /// 如果設定檔不存在，則使用預設值；之後再套用環境變數覆寫。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(SETTINGS_FILE);
        let settings = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("讀取面板設定失敗: {}", config_path.display()))?;
            let parsed: PanelSettings = toml::from_str(&raw)
                .with_context(|| format!("解析面板設定失敗: {}", config_path.display()))?;
            parsed.normalize(workspace_root)
        } else {
            Self::default()
        };
        Ok(settings.apply_env())
    }

    /// 將當前設定儲存到 `config/agentdeck.toml`。
    pub fn save_to_file(&self, workspace_root: &Path) -> Result<()> {
        let config_dir = workspace_root.join("config");
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("建立設定目錄失敗: {}", config_dir.display()))?;
        }
        let config_path = workspace_root.join(SETTINGS_FILE);
        let serialized = toml::to_string_pretty(self).context("序列化面板設定失敗")?;
        fs::write(&config_path, serialized)
            .with_context(|| format!("寫入面板設定失敗: {}", config_path.display()))?;
        Ok(())
    }

    /// 將設定中的相對路徑解析為相對於工作區根目錄的絕對路徑。
    fn normalize(mut self, workspace_root: &Path) -> Self {
        if let Some(file) = self.logging.config_file.as_mut()
            && file.is_relative()
        {
            *file = workspace_root.join(&file);
        }
        self
    }

    fn apply_env(mut self) -> Self {
        if let Ok(url) = env::var(RUNTIME_URL_ENV)
            && !url.trim().is_empty()
        {
            self.runtime.base_url = url.trim().to_string();
        }
        self
    }
}

/// 代理執行期 API 的連線設定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// API 的基礎 URL，例如 `http://localhost:7777`。
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 直接在設定中指定的 API 金鑰。
    #[serde(default)]
    pub api_key: Option<String>,
    /// 用於讀取 API 金鑰的環境變數名稱。
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// 建立連線與串流讀取閒置的逾時秒數。
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 送出執行請求時附帶的使用者 ID。
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            user_id: None,
        }
    }
}

impl RuntimeSettings {
    /// 解析並回傳最終的 API 金鑰。
    /// 優先順序：`api_key` 欄位 > `api_key_env` 環境變數。
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            Some(key.clone())
        } else if let Some(var) = &self.api_key_env {
            env::var(var).ok().filter(|value| !value.trim().is_empty())
        } else {
            None
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:7777".into()
}

fn default_timeout_secs() -> u64 {
    30
}

/// 日誌設定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// 未設定 `RUST_LOG` 時使用的預設等級。
    #[serde(default = "default_level")]
    pub level: String,
    /// log4rs 的 YAML 設定檔；存在時優先使用。
    #[serde(default)]
    pub config_file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            config_file: None,
        }
    }
}

fn default_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PanelSettings::load(dir.path()).unwrap();
        assert_eq!(settings.runtime.timeout_secs, 30);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.logging.config_file.is_none());
    }

    #[test]
    fn save_then_load_keeps_values_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = PanelSettings::default();
        settings.runtime.base_url = "http://runtime.internal:9000".into();
        settings.runtime.api_key = Some("secret".into());
        settings.logging.config_file = Some(PathBuf::from("config/log4rs.yaml"));
        settings.save_to_file(dir.path()).unwrap();

        let loaded = PanelSettings::load(dir.path()).unwrap();
        assert_eq!(loaded.runtime.api_key.as_deref(), Some("secret"));
        assert_eq!(
            loaded.logging.config_file,
            Some(dir.path().join("config/log4rs.yaml"))
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            "[runtime]\napi_key_env = \"AGENTDECK_TEST_UNSET_KEY\"\n",
        )
        .unwrap();
        let loaded = PanelSettings::load(dir.path()).unwrap();
        assert_eq!(loaded.runtime.timeout_secs, 30);
        assert_eq!(loaded.runtime.resolved_api_key(), None);
    }

    #[test]
    fn explicit_key_wins_over_env_var() {
        let settings = RuntimeSettings {
            api_key: Some("inline".into()),
            api_key_env: Some("PATH".into()),
            ..RuntimeSettings::default()
        };
        assert_eq!(settings.resolved_api_key().as_deref(), Some("inline"));
    }
}
