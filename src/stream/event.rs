use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 代理執行期（agent runtime）在串流中回報的事件種類。
///
/// 未列出的事件名稱會原樣保留在 `Other` 中，讓呼叫端自行決定如何處理。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub enum RunEventKind {
    RunStarted,
    /// 內容增量；事件未標示種類時的預設值。
    #[default]
    RunResponseContent,
    RunCompleted,
    RunError,
    RunCancelled,
    ToolCallStarted,
    ToolCallCompleted,
    ReasoningStarted,
    ReasoningStep,
    ReasoningCompleted,
    MemoryUpdateStarted,
    MemoryUpdateCompleted,
    Other(String),
}

impl RunEventKind {
    /// 回傳事件在線路上使用的名稱。
    pub fn as_str(&self) -> &str {
        match self {
            RunEventKind::RunStarted => "RunStarted",
            RunEventKind::RunResponseContent => "RunResponseContent",
            RunEventKind::RunCompleted => "RunCompleted",
            RunEventKind::RunError => "RunError",
            RunEventKind::RunCancelled => "RunCancelled",
            RunEventKind::ToolCallStarted => "ToolCallStarted",
            RunEventKind::ToolCallCompleted => "ToolCallCompleted",
            RunEventKind::ReasoningStarted => "ReasoningStarted",
            RunEventKind::ReasoningStep => "ReasoningStep",
            RunEventKind::ReasoningCompleted => "ReasoningCompleted",
            RunEventKind::MemoryUpdateStarted => "MemoryUpdateStarted",
            RunEventKind::MemoryUpdateCompleted => "MemoryUpdateCompleted",
            RunEventKind::Other(name) => name,
        }
    }

    /// 此事件是否代表一次執行已經結束（成功、失敗或被取消）。
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEventKind::RunCompleted | RunEventKind::RunError | RunEventKind::RunCancelled
        )
    }
}

impl From<&str> for RunEventKind {
    fn from(name: &str) -> Self {
        match name {
            "RunStarted" => RunEventKind::RunStarted,
            "RunResponseContent" => RunEventKind::RunResponseContent,
            "RunCompleted" => RunEventKind::RunCompleted,
            "RunError" => RunEventKind::RunError,
            "RunCancelled" => RunEventKind::RunCancelled,
            "ToolCallStarted" => RunEventKind::ToolCallStarted,
            "ToolCallCompleted" => RunEventKind::ToolCallCompleted,
            "ReasoningStarted" => RunEventKind::ReasoningStarted,
            "ReasoningStep" => RunEventKind::ReasoningStep,
            "ReasoningCompleted" => RunEventKind::ReasoningCompleted,
            "MemoryUpdateStarted" => RunEventKind::MemoryUpdateStarted,
            "MemoryUpdateCompleted" => RunEventKind::MemoryUpdateCompleted,
            other => RunEventKind::Other(other.to_string()),
        }
    }
}

impl From<RunEventKind> for String {
    fn from(kind: RunEventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 從串流中解碼出的單一事件。
///
/// 不認得的欄位會保留在 `extra`，不會被丟棄。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// 事件種類；缺少時視為 `RunResponseContent`。
    #[serde(default, deserialize_with = "deserialize_kind")]
    pub event: RunEventKind,
    /// 文字內容。非字串的 JSON 內容會以精簡的 JSON 文字保存。
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
    /// 執行期有時以數字送出 ID，一律轉成文字保存。
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub run_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub agent_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    /// 事件建立時間（Unix 秒）。缺少或無法解讀時以解碼當下的時間補上；
    /// RFC 3339 字串會轉換為 Unix 秒。
    #[serde(default = "now_epoch", deserialize_with = "deserialize_created_at")]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunEvent {
    /// 將一個 JSON 物件轉換為事件。
    ///
    /// 已知欄位的型別不符時會盡量轉換而不是拒絕整個事件。
    pub fn from_object(object: Map<String, Value>) -> Option<Self> {
        serde_json::from_value(Value::Object(object)).ok()
    }

    /// 取得內容文字，沒有內容時回傳空字串。
    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

pub(crate) fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

fn deserialize_kind<'de, D>(deserializer: D) -> Result<RunEventKind, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(name) => RunEventKind::from(name.as_str()),
        Value::Null => RunEventKind::default(),
        other => RunEventKind::Other(other.to_string()),
    })
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn deserialize_created_at<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(epoch_seconds(&value).unwrap_or_else(now_epoch))
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|seconds| seconds as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                chrono::DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|time| time.timestamp())
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_kinds_round_trip_by_name() {
        assert_eq!(RunEventKind::from("ToolCallStarted"), RunEventKind::ToolCallStarted);
        assert_eq!(RunEventKind::ToolCallStarted.as_str(), "ToolCallStarted");
        assert_eq!(
            RunEventKind::from("WorkflowStarted"),
            RunEventKind::Other("WorkflowStarted".into())
        );
    }

    #[test]
    fn missing_kind_and_timestamp_are_defaulted() {
        let before = now_epoch();
        let event: RunEvent = serde_json::from_value(json!({"content": "hello"})).unwrap();
        assert_eq!(event.event, RunEventKind::RunResponseContent);
        assert!(event.created_at >= before);
    }

    #[test]
    fn structured_content_is_kept_as_json_text() {
        let event: RunEvent =
            serde_json::from_value(json!({"event": "RunCompleted", "content": {"answer": 42}}))
                .unwrap();
        assert_eq!(event.content.as_deref(), Some(r#"{"answer":42}"#));
        assert!(event.event.is_terminal());
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let event: RunEvent = serde_json::from_value(json!({
            "event": "ToolCallStarted",
            "created_at": 12,
            "tool": {"tool_name": "search"}
        }))
        .unwrap();
        assert_eq!(event.extra["tool"]["tool_name"], "search");
        assert_eq!(event.created_at, 12);
    }

    #[test]
    fn serializes_kind_as_plain_name() {
        let event: RunEvent =
            serde_json::from_value(json!({"event": "RunStarted", "created_at": 5})).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "RunStarted");
        assert_eq!(value["created_at"], 5);
        assert!(value.get("content").is_none());
    }

    #[test]
    fn numeric_ids_are_kept_as_text() {
        let event = RunEvent::from_object(
            json!({"event": "RunResponseContent", "run_id": 42, "session_id": 7, "created_at": 1000})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(event.run_id.as_deref(), Some("42"));
        assert_eq!(event.session_id.as_deref(), Some("7"));
        assert_eq!(event.created_at, 1000);
    }

    #[test]
    fn rfc3339_timestamp_is_converted() {
        let event: RunEvent =
            serde_json::from_value(json!({"created_at": "2025-01-01T00:00:00Z"})).unwrap();
        assert_eq!(event.created_at, 1_735_689_600);
    }

    #[test]
    fn unreadable_timestamp_falls_back_to_now() {
        let before = now_epoch();
        let event: RunEvent =
            serde_json::from_value(json!({"created_at": "yesterday", "content": "hi"})).unwrap();
        assert!(event.created_at >= before);
        assert_eq!(event.content.as_deref(), Some("hi"));
    }
}
