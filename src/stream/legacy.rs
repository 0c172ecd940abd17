//! 舊式「偽建構子」事件格式的相容解碼器。
//!
//! 部分執行期版本不會輸出 JSON，而是直接把事件物件的除錯字串寫進串流，例如
//! `RunResponseContentEvent(event=RunResponseContent, content='hi', created_at=1000)`。
//! 這個格式沒有跳脫規則可言：值裡若出現 `, key=` 這樣的片段就會被切錯。
//! 只有在 JSON 解碼失敗時才會走到這裡。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

use super::event::RunEvent;

/// `<Name>Event(<body>)`，整行必須完全符合。
static CONSTRUCTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_]*Event)\((.*)\)\s*$").expect("constructor pattern")
});

/// 欄位起點：行首或逗號之後的 `key=`。
static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|,)\s*([A-Za-z_][A-Za-z0-9_]*)=").expect("key pattern"));

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").expect("integer pattern"));

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?$").expect("decimal pattern"));

/// 嘗試把一段偽建構子文字解碼為事件。格式不符時回傳 `None`。
pub fn decode(payload: &str) -> Option<RunEvent> {
    let captures = CONSTRUCTOR_RE.captures(payload)?;
    let body = captures.get(2)?.as_str();
    RunEvent::from_object(parse_fields(body))
}

/// 將括號內的 `key=value, key=value` 拆成 JSON 物件。
///
/// 同名欄位以第一次出現者為準，巢狀的偽建構子不會覆蓋外層欄位。
fn parse_fields(body: &str) -> Map<String, Value> {
    let keys: Vec<_> = KEY_RE.captures_iter(body).collect();
    let mut fields = Map::new();
    for (index, captures) in keys.iter().enumerate() {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let end = keys
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map_or(body.len(), |next| next.start());
        let raw = body[whole.end()..end].trim();
        if !fields.contains_key(key.as_str()) {
            fields.insert(key.as_str().to_string(), decode_value(raw));
        }
    }
    fields
}

fn decode_value(raw: &str) -> Value {
    match raw {
        "None" => return Value::Null,
        "True" => return Value::Bool(true),
        "False" => return Value::Bool(false),
        _ => {}
    }

    if let Some(inner) = strip_quotes(raw) {
        return Value::String(unescape(inner));
    }

    if INTEGER_RE.is_match(raw)
        && let Ok(value) = raw.parse::<i64>()
    {
        return Value::Number(value.into());
    }
    if DECIMAL_RE.is_match(raw)
        && let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64)
    {
        return Value::Number(number);
    }

    Value::String(raw.to_string())
}

fn strip_quotes(raw: &str) -> Option<&str> {
    let quote = raw.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    if raw.len() >= 2 && raw.ends_with(quote) {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
