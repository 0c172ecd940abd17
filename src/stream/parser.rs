//! 以行為單位的 `data:` 串流解析器。
//!
//! 傳輸層每收到一段文字就呼叫一次 [`consume`]；尚未以換行結尾的最後一行會留在緩衝區，
//! 等下一段文字到來再一起處理。串流結束時呼叫 [`FrameParser::finish`] 強制送出殘留內容。

use log::trace;

use super::event::RunEvent;
use super::legacy;

/// 事件行的前綴。
pub const DATA_PREFIX: &str = "data:";

/// 將前一次留下的緩衝區與新到的文字合併，回傳新的緩衝區與此次解出的事件。
///
/// 不以 `data:` 開頭的行會被略過；無法解碼的內容也會被靜默略過，不視為錯誤。
pub fn consume(buffer: &str, chunk: &str) -> (String, Vec<RunEvent>) {
    let mut combined = String::with_capacity(buffer.len() + chunk.len());
    combined.push_str(buffer);
    combined.push_str(chunk);

    let Some(last_newline) = combined.rfind('\n') else {
        return (combined, Vec::new());
    };

    let remaining = combined[last_newline + 1..].to_string();
    let events = combined[..last_newline]
        .split('\n')
        .filter_map(decode_line)
        .collect();
    (remaining, events)
}

/// 解碼單一完整行。
fn decode_line(line: &str) -> Option<RunEvent> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(serde_json::Value::Object(object)) => RunEvent::from_object(object),
        Ok(_) => None,
        Err(_) => {
            let decoded = legacy::decode(payload);
            if decoded.is_none() {
                trace!("略過無法解碼的事件行: {payload}");
            }
            decoded
        }
    }
}

/// 持有緩衝區的解析器，讓呼叫端不必自行傳遞緩衝字串。
///
/// 一個實例只服務一條串流，且必須依序呼叫。
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 餵入一段新文字，回傳此次完整解出的事件。
    pub fn push(&mut self, chunk: &str) -> Vec<RunEvent> {
        let (remaining, events) = consume(&self.buffer, chunk);
        self.buffer = remaining;
        events
    }

    /// 串流結束時呼叫：補上一個換行，讓殘留的最後一行也被處理。
    pub fn finish(&mut self) -> Vec<RunEvent> {
        self.push("\n")
    }

    /// 目前尚未形成完整行的內容。
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}

/// 跨區塊的 UTF-8 解碼狀態。
///
/// 多位元組字元可能被切在兩個網路區塊之間，不完整的尾端位元組會保留到下一次呼叫。
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解碼一段位元組；無效序列以 U+FFFD 取代。
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    out.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid = start + err.valid_up_to();
                    // valid_up_to 之前的位元組已確認是合法的 UTF-8。
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid + len;
                        }
                        None => {
                            // 尾端序列不完整，等待下一個區塊。
                            start = valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// 串流結束時，將剩餘的不完整位元組以替代字元輸出。
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
