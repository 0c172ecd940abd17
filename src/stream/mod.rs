//! 代理執行串流的解碼與傳輸。
//!
//! 回應本文是以換行分隔的文字，事件行以 `data:` 開頭，內容為 JSON，
//! 或是舊版執行期輸出的偽建構子字串。

/// `event` 模組：事件種類與事件結構。
pub mod event;

/// `legacy` 模組：偽建構子格式的相容解碼器。
pub mod legacy;

/// `parser` 模組：逐段累積文字並切出完整事件行。
pub mod parser;

/// `client` 模組：透過 HTTP 呼叫執行期並驅動解析器。
pub mod client;

pub use client::{RunRequest, RunStreamClient, StreamError, StreamUpdate};
pub use event::{RunEvent, RunEventKind};
pub use parser::{FrameParser, Utf8Decoder, consume};
