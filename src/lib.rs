//! 代理控制面板的核心邏輯。
//!
//! 包含兩個互不相依的單元：將代理執行串流解碼為事件的解析器，
//! 以及檢查代理設定與模型能力是否一致的驗證器。

/// `config` 模組：面板設定（執行期位址、API 金鑰、日誌）的載入與儲存。
pub mod config;

/// `logging` 模組：初始化 `log` 的輸出端。
pub mod logging;

/// `stream` 模組：執行串流的解析與 HTTP 傳輸。
pub mod stream;

/// `validation` 模組：代理設定驗證。
pub mod validation;

pub use config::PanelSettings;
pub use stream::{FrameParser, RunEvent, RunStreamClient};
pub use validation::{ValidationResult, validate_config};
