//! 代理設定的跨欄位驗證。
//!
//! 以靜態能力表與附加的工具清單檢查 [`ModelDescriptor`] 與 [`AgentConfig`]，
//! 結果以 [`ValidationResult`] 回傳；驗證本身不會失敗。

/// `capabilities`：靜態的模型能力表。
pub mod capabilities;

/// `config`：模型描述與代理設定型別，以及套用建議的函式。
pub mod config;

/// `issue`：驗證問題與結果型別。
pub mod issue;

/// `rules`：各規則群組與 `validate_config` 進入點。
pub mod rules;

pub use capabilities::{ModelCapabilities, REASONING_MODEL};
pub use config::{AgentConfig, ModelDescriptor, apply_suggestion};
pub use issue::{IssueKind, Severity, ValidationIssue, ValidationResult};
pub use rules::validate_config;
