use serde::Serialize;
use serde_json::Value;

/// 問題的嚴重程度，決定它落在結果的哪一個清單。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// 設定無法直接使用。
    Error,
    /// 可以使用，但部分功能會降級或行為不如預期。
    Warning,
    /// 可選的改善建議。
    Suggestion,
}

/// 每個問題附帶的子類型標記。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownModel,
    UnsupportedFeature,
    Fallback,
    MissingDependency,
    MissingConfiguration,
    DefaultApplied,
    Conflict,
    Performance,
    InvalidValue,
    CustomValue,
    Recommendation,
    Informational,
}

/// 單一驗證問題。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// 問題所屬欄位的點分路徑，例如 `memory.enabled`。
    pub field: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// 介面可一鍵套用的建議值，只出現在建議中。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<Value>,
}

/// 一次驗證的結果。
///
/// 只能透過 [`ReportBuilder`] 建立，因此 `is_valid` 恆等於 `errors().is_empty()`。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    suggestions: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn suggestions(&self) -> &[ValidationIssue] {
        &self.suggestions
    }

    /// 依嚴重程度列出所有問題，錯誤在前。
    pub fn issues(&self) -> impl Iterator<Item = (Severity, &ValidationIssue)> {
        self.errors
            .iter()
            .map(|issue| (Severity::Error, issue))
            .chain(self.warnings.iter().map(|issue| (Severity::Warning, issue)))
            .chain(
                self.suggestions
                    .iter()
                    .map(|issue| (Severity::Suggestion, issue)),
            )
    }
}

/// 規則群組執行期間累積問題。
#[derive(Debug, Default)]
pub(crate) struct ReportBuilder {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    suggestions: Vec<ValidationIssue>,
}

impl ReportBuilder {
    pub(crate) fn error(&mut self, field: &str, kind: IssueKind, message: impl Into<String>) {
        self.errors.push(issue(field, kind, message.into(), None));
    }

    pub(crate) fn warning(&mut self, field: &str, kind: IssueKind, message: impl Into<String>) {
        self.warnings.push(issue(field, kind, message.into(), None));
    }

    pub(crate) fn suggest(
        &mut self,
        field: &str,
        kind: IssueKind,
        message: impl Into<String>,
        suggested_value: Option<Value>,
    ) {
        self.suggestions
            .push(issue(field, kind, message.into(), suggested_value));
    }

    pub(crate) fn finish(self) -> ValidationResult {
        ValidationResult {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            suggestions: self.suggestions,
        }
    }
}

fn issue(
    field: &str,
    kind: IssueKind,
    message: String,
    suggested_value: Option<Value>,
) -> ValidationIssue {
    ValidationIssue {
        field: field.to_string(),
        message,
        kind,
        suggested_value,
    }
}
