use log::debug;
use serde_json::json;

use super::capabilities::{self, REASONING_MODEL};
use super::config::{AgentConfig, ModelDescriptor, flag};
use super::issue::{IssueKind, ReportBuilder, ValidationResult};

/// 每次執行的工具呼叫上限超過此值時發出警告。
pub const TOOL_CALL_LIMIT_THRESHOLD: u32 = 20;

/// 重試次數超過此值時發出警告。
pub const RETRY_THRESHOLD: u32 = 5;

/// 結構化輸出經由解析器處理時建議的溫度。
pub const STRUCTURED_TEMPERATURE: f64 = 0.1;

/// 啟用 `search_knowledge` 時執行期自動加入的工具。
pub const SEARCH_KNOWLEDGE_TOOL: &str = "search_knowledge";

/// 啟用 `read_chat_history` 時執行期自動加入的工具。
pub const CHAT_HISTORY_TOOL: &str = "get_chat_history";

/// 標準部署中既有的儲存 schema。
pub const STANDARD_SCHEMAS: [&str; 2] = ["ai", "public"];

const DEFAULT_MEMORY_TABLE: &str = "agent_memory";
const DEFAULT_KNOWLEDGE_TABLE: &str = "knowledge_documents";
const DEFAULT_STORAGE_TABLE: &str = "agent_sessions";

/// 依據模型能力與附加的工具檢查代理設定。
///
/// 不會失敗，所有發現都以資料回傳。規則群組依固定順序執行：模型能力、
/// 功能相依、工具、資源、衝突；順序只影響各清單中問題的排列。
pub fn validate_config(
    model: &ModelDescriptor,
    config: &AgentConfig,
    tools: &[String],
) -> ValidationResult {
    let mut report = ReportBuilder::default();
    model_capability_rules(model, config, &mut report);
    dependency_rules(config, &mut report);
    tool_rules(model, config, tools, &mut report);
    resource_rules(config, &mut report);
    conflict_rules(model, config, &mut report);

    let result = report.finish();
    debug!(
        "Validated config for {}: {} errors, {} warnings, {} suggestions",
        model.id,
        result.errors().len(),
        result.warnings().len(),
        result.suggestions().len()
    );
    result
}

fn model_capability_rules(model: &ModelDescriptor, config: &AgentConfig, report: &mut ReportBuilder) {
    let Some(caps) = capabilities::lookup(&model.id) else {
        report.warning(
            "model.id",
            IssueKind::UnknownModel,
            format!(
                "Model '{}' is not in the capability table; its capabilities cannot be verified",
                model.id
            ),
        );
        return;
    };

    if config.reasoning_enabled() && !caps.reasoning {
        report.error(
            "reasoning.enabled",
            IssueKind::UnsupportedFeature,
            format!("Model '{}' does not support reasoning", model.id),
        );
        report.suggest(
            "model.id",
            IssueKind::Recommendation,
            format!("Switch to a reasoning-capable model such as '{REASONING_MODEL}'"),
            Some(json!(REASONING_MODEL)),
        );
    }

    if flag(config.show_tool_calls) && !caps.tool_calls {
        report.error(
            "show_tool_calls",
            IssueKind::UnsupportedFeature,
            format!("Model '{}' does not support tool calls", model.id),
        );
    }

    if flag(config.structured_outputs) && !caps.structured_outputs {
        report.warning(
            "structured_outputs",
            IssueKind::Fallback,
            format!(
                "Model '{}' has no native structured outputs; responses will be parsed from text",
                model.id
            ),
        );
        if !flag(config.parse_response) {
            report.suggest(
                "parse_response",
                IssueKind::Recommendation,
                "Enable the response parser to get structured results from this model",
                Some(json!(true)),
            );
        }
    }

    if flag(config.use_json_mode) && !caps.json_mode {
        report.error(
            "use_json_mode",
            IssueKind::UnsupportedFeature,
            format!("Model '{}' does not support JSON mode", model.id),
        );
    }

    if flag(config.stream) && !caps.streaming {
        report.warning(
            "stream",
            IssueKind::Fallback,
            format!(
                "Model '{}' does not support streaming; responses will arrive in one piece",
                model.id
            ),
        );
    }
}

fn dependency_rules(config: &AgentConfig, report: &mut ReportBuilder) {
    if config.uses_memory() {
        let field = if config.memory_enabled() {
            "memory.enabled"
        } else {
            "enable_agentic_memory"
        };
        if !config.storage_enabled() {
            report.error(
                field,
                IssueKind::MissingDependency,
                "Memory requires storage to be enabled",
            );
            report.suggest(
                "storage.enabled",
                IssueKind::Recommendation,
                "Enable storage so memories can be persisted",
                Some(json!(true)),
            );
        }
        let table = config.memory.as_ref().and_then(|memory| memory.table_name.as_deref());
        if is_blank(table) {
            report.warning(
                "memory.table_name",
                IssueKind::DefaultApplied,
                format!("No memory table name set; '{DEFAULT_MEMORY_TABLE}' will be used"),
            );
        }
    }

    if let Some(knowledge) = config.knowledge.as_ref().filter(|knowledge| knowledge.enabled) {
        if knowledge.urls.is_empty() && knowledge.pdf_paths.is_empty() {
            report.error(
                "knowledge.urls",
                IssueKind::MissingConfiguration,
                "Knowledge base is enabled but has no URLs or PDF paths to load",
            );
        }
        if is_blank(knowledge.table_name.as_deref()) {
            report.warning(
                "knowledge.table_name",
                IssueKind::DefaultApplied,
                format!("No knowledge table name set; '{DEFAULT_KNOWLEDGE_TABLE}' will be used"),
            );
        }
    }

    if flag(config.search_knowledge) && !config.knowledge_enabled() {
        report.error(
            "search_knowledge",
            IssueKind::MissingDependency,
            "Searching knowledge requires a knowledge base to be enabled",
        );
    }

    if let Some(team) = config.team.as_ref().filter(|team| team.enabled) {
        if team.respond_directly {
            report.warning(
                "team.respond_directly",
                IssueKind::Conflict,
                "Responding directly bypasses team coordination; member answers are returned as-is",
            );
        }
        if !team.add_transfer_instructions {
            report.suggest(
                "team.add_transfer_instructions",
                IssueKind::Recommendation,
                "Add transfer instructions so the leader knows how to hand off tasks",
                Some(json!(true)),
            );
        }
    }
}

fn tool_rules(
    model: &ModelDescriptor,
    config: &AgentConfig,
    tools: &[String],
    report: &mut ReportBuilder,
) {
    if tools.is_empty() {
        return;
    }

    if let Some(caps) = capabilities::lookup(&model.id)
        && !caps.tool_calls
    {
        report.error(
            "tools",
            IssueKind::UnsupportedFeature,
            format!(
                "Model '{}' does not support tool calls, but {} tool(s) are attached",
                model.id,
                tools.len()
            ),
        );
    }

    if let Some(limit) = config.tool_call_limit
        && limit > TOOL_CALL_LIMIT_THRESHOLD
    {
        report.warning(
            "tool_call_limit",
            IssueKind::Performance,
            format!(
                "A tool call limit of {limit} is above {TOOL_CALL_LIMIT_THRESHOLD}; long runs may be slow and costly"
            ),
        );
    }

    let attached = |name: &str| tools.iter().any(|tool| tool == name);

    if flag(config.search_knowledge) && !attached(SEARCH_KNOWLEDGE_TOOL) {
        report.suggest(
            "tools",
            IssueKind::Informational,
            format!("The '{SEARCH_KNOWLEDGE_TOOL}' tool will be added automatically"),
            None,
        );
    }

    if flag(config.read_chat_history) && !attached(CHAT_HISTORY_TOOL) {
        report.suggest(
            "tools",
            IssueKind::Informational,
            format!("The '{CHAT_HISTORY_TOOL}' tool will be added automatically"),
            None,
        );
    }
}

fn resource_rules(config: &AgentConfig, report: &mut ReportBuilder) {
    if let Some(memory) = config.memory.as_ref().filter(|memory| memory.enabled)
        && let Some(db_url) = memory.db_url.as_deref().filter(|url| !url.trim().is_empty())
        && !is_postgres_url(db_url)
    {
        report.error(
            "memory.db_url",
            IssueKind::InvalidValue,
            "Memory database URL must be a valid postgresql:// or postgres:// URL",
        );
    }

    if let Some(storage) = config.storage.as_ref() {
        if storage.enabled && is_blank(storage.table_name.as_deref()) {
            report.warning(
                "storage.table_name",
                IssueKind::DefaultApplied,
                format!("No storage table name set; '{DEFAULT_STORAGE_TABLE}' will be used"),
            );
        }
        if let Some(schema) = storage.schema.as_deref()
            && !STANDARD_SCHEMAS.contains(&schema)
        {
            report.warning(
                "storage.schema",
                IssueKind::CustomValue,
                format!("Custom schema '{schema}' is used; ensure it exists in the database"),
            );
        }
    }
}

fn conflict_rules(model: &ModelDescriptor, config: &AgentConfig, report: &mut ReportBuilder) {
    let json_mode = flag(config.use_json_mode);
    let structured = flag(config.structured_outputs);

    if json_mode && flag(config.stream) {
        report.warning(
            "use_json_mode",
            IssueKind::Conflict,
            "JSON mode with streaming may deliver incomplete JSON fragments mid-stream",
        );
    }

    if structured && json_mode {
        report.warning(
            "structured_outputs",
            IssueKind::Conflict,
            "Structured outputs and JSON mode are redundant; pick one",
        );
    }

    if structured
        && flag(config.parse_response)
        && model
            .temperature
            .is_none_or(|temperature| temperature > STRUCTURED_TEMPERATURE)
    {
        report.suggest(
            "model.temperature",
            IssueKind::Recommendation,
            "Lower the temperature for more consistent structured output",
            Some(json!(STRUCTURED_TEMPERATURE)),
        );
    }

    if let Some(retries) = config.retries
        && retries > RETRY_THRESHOLD
    {
        report.warning(
            "retries",
            IssueKind::Performance,
            format!("{retries} retries can add a lot of latency when calls keep failing"),
        );
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|text| text.trim().is_empty())
}

fn is_postgres_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|url| matches!(url.scheme(), "postgresql" | "postgres"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::config::{KnowledgeConfig, MemoryConfig, StorageConfig, TeamConfig};

    fn gpt_4o() -> ModelDescriptor {
        ModelDescriptor::new("openai", "gpt-4o")
    }

    fn fields(issues: &[crate::validation::ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.field.as_str()).collect()
    }

    #[test]
    fn unknown_model_yields_single_warning_and_skips_capabilities() {
        let config = AgentConfig {
            use_json_mode: Some(true),
            show_tool_calls: Some(true),
            ..AgentConfig::default()
        };
        let model = ModelDescriptor::new("custom", "my-finetune");
        let mut report = ReportBuilder::default();
        model_capability_rules(&model, &config, &mut report);
        let result = report.finish();
        assert!(result.errors().is_empty());
        assert_eq!(fields(result.warnings()), vec!["model.id"]);
        assert_eq!(result.warnings()[0].kind, IssueKind::UnknownModel);
    }

    #[test]
    fn json_mode_on_model_without_support_is_error() {
        let config = AgentConfig {
            use_json_mode: Some(true),
            ..AgentConfig::default()
        };
        let model = ModelDescriptor::new("anthropic", "claude-3-5-sonnet-20241022");
        let result = validate_config(&model, &config, &[]);
        assert_eq!(fields(result.errors()), vec!["use_json_mode"]);
    }

    #[test]
    fn tool_call_display_on_model_without_tool_calls_is_error() {
        let config = AgentConfig {
            show_tool_calls: Some(true),
            ..AgentConfig::default()
        };
        let model = ModelDescriptor::new("deepseek", "deepseek-reasoner");
        let result = validate_config(&model, &config, &[]);

        assert!(!result.is_valid());
        assert_eq!(fields(result.errors()), vec!["show_tool_calls"]);
        assert_eq!(result.errors()[0].kind, IssueKind::UnsupportedFeature);

        let supported = validate_config(&gpt_4o(), &config, &[]);
        assert!(!fields(supported.errors()).contains(&"show_tool_calls"));
    }

    #[test]
    fn streaming_degradation_is_only_a_warning() {
        let config = AgentConfig {
            stream: Some(true),
            ..AgentConfig::default()
        };
        let result = validate_config(&ModelDescriptor::new("openai", "o1"), &config, &[]);
        assert!(result.is_valid());
        assert_eq!(fields(result.warnings()), vec!["stream"]);
    }

    #[test]
    fn structured_outputs_fall_back_to_parser() {
        let config = AgentConfig {
            structured_outputs: Some(true),
            ..AgentConfig::default()
        };
        let model = ModelDescriptor::new("deepseek", "deepseek-chat");
        let result = validate_config(&model, &config, &[]);
        assert!(result.is_valid());
        assert_eq!(fields(result.warnings()), vec!["structured_outputs"]);
        assert_eq!(fields(result.suggestions()), vec!["parse_response"]);
    }

    #[test]
    fn agentic_memory_without_storage_reports_its_own_field() {
        let config = AgentConfig {
            enable_agentic_memory: Some(true),
            ..AgentConfig::default()
        };
        let result = validate_config(&gpt_4o(), &config, &[]);
        assert_eq!(fields(result.errors()), vec!["enable_agentic_memory"]);
        assert_eq!(fields(result.warnings()), vec!["memory.table_name"]);
    }

    #[test]
    fn knowledge_without_sources_is_error() {
        let config = AgentConfig {
            knowledge: Some(KnowledgeConfig {
                enabled: true,
                ..KnowledgeConfig::default()
            }),
            ..AgentConfig::default()
        };
        let result = validate_config(&gpt_4o(), &config, &[]);
        assert_eq!(fields(result.errors()), vec!["knowledge.urls"]);
        assert_eq!(fields(result.warnings()), vec!["knowledge.table_name"]);
    }

    #[test]
    fn search_knowledge_requires_knowledge() {
        let config = AgentConfig {
            search_knowledge: Some(true),
            ..AgentConfig::default()
        };
        let result = validate_config(&gpt_4o(), &config, &[]);
        assert_eq!(fields(result.errors()), vec!["search_knowledge"]);
        assert_eq!(result.errors()[0].kind, IssueKind::MissingDependency);
    }

    #[test]
    fn team_rules() {
        let config = AgentConfig {
            team: Some(TeamConfig {
                enabled: true,
                respond_directly: true,
                add_transfer_instructions: false,
            }),
            ..AgentConfig::default()
        };
        let result = validate_config(&gpt_4o(), &config, &[]);
        assert!(result.is_valid());
        assert_eq!(fields(result.warnings()), vec!["team.respond_directly"]);
        assert_eq!(
            fields(result.suggestions()),
            vec!["team.add_transfer_instructions"]
        );
    }

    #[test]
    fn tool_rules_only_run_with_tools_attached() {
        let config = AgentConfig {
            tool_call_limit: Some(50),
            read_chat_history: Some(true),
            ..AgentConfig::default()
        };
        let model = ModelDescriptor::new("deepseek", "deepseek-reasoner");
        let result = validate_config(&model, &config, &[]);
        assert!(result.is_valid());
        assert!(result.warnings().is_empty());

        let tools = vec!["duckduckgo".to_string(), "calculator".to_string()];
        let result = validate_config(&model, &config, &tools);
        assert_eq!(fields(result.errors()), vec!["tools"]);
        assert!(result.errors()[0].message.contains("2 tool(s)"));
        assert_eq!(fields(result.warnings()), vec!["tool_call_limit"]);
        assert_eq!(fields(result.suggestions()), vec!["tools"]);
    }

    #[test]
    fn implicit_tools_already_attached_are_not_mentioned() {
        let config = AgentConfig {
            knowledge: Some(KnowledgeConfig {
                enabled: true,
                urls: vec!["https://docs.example.com/guide.pdf".into()],
                table_name: Some("docs".into()),
                ..KnowledgeConfig::default()
            }),
            search_knowledge: Some(true),
            ..AgentConfig::default()
        };
        let tools = vec![SEARCH_KNOWLEDGE_TOOL.to_string()];
        let result = validate_config(&gpt_4o(), &config, &tools);
        assert!(result.is_valid());
        assert!(result.warnings().is_empty());
        assert!(result.suggestions().is_empty());
    }

    #[test]
    fn memory_db_url_must_be_postgres() {
        let mut config = AgentConfig {
            memory: Some(MemoryConfig {
                enabled: true,
                table_name: Some("memories".into()),
                db_url: Some("mysql://localhost/agents".into()),
            }),
            storage: Some(StorageConfig {
                enabled: true,
                table_name: Some("sessions".into()),
                schema: None,
            }),
            ..AgentConfig::default()
        };
        let result = validate_config(&gpt_4o(), &config, &[]);
        assert_eq!(fields(result.errors()), vec!["memory.db_url"]);

        for valid in [
            "postgresql://ai:ai@localhost:5532/ai",
            "postgres://localhost/agents",
        ] {
            config.memory.as_mut().unwrap().db_url = Some(valid.into());
            assert!(validate_config(&gpt_4o(), &config, &[]).is_valid(), "{valid}");
        }

        config.memory.as_mut().unwrap().db_url = Some("not a url".into());
        assert!(!validate_config(&gpt_4o(), &config, &[]).is_valid());
    }

    #[test]
    fn storage_defaults_and_custom_schema_warn() {
        let config = AgentConfig {
            storage: Some(StorageConfig {
                enabled: true,
                table_name: None,
                schema: Some("tenant_7".into()),
            }),
            ..AgentConfig::default()
        };
        let result = validate_config(&gpt_4o(), &config, &[]);
        assert!(result.is_valid());
        assert_eq!(
            fields(result.warnings()),
            vec!["storage.table_name", "storage.schema"]
        );

        let standard = AgentConfig {
            storage: Some(StorageConfig {
                enabled: true,
                table_name: Some("sessions".into()),
                schema: Some("ai".into()),
            }),
            ..AgentConfig::default()
        };
        assert!(validate_config(&gpt_4o(), &standard, &[]).warnings().is_empty());
    }

    #[test]
    fn conflicting_output_modes_warn() {
        let config = AgentConfig {
            use_json_mode: Some(true),
            structured_outputs: Some(true),
            stream: Some(true),
            retries: Some(6),
            ..AgentConfig::default()
        };
        let result = validate_config(&gpt_4o(), &config, &[]);
        assert!(result.is_valid());
        assert_eq!(
            fields(result.warnings()),
            vec!["use_json_mode", "structured_outputs", "retries"]
        );
    }

    #[test]
    fn temperature_suggestion_respects_current_value() {
        let config = AgentConfig {
            structured_outputs: Some(true),
            parse_response: Some(true),
            ..AgentConfig::default()
        };
        let mut model = gpt_4o();
        model.temperature = Some(0.9);
        let result = validate_config(&model, &config, &[]);
        assert_eq!(fields(result.suggestions()), vec!["model.temperature"]);
        assert_eq!(
            result.suggestions()[0].suggested_value,
            Some(json!(STRUCTURED_TEMPERATURE))
        );

        model.temperature = Some(0.0);
        assert!(validate_config(&model, &config, &[]).suggestions().is_empty());
    }

    #[test]
    fn retry_threshold_is_exclusive() {
        let config = AgentConfig {
            retries: Some(RETRY_THRESHOLD),
            ..AgentConfig::default()
        };
        assert!(validate_config(&gpt_4o(), &config, &[]).warnings().is_empty());
    }
}
