/// 模型原生支援的功能旗標。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub reasoning: bool,
    pub tool_calls: bool,
    pub structured_outputs: bool,
    pub json_mode: bool,
    pub streaming: bool,
}

/// 在不支援推理的模型上要求推理時，建議改用的模型。
pub const REASONING_MODEL: &str = "o3-mini";

const fn caps(
    reasoning: bool,
    tool_calls: bool,
    structured_outputs: bool,
    json_mode: bool,
    streaming: bool,
) -> ModelCapabilities {
    ModelCapabilities {
        reasoning,
        tool_calls,
        structured_outputs,
        json_mode,
        streaming,
    }
}

// (模型 ID, reasoning, tool_calls, structured_outputs, json_mode, streaming)
static CAPABILITY_TABLE: &[(&str, ModelCapabilities)] = &[
    // OpenAI
    ("gpt-4o", caps(false, true, true, true, true)),
    ("gpt-4o-mini", caps(false, true, true, true, true)),
    ("gpt-4-turbo", caps(false, true, false, true, true)),
    ("gpt-3.5-turbo", caps(false, true, false, true, true)),
    ("o1", caps(true, true, true, true, false)),
    ("o1-mini", caps(true, false, false, false, true)),
    ("o3-mini", caps(true, true, true, true, true)),
    // Anthropic
    ("claude-3-7-sonnet-20250219", caps(true, true, false, false, true)),
    ("claude-3-5-sonnet-20241022", caps(false, true, false, false, true)),
    ("claude-3-5-haiku-20241022", caps(false, true, false, false, true)),
    // Google
    ("gemini-2.0-flash", caps(false, true, true, true, true)),
    ("gemini-2.0-flash-thinking-exp", caps(true, false, false, false, true)),
    ("gemini-1.5-pro", caps(false, true, true, true, true)),
    // DeepSeek
    ("deepseek-chat", caps(false, true, false, true, true)),
    ("deepseek-reasoner", caps(true, false, false, false, true)),
    // 本地（Ollama）
    ("llama3.1", caps(false, true, false, true, true)),
];

/// 查詢模型 ID 的能力。未知的 ID 回傳 `None`。
pub fn lookup(model_id: &str) -> Option<&'static ModelCapabilities> {
    CAPABILITY_TABLE
        .iter()
        .find(|(id, _)| *id == model_id)
        .map(|(_, capabilities)| capabilities)
}

/// 依表格順序列出所有已知的模型 ID。
pub fn known_models() -> impl Iterator<Item = &'static str> {
    CAPABILITY_TABLE.iter().map(|(id, _)| *id)
}
