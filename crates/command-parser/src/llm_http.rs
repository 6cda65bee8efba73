//! OpenAI-compatible chat-completions collaborator (blocking HTTP)

use crate::error::SemanticError;
use crate::registry::Registry;
use crate::{SemanticAnalyzer, SemanticResult};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Connection and sampling settings for the language-model collaborator
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            temperature: 0.1,
            max_tokens: 1000,
        }
    }

    /// Required: OPENAI_API_KEY
    /// Optional: OPENAI_BASE_URL, MODEL_NAME
    pub fn from_env() -> Result<Self, SemanticError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SemanticError::Unavailable("OPENAI_API_KEY not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("MODEL_NAME") {
            config.model = model;
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

pub struct LlmAnalyzer {
    client: Client,
    config: LlmConfig,
    system_prompt: String,
}

impl LlmAnalyzer {
    pub fn new(config: LlmConfig, registry: &Registry) -> Result<Self, SemanticError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SemanticError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            system_prompt: system_prompt(registry),
            config,
        })
    }

    pub fn from_env(registry: &Registry) -> Result<Self, SemanticError> {
        Self::new(LlmConfig::from_env()?, registry)
    }

    fn complete(&self, text: &str) -> Result<String, SemanticError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &self.system_prompt,
                },
                Message {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let resp = self
            .client
            .post(self.config.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .map_err(|e| SemanticError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SemanticError::Unavailable(format!("HTTP {}", resp.status())));
        }

        let body: ChatResponse = resp
            .json()
            .map_err(|e| SemanticError::ResponseInvalid(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| SemanticError::ResponseInvalid("empty completion".into()))
    }
}

impl SemanticAnalyzer for LlmAnalyzer {
    fn analyze(&self, text: &str) -> Result<SemanticResult, SemanticError> {
        let content = self.complete(text)?;
        debug!("LLM response: {}", content);
        SemanticResult::from_reply(&content)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Instructions listing the registry vocabulary and the expected reply shape
pub fn system_prompt(registry: &Registry) -> String {
    let intents: Vec<String> = registry
        .intents()
        .iter()
        .map(|i| format!("- {}: {} - {}", i.spec.intent_type, i.spec.name, i.spec.description))
        .collect();
    let entities: Vec<String> = registry
        .entities()
        .iter()
        .map(|e| {
            let examples: Vec<&str> = e.spec.examples.iter().take(3).map(String::as_str).collect();
            format!("- {}: {} - 例如: {}", e.spec.entity_type, e.spec.name, examples.join(", "))
        })
        .collect();

    format!(
        r#"你是一个语音控制机器人的自然语言理解系统。你的任务是分析用户的语音指令，识别意图并提取相关实体。

支持的意图类型：
{intents}

支持的实体类型：
{entities}

请分析用户输入的文本，返回JSON格式的结果，包含：
1. intent_type: 识别的意图类型
2. intent_confidence: 意图识别的置信度 (0-1)
3. entities: 提取的实体列表，每个实体包含type、value、start、end（按字符计数）
4. reasoning: 分析推理过程
5. structured_command: 结构化的指令参数

示例输入："巡检A区2号房主柜温度"
示例输出：
{{
    "intent_type": "patrol_inspection",
    "intent_confidence": 0.95,
    "entities": [
        {{"type": "location", "value": "A区", "start": 2, "end": 4}},
        {{"type": "location", "value": "2号房", "start": 4, "end": 7}},
        {{"type": "equipment", "value": "主柜", "start": 7, "end": 9}},
        {{"type": "parameter", "value": "温度", "start": 9, "end": 11}}
    ],
    "reasoning": "用户要求巡检A区2号房的主柜温度，这是一个典型的巡检指令",
    "structured_command": {{
        "action": "patrol_inspection",
        "location": {{"zone": "A", "room": "2"}},
        "equipment": "主柜",
        "parameter": "温度"
    }}
}}

请严格按照JSON格式返回结果，不要包含其他内容。"#,
        intents = intents.join("\n"),
        entities = entities.join("\n"),
    )
}
