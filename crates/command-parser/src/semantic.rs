//! Contract for the external semantic collaborator and parsing of its replies

use crate::error::SemanticError;
use crate::{EntityType, IntentType, Record};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Entity reported by the collaborator; it carries no confidence of its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticEntity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

/// Well-formed collaborator interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticResult {
    pub intent_type: IntentType,
    pub intent_confidence: f32,
    #[serde(default)]
    pub entities: Vec<SemanticEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub structured_command: Record,
}

impl SemanticResult {
    /// Parse a free-text reply that should contain one JSON object.
    ///
    /// Entities with an unrecognized type or an empty span are dropped; a confidence
    /// outside `[0, 1]` rejects the whole reply.
    pub fn from_reply(raw: &str) -> Result<Self, SemanticError> {
        #[derive(Deserialize)]
        struct RawEntity {
            #[serde(rename = "type")]
            entity_type: String,
            value: String,
            start: usize,
            end: usize,
        }
        #[derive(Deserialize)]
        struct RawReply {
            intent_type: String,
            intent_confidence: f32,
            #[serde(default)]
            entities: Vec<RawEntity>,
            #[serde(default)]
            reasoning: Option<String>,
            #[serde(default)]
            structured_command: Option<Record>,
        }

        let json = extract_json(raw)?;
        let reply: RawReply = serde_json::from_str(json)
            .map_err(|e| SemanticError::ResponseInvalid(format!("decode failed: {e}")))?;

        if !(0.0..=1.0).contains(&reply.intent_confidence) {
            return Err(SemanticError::ResponseInvalid(format!(
                "intent_confidence out of range: {}",
                reply.intent_confidence
            )));
        }

        let mut entities = Vec::with_capacity(reply.entities.len());
        for e in reply.entities {
            let Some(entity_type) = EntityType::parse(&e.entity_type) else {
                warn!("dropping collaborator entity of unknown type '{}'", e.entity_type);
                continue;
            };
            if e.start >= e.end {
                warn!("dropping collaborator entity '{}' with empty span", e.value);
                continue;
            }
            entities.push(SemanticEntity {
                entity_type,
                value: e.value,
                start: e.start,
                end: e.end,
            });
        }

        Ok(Self {
            intent_type: IntentType::parse(&reply.intent_type),
            intent_confidence: reply.intent_confidence,
            entities,
            reasoning: reply.reasoning,
            structured_command: reply.structured_command.unwrap_or_default(),
        })
    }
}

/// Extract the outermost JSON object from a reply that may carry surrounding prose
pub fn extract_json(response: &str) -> Result<&str, SemanticError> {
    let start = response
        .find('{')
        .ok_or_else(|| SemanticError::ResponseInvalid("no JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| SemanticError::ResponseInvalid("no closing brace found in response".into()))?;
    Ok(&response[start..=end])
}

/// External collaborator producing an optional richer interpretation.
///
/// Calls are synchronous and not retried; any error means "no semantic result".
pub trait SemanticAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<SemanticResult, SemanticError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "semantic"
    }
}
