//! Fusion of rule-based and collaborator interpretations into one `CommandResult`

use crate::classifier::IntentClassifier;
use crate::commands::build_structured_command;
use crate::entities::{resolve_overlaps, EntityExtractor};
use crate::registry::Registry;
use crate::{CommandResult, Entity, Intent, SemanticResult};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Confidence assigned to collaborator entities
const SEMANTIC_ENTITY_CONFIDENCE: f32 = 0.9;

const INTENT_WEIGHT: f32 = 0.5;
const ENTITY_WEIGHT: f32 = 0.3;
const SEMANTIC_WEIGHT: f32 = 0.2;

/// Runs the rule-based pipeline and reconciles it with an optional semantic result
#[derive(Debug, Clone)]
pub struct FusionEngine {
    registry: Arc<Registry>,
    classifier: IntentClassifier,
    extractor: EntityExtractor,
}

impl FusionEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            classifier: IntentClassifier::new(registry.clone()),
            extractor: EntityExtractor::new(registry.clone()),
            registry,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn extractor(&self) -> &EntityExtractor {
        &self.extractor
    }

    /// Classify, extract and fuse. Deterministic apart from the timestamp.
    pub fn process(&self, text: &str, semantic: Option<&SemanticResult>) -> CommandResult {
        let rule_intent = self.classifier.classify(text);
        let rule_entities = self.extractor.extract(text);
        self.fuse(text, rule_intent, rule_entities, semantic)
    }

    /// Merge precomputed rule-based results with an optional semantic result
    pub fn fuse(
        &self,
        text: &str,
        rule_intent: Intent,
        rule_entities: Vec<Entity>,
        semantic: Option<&SemanticResult>,
    ) -> CommandResult {
        let intent = self.merge_intent(rule_intent, semantic);

        let (entities, structured_command) = match semantic {
            Some(result) => {
                let collaborator = self.semantic_entities(text, result);
                (
                    merge_entities(collaborator, rule_entities),
                    result.structured_command.clone(),
                )
            }
            None => {
                let command = build_structured_command(&intent, &rule_entities);
                (rule_entities, command)
            }
        };

        let validation_errors: Vec<String> = self
            .registry
            .validate(intent.intent_type, &entities)
            .iter()
            .map(ToString::to_string)
            .collect();
        let overall_confidence = calculate_confidence(&intent, &entities, semantic);

        info!(
            "Command processed: {} with confidence {:.2} (valid: {})",
            intent.intent_type,
            overall_confidence,
            validation_errors.is_empty()
        );

        CommandResult {
            original_text: text.to_string(),
            intent,
            entities,
            overall_confidence,
            structured_command: Some(structured_command),
            is_valid: validation_errors.is_empty(),
            validation_errors,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Collaborator intent wins only with strictly higher confidence
    fn merge_intent(&self, rule_intent: Intent, semantic: Option<&SemanticResult>) -> Intent {
        let Some(result) = semantic else {
            return rule_intent;
        };
        if result.intent_confidence <= rule_intent.confidence {
            return rule_intent;
        }
        let (name, description) = self
            .registry
            .intent(result.intent_type)
            .map(|spec| (spec.name.clone(), spec.description.clone()))
            .unwrap_or_default();
        Intent {
            intent_type: result.intent_type,
            name,
            confidence: result.intent_confidence,
            description,
        }
    }

    /// Collaborator entities as `Entity`, dropping spans outside the text
    fn semantic_entities(&self, text: &str, result: &SemanticResult) -> Vec<Entity> {
        let len = text.chars().count();
        result
            .entities
            .iter()
            .filter(|e| {
                let in_bounds = e.start < e.end && e.end <= len;
                if !in_bounds {
                    warn!(
                        "dropping collaborator entity '{}' with span {}..{} outside text",
                        e.value, e.start, e.end
                    );
                }
                in_bounds
            })
            .map(|e| {
                let mut entity = Entity::new(
                    e.entity_type,
                    e.value.clone(),
                    e.start,
                    e.end,
                    SEMANTIC_ENTITY_CONFIDENCE,
                );
                entity.normalized_value = self.extractor.normalize(e.entity_type, &e.value);
                entity
            })
            .collect()
    }
}

/// Collaborator entities first, then every rule entity that overlaps none of them
fn merge_entities(collaborator: Vec<Entity>, rule: Vec<Entity>) -> Vec<Entity> {
    let mut merged = resolve_overlaps(collaborator);
    for entity in rule {
        if !merged.iter().any(|m| m.overlaps(&entity)) {
            merged.push(entity);
        }
    }
    merged.sort_by_key(|e| e.start);
    merged
}

/// `intent*0.5 + mean(entity)*0.3 + semantic*0.2`, capped at 1.0 and not renormalized
fn calculate_confidence(
    intent: &Intent,
    entities: &[Entity],
    semantic: Option<&SemanticResult>,
) -> f32 {
    let intent_score = intent.confidence * INTENT_WEIGHT;
    let entity_score = if entities.is_empty() {
        0.0
    } else {
        entities.iter().map(|e| e.confidence).sum::<f32>() / entities.len() as f32 * ENTITY_WEIGHT
    };
    let semantic_score = semantic.map_or(0.0, |s| s.intent_confidence * SEMANTIC_WEIGHT);
    (intent_score + entity_score + semantic_score).clamp(0.0, 1.0)
}
