//! Intent classification: keyword and composite-pattern scorers, summed per intent

use crate::registry::Registry;
use crate::{Entity, Intent, IntentType};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const KEYWORD_WEIGHT: f32 = 0.6;
const PATTERN_WEIGHT: f32 = 0.4;

/// Per-intent scores from both scorers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentScores {
    pub keyword: BTreeMap<IntentType, f32>,
    pub pattern: BTreeMap<IntentType, f32>,
}

impl IntentScores {
    /// Weighted sum; a scorer that produced nothing for an intent contributes 0
    pub fn combined(&self, intent_type: IntentType) -> f32 {
        self.keyword.get(&intent_type).copied().unwrap_or(0.0) * KEYWORD_WEIGHT
            + self.pattern.get(&intent_type).copied().unwrap_or(0.0) * PATTERN_WEIGHT
    }
}

/// Rule-based intent classifier
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    registry: Arc<Registry>,
}

impl IntentClassifier {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Keyword scorer: `min(0.9, hits / |K| + 0.3)` for every intent with at least one hit
    pub fn keyword_scores(&self, text: &str) -> BTreeMap<IntentType, f32> {
        let lower = text.to_lowercase();
        let mut scores = BTreeMap::new();
        for intent in self.registry.intents() {
            let keywords = &intent.spec.keywords;
            let hits = keywords
                .iter()
                .filter(|k| !k.is_empty() && (text.contains(k.as_str()) || lower.contains(k.as_str())))
                .count();
            if hits > 0 {
                let score = (hits as f32 / keywords.len() as f32 + 0.3).min(0.9);
                scores.insert(intent.spec.intent_type, score);
            }
        }
        scores
    }

    /// Pattern scorer: fixed confidence for each intent whose composite rule matches
    pub fn pattern_scores(&self, text: &str) -> BTreeMap<IntentType, f32> {
        self.registry
            .intents()
            .iter()
            .filter_map(|intent| {
                let re = intent.pattern.as_ref()?;
                re.is_match(text)
                    .then_some((intent.spec.intent_type, intent.spec.pattern_confidence))
            })
            .collect()
    }

    pub fn score(&self, text: &str) -> IntentScores {
        IntentScores {
            keyword: self.keyword_scores(text),
            pattern: self.pattern_scores(text),
        }
    }

    /// Classify text. Never fails; falls back to the `unknown` intent.
    pub fn classify(&self, text: &str) -> Intent {
        let scores = self.score(text);

        // Registry order is the tie-break priority; only a strictly higher score displaces
        let mut best: Option<(IntentType, f32)> = None;
        for intent in self.registry.intents() {
            let t = intent.spec.intent_type;
            let combined = scores.combined(t);
            if combined > 0.0 {
                debug!("intent {} scored {:.3}", t, combined);
            }
            if combined > 0.0 && best.map_or(true, |(_, b)| combined > b) {
                best = Some((t, combined));
            }
        }

        let intent = match best.and_then(|(t, c)| Some((self.registry.intent(t)?, c))) {
            Some((spec, confidence)) => Intent {
                intent_type: spec.intent_type,
                name: spec.name.clone(),
                confidence: confidence.min(1.0),
                description: spec.description.clone(),
            },
            None => Intent::unknown(),
        };

        info!(
            "Classified intent: {} ({}) with confidence {:.2}",
            intent.intent_type, intent.name, intent.confidence
        );
        intent
    }

    /// Whether every required entity type of `intent_type` is present
    pub fn validate_required_entities(
        &self,
        intent_type: IntentType,
        entities: &[Entity],
    ) -> (bool, Vec<String>) {
        let errors: Vec<String> = self
            .registry
            .validate(intent_type, entities)
            .iter()
            .map(ToString::to_string)
            .collect();
        (errors.is_empty(), errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityType;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(Arc::new(Registry::builtin()))
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_patrol_with_parameter_hits_pattern() {
        let c = classifier();
        let scores = c.score("巡检A区2号房主柜温度");
        assert!(scores.pattern[&IntentType::PatrolInspection] >= 0.9);
        assert!(approx(scores.keyword[&IntentType::PatrolInspection], 0.55));

        let intent = c.classify("巡检A区2号房主柜温度");
        assert_eq!(intent.intent_type, IntentType::PatrolInspection);
        assert_eq!(intent.name, "巡检");
        assert!(approx(intent.confidence, 0.55 * 0.6 + 0.95 * 0.4));
    }

    #[test]
    fn test_keyword_only_patrol() {
        let c = classifier();
        let scores = c.score("巡检");
        assert!(scores.pattern.is_empty());
        let intent = c.classify("巡检");
        assert_eq!(intent.intent_type, IntentType::PatrolInspection);
        assert!(approx(intent.confidence, 0.55 * 0.6));
    }

    #[test]
    fn test_empty_text_is_unknown() {
        let intent = classifier().classify("");
        assert_eq!(intent.intent_type, IntentType::Unknown);
        assert!(approx(intent.confidence, 0.1));
    }

    #[test]
    fn test_keyword_score_is_capped() {
        let c = classifier();
        let scores = c.keyword_scores("报警警报确认处理消除");
        assert!(approx(scores[&IntentType::AlarmHandling], 0.9));
    }

    #[test]
    fn test_control_and_navigation() {
        let c = classifier();
        let control = c.classify("开启B区空调");
        assert_eq!(control.intent_type, IntentType::EquipmentControl);
        assert!(approx(control.confidence, (1.0 / 6.0 + 0.3) * 0.6 + 0.95 * 0.4));

        let nav = c.classify("前往C区3号房");
        assert_eq!(nav.intent_type, IntentType::Navigation);
        assert!(approx(nav.confidence, 0.5 * 0.6 + 0.9 * 0.4));

        let query = c.classify("查询UPS1状态");
        assert_eq!(query.intent_type, IntentType::StatusQuery);
        assert!(approx(query.confidence, 0.8 * 0.6));
    }

    #[test]
    fn test_tie_breaks_on_priority_order() {
        // "检查" and "查询" each score one keyword out of four
        let intent = classifier().classify("检查 查询");
        assert_eq!(intent.intent_type, IntentType::PatrolInspection);
    }

    #[test]
    fn test_validate_required_entities() {
        let c = classifier();
        let (ok, errors) = c.validate_required_entities(IntentType::PatrolInspection, &[]);
        assert!(!ok);
        assert_eq!(errors, vec!["missing required entities: location, equipment"]);

        let entities = vec![
            Entity::new(EntityType::Equipment, "空调", 2, 4, 0.9),
            Entity::new(EntityType::Action, "关闭", 0, 2, 0.9),
        ];
        let (ok, errors) = c.validate_required_entities(IntentType::EquipmentControl, &entities);
        assert!(ok);
        assert!(errors.is_empty());

        let (ok, errors) = c.validate_required_entities(IntentType::Unknown, &entities);
        assert!(!ok);
        assert_eq!(errors, vec!["unable to recognize command intent"]);
    }
}
