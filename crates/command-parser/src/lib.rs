//! Command Parser for Inspection Robot Instructions
//!
//! This crate turns free-form Chinese voice-command transcripts into validated,
//! structured commands for a mobile inspection robot. A rule-based intent
//! classifier and entity extractor run over a shared vocabulary registry; the
//! fusion engine reconciles their output with an optional semantic
//! collaborator (a language model) and scores the result.

mod classifier;
mod commands;
mod entities;
pub mod error;
mod fusion;
#[cfg(feature = "llm-http")]
mod llm_http;
mod processor;
pub mod registry;
mod replay;
mod semantic;
mod types;

pub use classifier::{IntentClassifier, IntentScores};
pub use commands::build_structured_command;
pub use entities::{resolve_overlaps, EntityExtractor};
pub use error::{NluError, Result, SemanticError, ValidationIssue};
pub use fusion::FusionEngine;
#[cfg(feature = "llm-http")]
pub use llm_http::{system_prompt, LlmAnalyzer, LlmConfig};
pub use processor::CommandProcessor;
pub use registry::{Registry, RegistryConfig};
pub use replay::ReplayAnalyzer;
pub use semantic::{extract_json, SemanticAnalyzer, SemanticEntity, SemanticResult};
pub use types::{
    CommandResult, Entity, EntitySummary, EntityType, Intent, IntentType, ProcessingContext, Record,
};

use std::path::Path;
use std::sync::Arc;

/// Load the vocabulary registry: the YAML file at `path`, or the built-in one
pub fn init(path: Option<&Path>) -> Result<Arc<Registry>> {
    tracing::info!("Initializing command parser");
    let registry = match path {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin(),
    };
    if registry.skipped_patterns() > 0 {
        tracing::warn!("{} registry patterns skipped", registry.skipped_patterns());
    }
    Ok(Arc::new(registry))
}

/// Create a rule-only processor over the built-in registry
pub fn create_processor() -> CommandProcessor {
    CommandProcessor::new(Arc::new(Registry::builtin()))
}

/// Parse a single command with the built-in registry and no collaborator
pub fn process_command(text: &str) -> CommandResult {
    create_processor().process(text, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    struct TransportFailure;

    impl SemanticAnalyzer for TransportFailure {
        fn analyze(&self, _text: &str) -> Result<SemanticResult, SemanticError> {
            Err(SemanticError::Unavailable("timed out".into()))
        }
    }

    #[test]
    fn test_patrol_with_location_equipment_and_parameter() {
        let result = process_command("巡检A区2号房主柜温度");
        assert_eq!(result.intent.intent_type, IntentType::PatrolInspection);

        let scores = create_processor()
            .engine()
            .classifier()
            .score("巡检A区2号房主柜温度");
        assert!(scores.pattern[&IntentType::PatrolInspection] >= 0.9);

        let found: Vec<(EntityType, &str)> = result
            .entities
            .iter()
            .map(|e| (e.entity_type, e.value.as_str()))
            .collect();
        assert!(found.contains(&(EntityType::Location, "A区")));
        assert!(found.contains(&(EntityType::Location, "2号房")));
        assert!(found.contains(&(EntityType::Equipment, "主柜")));
        assert!(found.contains(&(EntityType::Parameter, "温度")));
        assert!(result.is_valid);
        assert!(result.validation_errors.is_empty());
    }

    #[test]
    fn test_bare_patrol_keyword_is_missing_entities() {
        let result = process_command("巡检");
        assert_eq!(result.intent.intent_type, IntentType::PatrolInspection);
        assert!(result.intent.confidence < 0.9);
        assert!(result.entities.is_empty());
        assert!(!result.is_valid);
        let error = &result.validation_errors[0];
        assert!(error.contains("location") && error.contains("equipment"));
    }

    #[test]
    fn test_empty_command() {
        let result = process_command("");
        assert_eq!(result.intent.intent_type, IntentType::Unknown);
        assert!(approx(result.intent.confidence, 0.1));
        assert!(result.entities.is_empty());
        assert!(!result.is_valid);
    }

    #[test]
    fn test_confident_collaborator_overrides_rules() {
        let text = "设置空调温度为25度";
        let reply = r#"{
            "intent_type": "equipment_control",
            "intent_confidence": 0.97,
            "entities": [
                {"type": "action", "value": "设置", "start": 0, "end": 2},
                {"type": "equipment", "value": "空调", "start": 2, "end": 4},
                {"type": "parameter", "value": "温度", "start": 4, "end": 6},
                {"type": "value", "value": "25度", "start": 7, "end": 10}
            ],
            "reasoning": "设定空调温度",
            "structured_command": {"action": "set", "equipment": "空调", "target": 25}
        }"#;

        let rule_only = process_command(text);
        assert!(rule_only.intent.confidence < 0.97);

        let processor = create_processor().with_analyzer(Box::new(ReplayAnalyzer::new(reply)));
        let result = processor.process(text, None);
        assert_eq!(result.intent.intent_type, IntentType::EquipmentControl);
        assert!(approx(result.intent.confidence, 0.97));

        let expected = SemanticResult::from_reply(reply).unwrap().structured_command;
        assert_eq!(result.structured_command, Some(expected));
        let grouped = result.entities_by_type();
        assert_eq!(grouped[&EntityType::Value][0].value, "25度");
        assert_eq!(grouped[&EntityType::Action][0].value, "设置");

        for (start, end) in [(0, 2), (2, 4), (4, 6), (7, 10)] {
            let entity = result
                .entities
                .iter()
                .find(|e| e.start == start && e.end == end)
                .unwrap();
            assert!(approx(entity.confidence, 0.9));
        }
        for pair in result.entities.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!(!pair[0].overlaps(&pair[1]));
        }
        assert!(result.is_valid);
    }

    #[test]
    fn test_collaborator_transport_error_matches_rule_only() {
        let processor = create_processor().with_analyzer(Box::new(TransportFailure));
        for text in ["巡检A区2号房主柜温度", "巡检", "", "前往C区3号房"] {
            let degraded = processor.process(text, None);
            let baseline = process_command(text);
            assert_eq!(degraded.intent, baseline.intent);
            assert_eq!(degraded.entities, baseline.entities);
            assert_eq!(degraded.overall_confidence, baseline.overall_confidence);
            assert_eq!(degraded.structured_command, baseline.structured_command);
            assert_eq!(degraded.is_valid, baseline.is_valid);
            assert_eq!(degraded.validation_errors, baseline.validation_errors);
        }
    }

    #[test]
    fn test_init_with_registry_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/registry.yaml");
        let registry = init(Some(&path)).unwrap();
        assert_eq!(registry.intents().len(), 5);
        assert_eq!(registry.skipped_patterns(), 0);
        assert!(init(Some(Path::new("/nonexistent/registry.yaml"))).is_err());
    }

    #[test]
    fn test_result_serializes_with_rfc3339_timestamp() {
        let result = process_command("查询UPS1状态");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["intent"]["type"], "status_query");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
        let back: CommandResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.entities, result.entities);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const FRAGMENTS: &[&str] = &[
        "巡检", "检查", "查询", "开启", "关闭", "前往", "确认", "A区", "B区", "2号房", "3楼",
        "主柜", "副柜", "UPS1", "ups", "空调", "配电室", "温度", "湿度", "电压", "25°C", "60%",
        "220V", "14:30", "10分钟", "高温报警", "状态", "的", " ", "设置", "为", "度",
    ];

    fn command_text() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::collection::vec(prop::sample::select(FRAGMENTS), 0..8).prop_map(|parts| parts.concat()),
            "\\PC{0,24}",
        ]
    }

    proptest! {
        #[test]
        fn entities_are_sorted_and_disjoint(text in command_text()) {
            let result = process_command(&text);
            let len = text.chars().count();
            for e in &result.entities {
                prop_assert!(e.start < e.end && e.end <= len);
                prop_assert!((0.0..=1.0).contains(&e.confidence));
            }
            for pair in result.entities.windows(2) {
                prop_assert!(pair[0].start <= pair[1].start);
                prop_assert!(!pair[0].overlaps(&pair[1]));
            }
        }

        #[test]
        fn confidences_stay_in_range(text in command_text()) {
            let result = process_command(&text);
            prop_assert!((0.0..=1.0).contains(&result.intent.confidence));
            prop_assert!((0.0..=1.0).contains(&result.overall_confidence));
            prop_assert_eq!(result.is_valid, result.validation_errors.is_empty());
        }

        #[test]
        fn processing_is_deterministic(text in command_text()) {
            let processor = create_processor();
            let first = processor.process(&text, None);
            let second = processor.process(&text, None);
            prop_assert_eq!(first.intent, second.intent);
            prop_assert_eq!(first.entities, second.entities);
            prop_assert_eq!(first.structured_command, second.structured_command);
            prop_assert_eq!(first.overall_confidence, second.overall_confidence);
        }
    }
}
