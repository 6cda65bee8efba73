//! Core data model shared by the extractor, classifier and fusion engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// Free-form structured record (normalized entity values, structured commands)
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Closed set of command intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// Inspect an area or device and read parameters
    PatrolInspection,
    /// Switch or adjust a device
    EquipmentControl,
    /// Report the status of a device
    StatusQuery,
    /// Acknowledge or clear an alarm
    AlarmHandling,
    /// Move the robot to a location
    Navigation,
    /// Nothing matched
    #[serde(other)]
    Unknown,
}

impl IntentType {
    /// Recognized intents in tie-break priority order
    pub const ALL: [IntentType; 5] = [
        IntentType::PatrolInspection,
        IntentType::EquipmentControl,
        IntentType::StatusQuery,
        IntentType::AlarmHandling,
        IntentType::Navigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::PatrolInspection => "patrol_inspection",
            IntentType::EquipmentControl => "equipment_control",
            IntentType::StatusQuery => "status_query",
            IntentType::AlarmHandling => "alarm_handling",
            IntentType::Navigation => "navigation",
            IntentType::Unknown => "unknown",
        }
    }

    /// Lenient parse used for collaborator replies; anything unrecognized is `Unknown`
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .unwrap_or(IntentType::Unknown)
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of entities that can appear in a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Zone, room, floor or named site
    Location,
    /// Cabinet, UPS, air conditioner, ...
    Equipment,
    /// Monitored quantity (temperature, voltage, ...)
    Parameter,
    /// Control verb (start, stop, adjust, ...)
    Action,
    /// Numeric value with unit
    Value,
    /// Clock time, duration or "now"
    Time,
    /// Alarm category
    AlarmType,
    /// Route hint for navigation
    Route,
    /// Speed hint for navigation
    Speed,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Location => "location",
            EntityType::Equipment => "equipment",
            EntityType::Parameter => "parameter",
            EntityType::Action => "action",
            EntityType::Value => "value",
            EntityType::Time => "time",
            EntityType::AlarmType => "alarm_type",
            EntityType::Route => "route",
            EntityType::Speed => "speed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        const ALL: [EntityType; 9] = [
            EntityType::Location,
            EntityType::Equipment,
            EntityType::Parameter,
            EntityType::Action,
            EntityType::Value,
            EntityType::Time,
            EntityType::AlarmType,
            EntityType::Route,
            EntityType::Speed,
        ];
        ALL.into_iter().find(|t| t.as_str() == s.trim())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extracted entity. `start`/`end` are half-open char offsets into the original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Raw substring of the original text
    pub value: String,
    pub start: usize,
    pub end: usize,
    /// Confidence in this entity extraction
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<Record>,
}

impl Entity {
    /// Create a new entity without a normalized value
    pub fn new(
        entity_type: EntityType,
        value: impl Into<String>,
        start: usize,
        end: usize,
        confidence: f32,
    ) -> Self {
        Self {
            entity_type,
            value: value.into(),
            start,
            end,
            confidence,
            normalized_value: None,
        }
    }

    /// Half-open interval overlap
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// The classified purpose of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub name: String,
    pub confidence: f32,
    pub description: String,
}

impl Intent {
    pub const UNKNOWN_CONFIDENCE: f32 = 0.1;

    /// Fallback intent when no scorer produced anything
    pub fn unknown() -> Self {
        Self {
            intent_type: IntentType::Unknown,
            name: "未知意图".to_string(),
            confidence: Self::UNKNOWN_CONFIDENCE,
            description: "无法识别的意图".to_string(),
        }
    }
}

/// One entry of the grouped-by-type entity listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub value: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<Record>,
}

/// Terminal artifact of processing one command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub original_text: String,
    pub intent: Intent,
    /// Sorted by `start`, pairwise non-overlapping
    pub entities: Vec<Entity>,
    pub overall_confidence: f32,
    pub structured_command: Option<Record>,
    pub is_valid: bool,
    pub validation_errors: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl CommandResult {
    /// Entities grouped by type, in text order within each group
    pub fn entities_by_type(&self) -> BTreeMap<EntityType, Vec<EntitySummary>> {
        group_entities(&self.entities)
    }
}

pub(crate) fn group_entities(entities: &[Entity]) -> BTreeMap<EntityType, Vec<EntitySummary>> {
    let mut grouped: BTreeMap<EntityType, Vec<EntitySummary>> = BTreeMap::new();
    for entity in entities {
        grouped
            .entry(entity.entity_type)
            .or_default()
            .push(EntitySummary {
                value: entity.value.clone(),
                confidence: entity.confidence,
                normalized: entity.normalized_value.clone(),
            });
    }
    grouped
}

/// Optional caller-supplied session snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingContext {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub previous_commands: Vec<CommandResult>,
    pub current_location: Option<String>,
    pub current_task: Option<String>,
}

impl ProcessingContext {
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    /// Append a finished command to the session history
    pub fn record(&mut self, result: CommandResult) {
        self.previous_commands.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_half_open() {
        let a = Entity::new(EntityType::Location, "A区", 2, 4, 0.9);
        let b = Entity::new(EntityType::Location, "2号房", 4, 7, 0.9);
        let c = Entity::new(EntityType::Equipment, "区2", 3, 5, 0.8);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_intent_type_parse() {
        assert_eq!(IntentType::parse("navigation"), IntentType::Navigation);
        assert_eq!(IntentType::parse(" status_query "), IntentType::StatusQuery);
        assert_eq!(IntentType::parse("dance"), IntentType::Unknown);
        let parsed: IntentType = serde_json::from_str("\"fly_away\"").unwrap();
        assert_eq!(parsed, IntentType::Unknown);
    }

    #[test]
    fn test_entity_type_serde_names() {
        let json = serde_json::to_string(&EntityType::AlarmType).unwrap();
        assert_eq!(json, "\"alarm_type\"");
        assert_eq!(EntityType::parse("alarm_type"), Some(EntityType::AlarmType));
        assert_eq!(EntityType::parse("colour"), None);
    }

    #[test]
    fn test_group_entities() {
        let entities = vec![
            Entity::new(EntityType::Parameter, "温度", 0, 2, 0.9),
            Entity::new(EntityType::Parameter, "湿度", 3, 5, 0.8),
            Entity::new(EntityType::Equipment, "主柜", 6, 8, 0.9),
        ];
        let grouped = group_entities(&entities);
        assert_eq!(grouped[&EntityType::Parameter].len(), 2);
        assert_eq!(grouped[&EntityType::Parameter][1].value, "湿度");
        assert_eq!(grouped[&EntityType::Equipment][0].confidence, 0.9);
    }
}
