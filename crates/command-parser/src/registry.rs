//! Intent and entity vocabulary: serde-loadable config plus the compiled, read-only registry

use crate::error::{NluError, Result, ValidationIssue};
use crate::{Entity, EntityType, IntentType, Record};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Static description of one intent type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSpec {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub required_entities: Vec<EntityType>,
    #[serde(default)]
    pub optional_entities: Vec<EntityType>,
    /// Composite verb + context-noun rule for the pattern scorer
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_pattern_confidence")]
    pub pattern_confidence: f32,
}

fn default_pattern_confidence() -> f32 {
    0.9
}

/// Static description of one entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Regex rules, applied in order
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Literal keywords matched by substring
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Alias table row mapping a literal to its canonical record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub record: Record,
}

/// Serializable registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub intents: Vec<IntentSpec>,
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub location_aliases: Vec<AliasEntry>,
    /// Ordered; substring fallback tries entries front to back
    #[serde(default)]
    pub equipment_aliases: Vec<AliasEntry>,
    #[serde(default)]
    pub parameter_units: BTreeMap<String, String>,
}

impl RegistryConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            intents: vec![
                IntentSpec {
                    intent_type: IntentType::PatrolInspection,
                    name: "巡检".into(),
                    description: "巡检相关指令，包括温度、湿度、电压等参数检查".into(),
                    keywords: strings(&["巡检", "检查", "监测", "查看"]),
                    required_entities: vec![EntityType::Location, EntityType::Equipment],
                    optional_entities: vec![EntityType::Parameter, EntityType::Time],
                    pattern: Some("(巡检|检查|监测|查看).*?(温度|湿度|电压|电流)".into()),
                    pattern_confidence: 0.95,
                },
                IntentSpec {
                    intent_type: IntentType::EquipmentControl,
                    name: "设备控制".into(),
                    description: "设备开关、调节等控制指令".into(),
                    keywords: strings(&["开启", "关闭", "启动", "停止", "调节", "设置"]),
                    required_entities: vec![EntityType::Equipment, EntityType::Action],
                    optional_entities: vec![
                        EntityType::Location,
                        EntityType::Parameter,
                        EntityType::Value,
                    ],
                    pattern: Some(
                        "(开启|关闭|启动|停止|调节|设置).*?(设备|主柜|副柜|UPS|空调)".into(),
                    ),
                    pattern_confidence: 0.95,
                },
                IntentSpec {
                    intent_type: IntentType::StatusQuery,
                    name: "状态查询".into(),
                    description: "查询设备状态、参数等信息".into(),
                    keywords: strings(&["查询", "状态", "显示", "报告"]),
                    required_entities: vec![EntityType::Equipment],
                    optional_entities: vec![EntityType::Location, EntityType::Parameter],
                    pattern: Some("(查询|状态|显示|报告).*?(设备|主柜|副柜)".into()),
                    pattern_confidence: 0.9,
                },
                IntentSpec {
                    intent_type: IntentType::AlarmHandling,
                    name: "报警处理".into(),
                    description: "报警确认、处理等指令".into(),
                    keywords: strings(&["报警", "警报", "确认", "处理", "消除"]),
                    required_entities: vec![EntityType::AlarmType],
                    optional_entities: vec![EntityType::Location, EntityType::Equipment],
                    pattern: Some("(报警|警报|确认|处理|消除)".into()),
                    pattern_confidence: 0.9,
                },
                IntentSpec {
                    intent_type: IntentType::Navigation,
                    name: "导航移动".into(),
                    description: "机器人移动、导航相关指令".into(),
                    keywords: strings(&["前往", "移动", "到达", "回到", "导航"]),
                    required_entities: vec![EntityType::Location],
                    optional_entities: vec![EntityType::Route, EntityType::Speed],
                    pattern: Some(r"(前往|移动|到达|回到|导航).*?([A-Z]区|\d+号房)".into()),
                    pattern_confidence: 0.9,
                },
            ],
            entities: vec![
                EntitySpec {
                    entity_type: EntityType::Location,
                    name: "位置".into(),
                    description: "区域、房间、位置信息".into(),
                    patterns: strings(&[
                        r"[A-Z]区",
                        r"\d+号房",
                        r"\d+楼",
                        r"[东西南北]侧",
                        r"机房\d*",
                        r"配电室\d*",
                    ]),
                    examples: strings(&["A区", "2号房", "3楼", "东侧", "机房1", "配电室"]),
                },
                EntitySpec {
                    entity_type: EntityType::Equipment,
                    name: "设备".into(),
                    description: "各类设备名称".into(),
                    patterns: strings(&[
                        r"主柜",
                        r"副柜",
                        r"UPS\d*",
                        r"空调\d*",
                        r"风机\d*",
                        r"变压器\d*",
                        r"开关柜\d*",
                        r"配电柜\d*",
                    ]),
                    examples: strings(&[
                        "主柜", "副柜", "UPS1", "空调", "风机", "变压器", "开关柜", "配电柜",
                    ]),
                },
                EntitySpec {
                    entity_type: EntityType::Parameter,
                    name: "参数".into(),
                    description: "监测参数类型".into(),
                    patterns: strings(&["温度", "湿度", "电压", "电流", "功率", "频率", "压力"]),
                    examples: strings(&["温度", "湿度", "电压", "电流", "功率", "频率", "压力"]),
                },
                EntitySpec {
                    entity_type: EntityType::Action,
                    name: "动作".into(),
                    description: "控制动作类型".into(),
                    patterns: strings(&["开启|启动|打开", "关闭|停止|关掉", "调节|设置|调整", "重启|复位"]),
                    examples: strings(&["开启", "关闭", "调节", "重启"]),
                },
                EntitySpec {
                    entity_type: EntityType::Value,
                    name: "数值".into(),
                    description: "参数数值".into(),
                    patterns: strings(&[
                        r"\d+\.?\d*°C",
                        r"\d+\.?\d*%",
                        r"\d+\.?\d*V",
                        r"\d+\.?\d*A",
                        r"\d+\.?\d*Hz",
                    ]),
                    examples: strings(&["25°C", "60%", "220V", "10A", "50Hz"]),
                },
                EntitySpec {
                    entity_type: EntityType::Time,
                    name: "时间".into(),
                    description: "时间相关信息".into(),
                    patterns: strings(&[r"\d{1,2}:\d{2}", r"\d+分钟", r"\d+小时", "现在|立即|马上"]),
                    examples: strings(&["14:30", "10分钟", "2小时", "现在"]),
                },
                EntitySpec {
                    entity_type: EntityType::AlarmType,
                    name: "报警类型".into(),
                    description: "报警类型".into(),
                    patterns: strings(&["高温报警", "低温报警", "过载报警", "断电报警", "通信故障"]),
                    examples: strings(&["高温报警", "低温报警", "过载报警", "断电报警", "通信故障"]),
                },
            ],
            location_aliases: vec![
                alias("A区", &[("zone", "A"), ("type", "zone")]),
                alias("B区", &[("zone", "B"), ("type", "zone")]),
                alias("C区", &[("zone", "C"), ("type", "zone")]),
                alias("1号房", &[("room", "1"), ("type", "room")]),
                alias("2号房", &[("room", "2"), ("type", "room")]),
                alias("3号房", &[("room", "3"), ("type", "room")]),
            ],
            equipment_aliases: vec![
                alias("主柜", &[("type", "cabinet"), ("subtype", "main")]),
                alias("副柜", &[("type", "cabinet"), ("subtype", "secondary")]),
                alias("UPS", &[("type", "ups"), ("subtype", "power")]),
                alias("空调", &[("type", "air_conditioner"), ("subtype", "hvac")]),
            ],
            parameter_units: [
                ("温度", "°C"),
                ("湿度", "%"),
                ("电压", "V"),
                ("电流", "A"),
                ("功率", "W"),
                ("频率", "Hz"),
                ("压力", "Pa"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn alias(name: &str, fields: &[(&str, &str)]) -> AliasEntry {
    AliasEntry {
        alias: name.to_string(),
        record: fields
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
            .collect(),
    }
}

/// Intent spec with its compiled composite rule
#[derive(Debug, Clone)]
pub struct CompiledIntent {
    pub spec: IntentSpec,
    pub pattern: Option<Regex>,
}

/// Entity spec with its compiled rules (invalid ones already dropped)
#[derive(Debug, Clone)]
pub struct CompiledEntity {
    pub spec: EntitySpec,
    pub rules: Vec<Regex>,
}

/// Immutable, compiled registry shared by every pipeline component
#[derive(Debug, Clone)]
pub struct Registry {
    intents: Vec<CompiledIntent>,
    entities: Vec<CompiledEntity>,
    location_aliases: Vec<AliasEntry>,
    equipment_aliases: Vec<AliasEntry>,
    parameter_units: BTreeMap<String, String>,
    skipped_patterns: usize,
}

impl Registry {
    /// Compile a config. Invalid regexes are logged and skipped, never fatal.
    pub fn compile(config: RegistryConfig) -> Self {
        let mut skipped = 0usize;

        let mut intents: Vec<CompiledIntent> = Vec::with_capacity(config.intents.len());
        for spec in config.intents {
            if spec.intent_type == IntentType::Unknown {
                warn!("ignoring registry intent '{}' with unrecognized type", spec.name);
                continue;
            }
            if intents.iter().any(|i| i.spec.intent_type == spec.intent_type) {
                warn!("duplicate registry intent {}, keeping the first", spec.intent_type);
                continue;
            }
            let pattern = spec
                .pattern
                .as_deref()
                .and_then(|p| compile_rule(spec.intent_type.as_str(), p, &mut skipped));
            intents.push(CompiledIntent { spec, pattern });
        }
        // Classification tie-break follows enum declaration order
        intents.sort_by_key(|i| i.spec.intent_type);

        let mut entities = Vec::with_capacity(config.entities.len());
        for spec in config.entities {
            let rules = spec
                .patterns
                .iter()
                .filter_map(|p| compile_rule(spec.entity_type.as_str(), p, &mut skipped))
                .collect();
            entities.push(CompiledEntity { spec, rules });
        }

        debug!(
            intents = intents.len(),
            entities = entities.len(),
            skipped,
            "registry compiled"
        );

        Self {
            intents,
            entities,
            location_aliases: config.location_aliases,
            equipment_aliases: config.equipment_aliases,
            parameter_units: config.parameter_units,
            skipped_patterns: skipped,
        }
    }

    /// Built-in inspection-robot vocabulary
    pub fn builtin() -> Self {
        Self::compile(RegistryConfig::default())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::compile(RegistryConfig::from_yaml_file(path)?))
    }

    /// Intents in tie-break priority order
    pub fn intents(&self) -> &[CompiledIntent] {
        &self.intents
    }

    pub fn intent(&self, intent_type: IntentType) -> Option<&IntentSpec> {
        self.intents
            .iter()
            .find(|i| i.spec.intent_type == intent_type)
            .map(|i| &i.spec)
    }

    pub fn entities(&self) -> &[CompiledEntity] {
        &self.entities
    }

    pub fn location_alias(&self, value: &str) -> Option<&Record> {
        self.location_aliases
            .iter()
            .find(|a| a.alias == value)
            .map(|a| &a.record)
    }

    pub fn equipment_aliases(&self) -> &[AliasEntry] {
        &self.equipment_aliases
    }

    /// Measurement unit for a parameter name; empty if unknown
    pub fn unit_for(&self, parameter: &str) -> &str {
        self.parameter_units
            .get(parameter)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Number of rules dropped at compile time
    pub fn skipped_patterns(&self) -> usize {
        self.skipped_patterns
    }

    /// Check an intent against the entities found for it.
    ///
    /// `Unknown` short-circuits; an intent missing from the registry is unsupported;
    /// otherwise all absent required types are reported together.
    pub fn validate(&self, intent_type: IntentType, entities: &[Entity]) -> Vec<ValidationIssue> {
        if intent_type == IntentType::Unknown {
            return vec![ValidationIssue::UnknownIntent];
        }
        let Some(spec) = self.intent(intent_type) else {
            return vec![ValidationIssue::UnsupportedIntent(intent_type)];
        };
        let missing: Vec<EntityType> = spec
            .required_entities
            .iter()
            .copied()
            .filter(|required| !entities.iter().any(|e| e.entity_type == *required))
            .collect();
        if missing.is_empty() {
            Vec::new()
        } else {
            vec![ValidationIssue::MissingRequiredEntities(missing)]
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn compile_rule(owner: &str, pattern: &str, skipped: &mut usize) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(source) => {
            let err = NluError::PatternInvalid {
                owner: owner.to_string(),
                pattern: pattern.to_string(),
                source,
            };
            warn!("skipping rule: {}", err);
            *skipped += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_compiles_cleanly() {
        let registry = Registry::builtin();
        assert_eq!(registry.skipped_patterns(), 0);
        assert_eq!(registry.intents().len(), 5);
        assert_eq!(registry.entities().len(), 7);
        assert!(registry.intents().iter().all(|i| i.pattern.is_some()));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let mut config = RegistryConfig::default();
        config.entities[0].patterns.push("([unclosed".to_string());
        config.intents[0].pattern = Some("(巡检".to_string());

        let registry = Registry::compile(config);
        assert_eq!(registry.skipped_patterns(), 2);
        assert_eq!(registry.entities()[0].rules.len(), 6);
        assert!(registry.intents()[0].pattern.is_none());
    }

    #[test]
    fn test_intents_sorted_by_priority() {
        let mut config = RegistryConfig::default();
        config.intents.reverse();
        let registry = Registry::compile(config);
        let order: Vec<IntentType> = registry
            .intents()
            .iter()
            .map(|i| i.spec.intent_type)
            .collect();
        assert_eq!(order, IntentType::ALL.to_vec());
    }

    #[test]
    fn test_lookups() {
        let registry = Registry::builtin();
        assert_eq!(registry.unit_for("湿度"), "%");
        assert_eq!(registry.unit_for("亮度"), "");
        let rec = registry.location_alias("B区").unwrap();
        assert_eq!(rec["zone"], "B");
        assert!(registry.location_alias("D区").is_none());
        assert_eq!(registry.equipment_aliases()[2].alias, "UPS");
    }

    #[test]
    fn test_validate() {
        let registry = Registry::builtin();
        let issues = registry.validate(IntentType::PatrolInspection, &[]);
        assert_eq!(
            issues,
            vec![ValidationIssue::MissingRequiredEntities(vec![
                EntityType::Location,
                EntityType::Equipment
            ])]
        );

        let entities = vec![Entity::new(EntityType::Location, "C区", 2, 4, 0.9)];
        assert!(registry.validate(IntentType::Navigation, &entities).is_empty());
        assert_eq!(
            registry.validate(IntentType::Unknown, &entities),
            vec![ValidationIssue::UnknownIntent]
        );
    }

    #[test]
    fn test_validate_unsupported_intent() {
        let mut config = RegistryConfig::default();
        config
            .intents
            .retain(|i| i.intent_type != IntentType::AlarmHandling);
        let registry = Registry::compile(config);
        assert_eq!(
            registry.validate(IntentType::AlarmHandling, &[]),
            vec![ValidationIssue::UnsupportedIntent(IntentType::AlarmHandling)]
        );
    }

    #[test]
    fn test_yaml_config() {
        let raw = include_str!("../../../configs/registry.yaml");
        let config = RegistryConfig::from_yaml_str(raw).unwrap();
        let registry = Registry::compile(config);
        assert_eq!(registry.skipped_patterns(), 0);
        assert_eq!(registry.intents().len(), 5);
        assert_eq!(
            registry.intent(IntentType::EquipmentControl).unwrap().required_entities,
            vec![EntityType::Equipment, EntityType::Action]
        );
        assert_eq!(registry.unit_for("频率"), "Hz");
    }

    #[test]
    fn test_yaml_rejects_garbage() {
        assert!(matches!(
            RegistryConfig::from_yaml_str("intents: 5"),
            Err(NluError::Config(_))
        ));
    }
}
