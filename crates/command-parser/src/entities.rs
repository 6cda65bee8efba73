//! Named entity recognition for commands

use crate::registry::{CompiledEntity, Registry};
use crate::{Entity, EntityType, Record};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

const PATTERN_CONFIDENCE: f32 = 0.9;
const KEYWORD_CONFIDENCE: f32 = 0.8;

/// Entity extractor driven by the registry's rules and keyword lists
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    registry: Arc<Registry>,
}

impl EntityExtractor {
    /// Create a new entity extractor
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Extract entities from text: sorted by start, pairwise non-overlapping
    pub fn extract(&self, text: &str) -> Vec<Entity> {
        let mut candidates = Vec::new();
        for entity in self.registry.entities() {
            self.extract_patterns(text, entity, &mut candidates);
        }
        for entity in self.registry.entities() {
            self.extract_keywords(text, entity, &mut candidates);
        }

        let entities = resolve_overlaps(candidates);

        info!("Extracted {} entities from text: {}", entities.len(), text);
        for entity in &entities {
            debug!(
                "Entity: {} = {} (confidence: {})",
                entity.entity_type, entity.value, entity.confidence
            );
        }
        entities
    }

    fn extract_patterns(&self, text: &str, entity: &CompiledEntity, out: &mut Vec<Entity>) {
        for rule in &entity.rules {
            for mat in rule.find_iter(text) {
                if mat.as_str().is_empty() {
                    continue;
                }
                let start = char_offset(text, mat.start());
                let end = start + mat.as_str().chars().count();
                out.push(self.candidate(
                    entity.spec.entity_type,
                    mat.as_str(),
                    start,
                    end,
                    PATTERN_CONFIDENCE,
                ));
            }
        }
    }

    fn extract_keywords(&self, text: &str, entity: &CompiledEntity, out: &mut Vec<Entity>) {
        for example in &entity.spec.examples {
            if example.is_empty() {
                continue;
            }
            let found = match text.find(example.as_str()) {
                Some(byte) => {
                    let start = char_offset(text, byte);
                    Some((start, start + example.chars().count()))
                }
                None => find_ignore_case(text, example),
            };
            if let Some((start, end)) = found {
                let raw: String = text.chars().skip(start).take(end - start).collect();
                out.push(self.candidate(
                    entity.spec.entity_type,
                    &raw,
                    start,
                    end,
                    KEYWORD_CONFIDENCE,
                ));
            }
        }
    }

    fn candidate(
        &self,
        entity_type: EntityType,
        raw: &str,
        start: usize,
        end: usize,
        confidence: f32,
    ) -> Entity {
        let mut entity = Entity::new(entity_type, raw, start, end, confidence);
        entity.normalized_value = self.normalize(entity_type, raw);
        entity
    }

    /// Map a raw value to its canonical record, if the type has a normalizer
    pub fn normalize(&self, entity_type: EntityType, value: &str) -> Option<Record> {
        match entity_type {
            EntityType::Location => self.normalize_location(value),
            EntityType::Equipment => self.normalize_equipment(value),
            EntityType::Parameter => {
                let mut record = Record::new();
                record.insert("parameter_type".into(), Value::from(value));
                record.insert("unit".into(), Value::from(self.registry.unit_for(value)));
                Some(record)
            }
            EntityType::Value => normalize_value(value),
            _ => None,
        }
    }

    fn normalize_location(&self, value: &str) -> Option<Record> {
        if let Some(record) = self.registry.location_alias(value) {
            return Some(record.clone());
        }

        static ZONE: OnceLock<Option<Regex>> = OnceLock::new();
        static ROOM: OnceLock<Option<Regex>> = OnceLock::new();
        let zone = ZONE.get_or_init(|| Regex::new(r"([A-Z])区").ok());
        let room = ROOM.get_or_init(|| Regex::new(r"(\d+)号房").ok());

        let mut record = Record::new();
        if let Some(caps) = zone.as_ref().and_then(|re| re.captures(value)) {
            record.insert("zone".into(), Value::from(&caps[1]));
        }
        if let Some(caps) = room.as_ref().and_then(|re| re.captures(value)) {
            record.insert("room".into(), Value::from(&caps[1]));
        }
        if record.is_empty() {
            return None;
        }
        record.insert("type".into(), Value::from("compound"));
        Some(record)
    }

    fn normalize_equipment(&self, value: &str) -> Option<Record> {
        let aliases = self.registry.equipment_aliases();
        if let Some(entry) = aliases.iter().find(|a| a.alias == value) {
            return Some(entry.record.clone());
        }
        let entry = aliases.iter().find(|a| value.contains(a.alias.as_str()))?;
        let mut record = entry.record.clone();
        if let Some(number) = first_digits(value) {
            record.insert("number".into(), Value::from(number));
        }
        Some(record)
    }
}

fn normalize_value(value: &str) -> Option<Record> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    static UNIT: OnceLock<Option<Regex>> = OnceLock::new();
    let number = NUMBER.get_or_init(|| Regex::new(r"(\d+\.?\d*)").ok());
    let unit = UNIT.get_or_init(|| Regex::new(r"(°C|%|V|A|Hz)").ok());

    let caps = number.as_ref()?.captures(value)?;
    let numeric: f64 = caps[1].parse().ok()?;
    let mut record = Record::new();
    record.insert("numeric_value".into(), Value::from(numeric));
    if let Some(u) = unit.as_ref().and_then(|re| re.find(value)) {
        record.insert("unit".into(), Value::from(u.as_str()));
    }
    Some(record)
}

fn first_digits(value: &str) -> Option<&str> {
    let start = value.find(|c: char| c.is_ascii_digit())?;
    let rest = &value[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..len])
}

/// Char offset of a byte index that lies on a char boundary
pub(crate) fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Case-insensitive substring search returning a char span
fn find_ignore_case(text: &str, needle: &str) -> Option<(usize, usize)> {
    let hay: Vec<char> = text.chars().collect();
    let pat: Vec<char> = needle.chars().collect();
    if pat.is_empty() || pat.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - pat.len())
        .find(|&i| {
            hay[i..i + pat.len()]
                .iter()
                .zip(&pat)
                .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
        })
        .map(|i| (i, i + pat.len()))
}

/// Single stable sweep over candidates ordered by `(start, end)`.
///
/// Accepted spans stay sorted and disjoint, so a candidate can only collide with the
/// last accepted one. A strictly more confident candidate replaces it; on a tie the
/// entity already accepted is kept.
pub fn resolve_overlaps(mut candidates: Vec<Entity>) -> Vec<Entity> {
    candidates.sort_by_key(|e| (e.start, e.end));
    let mut kept: Vec<Entity> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match kept.last_mut() {
            Some(last) if last.overlaps(&candidate) => {
                if candidate.confidence > last.confidence {
                    *last = candidate;
                }
            }
            _ => kept.push(candidate),
        }
    }
    kept
}
