//! Structured command synthesis from fused entities

use crate::types::{group_entities, EntitySummary};
use crate::{Entity, EntityType, Intent, IntentType, Record};
use serde_json::Value;
use std::collections::BTreeMap;

type Grouped = BTreeMap<EntityType, Vec<EntitySummary>>;

/// Build the machine-actionable command for an intent.
///
/// Every command carries `action`, `intent_name` and the grouped `entities` listing;
/// patrol, control, query and navigation intents add their own fields on top.
pub fn build_structured_command(intent: &Intent, entities: &[Entity]) -> Record {
    let grouped = group_entities(entities);

    let mut command = Record::new();
    command.insert("action".into(), Value::from(intent.intent_type.as_str()));
    command.insert("intent_name".into(), Value::from(intent.name.as_str()));
    command.insert("entities".into(), grouped_value(&grouped));

    match intent.intent_type {
        IntentType::PatrolInspection => build_patrol(&grouped, &mut command),
        IntentType::EquipmentControl => build_control(&grouped, &mut command),
        IntentType::StatusQuery => build_query(&grouped, &mut command),
        IntentType::Navigation => build_navigation(&grouped, &mut command),
        IntentType::AlarmHandling | IntentType::Unknown => {}
    }
    command
}

fn build_patrol(grouped: &Grouped, command: &mut Record) {
    command.insert("command_type".into(), Value::from("patrol"));
    if let Some(location) = first(grouped, EntityType::Location) {
        command.insert("target_location".into(), Value::from(location.value.as_str()));
        if let Some(details) = &location.normalized {
            command.insert("location_details".into(), Value::Object(details.clone()));
        }
    }
    if let Some(equipment) = first(grouped, EntityType::Equipment) {
        command.insert("target_equipment".into(), Value::from(equipment.value.as_str()));
    }
    if let Some(parameters) = values(grouped, EntityType::Parameter) {
        command.insert("parameters".into(), parameters);
    }
}

fn build_control(grouped: &Grouped, command: &mut Record) {
    command.insert("command_type".into(), Value::from("control"));
    if let Some(equipment) = first(grouped, EntityType::Equipment) {
        command.insert("target_equipment".into(), Value::from(equipment.value.as_str()));
    }
    if let Some(action) = first(grouped, EntityType::Action) {
        command.insert("action".into(), Value::from(action.value.as_str()));
    }
    if let Some(value) = first(grouped, EntityType::Value) {
        command.insert("target_value".into(), Value::from(value.value.as_str()));
    }
}

fn build_query(grouped: &Grouped, command: &mut Record) {
    command.insert("command_type".into(), Value::from("query"));
    if let Some(equipment) = first(grouped, EntityType::Equipment) {
        command.insert("target_equipment".into(), Value::from(equipment.value.as_str()));
    }
    if let Some(parameters) = values(grouped, EntityType::Parameter) {
        command.insert("query_parameters".into(), parameters);
    }
}

fn build_navigation(grouped: &Grouped, command: &mut Record) {
    command.insert("command_type".into(), Value::from("navigation"));
    if let Some(location) = first(grouped, EntityType::Location) {
        command.insert("destination".into(), Value::from(location.value.as_str()));
        if let Some(details) = &location.normalized {
            command.insert("location_details".into(), Value::Object(details.clone()));
        }
    }
}

fn first(grouped: &Grouped, entity_type: EntityType) -> Option<&EntitySummary> {
    grouped.get(&entity_type).and_then(|items| items.first())
}

fn values(grouped: &Grouped, entity_type: EntityType) -> Option<Value> {
    let items = grouped.get(&entity_type)?;
    Some(Value::Array(
        items.iter().map(|i| Value::from(i.value.as_str())).collect(),
    ))
}

fn grouped_value(grouped: &Grouped) -> Value {
    let mut out = Record::new();
    for (entity_type, items) in grouped {
        let listed = items
            .iter()
            .map(|item| {
                let mut entry = Record::new();
                entry.insert("value".into(), Value::from(item.value.as_str()));
                entry.insert("confidence".into(), Value::from(item.confidence));
                if let Some(normalized) = &item.normalized {
                    entry.insert("normalized".into(), Value::Object(normalized.clone()));
                }
                Value::Object(entry)
            })
            .collect();
        out.insert(entity_type.as_str().into(), Value::Array(listed));
    }
    Value::Object(out)
}
