use crate::{EntityType, IntentType};
use thiserror::Error;

pub type Result<T, E = NluError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NluError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid registry config: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("invalid pattern for {owner}: {pattern}: {source}")]
    PatternInvalid {
        owner: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Why no semantic result is available; the pipeline degrades on either variant
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("semantic collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("semantic collaborator response invalid: {0}")]
    ResponseInvalid(String),
}

/// Data-level validation failures, reported on the result rather than raised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("unable to recognize command intent")]
    UnknownIntent,
    #[error("unsupported intent type: {0}")]
    UnsupportedIntent(IntentType),
    #[error("missing required entities: {}", join_types(.0))]
    MissingRequiredEntities(Vec<EntityType>),
}

fn join_types(types: &[EntityType]) -> String {
    types
        .iter()
        .map(EntityType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entities_message() {
        let issue =
            ValidationIssue::MissingRequiredEntities(vec![EntityType::Location, EntityType::Equipment]);
        assert_eq!(
            issue.to_string(),
            "missing required entities: location, equipment"
        );
        assert_eq!(
            ValidationIssue::UnsupportedIntent(IntentType::Navigation).to_string(),
            "unsupported intent type: navigation"
        );
    }
}
