//! Offline collaborator that answers every request with a recorded reply

use crate::error::{Result, SemanticError};
use crate::{SemanticAnalyzer, SemanticResult};
use std::fs;
use std::path::Path;

pub struct ReplayAnalyzer {
    reply: String,
}

impl ReplayAnalyzer {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }

    /// Load a recorded collaborator reply (raw text, JSON object inside)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(fs::read_to_string(path)?))
    }
}

impl SemanticAnalyzer for ReplayAnalyzer {
    fn analyze(&self, _text: &str) -> Result<SemanticResult, SemanticError> {
        SemanticResult::from_reply(&self.reply)
    }

    fn name(&self) -> &str {
        "replay"
    }
}
