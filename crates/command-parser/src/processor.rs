//! Caller-facing entry point: rule pipeline plus optional semantic collaborator

use crate::fusion::FusionEngine;
use crate::registry::Registry;
use crate::{CommandResult, ProcessingContext, SemanticAnalyzer};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

pub struct CommandProcessor {
    engine: FusionEngine,
    analyzer: Option<Box<dyn SemanticAnalyzer>>,
}

impl CommandProcessor {
    /// Rule-only processor
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            engine: FusionEngine::new(registry),
            analyzer: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Box<dyn SemanticAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    pub fn has_analyzer(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Process one command. Collaborator failures degrade to the rule-only result.
    ///
    /// The context is attached to logging only; it is not used to resolve references.
    pub fn process(&self, text: &str, context: Option<&ProcessingContext>) -> CommandResult {
        let session = context
            .and_then(|c| c.session_id.as_deref())
            .unwrap_or("-");
        let span = info_span!("process_command", session);
        let _guard = span.enter();

        info!("Processing command: {}", text);
        if let Some(ctx) = context {
            debug!(
                history = ctx.previous_commands.len(),
                location = ctx.current_location.as_deref().unwrap_or("-"),
                "context snapshot"
            );
        }

        let semantic = self
            .analyzer
            .as_ref()
            .and_then(|analyzer| match analyzer.analyze(text) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("{} analysis skipped: {}", analyzer.name(), e);
                    None
                }
            });

        self.engine.process(text, semantic.as_ref())
    }
}
