use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::types::CompiledRule;

/// A rule-evaluation engine fed by the pipeline.
///
/// Every call is a full replace of the engine's rule set; engines never
/// receive incremental updates.
#[async_trait]
pub trait RulesEngine: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn replace_rules(&self, rules: Vec<CompiledRule>);
}

/// Engine that records every replace call instead of evaluating rules.
#[derive(Debug)]
pub struct RecordingRulesEngine {
    name: String,
    calls: Mutex<Vec<Vec<CompiledRule>>>,
}

impl RecordingRulesEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All replace calls, oldest first.
    pub async fn calls(&self) -> Vec<Vec<CompiledRule>> {
        self.calls.lock().await.clone()
    }

    /// Rules from the most recent replace, if any.
    pub async fn current_rules(&self) -> Option<Vec<CompiledRule>> {
        self.calls.lock().await.last().cloned()
    }
}

#[async_trait]
impl RulesEngine for RecordingRulesEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn replace_rules(&self, rules: Vec<CompiledRule>) {
        self.calls.lock().await.push(rules);
    }
}
