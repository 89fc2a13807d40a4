//! Capability classifier

use super::Capability;
use super::rule::{CapabilityRule, DrawKeywordRule};

/// Routes a request text to a [`Capability`].
///
/// Rules are consulted in order; the first rule that returns `Some` wins.
/// When no rule claims the text the request is a [`Capability::Chat`].
/// Classification is a pure function of the text, so transcribed audio is
/// classified exactly like typed text.
pub struct CapabilityClassifier {
    rules: Vec<Box<dyn CapabilityRule>>,
}

impl Default for CapabilityClassifier {
    fn default() -> Self {
        Self::new().with_rule(DrawKeywordRule::default())
    }
}

impl CapabilityClassifier {
    /// Classifier with no rules (everything is chat).
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: impl CapabilityRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn classify(&self, text: &str) -> Capability {
        self.rules
            .iter()
            .find_map(|rule| rule.classify(text))
            .unwrap_or_default()
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl std::fmt::Debug for CapabilityClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityClassifier")
            .field("rules", &self.rule_names())
            .finish()
    }
}
