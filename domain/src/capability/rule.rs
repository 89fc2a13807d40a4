//! Capability routing rules

use super::Capability;
use serde::{Deserialize, Serialize};

/// A single routing rule.
///
/// Returns `Some` when the rule claims the request text, `None` to defer to
/// the next rule.
pub trait CapabilityRule: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, text: &str) -> Option<Capability>;
}

/// Prefix keyword heuristic for image requests.
///
/// Claims a request as [`Capability::Draw`] when the text is at least
/// `min_bytes` long and its first `prefix_chars` characters (Unicode scalar
/// values, not bytes) contain `keyword`.
///
/// # Example
///
/// ```
/// use relay_domain::{Capability, CapabilityRule, DrawKeywordRule};
///
/// let rule = DrawKeywordRule::default();
/// assert_eq!(rule.classify("请画一只猫"), Some(Capability::Draw));
/// assert_eq!(rule.classify("你好"), None);        // too short
/// assert_eq!(rule.classify("今天天气很好，画画吧"), None); // keyword past the prefix
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawKeywordRule {
    pub keyword: String,
    pub prefix_chars: usize,
    pub min_bytes: usize,
}

impl Default for DrawKeywordRule {
    fn default() -> Self {
        Self {
            keyword: "画".to_string(),
            prefix_chars: 5,
            min_bytes: 10,
        }
    }
}

impl CapabilityRule for DrawKeywordRule {
    fn name(&self) -> &str {
        "draw-keyword"
    }

    fn classify(&self, text: &str) -> Option<Capability> {
        if self.keyword.is_empty() || text.len() < self.min_bytes {
            return None;
        }
        let prefix: String = text.chars().take(self.prefix_chars).collect();
        prefix.contains(&self.keyword).then_some(Capability::Draw)
    }
}
