//! Classifier configuration from TOML (`[classifier]` section)

use relay_domain::{CapabilityClassifier, DrawKeywordRule};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileClassifierConfig {
    /// Keyword that marks a draw request
    pub draw_keyword: String,
    /// Number of leading characters searched for the keyword
    pub prefix_chars: usize,
    /// Shortest request, in bytes, that can be a draw request
    pub min_bytes: usize,
}

impl Default for FileClassifierConfig {
    fn default() -> Self {
        let rule = DrawKeywordRule::default();
        Self {
            draw_keyword: rule.keyword,
            prefix_chars: rule.prefix_chars,
            min_bytes: rule.min_bytes,
        }
    }
}

impl FileClassifierConfig {
    pub fn to_classifier(&self) -> CapabilityClassifier {
        CapabilityClassifier::new().with_rule(DrawKeywordRule {
            keyword: self.draw_keyword.clone(),
            prefix_chars: self.prefix_chars,
            min_bytes: self.min_bytes,
        })
    }
}
