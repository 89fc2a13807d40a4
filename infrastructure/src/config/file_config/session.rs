//! Session configuration from TOML (`[session]` section)

use relay_application::config::relay_config::DEFAULT_APOLOGY;
use relay_domain::session::policy::{
    DEFAULT_MAX_SESSIONS, DEFAULT_MAX_TURNS, DEFAULT_SYSTEM_PROMPT,
};
use relay_domain::SessionPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    /// System turn every new session starts with
    pub system_prompt: String,
    /// History cap including the system turn
    pub max_turns: usize,
    /// Resident sessions before least-recently-active eviction
    pub max_sessions: usize,
    /// Apology prefixed to error replies
    pub apology: String,
    /// Seconds an idle session worker lingers before exiting
    pub worker_idle_secs: u64,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            max_sessions: DEFAULT_MAX_SESSIONS,
            apology: DEFAULT_APOLOGY.to_string(),
            worker_idle_secs: 300,
        }
    }
}

impl FileSessionConfig {
    pub fn to_policy(&self) -> SessionPolicy {
        SessionPolicy::default()
            .with_system_prompt(self.system_prompt.clone())
            .with_max_turns(self.max_turns)
            .with_max_sessions(self.max_sessions)
    }
}
