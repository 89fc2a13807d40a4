//! Configuration loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

const PROJECT_CONFIG: &str = "relay.toml";
const ENV_PREFIX: &str = "RELAY_";

/// Values given directly on the command line. They win over every other
/// source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub broker_url: Option<String>,
    pub proxy: Option<String>,
    pub api_key: Option<String>,
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    pub fn load(
        config_path: Option<&PathBuf>,
        overrides: &ConfigOverrides,
    ) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path, overrides)
            .extract()
            .map_err(Box::new)
    }

    /// Every source, merged in priority order.
    pub fn figment(config_path: Option<&PathBuf>, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::apply_overrides(figment, overrides)
    }

    /// Layer command-line values on top of `figment`.
    pub fn apply_overrides(mut figment: Figment, overrides: &ConfigOverrides) -> Figment {
        if let Some(url) = &overrides.broker_url {
            figment = figment.merge(Serialized::default("broker.url", url));
        }
        if let Some(proxy) = &overrides.proxy {
            figment = figment.merge(Serialized::default("provider.proxy", proxy));
        }
        if let Some(key) = &overrides.api_key {
            figment = figment.merge(Serialized::default("provider.api_key", key));
        }
        figment
    }

    /// Get the global config file path
    ///
    /// Returns `$XDG_CONFIG_HOME/mqtt-gpt-relay/config.toml` when set,
    /// otherwise the platform config directory equivalent.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mqtt-gpt-relay").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        let path = PathBuf::from(PROJECT_CONFIG);
        path.exists().then_some(path)
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&PathBuf>) {
        println!("Configuration sources (in priority order):");
        println!("  [     ] Flags:   --url, --proxy, --key");
        println!("  [     ] Env:     {ENV_PREFIX}<SECTION>__<KEY>");

        if let Some(path) = config_path {
            println!("  {} Explicit: {}", Self::marker(path), path.display());
        }

        let project = PathBuf::from(PROJECT_CONFIG);
        println!("  {} Project: {}", Self::marker(&project), project.display());

        if let Some(path) = Self::global_config_path() {
            println!("  {} Global:  {}", Self::marker(&path), path.display());
        }

        println!("  [     ] Default: built-in defaults");
    }

    fn marker(path: &Path) -> &'static str {
        if path.exists() { "[FOUND]" } else { "[     ]" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Figment {
        Figment::new().merge(Serialized::defaults(FileConfig::default()))
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("mqtt-gpt-relay"));
    }

    #[test]
    fn test_toml_layer_over_defaults() {
        let config: FileConfig = base()
            .merge(Toml::string(
                r#"
[provider]
chat_model = "gpt-4o-mini"
"#,
            ))
            .extract()
            .unwrap();
        assert_eq!(config.provider.chat_model, "gpt-4o-mini");
        assert_eq!(config.provider.max_tokens, 800);
        assert_eq!(config.broker.client_id, "go-mqtt-chat");
    }

    #[test]
    fn test_overrides_win_over_files() {
        let figment = base().merge(Toml::string(
            r#"
[broker]
url = "file-host:1883"

[provider]
proxy = "http://file-proxy:1"
api_key = "from-file"
"#,
        ));
        let overrides = ConfigOverrides {
            broker_url: Some("flag-host:1883".into()),
            proxy: None,
            api_key: Some("from-flag".into()),
        };

        let config: FileConfig = ConfigLoader::apply_overrides(figment, &overrides)
            .extract()
            .unwrap();
        assert_eq!(config.broker.url.as_deref(), Some("flag-host:1883"));
        assert_eq!(config.provider.proxy.as_deref(), Some("http://file-proxy:1"));
        assert_eq!(config.provider.api_key.as_deref(), Some("from-flag"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            r#"
[session]
max_turns = 7
"#,
        )
        .unwrap();

        let config: FileConfig = base().merge(Toml::file(&path)).extract().unwrap();
        assert_eq!(config.session.max_turns, 7);
    }
}
