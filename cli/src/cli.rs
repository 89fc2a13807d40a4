//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for mqtt-gpt-relay
#[derive(Parser, Debug)]
#[command(name = "mqtt-gpt-relay")]
#[command(author, version, about = "Relay chat, drawing and voice requests from MQTT to OpenAI")]
#[command(long_about = r#"
mqtt-gpt-relay subscribes to request topics on an MQTT broker, forwards each
request to the OpenAI API and publishes the answer back on the topic the
request came from. Chat replies are streamed fragment by fragment.

Configuration files are loaded from (in priority order):
1. --url / --proxy / --key flags
2. RELAY_* environment variables (e.g. RELAY_PROVIDER__API_KEY)
3. --config <path>     Explicit config file
4. ./relay.toml        Project-level config
5. ~/.config/mqtt-gpt-relay/config.toml   Global config

Example:
  mqtt-gpt-relay --url 127.0.0.1:1883 --proxy http://127.0.0.1:7890 --key sk-...
  mqtt-gpt-relay --config relay.toml -vv --transcript logs/transcript.jsonl
"#)]
pub struct Cli {
    /// Broker address (host:port)
    #[arg(long, value_name = "HOST:PORT")]
    pub url: Option<String>,

    /// Proxy for all OpenAI requests
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// OpenAI API key
    #[arg(long, value_name = "KEY")]
    pub key: Option<String>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write a daily-rolling log file into this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Append a JSONL transcript of relay events to this file
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
