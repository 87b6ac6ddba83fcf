use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;
use crate::providers::Provider;

#[derive(Parser)]
#[command(name = "pokemood")]
#[command(version = "0.3.1")]
#[command(about = "Mood-based Pokémon team generator with a streaming web UI")]
pub struct Args {
    /// Port for the web UI server (overrides the config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Default LLM provider: openai, anthropic or google
    #[arg(long, value_enum, default_value = "openai")]
    pub provider: Provider,

    /// Model override for the selected provider (defaults come from the
    /// config's model map)
    #[arg(long)]
    pub model: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Do not open the browser on startup
    #[arg(long)]
    pub no_browser: bool,
}

impl Args {
    /// Effective bind port: CLI flag beats config file.
    pub fn resolved_port(&self, config: &AppConfig) -> u16 {
        self.port.unwrap_or(config.port)
    }
}

/// The model to use for `provider`: an explicit override wins, otherwise
/// the configured model map decides.
pub fn resolve_model(config: &AppConfig, provider: &Provider, explicit: Option<&str>) -> String {
    match explicit {
        Some(model) => model.to_string(),
        None => config.model_for(provider).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["pokemood"]);
        assert_eq!(args.port, None);
        assert_eq!(args.provider, Provider::Openai);
        assert!(args.model.is_none());
        assert!(args.config.is_none());
        assert!(!args.no_browser);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "pokemood",
            "--port",
            "9000",
            "--provider",
            "anthropic",
            "--model",
            "claude-3-7-sonnet-latest",
            "--config",
            "pokemood.toml",
            "--no-browser",
        ]);
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.provider, Provider::Anthropic);
        assert_eq!(args.model.as_deref(), Some("claude-3-7-sonnet-latest"));
        assert_eq!(args.config.as_deref(), Some(std::path::Path::new("pokemood.toml")));
        assert!(args.no_browser);
    }

    #[test]
    fn test_args_parse_provider_google() {
        let args = Args::parse_from(["pokemood", "--provider", "google"]);
        assert_eq!(args.provider, Provider::Google);
    }

    #[test]
    fn test_resolved_port_prefers_cli() {
        let config = AppConfig::default();
        let args = Args::parse_from(["pokemood", "--port", "1234"]);
        assert_eq!(args.resolved_port(&config), 1234);

        let args = Args::parse_from(["pokemood"]);
        assert_eq!(args.resolved_port(&config), config.port);
    }

    #[test]
    fn test_resolve_model_explicit_override_wins() {
        let config = AppConfig::default();
        assert_eq!(
            resolve_model(&config, &Provider::Openai, Some("gpt-4o-mini")),
            "gpt-4o-mini"
        );
    }

    #[test]
    fn test_resolve_model_falls_back_to_map() {
        let config = AppConfig::default();
        assert_eq!(
            resolve_model(&config, &Provider::Anthropic, None),
            "claude-3-7-sonnet-latest"
        );
        assert_eq!(
            resolve_model(&config, &Provider::Google, None),
            "gemini-2.5-flash-preview-04-17"
        );
    }
}
