use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TeamError;
use crate::providers::Provider;

fn default_openai_model() -> String {
    "gpt-4.1".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-7-sonnet-latest".to_string()
}

fn default_google_model() -> String {
    "gemini-2.5-flash-preview-04-17".to_string()
}

fn default_pokeapi_base() -> String {
    "https://pokeapi.co/api/v2/pokemon".to_string()
}

fn default_port() -> u16 {
    8888
}

/// Model selected per provider when the user doesn't pass `--model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMap {
    #[serde(default = "default_openai_model")]
    pub openai: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic: String,
    #[serde(default = "default_google_model")]
    pub google: String,
}

impl Default for ModelMap {
    fn default() -> Self {
        ModelMap {
            openai: default_openai_model(),
            anthropic: default_anthropic_model(),
            google: default_google_model(),
        }
    }
}

/// Application configuration, loadable from an optional TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub models: ModelMap,
    /// Base URL for Pokémon record lookups.
    #[serde(default = "default_pokeapi_base")]
    pub pokeapi_base: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            models: ModelMap::default(),
            pokeapi_base: default_pokeapi_base(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, TeamError> {
        let Some(path) = path else {
            return Ok(AppConfig::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| TeamError::ConfigRead {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| TeamError::ConfigParse {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }

    /// The configured model for `provider`.
    pub fn model_for(&self, provider: &Provider) -> &str {
        match provider {
            Provider::Openai => &self.models.openai,
            Provider::Anthropic => &self.models.anthropic,
            Provider::Google => &self.models.google,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_default_model_map_matches_demo() {
        let map = ModelMap::default();
        assert_eq!(map.openai, "gpt-4.1");
        assert_eq!(map.anthropic, "claude-3-7-sonnet-latest");
        assert_eq!(map.google, "gemini-2.5-flash-preview-04-17");
    }

    #[test]
    fn test_load_without_path_is_default() {
        let config = AppConfig::load(None).expect("load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 8888);
        assert!(config.pokeapi_base.starts_with("https://pokeapi.co"));
    }

    #[rstest]
    #[case(Provider::Openai, "gpt-4.1")]
    #[case(Provider::Anthropic, "claude-3-7-sonnet-latest")]
    #[case(Provider::Google, "gemini-2.5-flash-preview-04-17")]
    fn test_model_for_default(#[case] provider: Provider, #[case] expected: &str) {
        let config = AppConfig::default();
        assert_eq!(config.model_for(&provider), expected);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            port = 9000

            [models]
            openai = "gpt-4o-mini"
            "#,
        )
        .expect("parse");
        assert_eq!(config.port, 9000);
        assert_eq!(config.models.openai, "gpt-4o-mini");
        assert_eq!(config.models.anthropic, "claude-3-7-sonnet-latest");
        assert_eq!(config.pokeapi_base, default_pokeapi_base());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "pokeapi_base = \"http://localhost:9999/pokemon\"").expect("write");
        let config = AppConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.pokeapi_base, "http://localhost:9999/pokemon");
        assert_eq!(config.port, 8888);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/pokemood.toml")));
        assert!(matches!(err, Err(TeamError::ConfigRead { .. })));
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "port = \"not a number").expect("write");
        let err = AppConfig::load(Some(file.path()));
        assert!(matches!(err, Err(TeamError::ConfigParse { .. })));
    }
}
