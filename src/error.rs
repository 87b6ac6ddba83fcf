use thiserror::Error;

/// Crate-level error type.
///
/// Variants carry enough context to diagnose a failure from the log line
/// alone, without inspecting the originating error.
#[derive(Debug, Error)]
pub enum TeamError {
    /// A required provider API key is missing from the environment.
    #[error("{0} not set. Export it or pass via environment.")]
    MissingApiKey(&'static str),

    /// The provider answered with a non-success status.
    #[error("{provider} API error: {detail}")]
    Provider { provider: String, detail: String },

    /// A remote endpoint answered with a non-success status.
    #[error("fetch failed for {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    /// Transport-level or JSON decoding failure from reqwest.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The config file could not be read.
    #[error("could not read config file {path}: {detail}")]
    ConfigRead { path: String, detail: String },

    /// The config file could not be parsed as TOML.
    #[error("could not parse config file {path}: {detail}")]
    ConfigParse { path: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_message_names_variable() {
        let err = TeamError::MissingApiKey("OPENAI_API_KEY");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn test_provider_error_message() {
        let err = TeamError::Provider {
            provider: "anthropic".to_string(),
            detail: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "anthropic API error: overloaded");
    }

    #[test]
    fn test_fetch_error_message_includes_status() {
        let err = TeamError::Fetch {
            url: "https://pokeapi.co/api/v2/pokemon/doesnotexist123".to_string(),
            status: 404,
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("doesnotexist123"));
    }

    #[test]
    fn test_config_parse_error_message() {
        let err = TeamError::ConfigParse {
            path: "pokemood.toml".to_string(),
            detail: "expected value".to_string(),
        };
        assert!(err.to_string().contains("pokemood.toml"));
    }
}
