pub mod card;
pub mod cli;
pub mod config;
pub mod error;
pub mod markup;
pub mod providers;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod web;

use std::env;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::warn;

use error::TeamError;
use providers::*;
use session::StreamEvent;

/// Instruction text for the team generator model call.
pub const SYSTEM_PROMPT: &str = r#"You are a Pokémon Team Generator that creates the perfect team based on the user's mood, personality, or preferences.

When responding to a user query about what Pokémon team they should use:

1. Analyze their mood, personality traits, or preferences described in their query.
2. Select 6 Pokémon that match this mood/personality.
3. For each Pokémon:
   - Provide a brief explanation of why it matches their mood/personality
   - Include a <pokemon-card pokemon-name="pokemonName"> tag (using the exact Pokémon name)

Format your response as follows:
1. A brief introduction connecting their mood to the team theme
2. For each of the 6 Pokémon:
   - Name and brief reasoning
   - <pokemon-card> tag
3. A conclusion about how the team works together

Always ensure you use correct Pokémon names that exist in the PokéAPI database. Only use the "pokemon-name" attribute in the <pokemon-card> tag, not pokemon-id.

Example response format:
"Based on your [mood/preference], here's a team that embodies [theme]:

1. Pikachu: [reason]
<pokemon-card pokemon-name="pikachu"></pokemon-card>

2. Charizard: [reason]
<pokemon-card pokemon-name="charizard"></pokemon-card>

... and so on for all 6 Pokémon"

If the user's query doesn't mention mood or personality, prompt them to share how they're feeling or what kind of personality they have so you can generate an appropriate team."#;

// ---------------------------------------------------------------------------
// TeamStreamer — multi-provider streaming engine
// ---------------------------------------------------------------------------

/// Streams a model completion, forwarding each text fragment over a channel
/// in arrival order.
pub struct TeamStreamer {
    client: Client,
    api_key: String,
    pub provider: Provider,
    pub model: String,
    /// Instruction text prepended to the conversation.
    pub system_prompt: Option<String>,
    /// Fragments are sent here as they arrive.
    pub fragment_tx: mpsc::UnboundedSender<StreamEvent>,
}

impl TeamStreamer {
    pub fn new(
        provider: Provider,
        model: String,
        fragment_tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<Self, TeamError> {
        let api_key = env::var(provider.api_key_var())
            .map_err(|_| TeamError::MissingApiKey(provider.api_key_var()))?;

        Ok(TeamStreamer {
            client: Client::new(),
            api_key,
            provider,
            model,
            system_prompt: None,
            fragment_tx,
        })
    }

    // -----------------------------------------------------------------------
    // Public entry point
    // -----------------------------------------------------------------------

    /// Stream the completion for `prompt`. Fragments go out through the
    /// channel; the caller signals `Done`/`Failed` based on the result.
    pub async fn stream(&self, prompt: &str) -> Result<(), TeamError> {
        match self.provider {
            Provider::Openai => self.stream_openai(prompt).await,
            Provider::Anthropic => self.stream_anthropic(prompt).await,
            Provider::Google => self.stream_google(prompt).await,
        }
    }

    fn send_fragment(&self, text: &str) {
        let _ = self
            .fragment_tx
            .send(StreamEvent::Fragment(text.to_string()));
    }

    // -----------------------------------------------------------------------
    // OpenAI streaming
    // -----------------------------------------------------------------------

    async fn stream_openai(&self, prompt: &str) -> Result<(), TeamError> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(OpenAIChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OpenAIChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });
        let request = OpenAIChatRequest {
            model: self.model.clone(),
            messages,
            stream: true,
            temperature: 0.7,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(TeamError::Provider {
                provider: "openai".to_string(),
                detail: error_text,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                if line.starts_with("data: ") && line != "data: [DONE]" {
                    let json_str = line.strip_prefix("data: ").unwrap_or(&line);
                    if let Ok(parsed) = serde_json::from_str::<OpenAIChunk>(json_str) {
                        if let Some(choice) = parsed.choices.first() {
                            if let Some(content) = &choice.delta.content {
                                self.send_fragment(content);
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Anthropic streaming
    // -----------------------------------------------------------------------

    async fn stream_anthropic(&self, prompt: &str) -> Result<(), TeamError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: 4096,
            stream: true,
            temperature: 0.7,
            system: self.system_prompt.clone(),
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(TeamError::Provider {
                provider: "anthropic".to_string(),
                detail: error_text,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                // Anthropic SSE: "event: content_block_delta" then "data: {...}"
                if line.starts_with("data: ") {
                    let json_str = line.strip_prefix("data: ").unwrap_or(&line);
                    if let Ok(event) = serde_json::from_str::<AnthropicStreamEvent>(json_str) {
                        if event.event_type == "content_block_delta" {
                            if let Some(text) = event.delta.as_ref().and_then(|d| d.text.as_deref())
                            {
                                self.send_fragment(text);
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Google Gemini streaming
    // -----------------------------------------------------------------------

    async fn stream_google(&self, prompt: &str) -> Result<(), TeamError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: self.system_prompt.as_ref().map(|system| {
                GeminiSystemInstruction {
                    parts: vec![GeminiPart {
                        text: system.clone(),
                    }],
                }
            }),
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(TeamError::Provider {
                provider: "google".to_string(),
                detail: error_text,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                if line.starts_with("data: ") {
                    let json_str = line.strip_prefix("data: ").unwrap_or(&line);
                    if let Ok(parsed) = serde_json::from_str::<GeminiChunk>(json_str) {
                        if let Some(content) =
                            parsed.candidates.first().and_then(|c| c.content.as_ref())
                        {
                            for part in &content.parts {
                                if let Some(text) = &part.text {
                                    self.send_fragment(text);
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Spawnable wrapper: runs the stream and closes it with `Done`/`Failed`.
pub async fn run_generation(streamer: TeamStreamer, prompt: String) {
    let tx = streamer.fragment_tx.clone();
    match streamer.stream(&prompt).await {
        Ok(()) => {
            let _ = tx.send(StreamEvent::Done);
        }
        Err(e) => {
            warn!(provider = %streamer.provider, error = %e, "generation stream failed");
            let _ = tx.send(StreamEvent::Failed(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_openai_requires_api_key() {
        std::env::remove_var("OPENAI_API_KEY");
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = TeamStreamer::new(Provider::Openai, "gpt-4.1".to_string(), tx);
        assert!(matches!(result, Err(TeamError::MissingApiKey(_))));
    }

    #[test]
    fn test_new_google_requires_api_key() {
        std::env::remove_var("GEMINI_API_KEY");
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = TeamStreamer::new(
            Provider::Google,
            "gemini-2.5-flash-preview-04-17".to_string(),
            tx,
        );
        assert!(matches!(result, Err(TeamError::MissingApiKey(_))));
    }

    #[test]
    fn test_system_prompt_mentions_card_tag() {
        assert!(SYSTEM_PROMPT.contains("<pokemon-card"));
        assert!(SYSTEM_PROMPT.contains("pokemon-name"));
    }

    #[test]
    fn test_send_fragment_forwards_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let streamer = TeamStreamer {
            client: Client::new(),
            api_key: "test-key".to_string(),
            provider: Provider::Openai,
            model: "test-model".to_string(),
            system_prompt: None,
            fragment_tx: tx,
        };
        streamer.send_fragment("one");
        streamer.send_fragment("two");

        assert_eq!(
            rx.try_recv().ok(),
            Some(StreamEvent::Fragment("one".to_string()))
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(StreamEvent::Fragment("two".to_string()))
        );
    }
}
