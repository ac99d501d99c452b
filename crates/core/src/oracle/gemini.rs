//! Gemini `generateContent` backend.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde_json::{Value, json};

use crate::audio::io::mime_type;
use crate::config::{BackendDescriptor, OracleConfig};
use crate::error::AlignError;

use super::OracleBackend;
use super::parse::response_text;

/// One Gemini model reached over HTTP with its own request timeout.
pub struct GeminiBackend {
    client: reqwest::blocking::Client,
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiBackend {
    pub fn new(
        descriptor: &BackendDescriptor,
        config: &OracleConfig,
        api_key: &str,
    ) -> Result<Self, AlignError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(descriptor.timeout_secs))
            .build()
            .map_err(|e| AlignError::oracle(&descriptor.model, format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            model: descriptor.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn payload(&self, mime: &str, audio_b64: String, prompt: &str) -> Value {
        json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": mime, "data": audio_b64}},
                    {"text": prompt}
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        })
    }
}

impl OracleBackend for GeminiBackend {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, audio_path: &Path, prompt: &str) -> Result<String, AlignError> {
        let err = |e: String| AlignError::oracle(&self.model, e);

        let audio = std::fs::read(audio_path)
            .map_err(|e| err(format!("cannot read {}: {}", audio_path.display(), e)))?;
        let payload = self.payload(mime_type(audio_path), BASE64_STANDARD.encode(&audio), prompt);
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(err(format!("HTTP {}", status)));
        }
        let body: Value = response.json().map_err(|e| err(format!("invalid body: {}", e)))?;
        response_text(&body).ok_or_else(|| err("no text in response".to_string()))
    }
}

/// Build one backend per configured descriptor, in order.
///
/// Fails with `OracleUnavailable` when the API key variable is unset.
pub fn backends_from_config(
    config: &OracleConfig,
) -> Result<Vec<Box<dyn OracleBackend>>, AlignError> {
    let api_key = match std::env::var(&config.api_key_env) {
        Ok(k) if !k.trim().is_empty() => k,
        _ => {
            log::warn!("{} not set; oracle alignment disabled", config.api_key_env);
            return Err(AlignError::OracleUnavailable);
        }
    };
    config
        .backends
        .iter()
        .map(|d| {
            GeminiBackend::new(d, config, &api_key).map(|b| Box::new(b) as Box<dyn OracleBackend>)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let config = OracleConfig::default();
        let backend = GeminiBackend::new(&config.backends[0], &config, "key").unwrap();
        let payload = backend.payload("audio/mpeg", "QUJD".to_string(), "prompt");
        assert_eq!(payload["contents"][0]["parts"][0]["inlineData"]["mimeType"], "audio/mpeg");
        assert_eq!(payload["contents"][0]["parts"][0]["inlineData"]["data"], "QUJD");
        assert_eq!(payload["contents"][0]["parts"][1]["text"], "prompt");
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 65536);
    }

    #[test]
    fn test_missing_key_disables_oracle() {
        let config = OracleConfig {
            api_key_env: "LYRICTIME_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..OracleConfig::default()
        };
        assert!(matches!(
            backends_from_config(&config),
            Err(AlignError::OracleUnavailable)
        ));
    }

    #[test]
    fn test_unreadable_audio_is_oracle_error() {
        let config = OracleConfig::default();
        let backend = GeminiBackend::new(&config.backends[0], &config, "key").unwrap();
        let err = backend.generate(Path::new("/nonexistent/song.mp3"), "p").unwrap_err();
        assert!(matches!(err, AlignError::Oracle { .. }));
    }
}
