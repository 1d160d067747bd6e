use std::time::Duration;

/// Inference-service client configuration loaded explicitly from
/// environment variables. Every knob has a default so the client can be
/// constructed in a bare environment.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the OpenAI-compatible inference service.
    pub base_url: String,
    /// Per-request timeout. The original UI blocked indefinitely on hung
    /// remote calls; a bounded wait is a deliberate policy choice here.
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
    /// Model used to turn a transcript into a partial profile.
    pub extraction_model: String,
    /// Model used to produce eligibility verdicts.
    pub eligibility_model: String,
    /// Model used for the speech-synthesis utility.
    pub speech_model: String,
    /// BCP-47 locale for the recognition session.
    pub recognition_locale: String,
}

impl InferenceConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("INFERENCE_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8001/v1".to_string());

        let default_timeout = std::env::var("INFERENCE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        let max_retries = std::env::var("INFERENCE_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3);

        let initial_backoff = std::env::var("INFERENCE_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = std::env::var("INFERENCE_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = std::env::var("INFERENCE_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        let extraction_model = std::env::var("EXTRACTION_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let eligibility_model = std::env::var("ELIGIBILITY_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let speech_model = std::env::var("SPEECH_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash-preview-tts".to_string());

        let recognition_locale =
            std::env::var("RECOGNITION_LOCALE").unwrap_or_else(|_| "hi-IN".to_string());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
            extraction_model,
            eligibility_model,
            speech_model,
            recognition_locale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        // from_env reads the process environment, so exercise the trim
        // behavior through it only when the variable is unset.
        if std::env::var("INFERENCE_BASE_URL").is_err() {
            let config = InferenceConfig::from_env();
            assert!(!config.base_url.ends_with('/'));
            assert_eq!(config.default_timeout, Duration::from_secs(30));
            assert_eq!(config.max_retries, 3);
        }
    }
}
