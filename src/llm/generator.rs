//! Response generation with retries, JSON repair and rule-based fallback

use crate::core::config::{GenerationConfig, PipelineConfig};
use crate::core::error::{PipelineError, Result};
use crate::events::{Event, EventBus};
use crate::llm::client::CompletionBackend;
use crate::llm::{fallback, prompt, repair};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prompt pair sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Where the generated text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSource {
    Backend,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Plan JSON (repaired when `repaired` is set)
    pub raw_text: String,
    pub repaired: bool,
    /// Backend calls made, including the successful one
    pub attempts: u32,
    pub source: GenerationSource,
}

/// Produces plan JSON for a request, degrading to rule-based synthesis
pub struct ResponseGenerator {
    backend: Option<Arc<dyn CompletionBackend>>,
    settings: GenerationConfig,
    max_repeat: u32,
    bus: Option<Arc<EventBus>>,
}

impl ResponseGenerator {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            settings: config.generation.clone(),
            max_repeat: config.resolver.max_repeat,
            bus: None,
        }
    }

    /// Publish a notice on this bus whenever the fallback is used
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Delay before retry number `retry` (0-based): base * 2^retry, capped
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let base = self.settings.base_delay();
        let factor = 2u32.saturating_pow(retry);
        base.checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.settings.max_delay())
    }

    /// Generate plan JSON for `user_prompt`
    ///
    /// Errors only when the backend keeps failing and the fallback is disabled.
    pub async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<GenerationResult> {
        let request = prompt::json_only(system_prompt, user_prompt);
        let mut attempts = 0;
        let mut last_error = None;

        if let Some(backend) = &self.backend {
            for attempt in 0..self.settings.max_attempts {
                if attempt > 0 {
                    let delay = self.backoff_delay(attempt - 1);
                    debug!(attempt = attempt + 1, ?delay, "retrying generation");
                    tokio::time::sleep(delay).await;
                }
                attempts += 1;

                match backend.complete(&request).await {
                    Ok(text) if !text.trim().is_empty() => {
                        let repaired = repair::repair_json(&text);
                        info!(attempts, repaired = repaired.repaired, "plan generated");
                        return Ok(GenerationResult {
                            raw_text: repaired.text,
                            repaired: repaired.repaired,
                            attempts,
                            source: GenerationSource::Backend,
                        });
                    }
                    Ok(_) => {
                        warn!(attempt = attempts, "backend returned empty content");
                        last_error = Some(PipelineError::Generation("Empty response".into()));
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(attempt = attempts, error = %e, "generation attempt failed");
                        last_error = Some(e);
                    }
                    Err(e) => {
                        warn!(attempt = attempts, error = %e, "generation failed, not retrying");
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        if !self.settings.fallback_enabled {
            return Err(last_error.unwrap_or_else(|| {
                PipelineError::Generation("no generation backend configured".into())
            }));
        }

        let plan = fallback::synthesize(user_prompt, self.max_repeat);
        info!(attempts, steps = plan.steps.len(), "using rule-based fallback plan");
        if let Some(bus) = &self.bus {
            let message = if self.backend.is_some() {
                "The language model is unavailable right now, so your request was interpreted with simple rules."
            } else {
                "Requests are being interpreted with simple rules."
            };
            bus.emit(&Event::notice(message));
        }

        Ok(GenerationResult {
            raw_text: plan.to_wire_json()?,
            repaired: false,
            attempts,
            source: GenerationSource::Fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{topics, SubscribeOptions};
    use crate::llm::parser::parse_plan;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Backend that replays scripted replies and records call times
    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
            self.calls.lock().unwrap().push(Instant::now());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PipelineError::Generation("script exhausted".into())))
        }
    }

    fn fail() -> Result<String> {
        Err(PipelineError::Generation("API error 503: busy".into()))
    }

    fn plan_json() -> Result<String> {
        Ok(r#"{"steps": [{"id": "1", "params": {"action": "member.kick", "user": "7"}}]}"#.into())
    }

    fn generator(backend: Arc<Scripted>, config: PipelineConfig) -> ResponseGenerator {
        ResponseGenerator::new(Some(backend as Arc<dyn CompletionBackend>), &config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retries() {
        let backend = Scripted::new(vec![fail(), fail(), plan_json()]);
        let result = generator(backend.clone(), PipelineConfig::default())
            .generate("sys", "kick 7")
            .await
            .unwrap();

        assert_eq!(result.source, GenerationSource::Backend);
        assert_eq!(result.attempts, 3);
        assert_eq!(backend.call_count(), 3);
        assert_eq!(
            backend.gaps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_stop_at_first_success() {
        let backend = Scripted::new(vec![plan_json(), plan_json()]);
        let result = generator(backend.clone(), PipelineConfig::default())
            .generate("sys", "kick 7")
            .await
            .unwrap();
        assert_eq!(result.attempts, 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fall_back() {
        let mut config = PipelineConfig::default();
        config.generation.max_attempts = 4;
        let backend = Scripted::new(vec![fail(), fail(), fail(), fail()]);
        let bus = Arc::new(EventBus::new());
        let notices = Arc::new(AtomicUsize::new(0));
        let seen = notices.clone();
        bus.subscribe(
            topics::NOTICE,
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            },
            SubscribeOptions::default(),
        );

        let result = generator(backend.clone(), config)
            .with_bus(bus)
            .generate("sys", "send hello 3 times")
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 4);
        assert_eq!(result.attempts, 4);
        assert_eq!(result.source, GenerationSource::Fallback);
        assert_eq!(notices.load(Ordering::SeqCst), 1);

        let gaps = backend.gaps();
        assert!(gaps.windows(2).all(|w| w[0] <= w[1]));

        let plan = parse_plan(&result.raw_text).unwrap();
        assert_eq!(plan.steps.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_content_is_retried() {
        let backend = Scripted::new(vec![Ok("   ".into()), plan_json()]);
        let result = generator(backend.clone(), PipelineConfig::default())
            .generate("sys", "kick 7")
            .await
            .unwrap();
        assert_eq!(result.attempts, 2);
        assert_eq!(result.source, GenerationSource::Backend);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_disabled_surfaces_error() {
        let mut config = PipelineConfig::default();
        config.generation.fallback_enabled = false;
        config.generation.max_attempts = 2;
        let backend = Scripted::new(vec![fail(), fail()]);
        let err = generator(backend, config)
            .generate("sys", "kick 7")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }

    #[tokio::test]
    async fn test_no_backend_uses_fallback_immediately() {
        let result = ResponseGenerator::new(None, &PipelineConfig::default())
            .generate("sys", "send hello 3 times")
            .await
            .unwrap();
        assert_eq!(result.attempts, 0);
        assert_eq!(result.source, GenerationSource::Fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repair_applied_to_backend_text() {
        let backend = Scripted::new(vec![Ok(
            "```json\n{steps: [{'id': '1', 'params': {'action': 'member.kick', 'user': '7'},}]}\n```".into(),
        )]);
        let result = generator(backend, PipelineConfig::default())
            .generate("sys", "kick 7")
            .await
            .unwrap();
        assert!(result.repaired);
        assert!(parse_plan(&result.raw_text).is_ok());
    }

    #[test]
    fn test_backoff_is_capped() {
        let mut config = PipelineConfig::default();
        config.generation.max_delay_ms = 5_000;
        let generator = ResponseGenerator::new(None, &config);
        assert_eq!(generator.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(generator.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(generator.backoff_delay(3), Duration::from_secs(5));
        assert_eq!(generator.backoff_delay(40), Duration::from_secs(5));
    }
}
