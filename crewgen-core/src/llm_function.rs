//! # LLM functions
//!
//! A prompt template bound to a model, a reply decoder and an optional
//! success predicate. `generate` fills the template, calls the model, decodes
//! the first code block and retries until the reply is acceptable or the
//! attempt budget is spent. Rejected replies are fed back to the model with
//! the reason, so a retry is a correction rather than a blind re-roll.

use crate::error::{Error, Result};
use crate::extract::extract_code_block;
use crate::prompt::{PromptTemplate, PromptVars};
use crate::provider::{ChatMessage, CompletionRequest, LlmProvider, UsageTracker};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Predicate a decoded reply must satisfy
pub type SuccessPredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Attempt budget and backoff between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts (tests, scripted providers)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor).min(self.max_backoff)
    }
}

/// A successful generation
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub value: T,
    /// Attempts used, 1 when the first reply was accepted
    pub attempts: u32,
    pub usage: UsageTracker,
}

/// A prompt template wired to a model
pub struct LlmFunction {
    template: PromptTemplate,
    model: Option<String>,
    temperature: Option<f32>,
    success: Option<SuccessPredicate>,
    retry: RetryPolicy,
}

impl LlmFunction {
    pub fn new(template: PromptTemplate) -> Self {
        Self {
            template,
            model: None,
            temperature: None,
            success: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Model identifier; the provider default is used when unset
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_success<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.success = Some(Box::new(predicate));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn template(&self) -> PromptTemplate {
        self.template
    }

    /// Decoded JSON value that passes the success predicate
    pub async fn generate(
        &self,
        provider: &dyn LlmProvider,
        vars: &PromptVars,
    ) -> Result<Generated<Value>> {
        self.generate_with(provider, vars, Ok).await
    }

    /// Like `generate`, but the value must also deserialize into `T`
    pub async fn generate_typed<T: DeserializeOwned>(
        &self,
        provider: &dyn LlmProvider,
        vars: &PromptVars,
    ) -> Result<Generated<T>> {
        self.generate_with(provider, vars, |value| {
            serde_json::from_value::<T>(value).map_err(|e| {
                Error::invalid_response(format!("config does not match the expected shape: {}", e))
            })
        })
        .await
    }

    /// Core loop: `accept` turns a predicate-approved value into `T` or
    /// rejects it, which counts as a failed attempt.
    pub async fn generate_with<T, F>(
        &self,
        provider: &dyn LlmProvider,
        vars: &PromptVars,
        accept: F,
    ) -> Result<Generated<T>>
    where
        F: Fn(Value) -> Result<T>,
    {
        let prompt = self.template.render(vars)?;
        let mut messages = vec![ChatMessage::user(prompt)];
        let mut usage = UsageTracker::new();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let mut request = CompletionRequest::new(messages.clone());
            if let Some(model) = &self.model {
                request = request.with_model(model.clone());
            }
            if let Some(temperature) = self.temperature {
                request = request.with_temperature(temperature);
            }

            debug!(template = self.template.name(), attempt, "calling model");

            let response = match provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    let err = Error::from(e)
                        .with_context("template", self.template.name())
                        .with_context("attempt", attempt.to_string());
                    if !err.is_retryable() {
                        return Err(err.with_operation("llm_function::generate"));
                    }
                    warn!(template = self.template.name(), attempt, error = %err, "model call failed");
                    last_error = Some(err);
                    self.pause(attempt, max_attempts).await;
                    continue;
                }
            };

            usage.track(&response.model, &response.usage);
            let reply = response.content.unwrap_or_default();
            debug!(template = self.template.name(), chars = reply.len(), "model replied");

            match self.check(&reply).and_then(&accept) {
                Ok(value) => {
                    return Ok(Generated {
                        value,
                        attempts: attempt,
                        usage,
                    })
                }
                Err(err) => {
                    warn!(
                        template = self.template.name(),
                        attempt,
                        reason = err.message(),
                        "reply rejected"
                    );
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(format!(
                        "Your reply could not be used: {}\n\
                         Reply again with exactly one ```json block that fixes this.",
                        err.message()
                    )));
                    last_error = Some(err);
                    self.pause(attempt, max_attempts).await;
                }
            }
        }

        let err = last_error
            .unwrap_or_else(|| Error::invalid_response("no attempts were made"))
            .persist()
            .with_operation("llm_function::generate")
            .with_context("template", self.template.name())
            .with_context("attempts", max_attempts.to_string());
        Err(err)
    }

    fn check(&self, reply: &str) -> Result<Value> {
        let value = extract_code_block(reply).into_result()?;
        match &self.success {
            Some(predicate) if !predicate(&value) => Err(crate::error::invalid_response(
                "config is missing required keys or references",
                reply,
            )),
            _ => Ok(value),
        }
    }

    async fn pause(&self, attempt: u32, max_attempts: u32) {
        if attempt < max_attempts {
            let delay = self.retry.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Success predicate: the value is an object holding every key
pub fn has_keys(keys: &'static [&'static str]) -> impl Fn(&Value) -> bool + Send + Sync {
    move |value| {
        value
            .as_object()
            .map(|obj| keys.iter().all(|k| obj.contains_key(*k)))
            .unwrap_or(false)
    }
}
