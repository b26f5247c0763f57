//! The orchestrator: selection, fallback, breaking, retry, and streaming
//!
//! One inbound request flows through a single pipeline: the selector picks a
//! primary provider, the fallback executor walks the configured chain, each
//! attempt runs behind that provider's circuit breaker, and transient failures
//! are retried with backoff before they count as a chain failure. Streaming
//! requests additionally route chunks through a [`StreamController`].

use crate::breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::cancel::CancelHandle;
use crate::catalog::ModelRegistry;
use crate::config::SwitchboardConfig;
use crate::error::{
    ErrorContext, ErrorKind, ErrorLogger, ProviderError, Result, DEFAULT_MAX_ENTRIES,
};
use crate::fallback::{FallbackChainExecutor, FallbackOptions};
use crate::preferences::ProviderPreferenceStore;
use crate::provider::{
    AiResponse, LlmProvider, ProviderBuilder, ProviderFactory, ProviderType, SendMessageParams,
    SendRequest,
};
use crate::retry::{RateLimitRetrier, RetryConfig};
use crate::selection::{breaker_key, ProviderSelector, SelectionContext};
use crate::streaming::{StreamConfig, StreamController, StreamEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Resilience tuning shared by every provider
#[derive(Debug, Clone, Default)]
pub struct SwitchboardOptions {
    /// Retry/backoff settings
    pub retry: RetryConfig,
    /// Circuit breaker settings
    pub breaker: CircuitBreakerConfig,
    /// Streaming settings
    pub stream: StreamConfig,
}

/// A live streaming request
///
/// Events and the final structured response travel on separate channels:
/// `events` carries the normalized [`StreamEvent`] sequence while `response`
/// resolves once the pipeline finishes. Both must be consumed.
pub struct StreamingReply {
    /// Message id every event is addressed to
    pub message_id: String,
    /// Normalized event stream
    pub events: mpsc::Receiver<StreamEvent>,
    /// Cooperative cancellation for this request
    pub cancel: CancelHandle,
    /// Resolves with the final response or the terminal error
    pub response: JoinHandle<Result<AiResponse>>,
}

impl StreamingReply {
    /// Split off the events as a [`futures::Stream`](futures::Stream)
    pub fn into_event_stream(
        self,
    ) -> (
        tokio_stream::wrappers::ReceiverStream<StreamEvent>,
        CancelHandle,
        JoinHandle<Result<AiResponse>>,
    ) {
        (
            tokio_stream::wrappers::ReceiverStream::new(self.events),
            self.cancel,
            self.response,
        )
    }

    /// Wait for the pipeline to finish, discarding the event stream
    pub async fn into_response(self) -> Result<AiResponse> {
        drop(self.events);
        match self.response.await {
            Ok(result) => result,
            Err(join_err) => Err(ProviderError::new(
                ErrorKind::Internal,
                format!("streaming task failed: {join_err}"),
            )),
        }
    }
}

/// Entry point tying every subsystem together
#[derive(Clone)]
pub struct Switchboard {
    config: Arc<SwitchboardConfig>,
    factory: Arc<ProviderFactory>,
    registry: Arc<ModelRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    preferences: Arc<ProviderPreferenceStore>,
    selector: Arc<ProviderSelector>,
    fallback: Arc<FallbackChainExecutor>,
    retrier: RateLimitRetrier,
    errors: Arc<ErrorLogger>,
    stream_config: StreamConfig,
}

impl Switchboard {
    /// Build a switchboard with default resilience tuning
    pub fn new(config: SwitchboardConfig) -> Self {
        Self::with_options(config, SwitchboardOptions::default())
    }

    /// Build a switchboard with explicit tuning
    pub fn with_options(config: SwitchboardConfig, options: SwitchboardOptions) -> Self {
        let config = Arc::new(config);
        let factory = Arc::new(ProviderFactory::new((*config).clone()));
        let registry = Arc::new(ModelRegistry::new());
        let breakers = Arc::new(CircuitBreakerRegistry::new(options.breaker));
        let preferences = Arc::new(ProviderPreferenceStore::new());
        let selector = Arc::new(ProviderSelector::new(
            factory.clone(),
            registry.clone(),
            breakers.clone(),
            preferences.clone(),
        ));
        Self {
            config,
            factory,
            registry,
            breakers,
            preferences,
            selector,
            fallback: Arc::new(FallbackChainExecutor::new()),
            retrier: RateLimitRetrier::new(options.retry),
            errors: Arc::new(ErrorLogger::new(DEFAULT_MAX_ENTRIES)),
            stream_config: options.stream,
        }
    }

    /// Register a ready provider adapter and index its models
    pub fn register_provider(&self, instance: Arc<dyn LlmProvider>) {
        self.registry.register_from_catalog(&instance.available_models());
        info!(provider = %instance.provider_type(), "provider registered");
        self.factory.register_instance(instance);
    }

    /// Register a lazy adapter constructor for a provider
    pub fn register_builder(&self, provider: ProviderType, builder: ProviderBuilder) {
        self.factory.register_builder(provider, builder);
    }

    /// Configure the fallback chain tried after `primary` fails
    pub fn set_fallback_chain(&self, primary: ProviderType, chain: Vec<ProviderType>) {
        self.fallback.set_chain(primary, chain);
    }

    /// The preference store, for user/conversation overrides
    pub fn preferences(&self) -> &ProviderPreferenceStore {
        &self.preferences
    }

    /// The model registry backing name-based selection
    pub fn models(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The shared circuit breaker registry
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// The error log shared by all requests
    pub fn errors(&self) -> &ErrorLogger {
        &self.errors
    }

    /// The selector, for ad-hoc selection without running a request
    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    /// Cumulative "from->to" fallback statistics
    pub fn fallback_stats(&self) -> std::collections::HashMap<String, u64> {
        self.fallback.stats()
    }

    /// One-shot completion without streaming
    pub async fn send_message(&self, request: &SendRequest) -> Result<AiResponse> {
        let context = self.selection_context(request);
        let primary = self.selector.select_provider(&context)?;
        let options = self.fallback_options(primary);
        self.fallback
            .execute_with_fallback(
                primary,
                |provider| self.send_attempt(provider, request),
                options,
            )
            .await
    }

    /// Streaming completion
    ///
    /// Returns immediately with the event receiver and a cancellation handle;
    /// the pipeline runs in a spawned task and resolves through
    /// [`StreamingReply::response`]. Exactly one terminal event is emitted
    /// per message id regardless of how the pipeline ends.
    pub fn stream_message(&self, request: SendRequest) -> Result<StreamingReply> {
        let context = self.selection_context(&request);
        let primary = self.selector.select_provider(&context)?;

        let (controller, events) = StreamController::new(&request.message_id, self.stream_config.clone());
        let cancel = CancelHandle::new();
        let message_id = request.message_id.clone();

        let switchboard = self.clone();
        let task_cancel = cancel.clone();
        let response = tokio::spawn(async move {
            switchboard
                .drive_stream(primary, request, controller, task_cancel)
                .await
        });

        Ok(StreamingReply {
            message_id,
            events,
            cancel,
            response,
        })
    }

    async fn drive_stream(
        &self,
        primary: ProviderType,
        request: SendRequest,
        controller: StreamController,
        cancel: CancelHandle,
    ) -> Result<AiResponse> {
        controller.start().await?;

        // mirror external cancellation into the stream state machine
        let watcher_controller = controller.clone();
        let watcher_cancel = cancel.clone();
        let watcher = tokio::spawn(async move {
            watcher_cancel.cancelled().await;
            watcher_controller.cancel().await;
        });

        let options = self.fallback_options(primary);
        let result = self
            .fallback
            .execute_with_fallback(
                primary,
                |provider| self.stream_attempt(provider, &request, &controller, &cancel),
                options,
            )
            .await;
        watcher.abort();

        match result {
            Ok(response) => {
                if controller.is_interrupted() {
                    controller.complete().await;
                    return Ok(response);
                }
                // the stream already terminated (cancel or watchdog) while
                // the provider call was still resolving
                let message = if cancel.is_cancelled() {
                    "stream cancelled"
                } else {
                    "stream terminated before the provider finished"
                };
                Err(ProviderError::new(ErrorKind::StreamInterrupted, message)
                    .with_retryable(false)
                    .with_context("message_id", controller.message_id()))
            }
            Err(err) => {
                error!(message_id = controller.message_id(), error = %err, "streaming pipeline failed");
                controller.on_error(&err).await;
                Err(err)
            }
        }
    }

    async fn send_attempt(
        &self,
        provider: ProviderType,
        request: &SendRequest,
    ) -> Result<AiResponse> {
        let instance = self.factory.get_or_create(provider)?;
        let params = self.build_params(provider, request)?;
        let ctx = self.error_context(provider, request, &params.model, "send_message");
        let timeout = self.provider_timeout(provider);

        self.breakers
            .breaker(&breaker_key(provider))
            .execute(|| {
                self.retrier.execute_with_retry(
                    || {
                        let instance = instance.clone();
                        let params = &params;
                        let ctx = &ctx;
                        async move {
                            let call = instance.send_message(params);
                            let result = match tokio::time::timeout(timeout, call).await {
                                Ok(result) => result,
                                Err(_) => Err(attempt_timeout(provider, timeout)),
                            };
                            if let Err(err) = &result {
                                self.errors.log_error(err, ctx);
                            }
                            result
                        }
                    },
                    "send_message",
                )
            })
            .await
    }

    async fn stream_attempt(
        &self,
        provider: ProviderType,
        request: &SendRequest,
        controller: &StreamController,
        cancel: &CancelHandle,
    ) -> Result<AiResponse> {
        let instance = self.factory.get_or_create(provider)?;
        let params = self.build_params(provider, request)?;
        let ctx = self.error_context(provider, request, &params.model, "stream_message");
        let timeout = self.provider_timeout(provider);

        self.breakers
            .breaker(&breaker_key(provider))
            .execute(|| {
                self.retrier.execute_cancellable(
                    || {
                        let instance = instance.clone();
                        let params = &params;
                        let ctx = &ctx;
                        let controller = controller.clone();
                        let cancel = cancel.clone();
                        async move {
                            if cancel.is_cancelled() {
                                return Err(ProviderError::new(
                                    ErrorKind::StreamInterrupted,
                                    "stream cancelled",
                                )
                                .with_retryable(false));
                            }

                            // fresh chunk channel per attempt; the pump checks
                            // the cancel flag between chunks and counts what
                            // actually reached the controller
                            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                            let emitted = Arc::new(AtomicU64::new(0));
                            let pump_controller = controller.clone();
                            let pump_cancel = cancel.clone();
                            let pump_emitted = emitted.clone();
                            let pump = tokio::spawn(async move {
                                while let Some(chunk) = rx.recv().await {
                                    if pump_cancel.is_cancelled() {
                                        break;
                                    }
                                    pump_controller.on_chunk(&chunk);
                                    pump_emitted.fetch_add(1, Ordering::SeqCst);
                                }
                            });

                            let call = instance.stream_message(params, tx);
                            let result = tokio::select! {
                                result = tokio::time::timeout(timeout, call) => match result {
                                    Ok(result) => result,
                                    Err(_) => Err(attempt_timeout(provider, timeout)),
                                },
                                _ = cancel.cancelled() => Err(ProviderError::new(
                                    ErrorKind::StreamInterrupted,
                                    "stream cancelled",
                                )
                                .with_retryable(false)),
                            };
                            // dropping the call also drops the sender, so the
                            // pump drains whatever was already buffered
                            let _ = pump.await;

                            // deltas already delivered to the consumer cannot
                            // be retracted: a failure past that point must not
                            // be retried or failed over, or the replayed
                            // stream would duplicate output
                            let result = match result {
                                Err(err)
                                    if emitted.load(Ordering::SeqCst) > 0
                                        && (err.retryable
                                            || err.kind != ErrorKind::StreamInterrupted) =>
                                {
                                    Err(ProviderError::new(
                                        ErrorKind::StreamInterrupted,
                                        format!(
                                            "stream interrupted after partial output: {}",
                                            err.message
                                        ),
                                    )
                                    .with_retryable(false)
                                    .with_context("interrupted_kind", err.kind.to_string())
                                    .with_context("message_id", controller.message_id()))
                                }
                                other => other,
                            };

                            if let Err(err) = &result {
                                self.errors.log_error(err, ctx);
                            }
                            result
                        }
                    },
                    "stream_message",
                    Some(cancel),
                )
            })
            .await
    }

    fn selection_context(&self, request: &SendRequest) -> SelectionContext {
        let mut context = SelectionContext::for_request(&request.user_id, &request.conversation_id);
        context.model_id = request.model_override.clone();
        context
    }

    fn error_context(
        &self,
        provider: ProviderType,
        request: &SendRequest,
        model: &str,
        operation: &str,
    ) -> ErrorContext {
        ErrorContext {
            provider: Some(provider),
            user_id: Some(request.user_id.clone()),
            conversation_id: Some(request.conversation_id.clone()),
            model_id: Some(model.to_string()),
            operation: Some(operation.to_string()),
        }
    }

    /// Try the primary plus its entire configured chain
    fn fallback_options(&self, primary: ProviderType) -> FallbackOptions {
        FallbackOptions {
            max_attempts: (1 + self.fallback.chain(primary).len()).max(2),
            ..FallbackOptions::default()
        }
    }

    fn provider_timeout(&self, provider: ProviderType) -> Duration {
        let ms = self
            .config
            .provider(provider)
            .map(|settings| settings.timeout_ms)
            .unwrap_or(60_000);
        Duration::from_millis(ms)
    }

    /// Pick the model one attempt will use
    ///
    /// An explicit override wins when it belongs to (or cannot be attributed
    /// away from) the attempted provider; a fallback provider otherwise runs
    /// its own configured or first catalogued model.
    fn resolve_model(&self, provider: ProviderType, request: &SendRequest) -> Result<String> {
        if let Some(model) = &request.model_override {
            match self.registry.resolve(model) {
                Some(owner) if owner != provider => {
                    debug!(model = %model, owner = %owner, provider = %provider, "override belongs to another provider");
                }
                _ => return Ok(model.clone()),
            }
        }
        if let Some(settings) = self.config.provider(provider) {
            if !settings.default_model.is_empty() {
                return Ok(settings.default_model.clone());
            }
        }
        let instance = self.factory.get_or_create(provider)?;
        let models = instance.available_models();
        models
            .iter()
            .find(|m| m.recommended && !m.deprecated)
            .or_else(|| models.iter().find(|m| !m.deprecated))
            .map(|m| m.id.clone())
            .ok_or_else(|| {
                ProviderError::new(
                    ErrorKind::ModelNotFound,
                    format!("no usable model for provider {provider}"),
                )
            })
    }

    fn build_params(&self, provider: ProviderType, request: &SendRequest) -> Result<SendMessageParams> {
        let model = self.resolve_model(provider, request)?;
        let max_tokens = request.max_tokens.or_else(|| {
            self.config
                .provider(provider)
                .map(|settings| settings.max_tokens)
        });
        Ok(SendMessageParams {
            model,
            messages: request.history.clone(),
            system_prompt: request.system_prompt.clone(),
            max_tokens,
            temperature: request.temperature,
        })
    }
}

fn attempt_timeout(provider: ProviderType, timeout: Duration) -> ProviderError {
    ProviderError::new(
        ErrorKind::Timeout,
        format!(
            "provider {provider} did not respond within {}ms",
            timeout.as_millis()
        ),
    )
}
