//! # Stream Orchestrator
//!
//! Drives one logical call: the attempt loop, deadlines, retries and
//! finalization.
//!
//! ```text
//! Attempting ─► WaitingFirstChunk ─► Reading ─► Draining ─► Finalizing ─► done
//!     ▲               │                 │
//!     └── retry ◄─────┴── timeout ──────┘      (fatal / aborted ─► error)
//! ```
//!
//! A single producer task pushes events into a bounded channel and the caller
//! pulls them as a [`Stream`]. The task always delivers exactly one terminal
//! event, including when it panics or is cancelled.
//!
//! State lifetimes:
//! - per call: retry bookkeeping, slot numbering
//! - per attempt: chunk decoder, frame scanner, content dedup, thinking
//!   segmenter, tool call assembler, usage and context-usage signals, output
//!   content
//!
//! Every attempt replays the response from the start, so a retry discards the
//! failed attempt's content. Its slots are left unclosed and the new attempt
//! opens fresh ones.

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{FutureExt, Stream, StreamExt};
use kestrel_core::retry::RetryConfig;
use kestrel_core::{
    AssistantContent, AssistantMessage, HttpErrorInfo, RetryErrorInfo, StopReason, StreamEvent,
    Usage,
};
use kestrel_settings::KestrelSettings;
use kestrel_tokens::{TokenCounter, input_tokens_from_context_usage, shared_counter};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bracket::extract_bracket_calls;
use crate::classify::{WireEvent, classify_fragment};
use crate::errors::{StreamError, TransportError};
use crate::frame::{FrameScanner, Utf8ChunkDecoder};
use crate::output::MessageBuilder;
use crate::retry::{RetryDecision, RetryState, decide_retry_with, decide_timeout_retry};
use crate::thinking::ThinkingSegmenter;
use crate::tool_calls::ToolCallAssembler;
use crate::transport::{ChunkStream, RequestBuilder, Transport, TransportResponse};

/// Events produced by [`StreamOrchestrator::stream`].
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Timing and accounting knobs, injected at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
    /// Retry budget, backoff bases and reduction step.
    pub retry: RetryConfig,
    /// Deadline from sending a request to its first chunk.
    pub first_chunk_timeout: Duration,
    /// Deadline between consecutive chunks.
    pub idle_timeout: Duration,
    /// Context window used to turn a context-usage percentage into tokens.
    pub context_window: u64,
    /// Whether `retry` events are emitted.
    pub emit_retry_events: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from(&KestrelSettings::default())
    }
}

impl From<&KestrelSettings> for StreamConfig {
    fn from(settings: &KestrelSettings) -> Self {
        Self {
            retry: settings.retry.clone(),
            first_chunk_timeout: Duration::from_millis(settings.timeouts.first_chunk_timeout_ms),
            idle_timeout: Duration::from_millis(settings.timeouts.idle_timeout_ms),
            context_window: settings.stream.context_window,
            emit_retry_events: settings.stream.emit_retry_events,
        }
    }
}

/// Entry point: turns a transport and a request builder into event streams.
#[derive(Clone)]
pub struct StreamOrchestrator {
    transport: Arc<dyn Transport>,
    request_builder: Arc<dyn RequestBuilder>,
    token_counter: Arc<dyn TokenCounter>,
    config: StreamConfig,
}

impl StreamOrchestrator {
    /// Orchestrator using the shared token estimator.
    pub fn new(
        transport: Arc<dyn Transport>,
        request_builder: Arc<dyn RequestBuilder>,
        config: StreamConfig,
    ) -> Self {
        Self {
            transport,
            request_builder,
            token_counter: shared_counter(),
            config,
        }
    }

    /// Replace the token counter.
    #[must_use]
    pub fn with_token_counter(mut self, token_counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = token_counter;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Mutable configuration, e.g. to shorten the first-chunk deadline.
    pub fn config_mut(&mut self) -> &mut StreamConfig {
        &mut self.config
    }

    /// Start one call.
    ///
    /// Must be called inside a Tokio runtime. Cancelling `cancel` at any
    /// point ends the stream with an `aborted` error event. Dropping the
    /// returned stream stops the producer.
    pub fn stream(&self, cancel: CancellationToken) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let call = StreamCall {
            transport: Arc::clone(&self.transport),
            request_builder: Arc::clone(&self.request_builder),
            token_counter: Arc::clone(&self.token_counter),
            config: self.config.clone(),
            cancel: cancel.child_token(),
            tx: tx.clone(),
            retry: RetryState::default(),
            output: MessageBuilder::new(),
        };

        let _ = tokio::spawn(async move {
            let terminal = match AssertUnwindSafe(call.run()).catch_unwind().await {
                Ok(terminal) => terminal,
                Err(panic) => {
                    let msg = panic_message(&*panic);
                    error!(panic = %msg, "stream producer panicked");
                    error_event(
                        Vec::new(),
                        StopReason::Error,
                        format!("internal error: {msg}"),
                        None,
                    )
                }
            };
            let _ = tx.send(terminal).await;
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

/// Outcome of one bounded chunk read.
enum ChunkRead {
    Chunk(Bytes),
    End,
    Failed(TransportError),
    TimedOut,
}

async fn read_chunk(chunks: &mut ChunkStream, deadline: Instant) -> ChunkRead {
    match tokio::time::timeout_at(deadline, chunks.next()).await {
        Ok(Some(Ok(bytes))) => ChunkRead::Chunk(bytes),
        Ok(Some(Err(e))) => ChunkRead::Failed(e),
        Ok(None) => ChunkRead::End,
        Err(_) => ChunkRead::TimedOut,
    }
}

/// Decoder state for one attempt.
#[derive(Default)]
struct AttemptState {
    decoder: Utf8ChunkDecoder,
    scanner: FrameScanner,
    last_content: Option<String>,
    segmenter: ThinkingSegmenter,
    tools: ToolCallAssembler,
    context_usage: Option<f64>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

/// Producer-side state for one call.
struct StreamCall {
    transport: Arc<dyn Transport>,
    request_builder: Arc<dyn RequestBuilder>,
    token_counter: Arc<dyn TokenCounter>,
    config: StreamConfig,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamEvent>,
    retry: RetryState,
    output: MessageBuilder,
}

impl StreamCall {
    /// Run attempts until success or a terminal failure; returns the
    /// terminal event.
    async fn run(mut self) -> StreamEvent {
        if self.cancel.is_cancelled() {
            return self.fail(StreamError::Aborted);
        }
        self.emit(StreamEvent::Start).await;

        loop {
            let err = match self.attempt().await {
                Ok(state) => return self.finalize(state).await,
                Err(err) => err,
            };
            let decision = self.decide(&err);
            if !decision.should_retry {
                return self.fail(err);
            }
            if let Err(abort) = self.wait_for_retry(&err, decision).await {
                return self.fail(abort);
            }
        }
    }

    async fn attempt(&mut self) -> Result<AttemptState, StreamError> {
        if !self.output.content().is_empty() {
            debug!(
                blocks = self.output.content().len(),
                "discarding content from failed attempt"
            );
        }
        self.output.restart();
        let request = self.request_builder.build(self.retry.reduction_factor)?;
        let first_deadline = Instant::now() + self.config.first_chunk_timeout;
        debug!(
            attempt = self.retry.attempt,
            reduction_factor = self.retry.reduction_factor,
            "sending request"
        );

        let sent = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(StreamError::Aborted),
            sent = tokio::time::timeout_at(first_deadline, self.transport.send(&request)) => sent,
        };
        let Ok(response) = sent else {
            return Err(self.first_chunk_timeout());
        };
        let mut chunks = match response? {
            TransportResponse::Stream(chunks) => chunks,
            TransportResponse::Status {
                status,
                status_text,
                body,
            } => {
                warn!(status, attempt = self.retry.attempt, "upstream returned error status");
                return Err(StreamError::http(status, status_text, body));
            }
        };

        let mut state = AttemptState::default();
        let mut deadline = first_deadline;
        let mut received = false;
        loop {
            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(StreamError::Aborted),
                read = read_chunk(&mut chunks, deadline) => read,
            };
            match read {
                ChunkRead::Chunk(bytes) => {
                    received = true;
                    let text = state.decoder.decode(&bytes);
                    self.ingest(&mut state, &text).await;
                    deadline = Instant::now() + self.config.idle_timeout;
                }
                ChunkRead::End => break,
                ChunkRead::Failed(e) => return Err(e.into()),
                ChunkRead::TimedOut => {
                    drop(chunks);
                    return Err(if received {
                        StreamError::IdleTimeout {
                            timeout_ms: self.config.idle_timeout.as_millis() as u64,
                        }
                    } else {
                        self.first_chunk_timeout()
                    });
                }
            }
        }

        let tail = state.decoder.finish();
        if !tail.is_empty() {
            self.ingest(&mut state, &tail).await;
        }
        info!(attempt = self.retry.attempt, "response drained");
        Ok(state)
    }

    /// Route every fragment in `text` to the segmenter or the assembler.
    async fn ingest(&mut self, state: &mut AttemptState, text: &str) {
        for fragment in state.scanner.push(text) {
            let Some(event) = classify_fragment(&fragment) else {
                continue;
            };
            match event {
                WireEvent::Content(content) => {
                    if state.last_content.as_deref() == Some(content.as_str()) {
                        debug!(len = content.len(), "dropping repeated content fragment");
                        continue;
                    }
                    let mut events = Vec::new();
                    for segment in state.segmenter.push(&content) {
                        events.extend(self.output.apply(segment));
                    }
                    self.emit_all(events).await;
                    state.last_content = Some(content);
                }
                WireEvent::ContextUsage(percentage) => state.context_usage = Some(percentage),
                WireEvent::Usage {
                    input_tokens,
                    output_tokens,
                } => {
                    state.input_tokens = input_tokens.or(state.input_tokens);
                    state.output_tokens = output_tokens.or(state.output_tokens);
                }
                WireEvent::FollowupPrompt(_) => debug!("ignoring followup prompt"),
                tool_event => state.tools.apply(&tool_event),
            }
        }
    }

    /// Flush the segmenter, recover inline tool calls and close every slot.
    ///
    /// When inline `[Called ...]` calls are recovered, the text slot's earlier
    /// deltas still carried them; only its end event and the final message
    /// hold the cleaned text.
    async fn finalize(mut self, mut state: AttemptState) -> StreamEvent {
        let mut events = Vec::new();
        for segment in state.segmenter.finish() {
            events.extend(self.output.apply(segment));
        }

        let mut calls = state.tools.finish();
        if calls.is_empty() {
            if let Some(extraction) = self.output.text().and_then(extract_bracket_calls) {
                info!(count = extraction.calls.len(), "recovered inline tool calls from text");
                self.output.replace_text(extraction.text);
                calls = extraction.calls;
            }
        }

        events.extend(self.output.close_thinking());
        events.extend(self.output.close_text());
        for call in &calls {
            events.extend(self.output.push_tool_call(call.clone()));
        }
        self.emit_all(events).await;

        let usage = self.usage(&state);
        let reason = match (calls.is_empty(), state.context_usage) {
            (false, _) => StopReason::ToolUse,
            (true, None) => StopReason::Length,
            (true, Some(_)) => StopReason::Stop,
        };
        info!(
            stop_reason = %reason,
            attempts = self.retry.attempt + 1,
            tool_calls = calls.len(),
            input_tokens = usage.input,
            output_tokens = usage.output,
            "stream completed"
        );

        StreamEvent::Done {
            reason,
            message: AssistantMessage {
                content: self.output.into_content(),
                usage,
                stop_reason: reason,
                error_message: None,
            },
        }
    }

    /// Explicit usage wins per field; otherwise input comes from the last
    /// context-usage signal and output from counting the final text and
    /// thinking.
    fn usage(&self, state: &AttemptState) -> Usage {
        let input = state.input_tokens.unwrap_or_else(|| {
            state.context_usage.map_or(0, |percentage| {
                input_tokens_from_context_usage(percentage, self.config.context_window)
            })
        });
        let output = state
            .output_tokens
            .unwrap_or_else(|| self.token_counter.count(&self.output.generated_text()));
        Usage::new(input, output)
    }

    fn decide(&self, err: &StreamError) -> RetryDecision {
        let retry = &self.config.retry;
        match err {
            StreamError::Http { status, body, .. } => {
                decide_retry_with(retry, *status, body, self.retry.attempt, retry.max_retries)
            }
            e if e.is_timeout() => decide_timeout_retry(retry, self.retry.attempt, retry.max_retries),
            _ => RetryDecision::NONE,
        }
    }

    /// Announce the retry and wait out its delay. Cancellation during the
    /// wait is returned as [`StreamError::Aborted`].
    async fn wait_for_retry(
        &mut self,
        err: &StreamError,
        decision: RetryDecision,
    ) -> Result<(), StreamError> {
        let retry_number = self.retry.attempt + 1;
        let max_retries = self.config.retry.max_retries;
        let strategy = decision.strategy.as_str();
        warn!(
            attempt = retry_number,
            max_retries,
            delay_ms = decision.delay_ms,
            strategy,
            category = err.category(),
            error = %err,
            "retrying stream"
        );
        metrics::counter!("stream_retries_total", "strategy" => strategy).increment(1);

        if self.config.emit_retry_events {
            self.emit(StreamEvent::Retry {
                attempt: retry_number,
                max_retries,
                delay_ms: decision.delay_ms,
                strategy: strategy.to_owned(),
                error: RetryErrorInfo {
                    category: err.category().to_owned(),
                    message: err.to_string(),
                },
            })
            .await;
        }
        self.retry.advance(&decision, self.config.retry.reduction_step);

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(StreamError::Aborted),
            () = tokio::time::sleep(Duration::from_millis(decision.delay_ms)) => Ok(()),
        }
    }

    fn first_chunk_timeout(&self) -> StreamError {
        StreamError::FirstChunkTimeout {
            timeout_ms: self.config.first_chunk_timeout.as_millis() as u64,
        }
    }

    /// Terminal error event keeping the content committed so far.
    fn fail(self, err: StreamError) -> StreamEvent {
        let reason = err.stop_reason();
        let message = err.to_string();
        if reason == StopReason::Aborted {
            info!(attempt = self.retry.attempt, "stream aborted");
        } else {
            error!(
                attempt = self.retry.attempt,
                category = err.category(),
                error = %message,
                "stream failed"
            );
        }
        let http = match err {
            StreamError::Http {
                status,
                status_text,
                body,
                ..
            } => Some(HttpErrorInfo {
                status,
                status_text,
                body,
            }),
            _ => None,
        };
        error_event(self.output.into_content(), reason, message, http)
    }

    async fn emit(&self, event: StreamEvent) {
        if self.tx.send(event).await.is_err() && !self.cancel.is_cancelled() {
            debug!("event receiver dropped, stopping producer");
            self.cancel.cancel();
        }
    }

    async fn emit_all(&self, events: Vec<StreamEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }
}

fn error_event(
    content: Vec<AssistantContent>,
    reason: StopReason,
    error: String,
    http: Option<HttpErrorInfo>,
) -> StreamEvent {
    StreamEvent::Error {
        reason,
        message: AssistantMessage {
            content,
            usage: Usage::default(),
            stop_reason: reason,
            error_message: Some(error.clone()),
        },
        error,
        http,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
