//! # kestrel-llm
//!
//! Decodes the upstream assistant service's chunked stream into ordered
//! [`StreamEvent`]s and recovers from transient failures.
//!
//! Pipeline, leaves first:
//! - [`frame`]: anchored fragment scanner over noisy framing, UTF-8 chunk decoding
//! - [`classify`]: ordered field-presence rules mapping fragments to [`WireEvent`]s
//! - [`thinking`]: thinking/answer segmenter across chunk boundaries
//! - [`tool_calls`]: tool call assembly from name/input/stop fragments
//! - [`bracket`]: `[Called name with args: {...}]` fallback extraction
//! - [`retry`]: pure retry decision table
//! - [`orchestrator`]: attempt loop, deadlines, finalization
//! - [`transport`]: transport and request-builder seams, `reqwest` transport
//!
//! [`StreamEvent`]: kestrel_core::StreamEvent

#![deny(unsafe_code)]

pub mod bracket;
pub mod classify;
pub mod error_parsing;
pub mod errors;
pub mod frame;
pub mod orchestrator;
pub mod output;
pub mod retry;
pub mod thinking;
pub mod tool_calls;
pub mod transport;

pub use classify::{WireEvent, classify, classify_fragment};
pub use errors::{StreamError, TransportError};
pub use orchestrator::{EventStream, StreamConfig, StreamOrchestrator};
pub use retry::{RetryDecision, RetryState, RetryStrategy, decide_retry};
pub use transport::{
    ChunkStream, OutboundRequest, ReqwestTransport, RequestBuilder, Transport, TransportResponse,
};
