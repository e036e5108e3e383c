//! # kestrel-core
//!
//! Foundation types shared by every Kestrel crate.
//!
//! - **Stream events**: [`events::StreamEvent`], the ordered sequence a caller consumes
//! - **Messages**: [`messages::AssistantMessage`] with usage and [`messages::StopReason`]
//! - **Content blocks**: [`content::AssistantContent`] (text, thinking, tool call)
//! - **Retry math**: [`retry::RetryConfig`] and exponential backoff
//! - **Text helpers**: UTF-8-safe truncation for log previews
//! - **Logging**: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod content;
pub mod events;
pub mod logging;
pub mod messages;
pub mod retry;
pub mod text;

pub use content::AssistantContent;
pub use events::{HttpErrorInfo, RetryErrorInfo, StreamEvent};
pub use messages::{AssistantMessage, StopReason, ToolCall, Usage};
