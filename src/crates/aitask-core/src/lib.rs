//! # aitask-core - Streaming primitives for cancellable AI tasks
//!
//! The building blocks the task engine is made of. Nothing here knows about
//! specific task types or where their data comes from.
//!
//! ## Overview
//!
//! - **Events** - [`Event`] is the closed set of things a generation stream carries
//! - **Cancellation** - [`CancelSignal`] is threaded through every async call
//! - **Models and tools** - [`LanguageModel`], [`Tool`] and [`ToolSet`]
//! - **Transform pipeline** - stages that reshape text but never touch other events
//! - **Early validation** - [`with_early_validation_retry`] holds back, checks and
//!   restarts attempts whose opening text is wrong
//! - **Tool loop** - [`ToolLoop`] runs a bounded multi-step generation with tools
//!
//! ## Data flow
//!
//! ```text
//! LanguageModel::stream ─► ToolLoop ─► early validation ─► transform stages ─► consumer
//!          ▲                   │
//!          └── tool results ◄──┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use aitask_core::{
//!     transform::{apply_transforms, trim_before_marker, TransformContext},
//!     CancelSignal, GenerateRequest, ToolLoop, ToolSet,
//! };
//!
//! let cancel = CancelSignal::new();
//! let raw = ToolLoop::new(model, ToolSet::new())
//!     .with_max_steps(3)
//!     .stream(GenerateRequest::prompt("Summarize the meeting"), cancel.clone());
//! let shaped = apply_transforms(
//!     raw,
//!     &[trim_before_marker("#")],
//!     &TransformContext::new(ToolSet::new(), cancel),
//! );
//! ```

pub mod agent;
pub mod cancel;
pub mod error;
pub mod event;
pub mod model;
pub mod testing;
pub mod tool;
pub mod transform;
pub mod validation;

pub use agent::{ToolLoop, DEFAULT_MAX_STEPS};
pub use cancel::CancelSignal;
pub use error::{BoxError, Result, TaskError};
pub use event::{
    collect_text, from_events, Event, EventStream, TextDelta, ToolCall, ToolFailure, ToolResult,
};
pub use model::{GenerateRequest, LanguageModel, Message};
pub use tool::{Tool, ToolDefinition, ToolSet};
pub use transform::{apply_transforms, TransformContext, TransformFactory};
pub use validation::{with_early_validation_retry, AttemptContext, Validation, ValidationConfig};
