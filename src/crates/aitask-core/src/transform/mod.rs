//! Transform pipeline
//!
//! A transform is a stage that maps one [`EventStream`] to another. Stages
//! may buffer, split or merge text, but every non-text event leaves a stage
//! exactly as it entered (see [`OpaqueEvent`]). Each task type declares an
//! ordered list of [`TransformFactory`] values; [`apply_transforms`] builds a
//! fresh stage from each factory for every run and composes them
//! left-to-right.
//!
//! # Built-in stages
//!
//! - [`trim_before_marker`]: drop everything the model wrote before a marker
//! - [`smooth_stream`]: re-chunk text into words, lines or characters and pace it
//! - [`section_separators`]: insert empty paragraphs between markdown sections
//!
//! # Example
//!
//! ```rust,ignore
//! use aitask_core::transform::{apply_transforms, smooth_stream, trim_before_marker, SmoothConfig, TransformContext};
//!
//! let stages = vec![trim_before_marker("#"), smooth_stream(SmoothConfig::default())];
//! let shaped = apply_transforms(raw, &stages, &TransformContext::new(tools, cancel));
//! ```

mod marker_trim;
mod separators;
mod smooth;
mod stage;

pub use marker_trim::{trim_before_marker, MarkerTrim};
pub use separators::{add_section_separators, section_separators, SectionSeparators, SECTION_SEPARATOR};
pub use smooth::{smooth_stream, Chunking, SmoothConfig, SmoothStream, DEFAULT_SMOOTH_DELAY};
pub use stage::{apply, Emitter, OpaqueEvent, Piece, Transform};

use crate::cancel::CancelSignal;
use crate::event::EventStream;
use crate::tool::ToolSet;
use std::sync::Arc;
use tracing::debug;

/// What a stage may know about the run it is part of
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Tools available to the generation
    pub tools: ToolSet,

    /// Cancellation signal of the run
    pub cancel: CancelSignal,
}

impl TransformContext {
    /// Create a new context
    pub fn new(tools: ToolSet, cancel: CancelSignal) -> Self {
        Self { tools, cancel }
    }
}

type BuildFn = dyn Fn(&TransformContext) -> Box<dyn Transform> + Send + Sync;

/// Builds a fresh stage for every run
#[derive(Clone)]
pub struct TransformFactory {
    name: &'static str,
    build: Arc<BuildFn>,
}

impl std::fmt::Debug for TransformFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformFactory")
            .field("name", &self.name)
            .finish()
    }
}

impl TransformFactory {
    /// Create a factory from a constructor closure
    pub fn new<F>(name: &'static str, build: F) -> Self
    where
        F: Fn(&TransformContext) -> Box<dyn Transform> + Send + Sync + 'static,
    {
        Self {
            name,
            build: Arc::new(build),
        }
    }

    /// Stage name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Construct a new stage instance
    pub fn build(&self, ctx: &TransformContext) -> Box<dyn Transform> {
        (self.build)(ctx)
    }
}

/// Compose `stages` over `input`, first stage closest to the model
pub fn apply_transforms(
    input: EventStream,
    stages: &[TransformFactory],
    ctx: &TransformContext,
) -> EventStream {
    stages.iter().fold(input, |stream, factory| {
        debug!(stage = factory.name(), "Applying transform");
        apply(stream, factory.build(ctx), ctx.cancel.clone())
    })
}
