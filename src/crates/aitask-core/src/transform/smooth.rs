//! Re-chunk and pace streamed text
//!
//! Providers deliver text in irregular bursts. This stage buffers text and
//! releases it one chunk (word, line, character, or custom pattern match) at
//! a time with a fixed pause between chunks, so callers render a steady
//! stream. Content is never altered: the concatenation of output text always
//! equals the concatenation of input text.

use super::stage::{Emitter, OpaqueEvent, Transform};
use super::TransformFactory;
use crate::error::{Result, TaskError};
use crate::event::TextDelta;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+\s+").unwrap());
static LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());

/// Default pause between chunks
pub const DEFAULT_SMOOTH_DELAY: Duration = Duration::from_millis(10);

/// Chunk granularity
#[derive(Debug, Clone)]
pub enum Chunking {
    /// One character at a time
    Character,
    /// Up to and including the whitespace that follows a word
    Word,
    /// Up to and including a run of newlines
    Line,
    /// Up to and including the next match of a custom pattern
    Pattern(Regex),
}

impl Chunking {
    /// Build a custom-pattern chunking
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern).map(Self::Pattern).map_err(|e| {
            TaskError::Configuration(format!("invalid chunking pattern '{pattern}': {e}"))
        })
    }

    /// Parse `character`, `word`, `line`, or treat anything else as a pattern
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "character" | "char" => Ok(Self::Character),
            "word" => Ok(Self::Word),
            "line" => Ok(Self::Line),
            other => Self::pattern(other),
        }
    }

    /// Length in bytes of the next complete chunk at the start of `buffer`
    fn next_chunk_len(&self, buffer: &str) -> Option<usize> {
        match self {
            Self::Character => buffer.chars().next().map(char::len_utf8),
            Self::Word => WORD.find(buffer).map(|m| m.end()),
            Self::Line => LINE.find(buffer).map(|m| m.end()),
            Self::Pattern(re) => re.find(buffer).map(|m| m.end()).filter(|end| *end > 0),
        }
    }
}

/// Smoothing configuration
#[derive(Debug, Clone)]
pub struct SmoothConfig {
    /// Chunk granularity
    pub chunking: Chunking,
    /// Pause after each chunk
    pub delay: Duration,
}

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            chunking: Chunking::Word,
            delay: DEFAULT_SMOOTH_DELAY,
        }
    }
}

impl SmoothConfig {
    /// Word chunking with the given pause
    pub fn words(delay: Duration) -> Self {
        Self {
            chunking: Chunking::Word,
            delay,
        }
    }
}

/// Create a factory for [`SmoothStream`]
pub fn smooth_stream(config: SmoothConfig) -> TransformFactory {
    TransformFactory::new("smooth", move |_| {
        Box::new(SmoothStream::new(config.clone()))
    })
}

/// Smoothing stage
#[derive(Debug)]
pub struct SmoothStream {
    config: SmoothConfig,
    buffer: String,
    id: String,
}

impl SmoothStream {
    /// Create a smoothing stage
    pub fn new(config: SmoothConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            id: String::new(),
        }
    }

    fn release_pending(&mut self, out: &mut Emitter) {
        if !self.buffer.is_empty() {
            let text = std::mem::take(&mut self.buffer);
            out.text(TextDelta::new(self.id.clone(), text));
        }
    }
}

impl Transform for SmoothStream {
    fn name(&self) -> &'static str {
        "smooth"
    }

    fn on_text(&mut self, delta: TextDelta, out: &mut Emitter) {
        if delta.id != self.id {
            self.release_pending(out);
            self.id = delta.id;
        }
        self.buffer.push_str(&delta.text);

        while let Some(len) = self.config.chunking.next_chunk_len(&self.buffer) {
            let rest = self.buffer.split_off(len);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            out.text(TextDelta::new(self.id.clone(), chunk));
            out.pause(self.config.delay);
        }
    }

    fn on_event(&mut self, event: OpaqueEvent, out: &mut Emitter) {
        self.release_pending(out);
        out.event(event);
    }

    fn flush(&mut self, out: &mut Emitter) {
        self.release_pending(out);
    }
}
