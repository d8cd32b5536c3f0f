//! Drop model preamble that precedes a marker
//!
//! Models often open with a sentence like "Sure, here are your notes:" before
//! the first heading. This stage withholds the stream until the accumulated
//! text contains the marker, then emits the text starting at the marker as a
//! single delta. The marker may be split across any number of deltas.

use super::stage::{Emitter, OpaqueEvent, Piece, Transform};
use super::TransformFactory;
use crate::event::TextDelta;
use tracing::debug;

/// Create a factory for [`MarkerTrim`]
pub fn trim_before_marker(marker: impl Into<String>) -> TransformFactory {
    let marker = marker.into();
    TransformFactory::new("marker-trim", move |_| {
        Box::new(MarkerTrim::new(marker.clone()))
    })
}

#[derive(Debug)]
enum State {
    Searching { held: Vec<Piece>, text: String },
    Passing,
}

/// Marker-trim stage
#[derive(Debug)]
pub struct MarkerTrim {
    marker: String,
    state: State,
}

impl MarkerTrim {
    /// Create a stage that trims everything before `marker`
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            state: State::Searching {
                held: Vec::new(),
                text: String::new(),
            },
        }
    }
}

/// Byte index of `marker` in `text`, scanning only where a match could
/// involve text appended after `prev_len`
fn find_marker(text: &str, prev_len: usize, marker: &str) -> Option<usize> {
    let mut from = prev_len.saturating_sub(marker.len().saturating_sub(1));
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    text[from..].find(marker).map(|idx| idx + from)
}

impl Transform for MarkerTrim {
    fn name(&self) -> &'static str {
        "marker-trim"
    }

    fn on_text(&mut self, delta: TextDelta, out: &mut Emitter) {
        let State::Searching { held, text } = &mut self.state else {
            out.text(delta);
            return;
        };

        let prev_len = text.len();
        text.push_str(&delta.text);
        let id = delta.id.clone();
        held.push(Piece::Text(delta));

        let Some(idx) = find_marker(text, prev_len, &self.marker) else {
            return;
        };

        debug!(
            marker = %self.marker,
            trimmed_bytes = idx,
            "Marker found, releasing held events"
        );
        for piece in held.drain(..) {
            if let Piece::Opaque(event) = piece {
                out.event(event);
            }
        }
        out.text(TextDelta::new(id, &text[idx..]));
        self.state = State::Passing;
    }

    fn on_event(&mut self, event: OpaqueEvent, out: &mut Emitter) {
        match &mut self.state {
            State::Searching { held, .. } => held.push(Piece::Opaque(event)),
            State::Passing => out.event(event),
        }
    }

    fn flush(&mut self, out: &mut Emitter) {
        if let State::Searching { held, .. } = &mut self.state {
            debug!(marker = %self.marker, "Marker never seen, releasing stream unchanged");
            for piece in held.drain(..) {
                out.piece(piece);
            }
        }
    }
}
