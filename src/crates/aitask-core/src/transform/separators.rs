//! Empty paragraphs between markdown sections
//!
//! The note editor collapses blank lines, so sections run into each other.
//! This stage inserts [`SECTION_SEPARATOR`] after every blank line that is
//! directly followed by a heading.

use super::stage::{Emitter, OpaqueEvent, Transform};
use super::TransformFactory;
use crate::event::TextDelta;

/// Inserted between a blank line and the heading that follows it
pub const SECTION_SEPARATOR: &str = "<p></p>\n\n";

const BEFORE_HEADING: &str = "\n\n#";
const WITH_SEPARATOR: &str = "\n\n<p></p>\n\n#";

/// Create a factory for [`SectionSeparators`]
pub fn section_separators() -> TransformFactory {
    TransformFactory::new("section-separators", |_| Box::new(SectionSeparators::new()))
}

/// Insert separators into a complete piece of text
pub fn add_section_separators(text: &str) -> String {
    text.replace(BEFORE_HEADING, WITH_SEPARATOR)
}

/// Section-separator stage
#[derive(Debug, Default)]
pub struct SectionSeparators {
    pending: String,
    id: String,
}

impl SectionSeparators {
    /// Create the stage
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit pending text, keeping back a trailing `\n` or `\n\n` unless `all`
    fn release(&mut self, all: bool, out: &mut Emitter) {
        let hold = if all {
            0
        } else if self.pending.ends_with("\n\n") {
            2
        } else if self.pending.ends_with('\n') {
            1
        } else {
            0
        };

        let kept = self.pending.split_off(self.pending.len() - hold);
        let ready = std::mem::replace(&mut self.pending, kept);
        if !ready.is_empty() {
            out.text(TextDelta::new(self.id.clone(), add_section_separators(&ready)));
        }
    }
}

impl Transform for SectionSeparators {
    fn name(&self) -> &'static str {
        "section-separators"
    }

    fn on_text(&mut self, delta: TextDelta, out: &mut Emitter) {
        if delta.id != self.id {
            self.release(true, out);
            self.id = delta.id;
        }
        self.pending.push_str(&delta.text);
        self.release(false, out);
    }

    fn on_event(&mut self, event: OpaqueEvent, out: &mut Emitter) {
        self.release(true, out);
        out.event(event);
    }

    fn flush(&mut self, out: &mut Emitter) {
        self.release(true, out);
    }
}
