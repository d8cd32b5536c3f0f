//! Stage plumbing: what a transform may see and emit.
//!
//! A stage receives text as [`TextDelta`] values it fully owns, and every
//! other event as an [`OpaqueEvent`]. An `OpaqueEvent` can be held, buffered
//! and released, but it cannot be constructed or modified outside this
//! module, so no stage can alter or invent a non-text event.

use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::event::{Event, EventStream, TextDelta};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;

/// A non-text event in transit through a stage
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueEvent(Event);

impl OpaqueEvent {
    /// Read-only view of the wrapped event
    pub fn event(&self) -> &Event {
        &self.0
    }
}

/// Unit of stage input and output
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    /// Text payload, free to reshape
    Text(TextDelta),
    /// Any other event, passed through untouched
    Opaque(OpaqueEvent),
}

impl Piece {
    fn from_event(event: Event) -> Self {
        match event {
            Event::TextDelta(delta) => Piece::Text(delta),
            other => Piece::Opaque(OpaqueEvent(other)),
        }
    }

    fn into_event(self) -> Event {
        match self {
            Piece::Text(delta) => Event::TextDelta(delta),
            Piece::Opaque(OpaqueEvent(event)) => event,
        }
    }
}

#[derive(Debug)]
enum Output {
    Piece(Piece),
    Pause(Duration),
}

/// Output queue handed to a stage on every call
#[derive(Debug, Default)]
pub struct Emitter {
    queue: VecDeque<Output>,
}

impl Emitter {
    /// Emit a text delta
    pub fn text(&mut self, delta: TextDelta) {
        self.queue.push_back(Output::Piece(Piece::Text(delta)));
    }

    /// Release a non-text event
    pub fn event(&mut self, event: OpaqueEvent) {
        self.queue.push_back(Output::Piece(Piece::Opaque(event)));
    }

    /// Emit a piece as-is
    pub fn piece(&mut self, piece: Piece) {
        self.queue.push_back(Output::Piece(piece));
    }

    /// Wait before emitting whatever comes next
    pub fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.queue.push_back(Output::Pause(duration));
        }
    }

    fn pop(&mut self) -> Option<Output> {
        self.queue.pop_front()
    }
}

/// A stream-to-stream stage over events.
///
/// Stages are synchronous state machines; the driver in [`apply`] handles
/// pacing and cancellation.
pub trait Transform: Send {
    /// Stage name for logging
    fn name(&self) -> &'static str;

    /// Handle one text delta
    fn on_text(&mut self, delta: TextDelta, out: &mut Emitter);

    /// Handle one non-text event. Defaults to passing it straight through.
    fn on_event(&mut self, event: OpaqueEvent, out: &mut Emitter) {
        out.event(event);
    }

    /// The input ended; release anything still held
    fn flush(&mut self, _out: &mut Emitter) {}
}

/// Run `input` through `stage`
pub fn apply(input: EventStream, stage: Box<dyn Transform>, cancel: CancelSignal) -> EventStream {
    Box::pin(drive(input, stage, cancel))
}

fn drive(
    mut input: EventStream,
    mut stage: Box<dyn Transform>,
    cancel: CancelSignal,
) -> impl Stream<Item = Result<Event>> + Send {
    try_stream! {
        let mut out = Emitter::default();
        let mut finished = false;

        while !finished {
            match input.next().await {
                Some(item) => match Piece::from_event(item?) {
                    Piece::Text(delta) => stage.on_text(delta, &mut out),
                    Piece::Opaque(event) => stage.on_event(event, &mut out),
                },
                None => {
                    stage.flush(&mut out);
                    finished = true;
                }
            }

            while let Some(output) = out.pop() {
                match output {
                    Output::Piece(piece) => yield piece.into_event(),
                    Output::Pause(duration) => cancel.sleep(duration).await?,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::from_events;

    /// Upper-cases text; leaves everything else to the default pass-through.
    struct Shout;

    impl Transform for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn on_text(&mut self, delta: TextDelta, out: &mut Emitter) {
            out.text(TextDelta::new(delta.id, delta.text.to_uppercase()));
        }
    }

    #[tokio::test]
    async fn test_default_stage_passes_non_text_events_unchanged() {
        let input = from_events(vec![
            Event::StartStep,
            Event::text_start("1"),
            Event::text_delta("1", "hi"),
            Event::text_end("1"),
            Event::FinishStep,
        ]);

        let output: Vec<Event> = apply(input, Box::new(Shout), CancelSignal::new())
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(
            output,
            vec![
                Event::StartStep,
                Event::text_start("1"),
                Event::text_delta("1", "HI"),
                Event::text_end("1"),
                Event::FinishStep,
            ]
        );
    }

    #[tokio::test]
    async fn test_upstream_errors_are_forwarded() {
        let items = vec![
            Ok(Event::text_delta("1", "a")),
            Err(crate::TaskError::provider("boom")),
        ];
        let input: EventStream = Box::pin(futures::stream::iter(items));

        let output: Vec<Result<Event>> = apply(input, Box::new(Shout), CancelSignal::new())
            .collect()
            .await;

        assert_eq!(output.len(), 2);
        assert!(output[1].is_err());
    }
}
