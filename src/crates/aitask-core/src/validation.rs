//! Early validation with retry
//!
//! Wraps a stream-producing attempt. The first part of each attempt's output
//! is held back and checked by a validator as it grows. A rejected attempt is
//! cancelled and restarted with the validator's feedback; an accepted attempt
//! has its held events released and then streams live.
//!
//! ```text
//! attempt n ──► hold ──► trimmed len >= min_chars? ──no──► keep holding
//!                              │yes
//!                          validator
//!                    ┌─────────┴─────────┐
//!                 Invalid              Valid
//!                    │                   │
//!        cancel scope, retry      len >= max_chars?
//!        with feedback or         ├─yes─► release held, go live
//!        ValidationExhausted      └─no──► keep holding
//! ```
//!
//! Only validation failures are retried. Provider errors end the stream, and
//! cancelling the parent signal ends it with [`TaskError::Cancelled`].

use crate::cancel::CancelSignal;
use crate::error::{Result, TaskError};
use crate::event::{Event, EventStream};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

/// Verdict on the text produced so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The output looks right
    Valid,
    /// The output is wrong; `feedback` is passed to the next attempt
    Invalid {
        /// Explanation of what was expected
        feedback: String,
    },
}

impl Validation {
    /// Create an `Invalid` verdict
    pub fn invalid(feedback: impl Into<String>) -> Self {
        Self::Invalid {
            feedback: feedback.into(),
        }
    }
}

/// Thresholds and budget for early validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Minimum trimmed length (in characters) before the validator runs
    pub min_chars: usize,

    /// Length after which an accepted attempt streams without further checks
    pub max_chars: usize,

    /// Total number of attempts, including the first
    pub max_retries: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_chars: 5,
            max_chars: 30,
            max_retries: 3,
        }
    }
}

/// Per-attempt input for the attempt function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptContext {
    /// 1-based attempt number
    pub attempt: usize,

    /// Feedback from the attempt before this one, if it was rejected
    pub previous_feedback: Option<String>,
}

/// Run `execute_attempt` under early validation.
///
/// Each attempt receives a child of `cancel` that is cancelled when the
/// attempt is rejected. `on_retry(next_attempt, feedback)` is called before
/// every restart.
pub fn with_early_validation_retry<A, V, R>(
    execute_attempt: A,
    validator: V,
    config: ValidationConfig,
    cancel: CancelSignal,
    on_retry: R,
) -> EventStream
where
    A: FnMut(CancelSignal, AttemptContext) -> EventStream + Send + 'static,
    V: Fn(&str) -> Validation + Send + 'static,
    R: Fn(usize, &str) + Send + 'static,
{
    Box::pin(validate(execute_attempt, validator, config, cancel, on_retry))
}

fn validate<A, V, R>(
    mut execute_attempt: A,
    validator: V,
    config: ValidationConfig,
    cancel: CancelSignal,
    on_retry: R,
) -> impl Stream<Item = Result<Event>> + Send
where
    A: FnMut(CancelSignal, AttemptContext) -> EventStream + Send + 'static,
    V: Fn(&str) -> Validation + Send + 'static,
    R: Fn(usize, &str) + Send + 'static,
{
    try_stream! {
        let max_attempts = config.max_retries.max(1);
        let mut attempt = 0;
        let mut feedback: Option<String> = None;
        let mut completed = false;

        while !completed && attempt < max_attempts {
            attempt += 1;
            cancel.check()?;

            debug!(attempt, max_attempts, has_feedback = feedback.is_some(), "Starting attempt");
            let scope = cancel.child();
            let mut stream = execute_attempt(
                scope.clone(),
                AttemptContext {
                    attempt,
                    previous_feedback: feedback.clone(),
                },
            );

            let mut held: Vec<Event> = Vec::new();
            let mut text = String::new();
            let mut live = false;
            let mut rejection: Option<String> = None;

            while let Some(item) = cancel.run(stream.next()).await? {
                let event = item?;
                if live {
                    yield event;
                    continue;
                }

                let Some(delta) = event.as_text() else {
                    held.push(event);
                    continue;
                };
                text.push_str(delta);
                held.push(event);

                if text.trim().chars().count() < config.min_chars {
                    continue;
                }
                match validator(&text) {
                    Validation::Invalid { feedback: reason } => {
                        rejection = Some(reason);
                        break;
                    }
                    Validation::Valid if text.chars().count() >= config.max_chars => {
                        debug!(attempt, held = held.len(), "Output validated, streaming live");
                        for event in held.drain(..) {
                            yield event;
                        }
                        live = true;
                    }
                    Validation::Valid => {}
                }
            }

            match rejection {
                None => {
                    for event in held.drain(..) {
                        yield event;
                    }
                    completed = true;
                }
                Some(reason) => {
                    scope.cancel();
                    drop(stream);
                    warn!(attempt, max_attempts, feedback = %reason, "Output rejected by validator");
                    if attempt < max_attempts {
                        on_retry(attempt + 1, &reason);
                    }
                    feedback = Some(reason);
                }
            }
        }

        if !completed {
            Err::<(), _>(TaskError::ValidationExhausted {
                attempts: attempt,
                feedback: feedback.unwrap_or_default(),
            })?;
        }
    }
}
