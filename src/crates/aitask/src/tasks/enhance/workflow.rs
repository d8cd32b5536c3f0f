//! Enhance workflow
//!
//! An optional outline sub-call, then a bounded tool loop under early
//! validation: the note must open with a `# ` heading, and an attempt that
//! does not is cancelled and restarted with the rejection reason appended
//! to the prompt.

use super::args::EnhanceContext;
use super::prompt::{
    analyze_structure_prompt, parse_outline, user_prompt, ANALYZE_SYSTEM_PROMPT, SYSTEM_PROMPT,
};
use super::EnhanceSettings;
use crate::state::CurrentStep;
use crate::tasks::Progress;
use aitask_core::{
    with_early_validation_retry, AttemptContext, CancelSignal, EventStream, GenerateRequest,
    LanguageModel, ToolLoop, ToolSet, Validation,
};
use async_stream::try_stream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PREVIEW_CHARS: usize = 40;

/// Accept output whose first non-blank text is a level-one heading
pub fn validate_first_line(text: &str) -> Validation {
    let trimmed = text.trim_start();
    if trimmed.starts_with("# ") {
        return Validation::Valid;
    }
    let preview: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    Validation::invalid(format!(
        "the notes must begin with a '# ' heading on the first line, but began with \"{preview}\""
    ))
}

pub(super) fn run(
    settings: EnhanceSettings,
    args: EnhanceContext,
    model: Arc<dyn LanguageModel>,
    tools: ToolSet,
    progress: Progress,
    cancel: CancelSignal,
) -> EventStream {
    Box::pin(try_stream! {
        let outline = if args.template.is_none() && settings.analyze_structure {
            progress.report(CurrentStep::AnalyzingStructure);
            let request = GenerateRequest::prompt(analyze_structure_prompt(&args))
                .with_system(ANALYZE_SYSTEM_PROMPT);
            match cancel.run_fallible(model.generate_text(request, cancel.clone())).await {
                Ok(reply) => {
                    let outline = parse_outline(&reply);
                    debug!(sections = outline.len(), "Analyzed note structure");
                    outline
                }
                Err(e) if e.is_cancelled() => Err::<Vec<String>, _>(e)?,
                Err(e) => {
                    warn!(error = %e, "Structure analysis failed, continuing without outline");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!(
            session_id = %args.session_id,
            model = model.model_id(),
            outline = outline.len(),
            "Generating enhanced note"
        );

        let agent = ToolLoop::new(model.clone(), tools).with_max_steps(settings.max_steps);
        let args = Arc::new(args);
        let outline = Arc::new(outline);
        let temperature = settings.temperature;

        let execute_attempt = move |scope: CancelSignal, attempt: AttemptContext| {
            let prompt = user_prompt(&args, &outline, attempt.previous_feedback.as_deref());
            let mut request = GenerateRequest::prompt(prompt).with_system(SYSTEM_PROMPT);
            if let Some(temperature) = temperature {
                request = request.with_temperature(temperature);
            }
            agent.stream(request, scope)
        };
        let retry_progress = progress.clone();
        let on_retry = move |attempt: usize, _feedback: &str| {
            retry_progress.report(CurrentStep::Retrying { attempt });
        };

        let mut events = with_early_validation_retry(
            execute_attempt,
            validate_first_line,
            settings.validation,
            cancel.clone(),
            on_retry,
        );
        while let Some(event) = events.next().await {
            yield event?;
        }
    })
}
