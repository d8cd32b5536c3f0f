//! Integration tests for the transform pipeline and early validation

use aitask_core::testing::{Script, ScriptedModel};
use aitask_core::transform::{
    apply_transforms, section_separators, smooth_stream, trim_before_marker, Chunking,
    SmoothConfig,
};
use aitask_core::{
    collect_text, from_events, with_early_validation_retry, CancelSignal, Event, EventStream,
    GenerateRequest, LanguageModel, TaskError, ToolLoop, ToolSet, TransformContext, Validation,
    ValidationConfig,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn context() -> TransformContext {
    TransformContext::new(ToolSet::new(), CancelSignal::new())
}

async fn collect(stream: EventStream) -> Vec<Event> {
    stream.map(|item| item.unwrap()).collect().await
}

fn heading_first(text: &str) -> Validation {
    if text.trim_start().starts_with("# ") {
        Validation::Valid
    } else {
        Validation::invalid("The note must start with a '# ' heading on the first line")
    }
}

#[tokio::test]
async fn test_marker_trim_example_from_preamble() {
    let input = from_events(vec![
        Event::text_start("1"),
        Event::text_delta("1", "Intro "),
        Event::text_delta("1", "## Title"),
        Event::text_delta("1", " body"),
        Event::text_end("1"),
    ]);

    let output = collect(apply_transforms(input, &[trim_before_marker("##")], &context())).await;

    assert_eq!(
        output,
        vec![
            Event::text_start("1"),
            Event::text_delta("1", "## Title"),
            Event::text_delta("1", " body"),
            Event::text_end("1"),
        ]
    );
}

#[tokio::test]
async fn test_marker_trim_with_split_marker() {
    let input = from_events(vec![
        Event::text_delta("1", "ABC"),
        Event::text_delta("1", "mark"),
        Event::text_delta("1", "erDEF"),
    ]);

    let output = collect(apply_transforms(input, &[trim_before_marker("marker")], &context())).await;

    assert_eq!(collect_text(&output), "markerDEF");
}

#[tokio::test(start_paused = true)]
async fn test_full_enhance_pipeline_shapes_text() {
    let input = from_events(vec![
        Event::StartStep,
        Event::text_start("1"),
        Event::text_delta("1", "Here are your notes:\n\n# Summary\nShort"),
        Event::text_delta("1", " recap.\n\n## Action items\n- ship it\n"),
        Event::text_end("1"),
        Event::FinishStep,
    ]);
    let stages = vec![
        trim_before_marker("#"),
        section_separators(),
        smooth_stream(SmoothConfig::words(Duration::from_millis(30))),
    ];

    let output = collect(apply_transforms(input, &stages, &context())).await;

    assert_eq!(
        collect_text(&output),
        "# Summary\nShort recap.\n\n<p></p>\n\n## Action items\n- ship it\n"
    );
    assert_eq!(output.first(), Some(&Event::StartStep));
    assert_eq!(output.last(), Some(&Event::FinishStep));
    let non_text: Vec<&Event> = output.iter().filter(|e| e.as_text().is_none()).collect();
    assert_eq!(
        non_text,
        vec![
            &Event::StartStep,
            &Event::text_start("1"),
            &Event::text_end("1"),
            &Event::FinishStep,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_smoothing_preserves_content_for_every_granularity() {
    let source = "First line of text\nsecond, shorter\n\nthird. Done";
    for chunking in [
        Chunking::Character,
        Chunking::Word,
        Chunking::Line,
        Chunking::pattern(r"[.,]\s*").unwrap(),
    ] {
        let input = from_events(vec![
            Event::text_delta("1", &source[..7]),
            Event::text_delta("1", &source[7..25]),
            Event::text_delta("1", &source[25..]),
        ]);
        let config = SmoothConfig {
            chunking,
            delay: Duration::from_millis(5),
        };

        let output = collect(apply_transforms(input, &[smooth_stream(config)], &context())).await;
        assert_eq!(collect_text(&output), source);
    }
}

#[tokio::test]
async fn test_validation_retry_with_scripted_model() {
    let model = Arc::new(ScriptedModel::new(vec![
        Script::chunks(["Intro", " text that is not a heading"]),
        Script::chunks(["# Real Title", "\n\nEverything discussed today."]),
    ]));
    let tools = ToolSet::new();
    let cancel = CancelSignal::new();

    let agent = ToolLoop::new(model.clone(), tools).with_max_steps(2);
    let stream = with_early_validation_retry(
        move |scope, ctx| {
            let mut prompt = "Write the note".to_string();
            if let Some(feedback) = ctx.previous_feedback {
                prompt.push_str("\n\n");
                prompt.push_str(&feedback);
            }
            agent.stream(GenerateRequest::prompt(prompt), scope)
        },
        heading_first,
        ValidationConfig {
            min_chars: 5,
            max_chars: 20,
            max_retries: 3,
        },
        cancel,
        |_, _| {},
    );

    let output = collect(stream).await;

    assert!(collect_text(&output).starts_with("# Real Title"));
    assert_eq!(model.call_count(), 2);
    let second_prompt = model.requests()[1].last_user_prompt().unwrap().to_string();
    assert!(second_prompt.contains("'# ' heading"));
}

#[tokio::test]
async fn test_validation_exhaustion_counts_attempts() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let model = Arc::new(ScriptedModel::repeating(Script::text("Sorry, I cannot do that")));

    let stream = with_early_validation_retry(
        move |scope, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            let model = model.clone();
            Box::pin(
                futures::stream::once(async move {
                    model.stream(GenerateRequest::prompt("x"), scope).await
                })
                .map(|opened| match opened {
                    Ok(events) => events,
                    Err(err) => Box::pin(futures::stream::iter(vec![Err(err)])) as EventStream,
                })
                .flatten(),
            ) as EventStream
        },
        heading_first,
        ValidationConfig {
            min_chars: 5,
            max_chars: 40,
            max_retries: 4,
        },
        CancelSignal::new(),
        |_, _| {},
    );

    let results: Vec<_> = stream.collect().await;

    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert!(matches!(
        results.last(),
        Some(Err(TaskError::ValidationExhausted { attempts: 4, .. }))
    ));
}
