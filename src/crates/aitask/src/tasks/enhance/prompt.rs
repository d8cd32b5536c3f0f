//! Prompt construction for the enhance task

use super::args::EnhanceContext;
use std::fmt::Write;

pub const SYSTEM_PROMPT: &str = "\
You are an expert note-taker. You turn a user's raw meeting notes and the \
meeting transcript into clear, well-structured notes in markdown.

Rules:
- Start immediately with a level-one heading (`# `). Write nothing before it.
- Use level-one headings (`# `) for sections and bullet points beneath them.
- Keep the user's own notes as the backbone and fill gaps from the transcript.
- Never invent facts, names, numbers or decisions that are not in the input.
- Write in the language of the raw notes, or of the transcript if notes are empty.";

pub const ANALYZE_SYSTEM_PROMPT: &str = "\
You plan the structure of meeting notes. Reply with section headings only, \
one per line, without numbering or commentary.";

/// Timestamp as `m:ss`, or `h:mm:ss` past the hour
pub fn format_timestamp(ms: i64) -> String {
    let total = ms.max(0) / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn write_session(out: &mut String, ctx: &EnhanceContext) {
    let session = &ctx.session;
    let _ = writeln!(out, "## Meeting");
    if !session.title.is_empty() {
        let _ = writeln!(out, "Title: {}", session.title);
    }
    if session.is_event {
        for (label, value) in [
            ("Started", &session.started_at),
            ("Ended", &session.ended_at),
            ("Location", &session.location),
            ("Description", &session.description),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "{label}: {value}");
            }
        }
    }

    if !ctx.participants.is_empty() {
        let _ = writeln!(out, "\n## Participants");
        for p in &ctx.participants {
            if p.job_title.is_empty() {
                let _ = writeln!(out, "- {}", p.name);
            } else {
                let _ = writeln!(out, "- {} ({})", p.name, p.job_title);
            }
        }
    }
}

fn write_transcript(out: &mut String, ctx: &EnhanceContext) {
    let _ = writeln!(out, "\n## Transcript");
    if ctx.segments.is_empty() {
        let _ = writeln!(out, "(no transcript)");
        return;
    }
    for segment in &ctx.segments {
        let _ = writeln!(
            out,
            "[{}] {}: {}",
            format_timestamp(segment.start_ms),
            segment.speaker_label,
            segment.text
        );
    }
}

fn write_raw_notes(out: &mut String, ctx: &EnhanceContext) {
    let _ = writeln!(out, "\n## Raw notes");
    if ctx.raw_md.trim().is_empty() {
        let _ = writeln!(out, "(empty)");
    } else {
        let _ = writeln!(out, "{}", ctx.raw_md.trim_end());
    }
}

/// Request for a section outline
pub fn analyze_structure_prompt(ctx: &EnhanceContext) -> String {
    let mut out = String::new();
    write_session(&mut out, ctx);
    write_transcript(&mut out, ctx);
    write_raw_notes(&mut out, ctx);
    let _ = write!(
        out,
        "\nPropose the sections these meeting notes should have, most important first."
    );
    out
}

/// Main generation prompt.
///
/// A template takes precedence over `outline`. `feedback` is the reason the
/// previous attempt was rejected.
pub fn user_prompt(ctx: &EnhanceContext, outline: &[String], feedback: Option<&str>) -> String {
    let mut out = String::new();
    write_session(&mut out, ctx);

    if let Some(template) = &ctx.template {
        let _ = writeln!(out, "\n## Template: {}", template.title);
        if !template.description.is_empty() {
            let _ = writeln!(out, "{}", template.description);
        }
        let _ = writeln!(out, "Use exactly these sections, in this order:");
        for section in &template.sections {
            if section.description.is_empty() {
                let _ = writeln!(out, "- {}", section.title);
            } else {
                let _ = writeln!(out, "- {}: {}", section.title, section.description);
            }
        }
    } else if !outline.is_empty() {
        let _ = writeln!(out, "\n## Suggested sections");
        for heading in outline {
            let _ = writeln!(out, "- {heading}");
        }
    }

    if !ctx.attachments.is_empty() {
        let _ = writeln!(out, "\n## Attachments");
        for a in &ctx.attachments {
            let _ = writeln!(out, "- {} ({})", a.file_name, a.mime_type);
        }
    }

    write_transcript(&mut out, ctx);
    write_raw_notes(&mut out, ctx);
    let _ = write!(out, "\nWrite the enhanced notes now.");

    if let Some(feedback) = feedback {
        let _ = write!(
            out,
            "\n\nYour previous answer was rejected: {feedback}\nStart your answer with a '# ' heading."
        );
    }
    out
}

/// Headings from an outline reply
pub fn parse_outline(text: &str) -> Vec<String> {
    let mut headings: Vec<String> = Vec::new();
    for line in text.lines() {
        let heading = line
            .trim()
            .trim_start_matches('#')
            .trim_start_matches(['-', '*'])
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start_matches(['.', ')'])
            .trim();
        if !heading.is_empty() && !headings.iter().any(|h| h == heading) {
            headings.push(heading.to_string());
        }
    }
    headings
}
