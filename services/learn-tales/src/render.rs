//! Plain-text rendering of the Learn Tales page for a terminal.

use learn_tales_core::content::ContentPayload;
use learn_tales_core::coordinator::{AppState, Illustration, Phase};
use learn_tales_core::narration::NarrationControls;
use learn_tales_core::quiz::{AnswerFeedback, OptionDisplay, QuizSummary, QuizView};
use learn_tales_core::request::LearningForm;
use learn_tales_core::view::ResultView;
use std::fmt::Write;

pub fn form(form: &LearningForm, can_submit: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Class:    {}", form.class_grade);
    let _ = writeln!(out, "Subject:  {}", form.subject);
    let _ = writeln!(out, "Topic:    {}", form.topic);
    let _ = writeln!(out, "Language: {}", form.language);
    let action = if can_submit {
        "[generate] Create My Story!"
    } else {
        "(Create My Story! is unavailable)"
    };
    let _ = write!(out, "{action}");
    out
}

/// The status line for the coordinator phase, if it has one.
pub fn phase(state: &AppState) -> Option<String> {
    match state.phase() {
        Phase::Idle => None,
        Phase::Loading => Some("Creating your story...".to_string()),
        Phase::ContentReady => None,
        Phase::Error => state.error().map(|message| format!("!! {message}")),
    }
}

pub fn story(view: &ResultView) -> String {
    let payload = view.payload();
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", view.story_title());
    if !payload.metadata.tags.is_empty() {
        let tags: Vec<String> = payload
            .metadata
            .tags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect();
        let _ = writeln!(out, "{}", tags.join(" "));
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", payload.narrative.trim());
    let _ = writeln!(out);
    if let Some(narration) = view.narration() {
        let _ = writeln!(out, "{}", controls(narration.controls()));
    }
    if view.offers_quiz() {
        let _ = write!(out, "[quiz] Ready for a Quiz?");
    }
    out.trim_end().to_string()
}

pub fn controls(controls: NarrationControls) -> String {
    let mut out = format!("[read] {}", controls.primary.label());
    if controls.show_restart {
        out.push_str("  [restart] Restart");
    }
    out
}

/// A line about the illustration, or `None` when there is nothing to show.
pub fn illustration(illustration: &Illustration) -> Option<String> {
    match illustration {
        Illustration::Loading => Some("Drawing a picture for your story...".to_string()),
        Illustration::Ready(image) => Some(format!(
            "Illustration ready ({}, {} bytes)",
            image.mime_type,
            image.bytes.len()
        )),
        Illustration::Absent | Illustration::Failed => None,
    }
}

pub fn quiz(view: QuizView<'_>) -> String {
    match view {
        QuizView::Empty => "No quiz questions available.".to_string(),
        QuizView::Complete(summary) => quiz_summary(summary),
        QuizView::Question(question) => {
            let mut out = String::new();
            let _ = writeln!(out, "Question {} of {}", question.number, question.total);
            let _ = writeln!(out, "{}", question.prompt);
            for option in &question.options {
                let marker = match option.display {
                    OptionDisplay::Neutral => "  ",
                    OptionDisplay::Dimmed => "· ",
                    OptionDisplay::Correct => "✓ ",
                    OptionDisplay::Incorrect => "✗ ",
                };
                let _ = writeln!(out, "{marker}{}. {}", option.letter, option.text);
            }
            if let Some(explanation) = question.explanation {
                let _ = writeln!(out, "{explanation}");
            }
            if question.can_advance {
                let _ = write!(out, "[next] Next Question");
            } else if question.explanation.is_none() {
                let _ = write!(out, "[answer A-D] Choose an answer");
            }
            out.trim_end().to_string()
        }
    }
}

pub fn feedback(feedback: &AnswerFeedback) -> String {
    if feedback.is_correct {
        "Correct!".to_string()
    } else {
        format!("Not quite. The answer is {}.", feedback.correct)
    }
}

pub fn quiz_summary(summary: QuizSummary) -> String {
    format!(
        "Quiz Complete! You scored {} out of {}.",
        summary.score, summary.total
    )
}

pub fn takeaways(takeaways: &[String]) -> String {
    let mut out = String::from("Key Takeaways");
    for takeaway in takeaways {
        let _ = write!(out, "\n  - {takeaway}");
    }
    out
}

/// One-line description of a payload for the status command.
pub fn headline(payload: &ContentPayload) -> String {
    format!(
        "{} · {} · {} ({} questions)",
        payload.metadata.class_level,
        payload.metadata.subject,
        payload.metadata.topic,
        payload.quiz_items.len()
    )
}
