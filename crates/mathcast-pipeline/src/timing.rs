//! Positional duration injection into pause markers.
//!
//! Scene code pauses with `self.wait()`; HTML fragments carry a
//! `STEP_PLACEHOLDER` token, optionally quoted. The i-th marker in text order
//! receives the i-th duration, and markers past the end of the list receive
//! the default. Nothing else in the text changes.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::ArtifactKind;

/// Placeholder token used by HTML animation fragments.
pub const HTML_PLACEHOLDER: &str = "STEP_PLACEHOLDER";

static SCENE_WAIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bself\.wait\(\s*\)").expect("valid regex"));

static HTML_PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""STEP_PLACEHOLDER"|'STEP_PLACEHOLDER'|\bSTEP_PLACEHOLDER\b"#).expect("valid regex")
});

fn marker_re(kind: ArtifactKind) -> &'static Regex {
    match kind {
        ArtifactKind::SceneCode => &SCENE_WAIT_RE,
        ArtifactKind::HtmlAnimation => &HTML_PLACEHOLDER_RE,
    }
}

/// Short description of the marker for error messages.
pub fn marker_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::SceneCode => "self.wait()",
        ArtifactKind::HtmlAnimation => HTML_PLACEHOLDER,
    }
}

/// Number of pending pause markers in `body`.
pub fn count_slots(kind: ArtifactKind, body: &str) -> usize {
    marker_re(kind).find_iter(body).count()
}

/// Replace pause markers with durations, in order of appearance.
pub fn inject_durations(kind: ArtifactKind, body: &str, durations: &[f64], default: f64) -> String {
    let mut position = 0usize;
    marker_re(kind)
        .replace_all(body, |_: &Captures<'_>| {
            let value = durations.get(position).copied().unwrap_or(default);
            position += 1;
            let seconds = format_seconds(value);
            match kind {
                ArtifactKind::SceneCode => format!("self.wait({})", seconds),
                ArtifactKind::HtmlAnimation => seconds,
            }
        })
        .into_owned()
}

/// Render seconds for code: millisecond precision, at least one decimal.
pub fn format_seconds(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        format!("{}", rounded)
    }
}
