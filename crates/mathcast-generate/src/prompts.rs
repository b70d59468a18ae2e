//! Prompt builders for every generation call.

use mathcast_pipeline::{ArtifactKind, Result, Step};

/// Pretty JSON rendering of the steps, embedded in several prompts.
pub fn steps_json(steps: &[Step]) -> Result<String> {
    Ok(serde_json::to_string_pretty(steps)?)
}

fn push_style(prompt: &mut String, style: Option<&str>) {
    if let Some(style) = style.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nAnimation style: ");
        prompt.push_str(style);
        prompt.push('\n');
    }
}

/// Truncate to at most `max` characters, marking the cut.
pub fn abbreviate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis
// ─────────────────────────────────────────────────────────────────────────────

pub struct AnalysisPrompt;

impl AnalysisPrompt {
    pub fn build(problem_text: &str, has_image: bool) -> String {
        let mut prompt = String::with_capacity(2048);
        prompt.push_str(ANALYSIS_INSTRUCTION);
        if has_image {
            prompt.push_str(
                "\n\nThe attached image shows the original problem. Read its figures, formulas and labels carefully.",
            );
        }
        prompt.push_str("\n\nProblem:\n");
        prompt.push_str(problem_text.trim());
        prompt.push_str("\n\nRespond with ONLY the JSON object. No markdown, no explanation.\n");
        prompt
    }
}

const ANALYSIS_INSTRUCTION: &str = r#"You are a mathematics expert and an animation script designer. Analyze the math problem below and break its solution into steps.

Return a JSON object with this structure:
{
  "steps": [
    {
      "step_id": 1,
      "description": "what happens in this step",
      "math_formula": "LaTeX formula, e.g. $x^2 + y^2 = r^2$",
      "visual_focus": "the visual element to highlight",
      "voiceover_text": "narration read aloud during this step"
    }
  ]
}

Rules:
- `step_id` starts at 1 and increases by one.
- Produce at least one step.
- Write `description` and `voiceover_text` in the language of the problem."#;

// ─────────────────────────────────────────────────────────────────────────────
// Scene code
// ─────────────────────────────────────────────────────────────────────────────

pub struct ScenePrompt;

impl ScenePrompt {
    pub fn build(steps_json: &str, scene_class: &str, style: Option<&str>) -> String {
        let mut prompt = String::with_capacity(4096);
        prompt.push_str(&SCENE_INSTRUCTION.replace("{scene_class}", scene_class));
        push_style(&mut prompt, style);
        prompt.push_str("\n\nSolution steps:\n");
        prompt.push_str(steps_json);
        prompt.push_str("\n\nRespond with ONLY the JSON object. No markdown, no explanation.\n");
        prompt
    }
}

const SCENE_INSTRUCTION: &str = r#"You are a Manim animation engineer. Write one Manim Community scene that explains the solution steps below.

Return a JSON object with this structure:
{
  "scene_code": "complete Python source",
  "image_prompts": ["one illustration prompt per step"]
}

Rules for `scene_code`:
- Define `class {scene_class}(Scene)` with a `construct(self)` method.
- After the animations of each step, call `self.wait()` with NO arguments exactly once. The pause length is filled in later from the narration.
- Use only Manim Community and the Python standard library.
- Keep text inside the frame.

Rules for `image_prompts`: one minimal textbook-style prompt on a white background per step, in step order."#;

// ─────────────────────────────────────────────────────────────────────────────
// HTML animation
// ─────────────────────────────────────────────────────────────────────────────

pub struct PlanPrompt;

impl PlanPrompt {
    pub fn build(steps_json: &str, has_image: bool, style: Option<&str>) -> String {
        let mut prompt = String::with_capacity(4096);
        prompt.push_str(PLAN_INSTRUCTION);
        if has_image {
            prompt.push_str(
                "\n- The attached image shows the original problem. Reproduce its figure, vertex labels and angles faithfully in `shared_svg`.",
            );
        }
        push_style(&mut prompt, style);
        prompt.push_str("\n\nSolution steps:\n");
        prompt.push_str(steps_json);
        prompt.push_str("\n\nRespond with ONLY the JSON object. No markdown, no explanation.\n");
        prompt
    }
}

const PLAN_INSTRUCTION: &str = r#"You are a math animation designer. Plan a web animation for each solution step below.

Return a JSON object with this structure:
{
  "shared_css": "CSS shared by all steps (.formula, .highlight, .step-title, ...)",
  "shared_svg": "an SVG base figure for geometry problems, or an empty string",
  "step_plans": [
    {"step_id": 1, "animation_description": "what appears, how it moves, which colors", "image_prompt": "minimal textbook-style illustration prompt"}
  ]
}

Rules:
- The animation container is 800x600px with a white background.
- Write formulas with Unicode math symbols (x², √, ∑, π). No MathJax or KaTeX.
- Animate with plain CSS (fade-in, slide-in). No external libraries.
- Draw geometry with SVG.
- `step_plans` must have exactly one entry per step."#;

pub struct StepCodePrompt;

impl StepCodePrompt {
    pub fn build(
        step: &Step,
        animation_description: &str,
        css_summary: &str,
        has_svg: bool,
        previous: &[String],
    ) -> String {
        let mut prompt = String::with_capacity(2048);
        prompt.push_str(STEP_CODE_INSTRUCTION);
        prompt.push_str("\n\nContext:\n");
        prompt.push_str("- Container: `<div id=\"animation-container\">`, 800x600px, white background\n");
        prompt.push_str(&format!("- Shared styles: {}\n", css_summary));
        prompt.push_str(if has_svg {
            "- An SVG base figure is already in the container\n"
        } else {
            "- There is no SVG base figure\n"
        });
        if !previous.is_empty() {
            prompt.push_str("- Steps already shown:\n");
            for line in previous {
                prompt.push_str(&format!("  {}\n", line));
            }
        }
        prompt.push_str(&format!("\nCurrent step {}:\n", step.step_id));
        prompt.push_str(&format!("- Description: {}\n", step.description));
        prompt.push_str(&format!("- Formula: {}\n", step.math_formula));
        prompt.push_str(&format!("- Visual focus: {}\n", step.visual_focus));
        prompt.push_str(&format!("- Narration: {}\n", step.voiceover_text));
        prompt.push_str(&format!("- Animation plan: {}\n", animation_description));
        prompt.push_str("\nRespond with ONLY the JSON object {\"animate_body\": \"...\"}. No markdown, no explanation.\n");
        prompt
    }
}

const STEP_CODE_INSTRUCTION: &str = r#"You are a front-end animation engineer. Write the JavaScript body of `function(container) { ... }` for one step of a math explanation.

Rules:
- Manipulate the DOM only through `container` (the animation-container element), via innerHTML or createElement.
- Reuse the shared CSS classes where possible.
- Use CSS animations or transitions that start as soon as elements are added.
- Write formulas with Unicode math symbols. No MathJax or KaTeX.
- For geometry, modify the existing SVG figure (colors, labels).
- Do NOT touch window, document.body or alert. Do NOT load external libraries.
- Output the function body only, without the `function` declaration."#;

// ─────────────────────────────────────────────────────────────────────────────
// Repair
// ─────────────────────────────────────────────────────────────────────────────

pub struct RepairPrompt;

impl RepairPrompt {
    pub fn build(kind: ArtifactKind, candidate: &str, error: &str, scene_class: &str) -> String {
        let (language, what, keep) = match kind {
            ArtifactKind::SceneCode => (
                "python",
                "This Manim scene code fails to render.",
                format!(
                    "Keep the `{}` class and every argument-less `self.wait()` pause marker.",
                    scene_class
                ),
            ),
            ArtifactKind::HtmlAnimation => (
                "html",
                "This web animation fragment has errors.",
                "Keep the animation-container element, the window.stepAnimations array and every STEP_PLACEHOLDER duration. \
                 Output an HTML fragment without <!DOCTYPE>, <html>, <head> or <body>, and do not use external libraries \
                 (MathJax, KaTeX, GSAP)."
                    .to_string(),
            ),
        };

        let mut prompt = String::with_capacity(candidate.len() + error.len() + 512);
        prompt.push_str(what);
        prompt.push_str(" Fix it and return ONLY the complete corrected code, without explanation.\n\n");
        prompt.push_str("Error:\n");
        prompt.push_str(error);
        prompt.push_str(&format!("\n\nCode:\n```{}\n", language));
        prompt.push_str(candidate);
        prompt.push_str("\n```\n\n");
        prompt.push_str(&keep);
        prompt.push('\n');
        prompt
    }
}
