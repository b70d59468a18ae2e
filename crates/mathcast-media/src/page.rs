//! Self-contained player page around an animation fragment.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use mathcast_pipeline::{Result, audio_file_name};

/// Wrap `fragment` in the player page with the narration of steps
/// `1..=step_count` from `audio_dir` inlined as base64
/// `<audio id="audio-step-{i}">` elements.
///
/// `i` is the zero-based step index, so a step without narration leaves a
/// gap instead of shifting later steps. Files for higher step numbers are
/// ignored.
pub fn assemble_html_page(
    fragment: &str,
    audio_dir: &Path,
    prefix: &str,
    step_count: usize,
) -> Result<String> {
    let mut elements = Vec::new();
    for number in 1..=step_count {
        let path = audio_dir.join(audio_file_name(prefix, number));
        if !path.is_file() {
            continue;
        }
        let bytes = std::fs::read(&path)?;
        elements.push(format!(
            "  <audio id=\"audio-step-{}\" preload=\"auto\" src=\"data:audio/mpeg;base64,{}\"></audio>",
            number - 1,
            STANDARD.encode(bytes)
        ));
    }

    let audio = elements.join("\n");
    let mut page =
        String::with_capacity(PAGE_HEAD.len() + fragment.len() + audio.len() + PAGE_TAIL.len() + 64);
    page.push_str(PAGE_HEAD);
    page.push_str(fragment);
    page.push_str(PAGE_MIDDLE);
    page.push_str(&audio);
    page.push_str(PAGE_TAIL);
    Ok(page)
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Math Walkthrough</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
      background: #1a1a2e;
      color: #e6e6e6;
      display: flex;
      flex-direction: column;
      align-items: center;
      min-height: 100vh;
      padding: 2rem 1rem;
    }
    h1 { font-size: 1.5rem; font-weight: 600; margin-bottom: 1.5rem; }
    #animation-wrapper {
      background: #fff;
      border-radius: 12px;
      box-shadow: 0 8px 32px rgba(0,0,0,0.3);
      overflow: hidden;
      margin-bottom: 1.5rem;
    }
    #controls {
      display: flex;
      align-items: center;
      gap: 1rem;
      padding: 0.75rem 1.5rem;
      background: #16213e;
      border-radius: 8px;
      margin-bottom: 1rem;
    }
    #controls button {
      padding: 0.5rem 1.25rem;
      border: none;
      border-radius: 6px;
      cursor: pointer;
      font-size: 0.9rem;
    }
    #btn-play { background: #58a6ff; color: #fff; }
    #btn-play:disabled { opacity: 0.5; cursor: not-allowed; }
    #btn-reset { background: transparent; color: #8b949e; border: 1px solid #30363d; }
    #step-info { color: #8b949e; font-size: 0.85rem; }
    #progress-bar { width: 100%; max-width: 800px; height: 4px; background: #30363d; border-radius: 2px; overflow: hidden; margin-bottom: 1rem; }
    #progress-fill { height: 100%; width: 0%; background: #58a6ff; transition: width 0.3s ease-out; }
  </style>
</head>
<body>
  <h1>Math Walkthrough</h1>
  <div id="progress-bar"><div id="progress-fill"></div></div>
  <div id="controls">
    <button id="btn-play">Play</button>
    <button id="btn-reset">Reset</button>
    <span id="step-info"></span>
  </div>
  <div id="animation-wrapper">
"#;

const PAGE_MIDDLE: &str = r#"
  </div>

"#;

const PAGE_TAIL: &str = r#"

  <script>
  (function() {
    var steps = window.stepAnimations || [];
    var total = steps.length;
    var current = 0;
    var playing = false;
    var playBtn = document.getElementById('btn-play');
    var resetBtn = document.getElementById('btn-reset');
    var info = document.getElementById('step-info');
    var fill = document.getElementById('progress-fill');
    var container = document.getElementById('animation-container');

    function updateUI() {
      if (current >= total) {
        info.textContent = 'Finished ' + total + ' steps';
        playBtn.textContent = 'Play';
        playBtn.disabled = false;
        playing = false;
        fill.style.width = '100%';
      } else {
        info.textContent = 'Step ' + (current + 1) + ' / ' + total;
        fill.style.width = ((current / total) * 100) + '%';
      }
    }

    function stopAudio() {
      for (var i = 0; i < total; i++) {
        var a = document.getElementById('audio-step-' + i);
        if (a) { a.pause(); a.currentTime = 0; }
      }
    }

    function playStep(index) {
      if (!playing) { return; }
      if (index >= total) { current = total; updateUI(); return; }
      current = index;
      playBtn.textContent = 'Playing';
      playBtn.disabled = true;
      updateUI();

      var step = steps[index];
      var seconds = (typeof step.duration === 'number' && step.duration > 0) ? step.duration : 3;
      var audio = document.getElementById('audio-step-' + index);
      if (audio) { audio.currentTime = 0; audio.play().catch(function() {}); }
      try { step.animate(container); } catch (e) { console.error('step ' + (index + 1) + ' failed', e); }
      setTimeout(function() { playStep(index + 1); }, seconds * 1000);
    }

    playBtn.addEventListener('click', function() {
      if (current >= total) { current = 0; if (container) { container.innerHTML = ''; } }
      playing = true;
      playStep(current);
    });

    resetBtn.addEventListener('click', function() {
      playing = false;
      current = 0;
      if (container) { container.innerHTML = ''; }
      stopAudio();
      playBtn.textContent = 'Play';
      playBtn.disabled = false;
      updateUI();
    });

    updateUI();
  })();
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_page_inlines_audio_by_step_number() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("step_1.mp3"), b"abc").unwrap();
        std::fs::write(dir.path().join("step_3.mp3"), b"xyz").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let page = assemble_html_page(
            "<div id=\"animation-container\"></div>",
            dir.path(),
            "step",
            3,
        )
        .unwrap();

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<div id=\"animation-container\"></div>"));
        assert!(page.contains("id=\"audio-step-0\" preload=\"auto\" src=\"data:audio/mpeg;base64,YWJj\""));
        assert!(page.contains("id=\"audio-step-2\""));
        assert!(!page.contains("id=\"audio-step-1\""));
        assert!(page.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_page_ignores_audio_beyond_step_count() {
        let dir = TempDir::new().unwrap();
        for name in ["step_1.mp3", "step_2.mp3", "step_3.mp3"] {
            std::fs::write(dir.path().join(name), b"abc").unwrap();
        }

        let page = assemble_html_page("frag", dir.path(), "step", 1).unwrap();

        assert_eq!(page.matches("<audio").count(), 1);
        assert!(page.contains("id=\"audio-step-0\""));
        assert!(!page.contains("id=\"audio-step-1\""));
    }

    #[test]
    fn test_page_without_audio_dir() {
        let dir = TempDir::new().unwrap();
        let page = assemble_html_page("frag", &dir.path().join("missing"), "step", 2).unwrap();
        assert!(page.contains("frag"));
        assert!(!page.contains("<audio"));
    }

    #[test]
    fn test_fragment_braces_survive() {
        let dir = TempDir::new().unwrap();
        let page = assemble_html_page("{{audio}} {x: 1}", dir.path(), "step", 0).unwrap();
        assert!(page.contains("{{audio}} {x: 1}"));
    }
}
