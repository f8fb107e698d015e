//! HTML pages served to the person being verified
//!
//! Pages are assembled with `format!`; every value that reaches the markup
//! or an inline script passes through [`escape_html`] or [`script_json`].

use serde::Serialize;

use crate::quiz::QuizBank;

const BASE_STYLE: &str = r#"
    body { font-family: 'Segoe UI', Arial, sans-serif; max-width: 800px; margin: 0 auto;
           padding: 20px; text-align: center; line-height: 1.6; background: #f5f5f5; color: #333; }
    .card { background: white; border-radius: 15px; padding: 30px; margin-bottom: 20px;
            box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1); }
    button { background: #5865F2; color: white; border: none; padding: 15px 40px; font-size: 18px;
             cursor: pointer; border-radius: 8px; font-weight: 600; }
    .option { display: block; width: 100%; margin: 10px 0; padding: 15px; background: #f8f9fa;
              border: 2px solid #e9ecef; color: #2C2F33; font-size: 1.1em; font-weight: normal; }
    .option.selected { background: #5865F2; color: white; border-color: #4752C4; }
    .progress-bar { width: 100%; height: 10px; background: #e9ecef; border-radius: 5px; margin: 20px 0; }
    .progress { height: 100%; background: #5865F2; width: 0%; border-radius: 5px; }
    ul { text-align: left; }
    #quiz { display: none; }
"#;

/// Question as seen by the browser.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientQuestion<'a> {
    prompt: &'a str,
    options: &'a [String],
    correct_index: usize,
}

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serializes `value` for embedding inside a `<script>` block.
///
/// `<` is emitted as `\u003c` so no string can close the script element.
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace('<', "\\u003c")
}

/// Renders the quiz for `subject_id`.
///
/// Answers are checked in the browser; the page posts the subject, the
/// correct count and the verification `state` to `/submit-quiz`, then moves
/// to `/success` or `/failure` depending on the response status.
pub fn quiz_page(subject_id: &str, state: &str, bank: &QuizBank) -> String {
    let questions: Vec<ClientQuestion<'_>> = bank
        .questions
        .iter()
        .map(|q| ClientQuestion {
            prompt: &q.prompt,
            options: &q.options,
            correct_index: q.correct_index,
        })
        .collect();

    let total = bank.len();
    let passing = bank.passing_score;

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Verification Quiz</title>
  <style>{style}</style>
</head>
<body>
  <div class="card" id="instructions">
    <h1>Server Verification Quiz</h1>
    <p>To gain access to the server, you must complete a short technical quiz.</p>
    <h2>Quiz Details</h2>
    <ul>
      <li>Total Questions: {total}</li>
      <li>Passing Threshold: {passing} correct answers</li>
      <li>Topic: Technical and Programming Concepts</li>
    </ul>
    <h2>Rules</h2>
    <p>Read each question carefully and select the best answer. You must answer all questions to complete the verification.</p>
    <button id="start-quiz">Start Quiz</button>
  </div>
  <div class="card" id="quiz">
    <p id="question-counter"></p>
    <div class="progress-bar"><div class="progress" id="progress"></div></div>
    <p id="question"></p>
    <div id="options"></div>
  </div>
  <script>
    const subjectId = {subject};
    const state = {state};
    const questions = {questions};
    let current = 0;
    let correctCount = 0;
    let locked = false;

    document.getElementById('start-quiz').addEventListener('click', () => {{
      document.getElementById('instructions').style.display = 'none';
      document.getElementById('quiz').style.display = 'block';
      render();
    }});

    function render() {{
      const q = questions[current];
      document.getElementById('progress').style.width = (current / questions.length * 100) + '%';
      document.getElementById('question-counter').textContent = 'Question ' + (current + 1) + ' of ' + questions.length;
      document.getElementById('question').textContent = q.prompt;
      const options = document.getElementById('options');
      options.innerHTML = '';
      q.options.forEach((text, index) => {{
        const button = document.createElement('button');
        button.className = 'option';
        button.textContent = text;
        button.addEventListener('click', () => answer(index, button));
        options.appendChild(button);
      }});
      locked = false;
    }}

    function answer(index, button) {{
      if (locked) return;
      locked = true;
      button.classList.add('selected');
      if (index === questions[current].correctIndex) correctCount++;
      current++;
      if (current >= questions.length) {{
        fetch('/submit-quiz', {{
          method: 'POST',
          headers: {{ 'Content-Type': 'application/json' }},
          body: JSON.stringify({{ subjectId, correctCount, state }})
        }}).then(r => {{
          window.location.href = r.ok ? '/success' : '/failure';
        }}).catch(() => {{ window.location.href = '/failure'; }});
        return;
      }}
      setTimeout(render, 1000);
    }}
  </script>
</body>
</html>
"#,
        style = BASE_STYLE,
        total = total,
        passing = passing,
        subject = script_json(subject_id),
        state = script_json(state),
        questions = script_json(&questions),
    )
}

/// Terminal page after a successful grant.
pub fn success_page() -> String {
    terminal_page(
        "Verification Successful",
        "Verification Successful!",
        &[
            "You have been verified and granted access to the server.",
            "You can now close this window and return to the Discord server.",
        ],
    )
}

/// Terminal page after a failed quiz or grant.
pub fn failure_page() -> String {
    terminal_page(
        "Verification Failed",
        "Verification Failed",
        &[
            "You did not pass the verification quiz.",
            "Please rejoin the server and try again.",
        ],
    )
}

fn terminal_page(title: &str, heading: &str, lines: &[&str]) -> String {
    let body: String = lines
        .iter()
        .map(|l| format!("  <p>{}</p>\n", escape_html(l)))
        .collect();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  <title>{}</title>\n  \
         <style>body {{ font-family: Arial, sans-serif; text-align: center; padding: 50px; }}</style>\n\
         </head>\n<body>\n  <h1>{}</h1>\n{}</body>\n</html>\n",
        escape_html(title),
        escape_html(heading),
        body
    )
}
