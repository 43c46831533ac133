//! The single-page question form.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use serde::Deserialize;

use crate::state::AppState;

const PAGE_TITLE: &str = "Local PDF Chatbot";
const PAGE_CAPTION: &str = "Local embeddings + in-memory vector index + local LLaMA";
const INPUT_LABEL: &str = "Ask a question from your PDF:";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub question: Option<String>,
}

enum Outcome {
    Empty,
    Answer(String),
    Error(String),
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let question = query.question.unwrap_or_default();
    let outcome = if question.trim().is_empty() {
        Outcome::Empty
    } else {
        answer(&state, &question).await
    };

    Html(render_page(&question, &outcome))
}

async fn answer(state: &AppState, question: &str) -> Outcome {
    let session = match state.session.get_or_initialize().await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!("Session unavailable: {}", err);
            return Outcome::Error(err.to_string());
        }
    };

    match session.pipeline.answer(question).await {
        Ok(answer) => Outcome::Answer(answer.text),
        Err(err) => {
            tracing::warn!("Question failed: {}", err);
            Outcome::Error(err.to_string())
        }
    }
}

fn render_page(question: &str, outcome: &Outcome) -> String {
    let result = match outcome {
        Outcome::Empty => String::new(),
        Outcome::Answer(text) => format!(
            "<section class=\"answer\">\n<h3>Answer</h3>\n<p>{}</p>\n</section>\n",
            escape_html(text)
        ),
        Outcome::Error(message) => format!(
            "<section class=\"error\" role=\"alert\">\n<p>Could not answer: {}</p>\n</section>\n",
            escape_html(message)
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; }}
.caption {{ color: #666; }}
input[type=text] {{ width: 100%; padding: 0.5rem; box-sizing: border-box; }}
.answer p {{ white-space: pre-wrap; }}
.error {{ color: #a00; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p class="caption">{caption}</p>
<form method="get" action="/">
<label for="question">{label}</label>
<input type="text" id="question" name="question" value="{value}" autofocus>
</form>
{result}</body>
</html>
"#,
        title = PAGE_TITLE,
        caption = escape_html(PAGE_CAPTION),
        label = INPUT_LABEL,
        value = escape_html(question),
        result = result,
    )
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
