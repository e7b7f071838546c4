//! Reasoning-span sanitizer
//!
//! Models such as DeepSeek-R1 wrap their deliberation in `<think>…</think>`.
//! [`sanitize`] removes those spans (and malformed or orphaned variants) from
//! any model text before it reaches a caller.
//!
//! The scanner only ever deletes characters, and [`sanitize`] re-runs it until
//! nothing changes, so its output contains no delimiter at all. Feeding that
//! output back in is therefore a no-op.

use serde_json::Value;

const WORD: &[u8] = b"think";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Text,
    /// `<think>`, `<think attr="x">`, `<thinking>`
    Open,
    /// `</think>`, `< / think >`, `</thinking>`
    Close,
    /// Any other complete tag mentioning the word, e.g. `<think/>`
    Orphan,
    /// `<think` with no `>` before the next `<` or end of input
    Dangling,
}

#[derive(Clone, Copy, Debug)]
struct Token {
    kind: Kind,
    start: usize,
    end: usize,
}

fn starts_with_word(bytes: &[u8]) -> bool {
    bytes.len() >= WORD.len() && bytes[..WORD.len()].eq_ignore_ascii_case(WORD)
}

fn contains_word(bytes: &[u8]) -> bool {
    bytes.windows(WORD.len()).any(|w| w.eq_ignore_ascii_case(WORD))
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Classify the body of a complete `<…>` tag
fn classify(body: &[u8]) -> Option<Kind> {
    if !contains_word(body) {
        return None;
    }

    let i = skip_ws(body, 0);
    if body.get(i) == Some(&b'/') {
        let j = skip_ws(body, i + 1);
        return Some(if starts_with_word(&body[j..]) {
            Kind::Close
        } else {
            Kind::Orphan
        });
    }

    let trimmed_end = body.trim_ascii_end();
    if starts_with_word(&body[i..]) && !trimmed_end.ends_with(b"/") {
        Some(Kind::Open)
    } else {
        Some(Kind::Orphan)
    }
}

/// Length of a dangling `<` [ws] [`/`] [ws] `think` prefix starting at `lt`, if any
fn dangling_len(bytes: &[u8], lt: usize) -> Option<usize> {
    let mut i = skip_ws(bytes, lt + 1);
    if bytes.get(i) == Some(&b'/') {
        i = skip_ws(bytes, i + 1);
    }
    starts_with_word(&bytes[i..]).then(|| i + WORD.len() - lt)
}

fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    let flush = |tokens: &mut Vec<Token>, from: usize, to: usize| {
        if from < to {
            tokens.push(Token { kind: Kind::Text, start: from, end: to });
        }
    };

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        let stop = bytes[i + 1..]
            .iter()
            .position(|&b| b == b'<' || b == b'>')
            .map(|p| i + 1 + p);

        let tag = match stop {
            Some(j) if bytes[j] == b'>' => classify(&bytes[i + 1..j]).map(|kind| (kind, j + 1)),
            _ => dangling_len(bytes, i).map(|len| (Kind::Dangling, i + len)),
        };

        match tag {
            Some((kind, end)) => {
                flush(&mut tokens, text_start, i);
                tokens.push(Token { kind, start: i, end });
                i = end;
                text_start = end;
            }
            None => i += 1,
        }
    }
    flush(&mut tokens, text_start, bytes.len());

    tokens
}

/// One left-to-right pass: drop closed spans, keep the inner text of spans
/// that never close, drop every stray delimiter.
fn strip_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open: Vec<String> = Vec::new();

    for token in tokenize(text) {
        let slice = &text[token.start..token.end];
        match token.kind {
            Kind::Text => match open.last_mut() {
                Some(span) => span.push_str(slice),
                None => out.push_str(slice),
            },
            Kind::Open => open.push(String::new()),
            Kind::Close => {
                open.pop();
            }
            Kind::Orphan | Kind::Dangling => {}
        }
    }

    for span in open {
        out.push_str(&span);
    }
    out
}

/// Remove reasoning spans from model output.
///
/// When the text contains a closing delimiter, whatever follows the last one
/// is the model's final answer and is preferred if non-empty.
pub fn sanitize(text: &str) -> String {
    let last_close = tokenize(text)
        .into_iter()
        .filter(|t| t.kind == Kind::Close)
        .map(|t| t.end)
        .next_back();

    let mut current = match last_close {
        Some(end) if !text[end..].trim().is_empty() => text[end..].to_string(),
        _ => text.to_string(),
    };

    loop {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    current.trim().to_string()
}

/// Apply [`sanitize`] to every string inside a JSON value
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
