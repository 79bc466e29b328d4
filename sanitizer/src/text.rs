use serde_json::Value;

/// HTML entity that sometimes survives `textContent` extraction verbatim.
const NBSP_ENTITY: &str = "&nbsp;";

/// Upper bound on consecutive line breaks in multi-line output.
const MAX_LINE_BREAKS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextPolicy {
    SingleLine,
    MultiLine,
}

/// Fields holding a person or organisation name keep token separation when
/// stray control characters are removed.
pub fn is_name_like(role: &str) -> bool {
    role == "name" || role.ends_with("_name")
}

/// Apply `policy` to a string value; anything else comes back unchanged.
pub fn sanitize_value(value: Value, policy: TextPolicy, role: Option<&str>) -> Value {
    match value {
        Value::String(text) => Value::String(match policy {
            TextPolicy::SingleLine => sanitize_single_line(&text, role),
            TextPolicy::MultiLine => sanitize_multi_line(&text),
        }),
        other => other,
    }
}

pub fn sanitize_single_line(text: &str, role: Option<&str>) -> String {
    let control_as_space = role.is_some_and(is_name_like);
    let text = text.replace(NBSP_ENTITY, " ");

    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if ch.is_control() {
            pending_space |= control_as_space;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

pub fn sanitize_multi_line(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace(NBSP_ENTITY, " ");

    let mut out = String::with_capacity(text.len());
    let mut pending_breaks = 0usize;
    let mut pending_space = false;
    for ch in text.chars() {
        if is_line_break(ch) {
            pending_breaks += 1;
            pending_space = false;
            continue;
        }
        if ch.is_whitespace() {
            // Indentation right after a break is dropped with the break.
            pending_space |= pending_breaks == 0;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if !out.is_empty() {
            if pending_breaks > 0 {
                out.extend(std::iter::repeat_n('\n', pending_breaks.min(MAX_LINE_BREAKS)));
            } else if pending_space {
                out.push(' ');
            }
        }
        pending_breaks = 0;
        pending_space = false;
        out.push(ch);
    }
    out
}

fn is_line_break(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}
