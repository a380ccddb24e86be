//! Response parser — recovers tool invocations from free-form model text.
//!
//! Models wrap tool-call JSON in prose, code fences, and half-valid
//! syntax. The parser scans for balanced `{...}` spans (brace depth
//! tracked with in-string/escape awareness, so braces inside quoted
//! strings are non-structural), decodes each span as a `{tool, args}`
//! object, and resumes past spans that don't decode. A response with no
//! decodable object is a conversational turn, not an error.

use codequill_core::tool::ToolInvocation;
use serde::Deserialize;
use tracing::debug;

/// The wire format consumed from model text. Extra keys are ignored.
#[derive(Deserialize)]
struct WireCall {
    tool: String,
    args: serde_json::Value,
}

/// Argument fields the lenient fallback knows how to extract.
const FALLBACK_FIELDS: &[&str] = &[
    "path", "content", "search", "replace", "command", "query", "url", "summary",
];

/// Extract zero or more tool invocations from `text`, left to right.
///
/// `known_tools` drives the lenient fallback: when a balanced span fails
/// strict decoding but quotes a registered tool name, its string fields
/// are pulled out directly rather than discarding the turn.
pub fn parse_invocations(text: &str, known_tools: &[&str]) -> Vec<ToolInvocation> {
    let mut invocations = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let Some(rel_start) = text[cursor..].find('{') else {
            break;
        };
        let start = cursor + rel_start;

        let Some(end) = balanced_object_end(&text[start..]).map(|e| start + e) else {
            // Unbalanced open brace: step past it so nested objects are
            // still reachable.
            cursor = start + 1;
            continue;
        };

        let candidate = &text[start..end];
        match serde_json::from_str::<WireCall>(candidate) {
            Ok(call) if call.args.is_object() => {
                invocations.push(ToolInvocation::new(call.tool, call.args));
                cursor = end;
            }
            Ok(_) => {
                // Decoded but args isn't an object — not a tool call.
                cursor = end;
            }
            Err(_) => {
                if let Some(inv) = lenient_extract(candidate, known_tools) {
                    debug!(tool = %inv.name, "Recovered malformed tool call via field extraction");
                    invocations.push(inv);
                }
                cursor = end;
            }
        }
    }

    invocations
}

/// Find the byte length of the balanced object starting at `input`
/// (which must begin with `{`). Braces inside quoted strings are ignored;
/// backslash escapes are honored.
fn balanced_object_end(input: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in input.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Pull a tool name and string arguments out of a span that failed strict
/// decoding. Returns None unless a known tool name appears quoted in the
/// span.
fn lenient_extract(candidate: &str, known_tools: &[&str]) -> Option<ToolInvocation> {
    let tool = known_tools
        .iter()
        .filter_map(|name| {
            candidate
                .find(&format!("\"{name}\""))
                .map(|pos| (pos, *name))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, name)| name)?;

    let mut args = serde_json::Map::new();
    for field in FALLBACK_FIELDS {
        if let Some(value) = extract_string_field(candidate, field) {
            args.insert((*field).to_string(), serde_json::Value::String(value));
        }
    }

    Some(ToolInvocation::new(tool, serde_json::Value::Object(args)))
}

/// Locate `"field": "..."` and return the unescaped string value.
fn extract_string_field(text: &str, field: &str) -> Option<String> {
    let key = format!("\"{field}\"");
    let key_pos = text.find(&key)?;
    let after_key = &text[key_pos + key.len()..];

    let colon = after_key.find(':')?;
    let after_colon = after_key[colon + 1..].trim_start();
    let mut chars = after_colon.chars();
    if chars.next() != Some('"') {
        return None;
    }

    let mut value = String::new();
    let mut escaped = false;
    for ch in chars {
        if escaped {
            match ch {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '"' => value.push('"'),
                '\\' => value.push('\\'),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return Some(value);
        } else {
            value.push(ch);
        }
    }

    None // Unterminated string
}
