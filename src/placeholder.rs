//! Placeholder Resolver: rewrites `{{key}}` context lookups and
//! `{name}` parameter lookups inside user-turn content.
//!
//! Grammar: scan left to right; at each `{`, first
//! attempt a balanced `{{...}}` span. If the captured span's inner text itself
//! contains a stray `{`, the outer brace is almost certainly not the real
//! opening of a marker — emit it literally and retry one position to the
//! right, so `{{{a}}}` resolves as a literal `{` followed by the resolved
//! `{{a}}` marker (and a literal trailing `}`).

use serde_json::{Map, Value};

use crate::context_store::{ContextItemStore, ContextStoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
enum MarkerKind {
    Context,
    Param,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Marker {
    kind: MarkerKind,
    raw: String,
    inner: String,
    start: usize,
    end: usize,
}

fn find_double_close(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '}' && chars[i + 1] == '}' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find_single_close(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len()).find(|&i| chars[i] == '}')
}

fn scan(content: &str) -> Vec<Marker> {
    let chars: Vec<char> = content.chars().collect();
    let mut markers = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i] != '{' {
            i += 1;
            continue;
        }

        if i + 1 < chars.len() && chars[i + 1] == '{' {
            if let Some(close) = find_double_close(&chars, i + 2) {
                let inner: String = chars[i + 2..close].iter().collect();
                if !inner.contains('{') {
                    let raw: String = chars[i..close + 2].iter().collect();
                    markers.push(Marker {
                        kind: MarkerKind::Context,
                        raw,
                        inner,
                        start: i,
                        end: close + 2,
                    });
                    i = close + 2;
                    continue;
                }
            }
            // Inner span contained a stray brace or no close was found: the
            // opening brace at `i` is literal; retry from `i + 1`.
            i += 1;
            continue;
        }

        if let Some(close) = find_single_close(&chars, i + 1) {
            let inner: String = chars[i + 1..close].iter().collect();
            if !inner.contains('{') {
                let raw: String = chars[i..close + 1].iter().collect();
                markers.push(Marker {
                    kind: MarkerKind::Param,
                    raw,
                    inner,
                    start: i,
                    end: close + 1,
                });
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }

    markers
}

/// Returns the raw text of the first remaining marker in `content`, if any.
/// Used by placeholder-validation to detect unresolved markers after populate.
pub fn first_unresolved_marker(content: &str) -> Option<String> {
    scan(content).into_iter().next().map(|m| m.raw)
}

enum NavigateOutcome {
    Found(Value),
    Missing,
    TypeMismatch,
}

fn navigate(value: &Value, path: &str) -> NavigateOutcome {
    if path.is_empty() {
        return NavigateOutcome::Found(value.clone());
    }
    let mut current = value;
    for segment in path.split(':') {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => current = v,
                None => return NavigateOutcome::Missing,
            },
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(idx) => match items.get(idx) {
                    Some(v) => current = v,
                    None => return NavigateOutcome::Missing,
                },
                Err(_) => return NavigateOutcome::TypeMismatch,
            },
            _ => return NavigateOutcome::TypeMismatch,
        }
    }
    NavigateOutcome::Found(current.clone())
}

/// Splits a `{{key}}` marker's inner text into `(stageKey, jsonPath)` when it
/// is an output-path reference. The marker spells the
/// stage's output as `"{stageKey}:output"`; the actual Context Store key it
/// was persisted under additionally carries the `stage:` namespace prefix
/// (the Key Builder's namespace), so callers resolve the record via
/// `crate::key::output`, not by looking the marker text up verbatim.
fn parse_output_ref(key: &str) -> Option<(String, String)> {
    let idx = key.find(":output")?;
    let after = idx + ":output".len();
    let stage_key = key[..idx].to_string();
    let rest = &key[after..];
    if rest.is_empty() {
        return Some((stage_key, String::new()));
    }
    rest.strip_prefix(':').map(|path| (stage_key, path.to_string()))
}

fn value_to_string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Resolution {
    Resolved(String),
    LeaveUnresolved,
}

async fn resolve_context_key(
    key: &str,
    session_id: &str,
    store: &dyn ContextItemStore,
) -> Result<Resolution, ContextStoreError> {
    if let Some((stage_key, path)) = parse_output_ref(key) {
        let record_key = crate::key::output(&stage_key);
        return match store.load_item(session_id, &record_key).await? {
            None => Ok(Resolution::Resolved(String::new())),
            Some(record) => match navigate(&record, &path) {
                NavigateOutcome::Found(v) => Ok(Resolution::Resolved(value_to_string_form(&v))),
                NavigateOutcome::Missing => Ok(Resolution::Resolved("{}".to_string())),
                NavigateOutcome::TypeMismatch => Ok(Resolution::Resolved(value_to_string_form(&record))),
            },
        };
    }

    match store.load_item(session_id, key).await? {
        Some(v) => Ok(Resolution::Resolved(value_to_string_form(&v))),
        None => Ok(Resolution::LeaveUnresolved),
    }
}

async fn resolve_param(
    name: &str,
    session_id: &str,
    store: &dyn ContextItemStore,
    parameters: &Map<String, Value>,
) -> Result<Resolution, ContextStoreError> {
    let Some(value) = parameters.get(name) else {
        return Ok(Resolution::LeaveUnresolved);
    };
    if let Value::String(s) = value {
        if let Some(inner) = s.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")) {
            return resolve_context_key(inner, session_id, store).await;
        }
    }
    Ok(Resolution::Resolved(value_to_string_form(value)))
}

/// Rewrites all markers in `content` with their resolved values. Markers that
/// cannot be resolved (absent context key, absent parameter) are left in the
/// output verbatim, so `PlaceholderValidationMiddleware` can detect them.
pub async fn populate(
    content: &str,
    session_id: &str,
    store: &dyn ContextItemStore,
    parameters: &Map<String, Value>,
) -> Result<String, ContextStoreError> {
    let chars: Vec<char> = content.chars().collect();
    let markers = scan(content);
    if markers.is_empty() {
        return Ok(content.to_string());
    }

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0usize;
    for marker in markers {
        out.extend(&chars[cursor..marker.start]);
        let resolution = match marker.kind {
            MarkerKind::Context => resolve_context_key(&marker.inner, session_id, store).await?,
            MarkerKind::Param => resolve_param(&marker.inner, session_id, store, parameters).await?,
        };
        match resolution {
            Resolution::Resolved(s) => out.push_str(&s),
            Resolution::LeaveUnresolved => out.push_str(&marker.raw),
        }
        cursor = marker.end;
    }
    out.extend(&chars[cursor..]);
    Ok(out)
}
