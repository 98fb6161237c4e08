//! Best-effort parsing of an incomplete JSON document.
//!
//! Tool arguments stream in as raw fragments. While a call is still in
//! `partial-call` state the client shows whatever prefix of the arguments is
//! already meaningful: open strings are closed, open objects and arrays are
//! closed, and a dangling key, comma or partial literal is cut back to the
//! last position that yields valid JSON.

use serde_json::Value;

/// Parse `raw` as JSON, repairing a truncated tail. Returns `None` when no
/// prefix of the input can be made into a JSON value.
pub fn parse_partial(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut candidates: Vec<Candidate> = Vec::new();

    for (idx, ch) in trimmed.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
                continue;
            } else if ch == '"' {
                in_string = false;
            }
        } else {
            match ch {
                '"' => in_string = true,
                '{' => closers.push('}'),
                '[' => closers.push(']'),
                '}' | ']' => {
                    if closers.pop() != Some(ch) {
                        return None;
                    }
                }
                _ => {}
            }
        }

        let mut suffix = String::new();
        if in_string {
            suffix.push('"');
        }
        suffix.extend(closers.iter().rev());
        candidates.push(Candidate {
            end: idx + ch.len_utf8(),
            in_string,
            suffix,
        });
    }

    candidates.into_iter().rev().find_map(|candidate| {
        let mut prefix = &trimmed[..candidate.end];
        if !candidate.in_string {
            prefix = prefix.trim_end().trim_end_matches(',');
        }
        serde_json::from_str(&format!("{prefix}{}", candidate.suffix)).ok()
    })
}

struct Candidate {
    end: usize,
    in_string: bool,
    suffix: String,
}
