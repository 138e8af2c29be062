use serde_json::Value;

/// Best-effort parse of JSON text that may have been cut off mid-stream.
///
/// Open strings, arrays and objects are closed; a trailing token that cannot be completed
/// (a dangling key, a half-written literal) is dropped. Returns `None` when no prefix of the
/// text forms a value.
pub fn parse_partial_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let boundaries = text
        .char_indices()
        .map(|(index, _)| index)
        .chain(std::iter::once(text.len()))
        .rev();
    for end in boundaries {
        if let Some(value) = close_and_parse(&text[..end]) {
            return Some(value);
        }
    }
    None
}

fn close_and_parse(prefix: &str) -> Option<Value> {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in prefix.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(c) {
                    return None;
                }
            }
            _ => {}
        }
    }

    let mut candidate = if in_string {
        if escaped {
            return None;
        }
        format!("{prefix}\"")
    } else {
        prefix
            .trim_end()
            .trim_end_matches(',')
            .to_string()
    };
    if candidate.trim().is_empty() {
        return None;
    }
    candidate.extend(closers.iter().rev());
    serde_json::from_str(&candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_json_passes_through() {
        assert_eq!(parse_partial_json(r#"{"q": "ai"}"#), Some(json!({"q": "ai"})));
        assert_eq!(parse_partial_json("42"), Some(json!(42)));
    }

    #[test]
    fn test_truncated_json() {
        let cases = [
            (r#"{"q": "hel"#, json!({"q": "hel"})),
            (r#"{"q": "hello", "n": 12"#, json!({"q": "hello", "n": 12})),
            (r#"{"items": [1, 2,"#, json!({"items": [1, 2]})),
            (r#"{"a": {"b": [true"#, json!({"a": {"b": [true]}})),
            (r#"{"q": "x", "lim"#, json!({"q": "x"})),
            (r#"{"q": "x", "limit":"#, json!({"q": "x"})),
            (r#"{"ok": tr"#, json!({})),
            (r#"{"path": "C:\\"#, json!({"path": "C:\\"})),
            ("{", json!({})),
        ];
        for (text, expected) in cases {
            assert_eq!(parse_partial_json(text), Some(expected), "text: {text}");
        }
    }

    #[test]
    fn test_nothing_to_parse() {
        assert_eq!(parse_partial_json(""), None);
        assert_eq!(parse_partial_json("   "), None);
        assert_eq!(parse_partial_json("}"), None);
    }
}
