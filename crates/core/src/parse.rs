use serde_json::Value;

/// Result of reading a structured model answer.
///
/// `Fallback` carries hardcoded defaults used because the answer could not be read.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> Parsed<T> {
    pub fn value(&self) -> &T {
        match self {
            Parsed::Parsed(value) | Parsed::Fallback(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Parsed::Parsed(value) | Parsed::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Parsed::Fallback(_))
    }
}

/// Reads JSON out of a model answer.
///
/// Tries the whole text first, then the body of a markdown code fence, then
/// the widest `[...]` or `{...}` span, whichever opens first.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    if let Some(fenced) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str(fenced) {
            return Some(value);
        }
    }

    let array = bracketed(text, '[', ']');
    let object = bracketed(text, '{', '}');
    let mut candidates = [array, object];
    candidates.sort_by_key(|candidate| candidate.map(|(start, _)| start).unwrap_or(usize::MAX));
    candidates
        .into_iter()
        .flatten()
        .find_map(|(_, span)| serde_json::from_str(span).ok())
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn bracketed(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, &text[start..=end]))
}

/// Collects non-empty strings from a JSON array, or from the first array
/// field of an object (e.g. `{"questions": [...]}`).
pub fn string_list(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.values().find_map(Value::as_array) {
            Some(items) => items,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Object(map) => ["question", "text"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(|text| text.trim().to_string()),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect()
}

/// Reads a number that a model may have written as a JSON number or a numeric string.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_json_is_read_directly() {
        assert_eq!(extract_json(r#"["a", "b"]"#), Some(json!(["a", "b"])));
    }

    #[test]
    fn code_fences_are_unwrapped() {
        let text = "```json\n{\"total\": 70}\n```";
        assert_eq!(extract_json(text), Some(json!({ "total": 70 })));
    }

    #[test]
    fn prose_around_an_array_is_ignored() {
        let text = "Here are your questions:\n[\"Why?\", \"How?\"]\nGood luck!";
        assert_eq!(extract_json(text), Some(json!(["Why?", "How?"])));
    }

    #[test]
    fn object_that_opens_first_wins() {
        let text = "Result: {\"scores\": {\"delivery\": 8}, \"tips\": [\"slow down\"]} done";
        let value = extract_json(text).unwrap();
        assert_eq!(value["scores"]["delivery"], 8);
    }

    #[test]
    fn unreadable_text_yields_nothing() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("[unterminated"), None);
    }

    #[test]
    fn string_lists_come_from_arrays_or_wrapped_objects() {
        assert_eq!(string_list(&json!(["One?", " ", "Two?"])), vec!["One?", "Two?"]);
        assert_eq!(
            string_list(&json!({ "questions": [{ "question": "Q1" }, "Q2"] })),
            vec!["Q1", "Q2"]
        );
        assert!(string_list(&json!(42)).is_empty());
    }

    #[test]
    fn parsed_tags_the_fallback_path() {
        let parsed = Parsed::Fallback(vec![1]);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.into_inner(), vec![1]);
        assert!(!Parsed::Parsed(0).is_fallback());
    }
}
