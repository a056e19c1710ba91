//! Shared record-level rules applied by the per-task checkers.

use regex::Regex;
use runcheck_diagnostics::{ErrorLog, Location, TooManyErrors};
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

/// Human name of a JSON value's type, as reported in type errors.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The value as an identifier string: strings verbatim, everything else in
/// its JSON rendering (so numeric ids compare against string registries).
pub fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether the value is missing-like: absent, `null`, or the empty string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Fetch `key` from the record, reporting a missing-field error naming it.
pub fn require<'a>(
    obj: &'a Value,
    key: &str,
    location: Location,
    log: &mut ErrorLog,
) -> Result<Option<&'a Value>, TooManyErrors> {
    match obj.get(key) {
        Some(value) => Ok(Some(value)),
        None => {
            log.error(location, format!("Entry is missing \"{key}\" field."))?;
            Ok(None)
        }
    }
}

/// Whether every key is present; a single combined error otherwise.
pub fn require_all(
    obj: &Value,
    keys: &[&str],
    location: Location,
    log: &mut ErrorLog,
) -> Result<bool, TooManyErrors> {
    if keys.iter().all(|key| obj.get(key).is_some()) {
        Ok(true)
    } else {
        log.error(location, "Entry is missing a required field.")?;
        Ok(false)
    }
}

/// `re.fullmatch` semantics: the whole string must match.
pub fn full_match(re: &Regex, text: &str) -> bool {
    re.find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

/// `re.match` semantics: the match must start at the beginning.
pub fn prefix_match(re: &Regex, text: &str) -> bool {
    re.find(text).is_some_and(|m| m.start() == 0)
}

/// NFKC-normalized character count, the length measure of the report tasks.
pub fn nfkc_chars(text: &str) -> usize {
    text.nfkc().count()
}

/// NFKC-normalized whitespace-token count, the length measure of the
/// generation tasks. Not interchangeable with [`nfkc_chars`]: the two task
/// families measure length differently.
pub fn nfkc_tokens(text: &str) -> usize {
    text.nfkc().collect::<String>().split_whitespace().count()
}

/// Trim trailing sentences from an over-length answer until it fits.
///
/// A leniency step for generation tasks with a hard output cap: instead of
/// rejecting the answer, sentences are dropped from the end, with one
/// Warning per removed sentence and a final updated-length Warning.
/// Validation continues on the truncated answer. Only tasks that opt in
/// call this; the length checks themselves never repair.
pub fn repair_answer_length(
    sentences: &mut Vec<Value>,
    mut length: usize,
    max_tokens: usize,
    location: Location,
    log: &mut ErrorLog,
) -> usize {
    log.warn(
        location,
        format!("Attempting to fix answer of length {length}"),
    );
    while length > max_tokens {
        let Some(last) = sentences.pop() else { break };
        let text = last
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_owned();
        length = length.saturating_sub(nfkc_tokens(&text));
        log.warn(
            location,
            format!("Removing a sentence from the end: {text}"),
        );
    }
    log.warn(location, format!("Updated length: {length}"));
    length
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use runcheck_diagnostics::DEFAULT_MAX_ERRORS;
    use serde_json::json;

    use super::*;

    fn scratch_log() -> (tempfile::TempDir, ErrorLog) {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ErrorLog::new(&dir.path().join("run"), DEFAULT_MAX_ERRORS);
        (dir, log)
    }

    #[test]
    fn require_names_the_missing_key() {
        let (_dir, mut log) = scratch_log();
        let obj = json!({"team_id": "x"});
        assert!(require(&obj, "team_id", Location::Record(1), &mut log)
            .unwrap()
            .is_some());
        assert!(require(&obj, "run_name", Location::Record(1), &mut log)
            .unwrap()
            .is_none());
        assert_eq!(
            log.diagnostics()[0].to_string(),
            "ERROR Item 1: Entry is missing \"run_name\" field."
        );
    }

    #[test]
    fn full_match_is_anchored_on_both_ends() {
        let re = Regex::new(r"\d+").unwrap();
        assert!(full_match(&re, "123"));
        assert!(!full_match(&re, "123x"));
        assert!(!full_match(&re, "x123"));
        assert!(prefix_match(&re, "123x"));
        assert!(!prefix_match(&re, "x123"));
    }

    #[test]
    fn token_and_char_lengths_disagree() {
        let text = "two words";
        assert_eq!(nfkc_tokens(text), 2);
        assert_eq!(nfkc_chars(text), 9);
        // ﬁ normalizes to two characters under NFKC
        assert_eq!(nfkc_chars("ﬁn"), 3);
    }

    #[test]
    fn repair_trims_from_the_end_and_logs_each_removal() {
        let (_dir, mut log) = scratch_log();
        let mut sentences = vec![
            json!({"text": "one two three"}),
            json!({"text": "four five"}),
            json!({"text": "six seven eight"}),
        ];
        let length = repair_answer_length(&mut sentences, 8, 4, Location::Record(1), &mut log);
        assert_eq!(length, 3);
        assert_eq!(sentences.len(), 1);
        let messages: Vec<_> = log
            .diagnostics()
            .iter()
            .map(|d| d.message().to_owned())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Attempting to fix answer of length 8",
                "Removing a sentence from the end: six seven eight",
                "Removing a sentence from the end: four five",
                "Updated length: 3",
            ]
        );
        assert_eq!(log.error_count(), 0);
    }
}
