//! Shape predicates over [`Value`] and the fixed format regex set used by the
//! string validators.

use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;

pub fn is_string(value: &Value) -> bool {
    matches!(value, Value::Text(_))
}

pub fn is_number(value: &Value) -> bool {
    matches!(value, Value::Numeric(_))
}

pub fn is_boolean(value: &Value) -> bool {
    matches!(value, Value::Boolean(_))
}

pub fn is_date(value: &Value) -> bool {
    matches!(value, Value::Temporal(_))
}

pub fn is_buffer(value: &Value) -> bool {
    matches!(value, Value::Binary(_))
}

pub fn is_array(value: &Value) -> bool {
    matches!(value, Value::Sequence(_))
}

pub fn is_object(value: &Value) -> bool {
    matches!(value, Value::Structured(_))
}

/// Compiled format patterns.
pub struct RegexSet {
    pub email: Regex,
    pub token: Regex,
    pub guid: Regex,
    pub hostname: Regex,
    pub url: Regex,
    pub alphanumeric: Regex,
}

static REGEX_SET: Lazy<RegexSet> = Lazy::new(|| RegexSet {
    email: compile(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    ),
    token: compile(r"^[A-Za-z0-9_-]+$"),
    guid: compile(
        r"^\{?[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}?$",
    ),
    hostname: compile(
        r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    ),
    url: compile(
        r"^(?:https?|ftp)://(?:[^\s:@/]+(?::[^\s@/]*)?@)?(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*|\[[0-9A-Fa-f:.]+\])(?::\d{1,5})?(?:[/?#]\S*)?$",
    ),
    alphanumeric: compile(r"^(?i)[a-z0-9]+$"),
});

// The patterns above are constants; a failure here is a programming error.
fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in pattern {pattern}: {e}"),
    }
}

/// The shared format patterns.
pub fn regex_set() -> &'static RegexSet {
    &REGEX_SET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_predicates() {
        assert!(is_string(&Value::from("a")));
        assert!(!is_string(&Value::from(1)));
        assert!(is_number(&Value::from(1)));
        assert!(is_boolean(&Value::from(true)));
        assert!(is_date(&Value::from(chrono::Utc::now())));
        assert!(is_buffer(&Value::Binary(vec![1, 2])));
        assert!(is_array(&Value::Sequence(vec![])));
        assert!(is_object(&Value::from(serde_json::json!({}))));
        assert!(!is_object(&Value::Null));
    }

    #[test]
    fn test_email() {
        let set = regex_set();
        assert!(set.email.is_match("alice@example.com"));
        assert!(set.email.is_match("a.b+tag@sub.example.co"));
        assert!(!set.email.is_match("alice@"));
        assert!(!set.email.is_match("not an email"));
    }

    #[test]
    fn test_guid() {
        let set = regex_set();
        assert!(set.guid.is_match("3F2504E0-4F89-11D3-9A0C-0305E82C3301"));
        assert!(set.guid.is_match("{3f2504e0-4f89-11d3-9a0c-0305e82c3301}"));
        assert!(!set.guid.is_match("3F2504E0-4F89-11D3-9A0C"));
    }

    #[test]
    fn test_hostname_and_url() {
        let set = regex_set();
        assert!(set.hostname.is_match("localhost"));
        assert!(set.hostname.is_match("api.example.com"));
        assert!(!set.hostname.is_match("-bad.example.com"));
        assert!(!set.hostname.is_match("has space.com"));

        assert!(set.url.is_match("https://example.com/path?q=1"));
        assert!(set.url.is_match("http://user:pw@localhost:8080"));
        assert!(!set.url.is_match("example.com"));
        assert!(!set.url.is_match("mailto:alice@example.com"));
    }

    #[test]
    fn test_token_and_alphanumeric() {
        let set = regex_set();
        assert!(set.token.is_match("abc_DEF-123"));
        assert!(!set.token.is_match("abc def"));
        assert!(set.alphanumeric.is_match("asdf1234"));
        assert!(set.alphanumeric.is_match("ASDF"));
        assert!(!set.alphanumeric.is_match("asdf1234-`=.,;`"));
    }
}
