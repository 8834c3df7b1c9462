//! Email address checks and HTML escaping for user-visible text.

use std::sync::LazyLock;

use regex::Regex;

static LOCAL_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~.-]+$").expect("static regex"));

static LOCAL_PART_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9!#$%&'*+/=?^_`{|}~.-]").expect("static regex"));

static DOMAIN_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9-]+$").expect("static regex"));

static DOMAIN_LABEL_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[^a-z0-9-]+").expect("static regex"));

static REPEATED_DOTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{2,}").expect("static regex"));

const WHITESPACE: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Split at the first `@`. Some `@` must appear past the first byte.
fn split_address(value: &str) -> Option<(&str, &str)> {
    if !value.bytes().skip(1).any(|b| b == b'@') {
        return None;
    }
    value.split_once('@')
}

/// Syntactic address check: printable local part, at least two dot-separated
/// alphanumeric domain labels, no label starting or ending with a hyphen.
pub fn is_email(value: &str) -> bool {
    if value.len() < 6 {
        return false;
    }
    let Some((local, domain)) = split_address(value) else {
        return false;
    };

    if !LOCAL_PART.is_match(local) {
        return false;
    }
    if REPEATED_DOTS.is_match(domain) {
        return false;
    }
    if domain.trim_matches(|c| WHITESPACE.contains(&c) || c == '.') != domain {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        label.trim_matches(|c| WHITESPACE.contains(&c) || c == '-') == *label
            && DOMAIN_LABEL.is_match(label)
    })
}

/// Strip characters that cannot appear in an address. Returns an empty
/// string when what remains is not address-shaped.
pub fn sanitize_email(value: &str) -> String {
    if value.len() < 6 {
        return String::new();
    }
    let Some((local, domain)) = split_address(value) else {
        return String::new();
    };

    let local = LOCAL_PART_INVALID.replace_all(local, "");
    if local.is_empty() {
        return String::new();
    }

    let domain = REPEATED_DOTS.replace_all(domain, "");
    let domain = domain.trim_matches(|c| WHITESPACE.contains(&c) || c == '.');
    if domain.is_empty() {
        return String::new();
    }

    let labels: Vec<String> = domain
        .split('.')
        .map(|label| {
            let label = label.trim_matches(|c| WHITESPACE.contains(&c) || c == '-');
            DOMAIN_LABEL_INVALID.replace_all(label, "").into_owned()
        })
        .filter(|label| !label.is_empty())
        .collect();
    if labels.len() < 2 {
        return String::new();
    }

    format!("{local}@{}", labels.join("."))
}

/// Escape text for inclusion in HTML element content or attributes.
pub fn esc_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}
