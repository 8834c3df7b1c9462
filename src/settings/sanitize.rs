//! Normalisation of a submitted settings form into a canonical record.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::SettingsRecord;
use crate::mail::address::sanitize_email;

/// Raw form submission as received from the client.
pub type RawSettings = serde_json::Map<String, Value>;

const ALLOWED_SECURE: &[&str] = &["", "tls", "ssl"];

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*?>.*?</(script|style)>").expect("static regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n\t ]+").expect("static regex"));
static OCTET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%[a-f0-9]{2}").expect("static regex"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("static regex"));

/// Build a complete record from a submission. An absent or empty password
/// keeps the one in `previous`; a non-empty one is stored verbatim.
pub fn sanitize(raw: &RawSettings, previous: Option<&SettingsRecord>) -> SettingsRecord {
    let submitted_pass = text(raw, "smtp_pass");
    let smtp_pass = if submitted_pass.is_empty() {
        previous.map(|p| p.smtp_pass.clone()).unwrap_or_default()
    } else {
        submitted_pass
    };

    let secure = text(raw, "smtp_secure");
    let smtp_secure = if ALLOWED_SECURE.contains(&secure.as_str()) {
        secure
    } else {
        "tls".to_owned()
    };

    SettingsRecord {
        smtp_host: clean_text(&text(raw, "smtp_host")),
        smtp_port: non_negative_int(&text(raw, "smtp_port")).to_string(),
        smtp_auth: flag(raw, "smtp_auth"),
        smtp_user: clean_text(&text(raw, "smtp_user")),
        smtp_pass,
        smtp_secure,
        from_email: sanitize_email(&text(raw, "from_email")),
        from_name: clean_text(&text(raw, "from_name")),
        enable_smtp: flag(raw, "enable_smtp"),
        admin_email: sanitize_email(&text(raw, "admin_email")),
        test_email: sanitize_email(&text(raw, "test_email")),
    }
}

/// Scalar form value as text. Absent, null and structured values are empty.
fn text(raw: &RawSettings, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(true)) => "1".to_owned(),
        _ => String::new(),
    }
}

/// Checkbox semantics: a present, non-null key means checked.
fn flag(raw: &RawSettings, key: &str) -> String {
    let checked = raw.get(key).is_some_and(|v| !v.is_null());
    String::from(if checked { "1" } else { "0" })
}

/// Leading decimal integer of the trimmed value. Negative, missing or
/// overflowing input yields `0`.
pub fn non_negative_int(value: &str) -> u64 {
    let value = value.trim();
    let digits = value.strip_prefix('+').unwrap_or(value);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().unwrap_or(0)
}

/// Single-line plain text: tags removed, whitespace collapsed, stray
/// percent-encoded octets dropped.
pub fn clean_text(value: &str) -> String {
    let mut out = value.to_owned();

    if out.contains('<') {
        out = SCRIPT_OR_STYLE.replace_all(&out, "").into_owned();
        out = TAG.replace_all(&out, "").into_owned();
        out = out.replace('<', "&lt;");
    }

    out = WHITESPACE_RUN.replace_all(&out, " ").trim().to_owned();

    let mut stripped = false;
    while OCTET.is_match(&out) {
        out = OCTET.replace_all(&out, "").into_owned();
        stripped = true;
    }
    if stripped {
        out = SPACE_RUN.replace_all(&out, " ").trim().to_owned();
    }

    out
}
