//! Advisory configuration checks shown next to the settings form.

use std::sync::LazyLock;

use regex::Regex;

use super::SettingsRecord;
use crate::mail::address::{esc_html, is_email};

pub const HOST_MISSING: &str = "Nie skonfigurowano serwera SMTP.";
pub const PORT_INVALID: &str = "Port SMTP jest nieprawidłowy.";
pub const FROM_MISSING: &str = "Adres e-mail nadawcy nie jest ustawiony.";
pub const FROM_INVALID: &str = "Adres e-mail nadawcy jest nieprawidłowy: ";
pub const USER_MISSING: &str = "Włączono uwierzytelnianie, ale nie podano nazwy użytkownika.";
pub const PASS_MISSING: &str = "Włączono uwierzytelnianie, ale nie podano hasła.";
pub const ADMIN_EMAIL_INVALID: &str = "Adres e-mail do testów jest nieprawidłowy: ";

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").expect("static regex")
});

/// Decimal numeric string: optional sign, digits with optional fraction or
/// exponent, surrounding whitespace allowed.
pub fn is_numeric(value: &str) -> bool {
    NUMERIC.is_match(value)
}

/// A numeric string whose value is zero (`"0"`, `"0.0"`, `"-0"`, `"0e5"`).
fn is_zero(value: &str) -> bool {
    let mantissa = value.split(['e', 'E']).next().unwrap_or_default();
    !mantissa.chars().any(|c| matches!(c, '1'..='9'))
}

/// A port counts as unset when it is empty, non-numeric or zero. The
/// sanitizer stores unusable input as `"0"`.
pub fn port_missing(value: &str) -> bool {
    value.is_empty() || !is_numeric(value) || is_zero(value)
}

/// List configuration problems in a fixed order. A disabled configuration is
/// never flagged. Offending values are HTML-escaped.
pub fn issues(record: &SettingsRecord) -> Vec<String> {
    let mut issues = Vec::new();

    if !record.is_enabled() {
        return issues;
    }

    if record.smtp_host.is_empty() {
        issues.push(HOST_MISSING.to_owned());
    }

    if port_missing(&record.smtp_port) {
        issues.push(PORT_INVALID.to_owned());
    }

    if record.from_email.is_empty() {
        issues.push(FROM_MISSING.to_owned());
    } else if !is_email(&record.from_email) {
        issues.push(format!("{FROM_INVALID}{}", esc_html(&record.from_email)));
    }

    if record.auth_enabled() {
        if record.smtp_user.is_empty() {
            issues.push(USER_MISSING.to_owned());
        }
        if record.smtp_pass.is_empty() {
            issues.push(PASS_MISSING.to_owned());
        }
    }

    if !record.admin_email.is_empty() && !is_email(&record.admin_email) {
        issues.push(format!(
            "{ADMIN_EMAIL_INVALID}{}",
            esc_html(&record.admin_email)
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid_enabled() -> SettingsRecord {
        SettingsRecord {
            smtp_host: "smtp.example.com".into(),
            smtp_port: "587".into(),
            smtp_auth: "1".into(),
            smtp_user: "mailer".into(),
            smtp_pass: "secret".into(),
            smtp_secure: "tls".into(),
            from_email: "mailer@example.com".into(),
            from_name: "Example".into(),
            enable_smtp: "1".into(),
            admin_email: "admin@example.com".into(),
            test_email: String::new(),
        }
    }

    #[test]
    fn valid_enabled_record_has_no_issues() {
        assert!(issues(&valid_enabled()).is_empty());
    }

    #[test]
    fn disabled_record_never_flagged() {
        let record = SettingsRecord {
            smtp_host: String::new(),
            smtp_port: "abc".into(),
            smtp_auth: "1".into(),
            from_email: "broken".into(),
            admin_email: "broken".into(),
            enable_smtp: "0".into(),
            ..SettingsRecord::default()
        };
        assert!(issues(&record).is_empty());
    }

    #[test]
    fn missing_host_only() {
        let record = SettingsRecord {
            enable_smtp: "1".into(),
            smtp_host: String::new(),
            smtp_port: "587".into(),
            from_email: "a@b.com".into(),
            smtp_auth: "0".into(),
            ..SettingsRecord::default()
        };
        assert_eq!(issues(&record), vec!["Nie skonfigurowano serwera SMTP.".to_owned()]);
    }

    #[test]
    fn auth_without_credentials_lists_user_then_password() {
        let record = SettingsRecord {
            smtp_user: String::new(),
            smtp_pass: String::new(),
            ..valid_enabled()
        };
        assert_eq!(issues(&record), vec![USER_MISSING.to_owned(), PASS_MISSING.to_owned()]);
    }

    #[test]
    fn credentials_ignored_when_auth_disabled() {
        let record = SettingsRecord {
            smtp_auth: "0".into(),
            smtp_user: String::new(),
            smtp_pass: String::new(),
            ..valid_enabled()
        };
        assert!(issues(&record).is_empty());
    }

    #[test]
    fn missing_from_email_reported_without_format_error() {
        let record = SettingsRecord {
            from_email: String::new(),
            ..valid_enabled()
        };
        assert_eq!(issues(&record), vec![FROM_MISSING.to_owned()]);
    }

    #[test]
    fn invalid_addresses_are_escaped() {
        let record = SettingsRecord {
            from_email: "<b>bad".into(),
            admin_email: "x&y".into(),
            ..valid_enabled()
        };
        assert_eq!(
            issues(&record),
            vec![
                format!("{FROM_INVALID}&lt;b&gt;bad"),
                format!("{ADMIN_EMAIL_INVALID}x&amp;y"),
            ]
        );
    }

    #[test]
    fn every_rule_in_fixed_order() {
        let record = SettingsRecord {
            enable_smtp: "1".into(),
            smtp_host: String::new(),
            smtp_port: String::new(),
            from_email: "nope".into(),
            smtp_auth: "1".into(),
            smtp_user: String::new(),
            smtp_pass: String::new(),
            admin_email: "nope".into(),
            ..SettingsRecord::default()
        };
        assert_eq!(
            issues(&record),
            vec![
                HOST_MISSING.to_owned(),
                PORT_INVALID.to_owned(),
                format!("{FROM_INVALID}nope"),
                USER_MISSING.to_owned(),
                PASS_MISSING.to_owned(),
                format!("{ADMIN_EMAIL_INVALID}nope"),
            ]
        );
    }

    #[rstest]
    #[case("587", true)]
    #[case("0", true)]
    #[case(" 25 ", true)]
    #[case("+465", true)]
    #[case("1e3", true)]
    #[case("2.5", true)]
    #[case(".5", true)]
    #[case("", false)]
    #[case("abc", false)]
    #[case("587abc", false)]
    #[case("0x1A", false)]
    #[case("1 2", false)]
    fn numeric_strings(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_numeric(value), expected, "is_numeric({value:?})");
    }

    #[test]
    fn non_numeric_port_flagged() {
        let record = SettingsRecord {
            smtp_port: "smtp".into(),
            ..valid_enabled()
        };
        assert_eq!(issues(&record), vec![PORT_INVALID.to_owned()]);
    }

    #[rstest]
    #[case("587", false)]
    #[case("1e3", false)]
    #[case("0.5", false)]
    #[case("0", true)]
    #[case(" 0 ", true)]
    #[case("-0", true)]
    #[case("0.0", true)]
    #[case("0e5", true)]
    #[case("", true)]
    #[case("abc", true)]
    fn port_missing_cases(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(port_missing(value), expected, "port_missing({value:?})");
    }

    #[test]
    fn zero_port_flagged() {
        let record = SettingsRecord {
            smtp_port: "0".into(),
            ..valid_enabled()
        };
        assert_eq!(issues(&record), vec![PORT_INVALID.to_owned()]);
    }

    #[test]
    fn unusable_port_flagged_after_sanitizing() {
        let raw = serde_json::json!({ "smtp_port": "abc" });
        let serde_json::Value::Object(raw) = raw else {
            unreachable!()
        };
        let record = SettingsRecord {
            smtp_port: crate::settings::sanitize::sanitize(&raw, None).smtp_port,
            ..valid_enabled()
        };
        assert_eq!(record.smtp_port, "0");
        assert_eq!(issues(&record), vec![PORT_INVALID.to_owned()]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_record(enable: &'static str) -> impl Strategy<Value = SettingsRecord> {
            (
                ".{0,20}",
                ".{0,6}",
                prop_oneof![Just("0"), Just("1"), Just("")],
                ".{0,10}",
                ".{0,10}",
                prop_oneof![Just(""), Just("tls"), Just("ssl"), Just("bogus")],
                ".{0,20}",
                ".{0,20}",
            )
                .prop_map(move |(host, port, auth, user, pass, secure, from, admin)| {
                    SettingsRecord {
                        smtp_host: host,
                        smtp_port: port,
                        smtp_auth: auth.to_owned(),
                        smtp_user: user,
                        smtp_pass: pass,
                        smtp_secure: secure.to_owned(),
                        from_email: from,
                        from_name: String::new(),
                        enable_smtp: enable.to_owned(),
                        admin_email: admin,
                        test_email: String::new(),
                    }
                })
        }

        proptest! {
            #[test]
            fn disabled_records_have_no_issues(record in arb_record("0")) {
                prop_assert!(issues(&record).is_empty());
            }

            #[test]
            fn enabled_records_never_exceed_rule_count(record in arb_record("1")) {
                prop_assert!(issues(&record).len() <= 6);
            }
        }
    }
}
