//! Sender overrides applied to every outgoing message.

use super::Sender;
use crate::settings::SettingsRecord;

/// The configured sender address when the override is enabled and the
/// address is valid; otherwise `candidate`.
pub fn override_from_email(record: &SettingsRecord, candidate: &str) -> String {
    if !record.is_enabled() {
        return candidate.to_owned();
    }
    record.valid_from_email().unwrap_or(candidate).to_owned()
}

/// The configured display name when the override is enabled and the name is
/// set; otherwise `candidate`.
pub fn override_from_name(record: &SettingsRecord, candidate: &str) -> String {
    if !record.is_enabled() || record.from_name.is_empty() {
        return candidate.to_owned();
    }
    record.from_name.clone()
}

pub fn apply(record: &SettingsRecord, candidate: Sender) -> Sender {
    Sender {
        email: override_from_email(record, &candidate.email),
        name: override_from_name(record, &candidate.name),
    }
}
