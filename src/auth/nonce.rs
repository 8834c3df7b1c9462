//! Action-scoped authenticity tokens for state-changing admin requests.
//!
//! A nonce is `"{salt}.{tag}"` where `tag = HMAC-SHA256(key, "{tick}|{action}|{principal}|{salt}")`
//! and `tick` counts 12-hour windows since the epoch. Verification accepts the
//! current and the previous tick.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TICK_SECS: i64 = 12 * 60 * 60;

const SALT_BYTES: usize = 8;

#[derive(Clone)]
pub struct NonceKey {
    mac: HmacSha256,
}

impl fmt::Debug for NonceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceKey").field("mac", &"[redacted]").finish()
    }
}

impl NonceKey {
    /// Key from a configured secret, or a random per-process key when absent.
    pub fn from_secret(secret: Option<&str>) -> anyhow::Result<Self> {
        let mac = match secret {
            Some(secret) => HmacSha256::new_from_slice(secret.as_bytes()),
            None => {
                let mut bytes = [0u8; 32];
                rand::fill(&mut bytes);
                HmacSha256::new_from_slice(&bytes)
            }
        }
        .map_err(|e| anyhow::anyhow!("invalid nonce key: {e}"))?;
        Ok(Self { mac })
    }

    pub fn issue(&self, action: &str, principal: &str) -> String {
        self.issue_at(action, principal, chrono::Utc::now().timestamp())
    }

    pub fn verify(&self, nonce: &str, action: &str, principal: &str) -> bool {
        self.verify_at(nonce, action, principal, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, action: &str, principal: &str, now: i64) -> String {
        let mut salt = [0u8; SALT_BYTES];
        rand::fill(&mut salt);
        let salt = hex::encode(salt);
        let tag = self.tag(tick(now), action, principal, &salt).finalize();
        format!("{salt}.{}", hex::encode(tag.into_bytes()))
    }

    pub fn verify_at(&self, nonce: &str, action: &str, principal: &str, now: i64) -> bool {
        let Some((salt, tag)) = nonce.split_once('.') else {
            return false;
        };
        if salt.len() != SALT_BYTES * 2 {
            return false;
        }
        let Ok(tag) = hex::decode(tag) else {
            return false;
        };

        let current = tick(now);
        [current, current - 1].into_iter().any(|t| {
            self.tag(t, action, principal, salt)
                .verify_slice(&tag)
                .is_ok()
        })
    }

    fn tag(&self, tick: i64, action: &str, principal: &str, salt: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(format!("{tick}|{action}|{principal}|{salt}").as_bytes());
        mac
    }
}

fn tick(now: i64) -> i64 {
    now.div_euclid(TICK_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn key() -> NonceKey {
        NonceKey::from_secret(Some("test-secret")).unwrap()
    }

    #[test]
    fn issued_nonce_verifies() {
        let key = key();
        let nonce = key.issue_at("smtp_settings_save", "admin", NOW);
        assert!(key.verify_at(&nonce, "smtp_settings_save", "admin", NOW));
    }

    #[test]
    fn every_issue_is_fresh() {
        let key = key();
        let a = key.issue_at("smtp_settings_save", "admin", NOW);
        let b = key.issue_at("smtp_settings_save", "admin", NOW);
        assert_ne!(a, b);
        assert!(key.verify_at(&a, "smtp_settings_save", "admin", NOW));
        assert!(key.verify_at(&b, "smtp_settings_save", "admin", NOW));
    }

    #[test]
    fn bound_to_action_and_principal() {
        let key = key();
        let nonce = key.issue_at("smtp_settings_save", "admin", NOW);
        assert!(!key.verify_at(&nonce, "smtp_test_email", "admin", NOW));
        assert!(!key.verify_at(&nonce, "smtp_settings_save", "other", NOW));
        assert!(!key.verify_at(&nonce, "smtp_settings_save", "", NOW));
    }

    #[test]
    fn previous_tick_accepted_older_rejected() {
        let key = key();
        let nonce = key.issue_at("a", "p", NOW);
        assert!(key.verify_at(&nonce, "a", "p", NOW + TICK_SECS));
        assert!(!key.verify_at(&nonce, "a", "p", NOW + 2 * TICK_SECS));
        assert!(!key.verify_at(&nonce, "a", "p", NOW - TICK_SECS));
    }

    #[test]
    fn different_keys_do_not_cross_verify() {
        let nonce = key().issue_at("a", "p", NOW);
        let other = NonceKey::from_secret(None).unwrap();
        assert!(!other.verify_at(&nonce, "a", "p", NOW));
    }

    #[test]
    fn malformed_nonces_rejected() {
        let key = key();
        for nonce in ["", "abc", ".", "0011223344556677.", "0011223344556677.zz", "short.00"] {
            assert!(!key.verify_at(nonce, "a", "p", NOW), "{nonce:?}");
        }
    }

    #[test]
    fn tampered_tag_rejected() {
        let key = key();
        let mut nonce = key.issue_at("a", "p", NOW);
        let last = nonce.pop().unwrap();
        nonce.push(if last == '0' { '1' } else { '0' });
        assert!(!key.verify_at(&nonce, "a", "p", NOW));
    }

    #[test]
    fn debug_redacts_key() {
        assert!(format!("{:?}", key()).contains("[redacted]"));
    }

    #[test]
    fn wall_clock_round_trip() {
        let key = key();
        let nonce = key.issue("smtp_test_email", "admin");
        assert!(key.verify(&nonce, "smtp_test_email", "admin"));
    }
}
