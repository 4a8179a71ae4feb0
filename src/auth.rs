use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

/// Fields posted by the login form. A 307 from /register re-posts the
/// registration form here, so extra fields (email) are ignored.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Fields posted by the registration form.
#[derive(Debug, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A salted password hash, stored as `salt$hexdigest`.
pub struct PwHash(String);

impl PwHash {
    pub fn new(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        Self::with_salt(&salt, password)
    }

    fn with_salt(salt: &str, password: &str) -> Self {
        let digest = sha256::digest(format!("{salt}:{password}"));
        Self(format!("{salt}${digest}"))
    }

    pub fn matches(&self, password: &str) -> bool {
        let Some((salt, _)) = self.0.split_once('$') else {
            return false;
        };

        let candidate = Self::with_salt(salt, password);
        constant_time_eq(self.0.as_bytes(), candidate.0.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PwHash {
    fn from(stored: String) -> Self {
        Self(stored)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for SessionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        Uuid::try_parse(s).map(Self).map_err(|_| ())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0.as_simple())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pwhash_roundtrip() {
        let hash = PwHash::new("pw123");

        assert!(hash.matches("pw123"));
        assert!(!hash.matches("pw124"));
        assert!(!hash.matches(""));
    }

    #[test]
    fn pwhash_salts_differ() {
        let a = PwHash::new("pw123");
        let b = PwHash::new("pw123");

        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn stored_hash_verifies() {
        let stored = PwHash::new("hunter2").as_str().to_string();

        assert!(PwHash::from(stored).matches("hunter2"));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!PwHash::from("no-dollar-here".to_string()).matches("anything"));
    }

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();

        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }
}
