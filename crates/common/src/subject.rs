use std::fmt;

use thiserror::Error;

const MAX_PLAYER_NAME_LEN: usize = 12;
const MAX_CLAN_NAME_LEN: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    #[error("name is empty")]
    Empty,
    #[error("name is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("name contains invalid character {0:?}")]
    InvalidChar(char),
}

/// What a subject names. Ledger files and data directories are namespaced by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    Player,
    Clan,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "user",
            Self::Clan => "clan",
        }
    }
}

/// A validated, normalized player or clan name.
///
/// `key` is the case-folded, trimmed and URL-encoded form used for every
/// filesystem path and upstream query; `display` keeps the trimmed input for
/// rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    kind: SubjectKind,
    key: String,
    display: String,
}

impl Subject {
    /// Player names: ASCII alphanumerics and hyphens, 1-12 characters.
    pub fn player(raw: &str) -> Result<Self, SubjectError> {
        let trimmed = raw.trim();
        validate(trimmed, MAX_PLAYER_NAME_LEN, |c| {
            c.is_ascii_alphanumeric() || c == '-'
        })?;
        Ok(Self::new(SubjectKind::Player, trimmed))
    }

    /// Clan names also allow spaces and underscores, up to 20 characters.
    pub fn clan(raw: &str) -> Result<Self, SubjectError> {
        let trimmed = raw.trim();
        validate(trimmed, MAX_CLAN_NAME_LEN, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' ')
        })?;
        Ok(Self::new(SubjectKind::Clan, trimmed))
    }

    fn new(kind: SubjectKind, trimmed: &str) -> Self {
        Self {
            kind,
            key: normalize(trimmed),
            display: trimmed.to_string(),
        }
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn display_name(&self) -> &str {
        &self.display
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

/// Case-fold, trim and URL-encode a name.
pub fn normalize(name: &str) -> String {
    urlencoding::encode(&name.trim().to_lowercase()).into_owned()
}

fn validate(name: &str, max: usize, allowed: impl Fn(char) -> bool) -> Result<(), SubjectError> {
    if name.is_empty() {
        return Err(SubjectError::Empty);
    }
    let len = name.chars().count();
    if len > max {
        return Err(SubjectError::TooLong { len, max });
    }
    match name.chars().find(|c| !allowed(*c)) {
        Some(c) => Err(SubjectError::InvalidChar(c)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_fold_to_same_key() {
        let a = Subject::player("  Berserkguard ").unwrap();
        let b = Subject::player("berserkGUARD").unwrap();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "berserkguard");
        assert_eq!(a.display_name(), "Berserkguard");
    }

    #[test]
    fn test_player_rejects_bad_names_before_io() {
        assert_eq!(Subject::player("   "), Err(SubjectError::Empty));
        assert_eq!(
            Subject::player("abcdefghijklm"),
            Err(SubjectError::TooLong { len: 13, max: 12 })
        );
        assert_eq!(
            Subject::player("../etc"),
            Err(SubjectError::InvalidChar('.'))
        );
        assert_eq!(
            Subject::player("two words"),
            Err(SubjectError::InvalidChar(' '))
        );
        assert!(Subject::player("a-1").is_ok());
        assert!(Subject::player("abcdefghijkl").is_ok());
    }

    #[test]
    fn test_clan_names_keep_spaces_encoded() {
        let clan = Subject::clan("Chronic Demise").unwrap();
        assert_eq!(clan.kind(), SubjectKind::Clan);
        assert_eq!(clan.key(), "chronic%20demise");
        assert_eq!(clan.to_string(), "clan:chronic%20demise");
    }

    #[test]
    fn test_kind_is_part_of_identity() {
        let player = Subject::player("zezima").unwrap();
        let clan = Subject::clan("zezima").unwrap();
        assert_eq!(player.key(), clan.key());
        assert_ne!(player, clan);
    }
}
