use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Score value with validation
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Score(f32);

impl Score {
    pub fn new(value: f32) -> Result<Self, &'static str> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err("Score must be between 0.0 and 1.0")
        }
    }

    /// Clamp an arbitrary finite value into `[0, 1]`.
    pub fn clamped(value: f32) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self(0.0)
        }
    }

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::zero()
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Build the `"<vault_id>/<folder>"` key used for folder scoping.
pub fn folder_key(vault_id: i64, folder: &str) -> String {
    format!("{}/{}", vault_id, folder)
}

/// Split a `"<vault_id>/<folder>"` key back into its parts.
///
/// The folder part may be empty (root-level notes).
pub fn split_folder_key(key: &str) -> Option<(i64, &str)> {
    let (id, folder) = key.split_once('/')?;
    let vault_id = id.parse().ok()?;
    Some((vault_id, folder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rejects_out_of_range() {
        assert!(Score::new(1.2).is_err());
        assert!(Score::new(-0.1).is_err());
        assert!(Score::new(f32::NAN).is_err());
        assert_eq!(Score::clamped(1.2).value(), 1.0);
        assert_eq!(Score::clamped(-3.0).value(), 0.0);
    }

    #[test]
    fn folder_key_round_trips() {
        let key = folder_key(3, "projects/alpha");
        assert_eq!(key, "3/projects/alpha");
        assert_eq!(split_folder_key(&key), Some((3, "projects/alpha")));
    }

    #[test]
    fn folder_key_allows_empty_folder() {
        let key = folder_key(1, "");
        assert_eq!(split_folder_key(&key), Some((1, "")));
    }

    #[test]
    fn split_rejects_garbage() {
        assert_eq!(split_folder_key("projects"), None);
        assert_eq!(split_folder_key("x/projects"), None);
    }
}
