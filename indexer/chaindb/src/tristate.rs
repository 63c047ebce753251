//! Three-valued flags for facts that are provisional until the canonical chain settles.
//!
//! Both types serialize as `null`, `true` or `false` so that "not yet known" is never confused
//! with a negative answer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical status of a block, and by inheritance of everything included in it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Canonicality {
    /// No canonical-chain pass has classified this block yet.
    #[default]
    Unknown,
    /// Confirmed part of the canonical chain.
    Canonical,
    /// Confirmed reorged out.
    Orphaned,
}

impl Canonicality {
    pub fn is_known(self) -> bool {
        self != Canonicality::Unknown
    }

    pub fn is_canonical(self) -> bool {
        self == Canonicality::Canonical
    }

    pub fn as_option(self) -> Option<bool> {
        self.into()
    }
}

impl From<bool> for Canonicality {
    fn from(canonical: bool) -> Self {
        if canonical {
            Canonicality::Canonical
        } else {
            Canonicality::Orphaned
        }
    }
}

impl From<Option<bool>> for Canonicality {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Canonicality::Unknown, Into::into)
    }
}

impl From<Canonicality> for Option<bool> {
    fn from(value: Canonicality) -> Self {
        match value {
            Canonicality::Unknown => None,
            Canonicality::Canonical => Some(true),
            Canonicality::Orphaned => Some(false),
        }
    }
}

impl fmt::Display for Canonicality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Canonicality::Unknown => write!(f, "unknown"),
            Canonicality::Canonical => write!(f, "canonical"),
            Canonicality::Orphaned => write!(f, "orphaned"),
        }
    }
}

/// A boolean fact that may not be computable yet, e.g. whether an attestation voted for the
/// correct head.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Tristate {
    #[default]
    Unknown,
    True,
    False,
}

impl Tristate {
    pub fn is_known(self) -> bool {
        self != Tristate::Unknown
    }

    pub fn as_option(self) -> Option<bool> {
        self.into()
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Tristate::Unknown, Into::into)
    }
}

impl From<Tristate> for Option<bool> {
    fn from(value: Tristate) -> Self {
        match value {
            Tristate::Unknown => None,
            Tristate::True => Some(true),
            Tristate::False => Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_not_false() {
        assert_ne!(Canonicality::default(), Canonicality::Orphaned);
        assert_ne!(Tristate::default(), Tristate::False);
        assert!(!Canonicality::Unknown.is_known());
        assert!(!Tristate::Unknown.is_known());
    }

    #[test]
    fn serializes_as_nullable_bool() {
        assert_eq!(serde_json::to_string(&Canonicality::Unknown).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Canonicality::Canonical).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Canonicality::Orphaned).unwrap(), "false");
        assert_eq!(
            serde_json::from_str::<Tristate>("false").unwrap(),
            Tristate::False
        );
        assert_eq!(
            serde_json::from_str::<Tristate>("null").unwrap(),
            Tristate::Unknown
        );
    }
}
