use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The checkpoint key of the standard blocks sub-indexer.
pub const BLOCKS_STANDARD_KEY: &str = "blocks.standard";

/// The value `latest_slot` takes before anything has been processed. Never a real slot.
pub const NOT_STARTED: i64 = -1;

fn not_started() -> i64 {
    NOT_STARTED
}

/// A progress record stored as JSON under a service key.
///
/// Records evolve additively: unknown fields in stored bytes are ignored and new fields must
/// default when absent.
pub trait MetadataRecord: Serialize + DeserializeOwned + Default + Send + Sync {
    /// Returns a reason if the record holds a value that can never be valid.
    fn invalid_reason(&self) -> Option<String> {
        None
    }
}

/// The last slot a sub-indexer has fully processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "not_started")]
    pub latest_slot: i64,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            latest_slot: NOT_STARTED,
        }
    }
}

impl Checkpoint {
    pub fn at_slot(slot: u64) -> Self {
        Self {
            latest_slot: i64::try_from(slot).unwrap_or(i64::MAX),
        }
    }

    /// The latest processed slot, or `None` if nothing was processed.
    pub fn latest_slot(&self) -> Option<u64> {
        u64::try_from(self.latest_slot).ok()
    }

    /// The first slot that still needs processing.
    pub fn next_slot(&self) -> u64 {
        self.latest_slot().map_or(0, |slot| slot.saturating_add(1))
    }
}

impl MetadataRecord for Checkpoint {
    fn invalid_reason(&self) -> Option<String> {
        (self.latest_slot < NOT_STARTED)
            .then(|| format!("latest_slot {} is below {}", self.latest_slot, NOT_STARTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        let json = serde_json::to_string(&Checkpoint::at_slot(1000)).unwrap();
        assert_eq!(json, r#"{"latest_slot":1000}"#);
        let default = serde_json::to_string(&Checkpoint::default()).unwrap();
        assert_eq!(default, r#"{"latest_slot":-1}"#);
    }

    #[test]
    fn additive_schema() {
        let checkpoint: Checkpoint =
            serde_json::from_str(r#"{"latest_slot":12,"latest_epoch":0}"#).unwrap();
        assert_eq!(checkpoint, Checkpoint::at_slot(12));
        let checkpoint: Checkpoint = serde_json::from_str("{}").unwrap();
        assert_eq!(checkpoint, Checkpoint::default());
    }

    #[test]
    fn next_slot() {
        assert_eq!(Checkpoint::default().next_slot(), 0);
        assert_eq!(Checkpoint::default().latest_slot(), None);
        assert_eq!(Checkpoint::at_slot(41).next_slot(), 42);
    }

    #[test]
    fn sentinel_is_the_only_negative() {
        assert!(Checkpoint::default().invalid_reason().is_none());
        assert!(Checkpoint { latest_slot: -2 }.invalid_reason().is_some());
    }
}
