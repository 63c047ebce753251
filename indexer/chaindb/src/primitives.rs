//! Primitive identifiers shared by every indexed entity.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub use ethereum_types::{H160 as Address, H256 as Hash256};

pub type ValidatorIndex = u64;
pub type CommitteeIndex = u64;
pub type Gwei = u64;

pub const PUBLIC_KEY_BYTES_LEN: usize = 48;
pub const SIGNATURE_BYTES_LEN: usize = 96;

macro_rules! impl_slot_like {
    ($name: ident) => {
        #[derive(
            Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn as_u64(self) -> u64 {
                self.0
            }

            pub fn saturating_sub(self, other: u64) -> Self {
                Self(self.0.saturating_sub(other))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(value: $name) -> u64 {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_slot_like!(Slot);
impl_slot_like!(Epoch);

impl Slot {
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0 / slots_per_epoch.max(1))
    }
}

impl Epoch {
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(self.0.saturating_mul(slots_per_epoch))
    }
}

macro_rules! impl_fixed_bytes {
    ($name: ident, $len: expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            pub fn empty() -> Self {
                Self([0; $len])
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Returns `None` if `bytes` is not exactly the expected length.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let mut array = [0; $len];
                if bytes.len() != $len {
                    return None;
                }
                array.copy_from_slice(bytes);
                Some(Self(array))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s: String = Deserialize::deserialize(deserializer)?;
                let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s))
                    .map_err(|e| D::Error::custom(format!("invalid hex: {:?}", e)))?;
                Self::from_slice(&bytes).ok_or_else(|| {
                    D::Error::custom(format!("expected {} bytes, got {}", $len, bytes.len()))
                })
            }
        }
    };
}

impl_fixed_bytes!(PublicKeyBytes, PUBLIC_KEY_BYTES_LEN);
impl_fixed_bytes!(SignatureBytes, SIGNATURE_BYTES_LEN);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_epoch_conversions() {
        assert_eq!(Slot::new(63).epoch(32), Epoch::new(1));
        assert_eq!(Slot::new(64).epoch(32), Epoch::new(2));
        assert_eq!(Epoch::new(3).start_slot(32), Slot::new(96));
    }

    #[test]
    fn fixed_bytes_reject_wrong_length() {
        assert!(PublicKeyBytes::from_slice(&[1; 47]).is_none());
        assert!(PublicKeyBytes::from_slice(&[1; 48]).is_some());
        assert!(SignatureBytes::from_slice(&[1; 97]).is_none());
    }

    #[test]
    fn fixed_bytes_serde_hex() {
        let pk = PublicKeyBytes::from_slice(&[0xab; 48]).unwrap();
        let json = serde_json::to_string(&pk).unwrap();
        assert!(json.starts_with("\"0xabab"));
        let decoded: PublicKeyBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, pk);
    }
}
