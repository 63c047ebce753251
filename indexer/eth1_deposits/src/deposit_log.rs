use crate::http::{Log, Receipt};
use chaindb::types::Eth1Deposit;
use chaindb::{Address, Gwei, Hash256, PublicKeyBytes, SignatureBytes};

/// The following constants define the layout of bytes in the deposit contract `DepositEvent`. The
/// event bytes are formatted according to the Ethereum ABI.
const PUBKEY_START: usize = 192;
const PUBKEY_LEN: usize = 48;
const CREDS_START: usize = PUBKEY_START + 64 + 32;
const CREDS_LEN: usize = 32;
const AMOUNT_START: usize = CREDS_START + 32 + 32;
const AMOUNT_LEN: usize = 8;
const SIG_START: usize = AMOUNT_START + 32 + 32;
const SIG_LEN: usize = 96;
const INDEX_START: usize = SIG_START + 96 + 32;
const INDEX_LEN: usize = 8;

/// A fully parsed eth1 deposit contract log, not yet tied to its block and transaction.
#[derive(Debug, PartialEq, Clone)]
pub struct DepositLog {
    pub block_number: u64,
    pub block_hash: Hash256,
    pub transaction_hash: Hash256,
    pub log_index: u64,
    /// The index included with the deposit log.
    pub index: u64,
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: Vec<u8>,
    pub amount: Gwei,
    pub signature: SignatureBytes,
}

impl DepositLog {
    /// Attempts to parse a raw `Log` from the deposit contract into a `DepositLog`.
    pub fn from_log(log: &Log) -> Result<Self, String> {
        let bytes = &log.data;

        let pubkey = bytes
            .get(PUBKEY_START..PUBKEY_START + PUBKEY_LEN)
            .ok_or_else(|| "Insufficient bytes for pubkey".to_string())?;
        let withdrawal_credentials = bytes
            .get(CREDS_START..CREDS_START + CREDS_LEN)
            .ok_or_else(|| "Insufficient bytes for withdrawal credential".to_string())?;
        let amount = bytes
            .get(AMOUNT_START..AMOUNT_START + AMOUNT_LEN)
            .ok_or_else(|| "Insufficient bytes for amount".to_string())?;
        let signature = bytes
            .get(SIG_START..SIG_START + SIG_LEN)
            .ok_or_else(|| "Insufficient bytes for signature".to_string())?;
        let index = bytes
            .get(INDEX_START..INDEX_START + INDEX_LEN)
            .ok_or_else(|| "Insufficient bytes for index".to_string())?;

        Ok(DepositLog {
            block_number: log.block_number,
            block_hash: log.block_hash,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
            index: u64_from_le_bytes(index)?,
            pubkey: PublicKeyBytes::from_slice(pubkey)
                .ok_or_else(|| "Invalid pubkey length".to_string())?,
            withdrawal_credentials: withdrawal_credentials.to_vec(),
            amount: u64_from_le_bytes(amount)?,
            signature: SignatureBytes::from_slice(signature)
                .ok_or_else(|| "Invalid signature length".to_string())?,
        })
    }

    /// Combines the log with its block timestamp and transaction receipt.
    pub fn into_eth1_deposit(self, block_timestamp: u64, receipt: &Receipt) -> Eth1Deposit {
        Eth1Deposit {
            eth1_block_number: self.block_number,
            eth1_block_hash: self.block_hash,
            eth1_block_timestamp: block_timestamp,
            eth1_tx_hash: self.transaction_hash,
            eth1_log_index: self.log_index,
            eth1_sender: receipt.from,
            eth1_recipient: receipt.to.unwrap_or_else(Address::zero),
            eth1_gas_used: receipt.gas_used,
            eth1_gas_price: receipt.effective_gas_price.unwrap_or(0),
            deposit_index: self.index,
            validator_pubkey: self.pubkey,
            withdrawal_credentials: self.withdrawal_credentials,
            signature: self.signature,
            amount: self.amount,
        }
    }
}

/// The deposit contract encodes integers little-endian, unlike the JSON-RPC.
fn u64_from_le_bytes(bytes: &[u8]) -> Result<u64, String> {
    bytes
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| format!("Expected 8 bytes, got {}", bytes.len()))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// The data from a deposit event, using the v0.8.3 version of the deposit contract.
    pub const EXAMPLE_LOG: &[u8] = &[
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 160, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 1, 64, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 1, 128, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 48, 167, 108, 6, 69, 88, 17, 3, 51, 6, 4, 158, 232, 82,
        248, 218, 2, 71, 219, 55, 102, 86, 125, 136, 203, 36, 77, 64, 213, 43, 52, 175, 154, 239,
        50, 142, 52, 201, 77, 54, 239, 0, 229, 22, 46, 139, 120, 62, 240, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 0, 64, 89, 115, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 96, 140, 74, 175, 158, 209, 20, 206,
        30, 63, 215, 238, 113, 60, 132, 216, 211, 100, 186, 202, 71, 34, 200, 160, 225, 212, 213,
        119, 88, 51, 80, 101, 74, 2, 45, 78, 153, 12, 192, 44, 51, 77, 40, 10, 72, 246, 34, 193,
        187, 22, 95, 4, 211, 245, 224, 13, 162, 21, 163, 54, 225, 22, 124, 3, 56, 14, 81, 122, 189,
        149, 250, 251, 159, 22, 77, 94, 157, 197, 196, 253, 110, 201, 88, 193, 246, 136, 226, 221,
        18, 113, 232, 105, 100, 114, 103, 237, 189, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    fn example_log() -> Log {
        Log {
            block_number: 42,
            block_hash: Hash256::repeat_byte(0x42),
            transaction_hash: Hash256::repeat_byte(0x43),
            log_index: 3,
            data: EXAMPLE_LOG.to_vec(),
            removed: false,
        }
    }

    #[test]
    fn can_parse_example_log() {
        let deposit = DepositLog::from_log(&example_log()).expect("should decode log");
        assert_eq!(deposit.index, 7);
        assert_eq!(deposit.amount, 32_000_000_000);
        assert_eq!(deposit.withdrawal_credentials, vec![0; 32]);
        assert_eq!(deposit.pubkey.as_bytes()[..2], [0xa7, 0x6c]);
        assert_eq!(deposit.signature.as_bytes()[..2], [0x8c, 0x4a]);
        assert_eq!(deposit.block_number, 42);
        assert_eq!(deposit.log_index, 3);
    }

    #[test]
    fn truncated_log_is_rejected() {
        let mut log = example_log();
        log.data.truncate(INDEX_START + 4);
        assert!(DepositLog::from_log(&log).is_err());
    }

    #[test]
    fn enrich_with_receipt() {
        let receipt = Receipt {
            from: Address::repeat_byte(1),
            to: None,
            gas_used: 50_000,
            effective_gas_price: Some(7),
        };
        let deposit = DepositLog::from_log(&example_log())
            .unwrap()
            .into_eth1_deposit(1_600_000_000, &receipt);
        assert_eq!(deposit.key(), (Hash256::repeat_byte(0x42), 3));
        assert_eq!(deposit.eth1_block_timestamp, 1_600_000_000);
        assert_eq!(deposit.eth1_sender, Address::repeat_byte(1));
        assert_eq!(deposit.eth1_recipient, Address::zero());
        assert_eq!(deposit.eth1_gas_price, 7);
        assert_eq!(deposit.deposit_index, 7);
    }
}
