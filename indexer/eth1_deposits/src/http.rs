//! A minimal JSON-RPC client for an eth1 endpoint.
//!
//! Only the handful of methods needed to verify the chain and pull deposit contract logs are
//! supported. There is no ABI parsing here; the event topic is hard-coded.

use crate::chain_id::Eth1Id;
use crate::endpoint::Endpoint;
use crate::errors::Error;
use chaindb::{Address, Hash256};
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

/// `keccak("DepositEvent(bytes,bytes,bytes,bytes,bytes)")`
pub const DEPOSIT_EVENT_TOPIC: &str =
    "0x649bbc62d0e31342afea4e5cd82d4049e7e1ee912fc0889aa790803be39038c5";

/// Every request carries the same id; calls are never pipelined on one connection.
pub const REQUEST_ID: u32 = 1901;
const JSONRPC_VERSION: &str = "2.0";

pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const ETH_GET_LOGS: &str = "eth_getLogs";
pub const ETH_GET_BLOCK_BY_HASH: &str = "eth_getBlockByHash";
pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";

#[derive(Serialize)]
struct JsonRequestBody<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Value,
    id: u32,
}

#[derive(Deserialize)]
struct JsonError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct JsonResponseBody {
    #[serde(default)]
    result: Value,
    error: Option<JsonError>,
}

/// A deposit contract log as returned by `eth_getLogs`.
#[derive(Debug, PartialEq, Clone)]
pub struct Log {
    pub block_number: u64,
    pub block_hash: Hash256,
    pub transaction_hash: Hash256,
    pub log_index: u64,
    pub data: Vec<u8>,
    pub removed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    block_number: String,
    block_hash: String,
    transaction_hash: String,
    log_index: String,
    data: String,
    #[serde(default)]
    removed: bool,
}

impl TryFrom<RawLog> for Log {
    type Error = String;

    fn try_from(raw: RawLog) -> Result<Self, Self::Error> {
        Ok(Log {
            block_number: hex_to_u64_be(&raw.block_number)?,
            block_hash: hex_to_hash256(&raw.block_hash)?,
            transaction_hash: hex_to_hash256(&raw.transaction_hash)?,
            log_index: hex_to_u64_be(&raw.log_index)?,
            data: hex_to_bytes(&raw.data)?,
            removed: raw.removed,
        })
    }
}

/// The fields of a transaction receipt a deposit is enriched with.
#[derive(Debug, PartialEq, Clone)]
pub struct Receipt {
    pub from: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
    pub gas_used: u64,
    /// Absent on endpoints predating EIP-1559.
    pub effective_gas_price: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    from: String,
    to: Option<String>,
    gas_used: String,
    effective_gas_price: Option<String>,
}

impl TryFrom<RawReceipt> for Receipt {
    type Error = String;

    fn try_from(raw: RawReceipt) -> Result<Self, Self::Error> {
        Ok(Receipt {
            from: hex_to_address(&raw.from)?,
            to: raw.to.as_deref().map(hex_to_address).transpose()?,
            gas_used: hex_to_u64_be(&raw.gas_used)?,
            effective_gas_price: raw
                .effective_gas_price
                .as_deref()
                .map(hex_to_u64_be)
                .transpose()?,
        })
    }
}

#[derive(Deserialize)]
struct RawBlockHeader {
    timestamp: String,
}

/// Holds a pooled HTTP client for one endpoint.
pub struct JsonRpcClient {
    client: Client,
    endpoint: Endpoint,
    max_error_body_bytes: usize,
}

impl fmt::Display for JsonRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.endpoint.fmt(f)
    }
}

impl JsonRpcClient {
    pub fn new(endpoint: Endpoint, max_error_body_bytes: usize) -> Result<Self, Error> {
        Ok(Self {
            client: Client::builder().build().map_err(Error::ClientBuild)?,
            endpoint,
            max_error_body_bytes,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn rpc_request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
        timeout: Duration,
    ) -> Result<T, Error> {
        let body = JsonRequestBody {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: REQUEST_ID,
        };

        let response = self
            .client
            .post(self.endpoint.rpc_url())
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|cause| Error::RequestFailed {
                endpoint: self.endpoint.to_string(),
                method,
                cause,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::BadStatus {
                endpoint: self.endpoint.to_string(),
                method,
                status: status.as_u16(),
                body: read_bounded_body(response, self.max_error_body_bytes).await,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|cause| Error::RequestFailed {
                endpoint: self.endpoint.to_string(),
                method,
                cause,
            })?;

        let body: JsonResponseBody = serde_json::from_slice(&bytes)
            .map_err(|e| self.invalid_response(method, format!("Invalid JSON: {}", e)))?;

        if let Some(error) = body.error {
            return Err(Error::ServerMessage {
                endpoint: self.endpoint.to_string(),
                method,
                code: error.code,
                message: error.message,
            });
        }

        if body.result.is_null() {
            return Err(Error::MissingResult {
                endpoint: self.endpoint.to_string(),
                method,
            });
        }

        serde_json::from_value(body.result)
            .map_err(|e| self.invalid_response(method, format!("Unexpected result: {}", e)))
    }

    fn invalid_response(&self, method: &'static str, reason: String) -> Error {
        Error::InvalidResponse {
            endpoint: self.endpoint.to_string(),
            method,
            reason,
        }
    }

    /// Get the eth1 chain id of the endpoint.
    pub async fn get_chain_id(&self, timeout: Duration) -> Result<Eth1Id, Error> {
        let result: String = self.rpc_request(ETH_CHAIN_ID, json!([]), timeout).await?;
        hex_to_u64_be(&result)
            .map(Into::into)
            .map_err(|reason| self.invalid_response(ETH_CHAIN_ID, reason))
    }

    /// Returns the current block number.
    pub async fn get_block_number(&self, timeout: Duration) -> Result<u64, Error> {
        let result: String = self
            .rpc_request(ETH_BLOCK_NUMBER, json!([]), timeout)
            .await?;
        hex_to_u64_be(&result).map_err(|reason| self.invalid_response(ETH_BLOCK_NUMBER, reason))
    }

    /// Returns the `DEPOSIT_EVENT_TOPIC` logs emitted by `address` in `block_range`.
    ///
    /// Both ends of the range are inclusive, as they are for `eth_getLogs`.
    pub async fn get_deposit_logs_in_range(
        &self,
        address: Address,
        block_range: RangeInclusive<u64>,
        timeout: Duration,
    ) -> Result<Vec<Log>, Error> {
        let params = json!([{
            "address": format!("{:#x}", address),
            "topics": [DEPOSIT_EVENT_TOPIC],
            "fromBlock": format!("0x{:x}", block_range.start()),
            "toBlock": format!("0x{:x}", block_range.end()),
        }]);

        let raw_logs: Vec<RawLog> = self.rpc_request(ETH_GET_LOGS, params, timeout).await?;
        raw_logs
            .into_iter()
            .map(Log::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| self.invalid_response(ETH_GET_LOGS, reason))
    }

    /// Returns the timestamp, in seconds, of the block with the given hash.
    pub async fn get_block_timestamp(
        &self,
        block_hash: Hash256,
        timeout: Duration,
    ) -> Result<u64, Error> {
        let params = json!([format!("{:#x}", block_hash), false]);
        let header: RawBlockHeader = self
            .rpc_request(ETH_GET_BLOCK_BY_HASH, params, timeout)
            .await?;
        hex_to_u64_be(&header.timestamp)
            .map_err(|reason| self.invalid_response(ETH_GET_BLOCK_BY_HASH, reason))
    }

    pub async fn get_transaction_receipt(
        &self,
        transaction_hash: Hash256,
        timeout: Duration,
    ) -> Result<Receipt, Error> {
        let params = json!([format!("{:#x}", transaction_hash)]);
        let raw: RawReceipt = self
            .rpc_request(ETH_GET_TRANSACTION_RECEIPT, params, timeout)
            .await?;
        Receipt::try_from(raw)
            .map_err(|reason| self.invalid_response(ETH_GET_TRANSACTION_RECEIPT, reason))
    }
}

/// Reads at most `limit` bytes of an error response. Read failures truncate the body.
async fn read_bounded_body(mut response: Response, limit: usize) -> String {
    let mut body = Vec::new();
    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Parses a big-endian hex quantity as a u64. The `0x` prefix is optional.
///
/// E.g., `0x01 == 1`
pub fn hex_to_u64_be(hex: &str) -> Result<u64, String> {
    let digits = strip_prefix(hex);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("Invalid hex quantity: {:?}", hex));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("Failed to parse hex as u64: {:?}", e))
}

/// Parses a hex string as bytes. The `0x` prefix is optional.
///
/// E.g., `0x0102 == vec![1, 2]`
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, String> {
    hex::decode(strip_prefix(hex)).map_err(|e| format!("Failed to parse hex as bytes: {:?}", e))
}

fn hex_to_hash256(hex: &str) -> Result<Hash256, String> {
    let bytes = hex_to_bytes(hex)?;
    if bytes.len() == Hash256::len_bytes() {
        Ok(Hash256::from_slice(&bytes))
    } else {
        Err(format!("Hash was not 32 bytes: {:?}", hex))
    }
}

fn hex_to_address(hex: &str) -> Result<Address, String> {
    let bytes = hex_to_bytes(hex)?;
    if bytes.len() == Address::len_bytes() {
        Ok(Address::from_slice(&bytes))
    } else {
        Err(format!("Address was not 20 bytes: {:?}", hex))
    }
}

fn strip_prefix(hex: &str) -> &str {
    hex.strip_prefix("0x").unwrap_or(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope() {
        let body = JsonRequestBody {
            jsonrpc: JSONRPC_VERSION,
            method: ETH_CHAIN_ID,
            params: json!([]),
            id: REQUEST_ID,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"jsonrpc":"2.0","method":"eth_chainId","params":[],"id":1901}"#
        );
    }

    #[test]
    fn hex_quantities() {
        assert_eq!(hex_to_u64_be("0x1"), Ok(1));
        assert_eq!(hex_to_u64_be("0x01"), Ok(1));
        assert_eq!(hex_to_u64_be("aa36a7"), Ok(11_155_111));
        assert_eq!(hex_to_u64_be("0xffffffffffffffff"), Ok(u64::MAX));
        assert!(hex_to_u64_be("0x10000000000000000").is_err());
        assert!(hex_to_u64_be("0x").is_err());
        assert!(hex_to_u64_be("").is_err());
        assert!(hex_to_u64_be("0x+1").is_err());
        assert!(hex_to_u64_be("0xzz").is_err());
    }

    #[test]
    fn hex_bytes() {
        assert_eq!(hex_to_bytes("0x0102"), Ok(vec![1, 2]));
        assert_eq!(hex_to_bytes("0x"), Ok(vec![]));
        assert!(hex_to_bytes("0x012").is_err());
        assert!(hex_to_hash256("0x0102").is_err());
        assert!(hex_to_address(&format!("0x{}", "11".repeat(20))).is_ok());
    }

    #[test]
    fn decode_log() {
        let raw: RawLog = serde_json::from_value(json!({
            "address": "0x00000000219ab540356cbb839cbe05303d7705fa",
            "blockNumber": "0x10",
            "blockHash": format!("0x{}", "ab".repeat(32)),
            "transactionHash": format!("0x{}", "cd".repeat(32)),
            "logIndex": "0x2",
            "data": "0x0102",
            "topics": [DEPOSIT_EVENT_TOPIC],
        }))
        .unwrap();
        let log = Log::try_from(raw).unwrap();
        assert_eq!(log.block_number, 16);
        assert_eq!(log.block_hash, Hash256::repeat_byte(0xab));
        assert_eq!(log.log_index, 2);
        assert_eq!(log.data, vec![1, 2]);
        assert!(!log.removed);
    }

    #[test]
    fn decode_receipt() {
        let raw: RawReceipt = serde_json::from_value(json!({
            "from": format!("0x{}", "11".repeat(20)),
            "to": null,
            "gasUsed": "0x5208",
            "status": "0x1",
        }))
        .unwrap();
        let receipt = Receipt::try_from(raw).unwrap();
        assert_eq!(receipt.from, Address::repeat_byte(0x11));
        assert_eq!(receipt.to, None);
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(receipt.effective_gas_price, None);
    }
}
