use crate::errors::Error;
use crate::http::JsonRpcClient;
use serde::{Deserialize, Serialize};
use slog::{debug, warn, Logger};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Represents an eth1 chain id.
///
/// Serialized as the bare number so configuration files read naturally. Two ids are equal when
/// they name the same number, so `Custom(5) == Goerli`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum Eth1Id {
    Mainnet,
    Goerli,
    Sepolia,
    Holesky,
    Custom(u64),
}

impl From<Eth1Id> for u64 {
    fn from(id: Eth1Id) -> u64 {
        match id {
            Eth1Id::Mainnet => 1,
            Eth1Id::Goerli => 5,
            Eth1Id::Sepolia => 11_155_111,
            Eth1Id::Holesky => 17_000,
            Eth1Id::Custom(id) => id,
        }
    }
}

impl From<u64> for Eth1Id {
    fn from(id: u64) -> Self {
        let into = |x: Eth1Id| -> u64 { x.into() };
        match id {
            id if id == into(Eth1Id::Mainnet) => Eth1Id::Mainnet,
            id if id == into(Eth1Id::Goerli) => Eth1Id::Goerli,
            id if id == into(Eth1Id::Sepolia) => Eth1Id::Sepolia,
            id if id == into(Eth1Id::Holesky) => Eth1Id::Holesky,
            id => Eth1Id::Custom(id),
        }
    }
}

impl PartialEq for Eth1Id {
    fn eq(&self, other: &Self) -> bool {
        u64::from(*self) == u64::from(*other)
    }
}

impl Eq for Eth1Id {}

impl FromStr for Eth1Id {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Into::into)
            .map_err(|e| format!("Failed to parse eth1 chain id {}", e))
    }
}

impl fmt::Display for Eth1Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u64::from(*self))
    }
}

/// Returns `Ok` if `client` serves the `expected` chain.
///
/// Transport failures are `Unreachable` and a garbled answer is a `ProtocolViolation`; neither
/// is ever reported as a mismatch.
pub async fn verify_chain_id(
    client: &JsonRpcClient,
    expected: Eth1Id,
    timeout: Duration,
    log: &Logger,
) -> Result<(), Error> {
    let actual = client.get_chain_id(timeout).await.map_err(|e| {
        debug!(
            log,
            "Eth1 endpoint error";
            "endpoint" => %client,
            "error" => ?e,
        );
        e
    })?;

    if actual != expected {
        warn!(
            log,
            "Invalid eth1 chain id. Please switch to correct chain id on endpoint";
            "endpoint" => %client,
            "expected" => %expected,
            "received" => %actual,
        );
        return Err(Error::ChainMismatch {
            endpoint: client.endpoint().to_string(),
            expected: expected.into(),
            actual: actual.into(),
        });
    }

    debug!(
        log,
        "Eth1 chain id verified";
        "endpoint" => %client,
        "chain_id" => %actual,
    );
    Ok(())
}
