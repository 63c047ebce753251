use crate::chain_id::verify_chain_id;
use crate::config::Config;
use crate::deposit_log::DepositLog;
use crate::endpoint::Endpoint;
use crate::errors::Error;
use crate::http::{
    JsonRpcClient, Log, Receipt, ETH_GET_BLOCK_BY_HASH, ETH_GET_TRANSACTION_RECEIPT,
};
use chaindb::types::Eth1Deposit;
use chaindb::{Eth1DepositsStore, Hash256, MetadataStore};
use checkpoint::{CheckpointService, MetadataRecord, NOT_STARTED};
use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use slog::{debug, info, warn, Logger};
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// The checkpoint key of the deposit log sync.
pub const GETLOGS_KEY: &str = "eth1deposits.getlogs";

fn not_started() -> i64 {
    NOT_STARTED
}

/// The last eth1 block whose deposit logs are all stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLogsProgress {
    #[serde(default = "not_started")]
    pub latest_block: i64,
}

impl Default for GetLogsProgress {
    fn default() -> Self {
        Self {
            latest_block: NOT_STARTED,
        }
    }
}

impl GetLogsProgress {
    pub fn at_block(block_number: u64) -> Self {
        Self {
            latest_block: i64::try_from(block_number).unwrap_or(i64::MAX),
        }
    }

    pub fn next_block(&self) -> u64 {
        u64::try_from(self.latest_block).map_or(0, |block| block.saturating_add(1))
    }
}

impl MetadataRecord for GetLogsProgress {
    fn invalid_reason(&self) -> Option<String> {
        (self.latest_block < NOT_STARTED)
            .then(|| format!("latest_block {} is below {}", self.latest_block, NOT_STARTED))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EndpointStatus {
    Unverified,
    Verified,
    /// The chain id check failed. Sticky until the endpoint is replaced or re-verified.
    WrongChain { actual: u64 },
}

struct EndpointState {
    client: Arc<JsonRpcClient>,
    status: EndpointStatus,
}

/// The result of a single `update_deposits` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositUpdateOutcome {
    /// The highest block that may be imported, i.e. the remote head less the follow distance.
    /// `None` while the remote chain is shorter than the follow distance.
    pub target_block: Option<u64>,
    /// The blocks whose logs were imported by this call, if any.
    pub blocks_imported: Option<RangeInclusive<u64>>,
    pub new_deposits: usize,
    /// Deposits that were already stored, e.g. redelivered by the endpoint.
    pub known_deposits: usize,
}

/// Imports deposit contract logs from a verified eth1 endpoint into the store.
///
/// Progress is recorded under `GETLOGS_KEY` after each chunk of blocks is fully stored, so an
/// interrupted update resumes from the first incomplete chunk. Only one `update_deposits` call
/// should run at a time.
pub struct Service<S> {
    config: Config,
    endpoint: RwLock<EndpointState>,
    store: S,
    checkpoints: CheckpointService<S>,
    log: Logger,
}

impl<S> Service<S>
where
    S: MetadataStore + Eth1DepositsStore + Clone,
{
    pub fn new(config: Config, store: S, log: Logger) -> Result<Self, Error> {
        config.validate()?;
        let client = JsonRpcClient::new(config.endpoint.clone(), config.max_error_body_bytes)?;
        Ok(Self {
            endpoint: RwLock::new(EndpointState {
                client: Arc::new(client),
                status: EndpointStatus::Unverified,
            }),
            checkpoints: CheckpointService::new(store.clone(), log.clone()),
            store,
            config,
            log,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.read().client.endpoint().clone()
    }

    /// Swaps to a new endpoint. It is verified again before it is used.
    pub fn set_endpoint(&self, endpoint: Endpoint) -> Result<(), Error> {
        let client = JsonRpcClient::new(endpoint, self.config.max_error_body_bytes)?;
        info!(
            self.log,
            "Eth1 endpoint changed";
            "endpoint" => %client,
        );
        *self.endpoint.write() = EndpointState {
            client: Arc::new(client),
            status: EndpointStatus::Unverified,
        };
        Ok(())
    }

    /// Checks the chain id of the current endpoint now, regardless of any earlier result.
    pub async fn verify_endpoint(&self) -> Result<(), Error> {
        let client = self.endpoint.read().client.clone();
        self.verify_client(&client).await
    }

    async fn verify_client(&self, client: &Arc<JsonRpcClient>) -> Result<(), Error> {
        let result = verify_chain_id(
            client,
            self.config.chain_id,
            self.config.request_timeout(),
            &self.log,
        )
        .await;

        let status = match &result {
            Ok(()) => EndpointStatus::Verified,
            Err(Error::ChainMismatch { actual, .. }) => {
                EndpointStatus::WrongChain { actual: *actual }
            }
            // Transient failures say nothing about the chain.
            Err(_) => EndpointStatus::Unverified,
        };

        let mut state = self.endpoint.write();
        // The endpoint may have been swapped while the check was in flight.
        if Arc::ptr_eq(&state.client, client) {
            state.status = status;
        }

        result
    }

    /// Returns a client for an endpoint known to serve the configured chain.
    async fn verified_client(&self) -> Result<Arc<JsonRpcClient>, Error> {
        let (client, status) = {
            let state = self.endpoint.read();
            (state.client.clone(), state.status)
        };

        match status {
            EndpointStatus::Verified => Ok(client),
            EndpointStatus::WrongChain { actual } => Err(Error::ChainMismatch {
                endpoint: client.endpoint().to_string(),
                expected: self.config.chain_id.into(),
                actual,
            }),
            EndpointStatus::Unverified => {
                self.verify_client(&client).await?;
                Ok(client)
            }
        }
    }

    /// Imports all deposit logs between the last imported block and the remote head less the
    /// follow distance, in chunks of `blocks_per_log_query` blocks.
    ///
    /// A failing chunk aborts the update. The checkpoint then still points at the end of the
    /// previous chunk, so the next call requests the same range again.
    pub async fn update_deposits(&self) -> Result<DepositUpdateOutcome, Error> {
        let client = self.verified_client().await?;

        let remote_head = client
            .get_block_number(self.config.request_timeout())
            .await?;
        let target_block = remote_head.checked_sub(self.config.follow_distance);

        let progress: GetLogsProgress = self.checkpoints.get_record(GETLOGS_KEY).await?;
        let start_block = progress
            .next_block()
            .max(self.config.deposit_contract_deploy_block);

        let mut outcome = DepositUpdateOutcome {
            target_block,
            blocks_imported: None,
            new_deposits: 0,
            known_deposits: 0,
        };

        let target_block = match target_block {
            Some(target_block) if start_block <= target_block => target_block,
            _ => {
                debug!(
                    self.log,
                    "No new blocks to scan for logs";
                    "next_block" => start_block,
                    "remote_head" => remote_head,
                );
                return Ok(outcome);
            }
        };

        let blocks_per_log_query = self.config.blocks_per_log_query.max(1);
        let chunks = (start_block..=target_block)
            .step_by(blocks_per_log_query as usize)
            .take(self.config.max_log_requests_per_update as usize)
            .map(|chunk_start| {
                let chunk_end = chunk_start
                    .saturating_add(blocks_per_log_query - 1)
                    .min(target_block);
                chunk_start..=chunk_end
            });

        for block_range in chunks {
            let deposits = self.download_deposits(&client, block_range.clone()).await?;

            let mut new_in_chunk = 0;
            for deposit in &deposits {
                if self.store.set_eth1_deposit(deposit).await? {
                    new_in_chunk += 1;
                }
            }

            self.checkpoints
                .set_record(GETLOGS_KEY, &GetLogsProgress::at_block(*block_range.end()))
                .await?;

            debug!(
                self.log,
                "Imported deposit logs chunk";
                "from_block" => block_range.start(),
                "to_block" => block_range.end(),
                "logs" => deposits.len(),
                "new" => new_in_chunk,
            );

            outcome.new_deposits += new_in_chunk;
            outcome.known_deposits += deposits.len() - new_in_chunk;
            outcome.blocks_imported = Some(start_block..=*block_range.end());
        }

        if outcome.new_deposits > 0 {
            info!(
                self.log,
                "Imported deposit log(s)";
                "latest_block" => outcome.blocks_imported.as_ref().map(|r| *r.end()),
                "target_block" => target_block,
                "new" => outcome.new_deposits,
            );
        }

        Ok(outcome)
    }

    /// Downloads, decodes and enriches every deposit log in `block_range`.
    ///
    /// Nothing is returned unless every log in the range could be turned into a deposit.
    async fn download_deposits(
        &self,
        client: &JsonRpcClient,
        block_range: RangeInclusive<u64>,
    ) -> Result<Vec<Eth1Deposit>, Error> {
        let logs = client
            .get_deposit_logs_in_range(
                self.config.deposit_contract_address,
                block_range.clone(),
                self.config.get_logs_timeout(),
            )
            .await?;

        let deposit_logs = logs
            .iter()
            .map(|log| self.parse_log(log, &block_range))
            .collect::<Result<Vec<_>, _>>()?;

        let block_hashes: BTreeSet<Hash256> =
            deposit_logs.iter().map(|log| log.block_hash).collect();
        let tx_hashes: BTreeSet<Hash256> = deposit_logs
            .iter()
            .map(|log| log.transaction_hash)
            .collect();

        let timeout = self.config.request_timeout();
        let max_concurrent = self.config.max_concurrent_requests;
        let timestamps: HashMap<Hash256, u64> = stream::iter(block_hashes)
            .map(|hash| async move {
                let timestamp = client.get_block_timestamp(hash, timeout).await?;
                Ok::<_, Error>((hash, timestamp))
            })
            .buffer_unordered(max_concurrent)
            .try_collect()
            .await?;
        let receipts: HashMap<Hash256, Receipt> = stream::iter(tx_hashes)
            .map(|hash| async move {
                let receipt = client.get_transaction_receipt(hash, timeout).await?;
                Ok::<_, Error>((hash, receipt))
            })
            .buffer_unordered(max_concurrent)
            .try_collect()
            .await?;

        let mut deposits = deposit_logs
            .into_iter()
            .map(|log| {
                let timestamp = timestamps.get(&log.block_hash).copied().ok_or_else(|| {
                    Error::MissingResult {
                        endpoint: client.endpoint().to_string(),
                        method: ETH_GET_BLOCK_BY_HASH,
                    }
                })?;
                let receipt = receipts.get(&log.transaction_hash).ok_or_else(|| {
                    Error::MissingResult {
                        endpoint: client.endpoint().to_string(),
                        method: ETH_GET_TRANSACTION_RECEIPT,
                    }
                })?;
                Ok(log.into_eth1_deposit(timestamp, receipt))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        deposits.sort_by_key(|deposit| (deposit.eth1_block_number, deposit.eth1_log_index));

        Ok(deposits)
    }

    fn parse_log(&self, log: &Log, block_range: &RangeInclusive<u64>) -> Result<DepositLog, Error> {
        if log.removed {
            warn!(
                self.log,
                "Eth1 endpoint reported a removed deposit log";
                "block_hash" => ?log.block_hash,
                "log_index" => log.log_index,
                "follow_distance" => self.config.follow_distance,
            );
            return Err(Error::RemovedLog {
                block_hash: log.block_hash,
                log_index: log.log_index,
            });
        }

        if !block_range.contains(&log.block_number) {
            return Err(Error::LogOutOfRange {
                block_number: log.block_number,
                range: block_range.clone(),
            });
        }

        DepositLog::from_log(log).map_err(|error| Error::FailedToParseDepositLog {
            block_hash: log.block_hash,
            log_index: log.log_index,
            error,
        })
    }

    /// Returns the last block whose deposits are fully stored, if any.
    pub async fn latest_imported_block(&self) -> Result<Option<u64>, Error> {
        let progress: GetLogsProgress = self.checkpoints.get_record(GETLOGS_KEY).await?;
        Ok(u64::try_from(progress.latest_block).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_defaults_to_not_started() {
        let progress: GetLogsProgress = serde_json::from_str("{}").unwrap();
        assert_eq!(progress, GetLogsProgress::default());
        assert_eq!(progress.next_block(), 0);
        assert_eq!(GetLogsProgress::at_block(99).next_block(), 100);
        assert!(GetLogsProgress { latest_block: -3 }.invalid_reason().is_some());
    }
}
