use async_trait::async_trait;
use chaindb::{ErrorKind, MemoryChainDb, MetadataStore};
use checkpoint::{Checkpoint, CheckpointService, MetadataRecord, BLOCKS_STANDARD_KEY};
use serde::{Deserialize, Serialize};
use slog::Logger;
use sloggers::{null::NullLoggerBuilder, Build};
use std::sync::atomic::{AtomicBool, Ordering};

fn test_logger() -> Logger {
    NullLoggerBuilder.build().expect("should build null logger")
}

fn service() -> CheckpointService<MemoryChainDb> {
    CheckpointService::new(MemoryChainDb::open(), test_logger())
}

/// A metadata store whose reads and writes can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryChainDb,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

#[async_trait]
impl MetadataStore for FlakyStore {
    async fn metadata(&self, key: &str) -> Result<Option<Vec<u8>>, chaindb::Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(chaindb::Error::ReadFailed {
                operation: "metadata",
                reason: "connection reset".into(),
            });
        }
        self.inner.metadata(key).await
    }

    async fn set_metadata(&self, key: &str, value: &[u8]) -> Result<(), chaindb::Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(chaindb::Error::WriteFailed {
                operation: "set_metadata",
                reason: "disk full".into(),
            });
        }
        self.inner.set_metadata(key, value).await
    }
}

#[tokio::test]
async fn absent_key_reads_as_not_started() {
    let service = service();
    let checkpoint = service.get(BLOCKS_STANDARD_KEY).await.unwrap();
    assert_eq!(checkpoint.latest_slot, -1);
    assert_eq!(checkpoint.next_slot(), 0);
}

#[tokio::test]
async fn set_then_get() {
    let service = service();
    for slot in [0, 1000, i64::MAX] {
        let checkpoint = Checkpoint { latest_slot: slot };
        service.set(BLOCKS_STANDARD_KEY, &checkpoint).await.unwrap();
        assert_eq!(service.get(BLOCKS_STANDARD_KEY).await.unwrap(), checkpoint);
    }

    // Rewinding is allowed.
    service
        .set(BLOCKS_STANDARD_KEY, &Checkpoint::at_slot(10))
        .await
        .unwrap();
    assert_eq!(
        service.get(BLOCKS_STANDARD_KEY).await.unwrap(),
        Checkpoint::at_slot(10)
    );

    // Repeating a write is a no-op.
    service
        .set(BLOCKS_STANDARD_KEY, &Checkpoint::at_slot(10))
        .await
        .unwrap();
    assert_eq!(
        service.get(BLOCKS_STANDARD_KEY).await.unwrap(),
        Checkpoint::at_slot(10)
    );
}

#[tokio::test]
async fn keys_are_independent() {
    let service = service();
    service
        .set(BLOCKS_STANDARD_KEY, &Checkpoint::at_slot(5))
        .await
        .unwrap();
    assert_eq!(
        service.get("epochs.summary").await.unwrap(),
        Checkpoint::default()
    );
}

#[tokio::test]
async fn reset_restores_default() {
    let service = service();
    service
        .set(BLOCKS_STANDARD_KEY, &Checkpoint::at_slot(77))
        .await
        .unwrap();
    service.reset(BLOCKS_STANDARD_KEY).await.unwrap();
    assert_eq!(
        service.get(BLOCKS_STANDARD_KEY).await.unwrap(),
        Checkpoint::default()
    );
}

#[tokio::test]
async fn corrupt_bytes_are_never_defaulted() {
    let service = service();
    let corrupt: [&[u8]; 4] = [
        br#"{"latest_slot":10"#,
        b"not json",
        br#"{"latest_slot":"ten"}"#,
        b"",
    ];
    for bytes in corrupt {
        service
            .store()
            .set_metadata(BLOCKS_STANDARD_KEY, bytes)
            .await
            .unwrap();
        let err = service.get(BLOCKS_STANDARD_KEY).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptCheckpoint);
        assert_eq!(err.key(), BLOCKS_STANDARD_KEY);
        assert!(!err.kind().is_retryable());
    }
}

#[tokio::test]
async fn impossible_slot_is_corrupt() {
    let service = service();
    service
        .store()
        .set_metadata(BLOCKS_STANDARD_KEY, br#"{"latest_slot":-7}"#)
        .await
        .unwrap();
    let err = service.get(BLOCKS_STANDARD_KEY).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptCheckpoint);

    let err = service
        .set(BLOCKS_STANDARD_KEY, &Checkpoint { latest_slot: -2 })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn unknown_fields_are_ignored() {
    let service = service();
    service
        .store()
        .set_metadata(
            BLOCKS_STANDARD_KEY,
            br#"{"latest_slot":42,"latest_epoch":1,"extra":{"nested":true}}"#,
        )
        .await
        .unwrap();
    assert_eq!(
        service.get(BLOCKS_STANDARD_KEY).await.unwrap(),
        Checkpoint::at_slot(42)
    );
}

#[tokio::test]
async fn storage_failures_carry_the_key() {
    let store = FlakyStore::default();
    let service = CheckpointService::new(store, test_logger());
    service
        .set(BLOCKS_STANDARD_KEY, &Checkpoint::at_slot(3))
        .await
        .unwrap();

    service.store().fail_writes.store(true, Ordering::SeqCst);
    let err = service
        .set(BLOCKS_STANDARD_KEY, &Checkpoint::at_slot(4))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageWriteFailed);
    assert!(err.kind().is_retryable());
    assert_eq!(err.key(), BLOCKS_STANDARD_KEY);

    // The failed write left the previous record in place.
    service.store().fail_writes.store(false, Ordering::SeqCst);
    assert_eq!(
        service.get(BLOCKS_STANDARD_KEY).await.unwrap(),
        Checkpoint::at_slot(3)
    );

    service.store().fail_reads.store(true, Ordering::SeqCst);
    let err = service.get(BLOCKS_STANDARD_KEY).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageReadFailed);
    assert!(err.kind().is_retryable());
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct CursorRecord {
    #[serde(default)]
    cursor: u64,
}

impl MetadataRecord for CursorRecord {}

#[tokio::test]
async fn custom_records() {
    let service = service();
    assert_eq!(
        service.get_record::<CursorRecord>("cursor").await.unwrap(),
        CursorRecord::default()
    );
    service
        .set_record("cursor", &CursorRecord { cursor: 9 })
        .await
        .unwrap();
    assert_eq!(
        service.get_record::<CursorRecord>("cursor").await.unwrap(),
        CursorRecord { cursor: 9 }
    );
}
