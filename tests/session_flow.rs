//! Connect, disconnect and restore of the confidential wallet.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use privacy_relay::balances::{RawBucketKey, TokenAmount};
use privacy_relay::client::{ClientDeps, ClientError, PrivacyClient};
use privacy_relay::engine::{EngineRegistry, LifecycleError};
use privacy_relay::session::{MemorySessionStore, SessionError, SessionRecord, SessionResult, SessionStore};

mod common;
use common::{test_config, Harness, MockChain, MockEngine, RecordingTelemetry, ScriptedLogSource, TOKEN};

/// Keeps records in memory but cannot delete them.
#[derive(Debug, Default)]
struct UndeletableStore {
    inner: MemorySessionStore,
}

impl SessionStore for UndeletableStore {
    fn load(&self) -> SessionResult<Option<SessionRecord>> {
        self.inner.load()
    }

    fn save(&self, record: &SessionRecord) -> SessionResult<()> {
        self.inner.save(record)
    }

    fn clear(&self) -> SessionResult<()> {
        Err(SessionError::Io(std::io::Error::other("disk gone")))
    }
}

#[tokio::test]
async fn test_connect_creates_and_persists_wallet() {
    let h = Harness::new(test_config());
    let user = h.chain.user();

    let record = h.client.connect(user).await.unwrap();

    assert_eq!(record.wallet_id, "wallet-1");
    assert_eq!(record.user_address, user);
    assert_eq!(record.network, "EthereumSepolia");
    assert_eq!(h.store.load().unwrap(), Some(record.clone()));
    assert_eq!(h.client.session(), Some(record));
    assert_eq!(h.client.get_wallet_by_id("wallet-1").unwrap().private_address, "0zk1");
}

#[tokio::test]
async fn test_reconnect_reuses_stored_wallet() {
    let h = Harness::new(test_config());
    let user = h.chain.user();
    let first = h.client.connect(user).await.unwrap();

    h.client.reset();
    let second = h.client.connect(user).await.unwrap();

    assert_eq!(first.wallet_id, second.wallet_id);
    assert_eq!(first.encryption_key, second.encryption_key);
    assert_eq!(h.engine.created.load(Ordering::SeqCst), 1);
    assert_eq!(h.engine.load_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connect_rejects_foreign_user() {
    let h = Harness::new(test_config());
    let err = h.client.connect(Address::repeat_byte(0x42)).await.unwrap_err();
    assert!(matches!(err, ClientError::SignerMismatch { .. }));
    assert_eq!(h.engine.start_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connect_replaces_other_users_record() {
    let store = Arc::new(MemorySessionStore::default());
    let engine = MockEngine::new();
    let registry = EngineRegistry::new();

    let alice = Harness::with_parts(test_config(), engine.clone(), MockChain::new(), store.clone(), registry.clone());
    let alice_record = alice.client.connect(alice.chain.user()).await.unwrap();
    drop(alice);

    let bob = Harness::with_parts(test_config(), engine.clone(), MockChain::new(), store.clone(), registry);
    let bob_record = bob.client.connect(bob.chain.user()).await.unwrap();

    assert_ne!(alice_record.wallet_id, bob_record.wallet_id);
    assert_eq!(store.load().unwrap().unwrap().user_address, bob.chain.user());
}

#[tokio::test]
async fn test_disconnect_clears_memory_and_storage() {
    let h = Harness::new(test_config());
    h.client.connect(h.chain.user()).await.unwrap();

    h.client.disconnect().unwrap();

    assert_eq!(h.client.session(), None);
    assert_eq!(h.store.load().unwrap(), None);
}

#[tokio::test]
async fn test_restore_reopens_wallet() {
    let store = Arc::new(MemorySessionStore::default());
    let engine = MockEngine::new();
    let chain = MockChain::new();
    let registry = EngineRegistry::new();

    let before = Harness::with_parts(test_config(), engine.clone(), chain.clone(), store.clone(), registry.clone());
    let record = before.client.connect(chain.user()).await.unwrap();
    drop(before);

    let after = Harness::with_parts(test_config(), engine.clone(), chain.clone(), store, registry);
    let restored = after.client.restore_session(chain.user()).await.unwrap();

    assert_eq!(restored, record);
    assert_eq!(after.client.session(), Some(record));
    assert!(after.client.get_wallet_by_id(&restored.wallet_id).is_ok());
}

#[tokio::test]
async fn test_restore_by_other_user_keeps_record() {
    let h = Harness::new(test_config());
    let record = h.client.connect(h.chain.user()).await.unwrap();
    h.client.reset();

    let other = Address::repeat_byte(0x42);
    let err = h.client.restore_session(other).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Session(SessionError::DifferentUser { stored }) if stored == h.chain.user()
    ));
    assert_eq!(h.store.load().unwrap(), Some(record));
}

#[tokio::test]
async fn test_restore_without_record() {
    let h = Harness::new(test_config());
    let err = h.client.restore_session(h.chain.user()).await.unwrap_err();
    assert!(matches!(err, ClientError::Session(SessionError::NoStoredSession)));
}

#[tokio::test]
async fn test_failed_restore_leaves_no_active_session() {
    let store = Arc::new(MemorySessionStore::default());
    let chain = MockChain::new();
    let seed = Harness::with_parts(test_config(), MockEngine::new(), chain.clone(), store.clone(), EngineRegistry::new());
    seed.client.connect(chain.user()).await.unwrap();
    drop(seed);

    // a fresh engine does not know the stored wallet
    let h = Harness::with_parts(test_config(), MockEngine::new(), chain.clone(), store.clone(), EngineRegistry::new());
    assert!(h.client.restore_session(chain.user()).await.is_err());

    assert_eq!(h.client.session(), None);
    assert!(store.load().unwrap().is_some());
}

#[tokio::test]
async fn test_failed_storage_clear_still_drops_balances() {
    let engine = MockEngine::new();
    engine.set_pushes(vec![(
        RawBucketKey::from("Spendable"),
        vec![TokenAmount::new(TOKEN, U256::from(5))],
    )]);
    let chain = MockChain::new();
    let store = Arc::new(UndeletableStore::default());
    let deps = ClientDeps {
        registry: EngineRegistry::new(),
        engine: engine.clone(),
        chain: chain.clone(),
        log_source: ScriptedLogSource::new(100),
        session_store: store.clone(),
        telemetry: Arc::new(RecordingTelemetry::default()),
    };
    let client = PrivacyClient::new(test_config(), deps).unwrap();
    client.connect(chain.user()).await.unwrap();
    assert!(client.refresh_balances(false, None).await.is_success());
    assert!(!client.get_balances().buckets.is_empty());

    let err = client.disconnect().unwrap_err();

    assert!(matches!(err, ClientError::Session(SessionError::Io(_))));
    assert_eq!(client.session(), None);
    assert!(client.get_balances().buckets.is_empty());
    assert!(store.load().unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_connect_retries_engine_start() {
    let h = Harness::new(test_config());
    h.engine.start_failures.store(2, Ordering::SeqCst);

    let record = h.client.connect(h.chain.user()).await.unwrap();

    assert_eq!(record.wallet_id, "wallet-1");
    assert_eq!(h.engine.start_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.engine.network_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_configured_attempts() {
    let mut config = test_config();
    config.engine.init_attempts = 3;
    let h = Harness::new(config);
    h.engine.start_failures.store(5, Ordering::SeqCst);

    let err = h.client.connect(h.chain.user()).await.unwrap_err();

    assert!(matches!(err, ClientError::Lifecycle(LifecycleError::EngineStart(_))));
    assert_eq!(h.engine.start_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.engine.created.load(Ordering::SeqCst), 0);
    assert_eq!(h.client.session(), None);
}
