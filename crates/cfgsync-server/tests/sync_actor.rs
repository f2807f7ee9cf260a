//! Integration tests for the sync actor.

use std::time::Duration;

use cfgsync_protocol::{
    ClientId, ConfigEntry, ConfigKey, ConfigValue, EntryEvent, SetName, SetRecord,
    SyncEvent, UpdateConfigs,
};
use cfgsync_registry::{ConfigRegistry, MemoryGroup};
use cfgsync_server::{ServerConfig, SyncError, SyncHandle, SyncServer};
use cfgsync_session::{AdminList, Attach, SessionConfig, SessionError};
use tokio::sync::mpsc;

const ADMIN: ClientId = ClientId(1);
const PLAYER: ClientId = ClientId(2);

fn key(name: &str) -> ConfigKey {
    ConfigKey::new("Weapon", name)
}

fn entry(name: &str, value: &[u8]) -> ConfigEntry {
    ConfigEntry::new(key(name), ConfigValue(value.to_vec()))
}

fn spawn() -> SyncHandle {
    SyncServer::builder(AdminList::new([ADMIN])).spawn()
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for sync event")
        .expect("subscriber channel closed")
}

#[tokio::test]
async fn test_subscribe_delivers_snapshot_first() {
    let handle = spawn();
    handle
        .update_configs(ADMIN, UpdateConfigs::add(entry("sword", b"1")))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let attach = handle.subscribe(PLAYER, tx).await.unwrap();

    assert_eq!(attach, Attach::Fresh);
    match recv(&mut rx).await {
        SyncEvent::Snapshot(snapshot) => {
            assert_eq!(snapshot.added, vec![entry("sword", b"1")]);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_admin_update_is_broadcast_as_one_commit() {
    let handle = spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx).await.unwrap();
    let _ = recv(&mut rx).await;

    handle
        .update_configs(
            ADMIN,
            UpdateConfigs {
                add: vec![entry("sword", b"1")],
                update: vec![entry("bow", b"2")],
                remove: vec![key("club")],
            },
        )
        .await
        .unwrap();

    match recv(&mut rx).await {
        SyncEvent::Commit(commit) => {
            assert_eq!(commit.origin, ADMIN);
            assert_eq!(commit.events.len(), 3);
            assert_eq!(
                commit.events[0],
                EntryEvent::Added {
                    set: SetName::Added,
                    record: SetRecord::Entry(entry("sword", b"1")),
                }
            );
        }
        other => panic!("expected commit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_admin_update_is_dropped_silently() {
    let handle = spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx).await.unwrap();
    let _ = recv(&mut rx).await;

    let result = handle
        .update_configs(PLAYER, UpdateConfigs::add(entry("sword", b"1")))
        .await;

    assert!(result.is_ok());
    // Commands are processed in order, so the update has been handled.
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_no_op_update_broadcasts_nothing() {
    let handle = spawn();
    handle
        .update_configs(ADMIN, UpdateConfigs::update(entry("bow", b"1")))
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx).await.unwrap();
    let _ = recv(&mut rx).await;

    handle
        .update_configs(ADMIN, UpdateConfigs::update(entry("bow", b"1")))
        .await
        .unwrap();
    handle.snapshot().await.unwrap();

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_subscribe_twice_returns_already_attached() {
    let handle = spawn();
    let (tx, _rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx.clone()).await.unwrap();

    let result = handle.subscribe(PLAYER, tx).await;

    assert!(matches!(
        result,
        Err(SyncError::Session(SessionError::AlreadyAttached(id))) if id == PLAYER
    ));
}

#[tokio::test]
async fn test_resubscribe_after_unsubscribe_is_resumed() {
    let handle = spawn();
    let (tx, _rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx.clone()).await.unwrap();
    handle.unsubscribe(PLAYER).await.unwrap();

    let attach = handle.subscribe(PLAYER, tx).await.unwrap();

    assert_eq!(attach, Attach::Resumed { attach_count: 2 });
}

#[tokio::test]
async fn test_unsubscribed_client_receives_no_commits() {
    let handle = spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx).await.unwrap();
    let _ = recv(&mut rx).await;
    handle.unsubscribe(PLAYER).await.unwrap();

    handle
        .update_configs(ADMIN, UpdateConfigs::add(entry("sword", b"1")))
        .await
        .unwrap();
    handle.snapshot().await.unwrap();

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_expired_session_resubscribes_as_fresh() {
    let handle = SyncServer::builder(AdminList::new([ADMIN]))
        .config(ServerConfig {
            session: SessionConfig {
                detached_retention_secs: 0,
                ..SessionConfig::default()
            },
            ..ServerConfig::default()
        })
        .spawn();
    let (tx, _rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx.clone()).await.unwrap();
    handle.unsubscribe(PLAYER).await.unwrap();

    let attach = handle.subscribe(PLAYER, tx).await.unwrap();

    assert_eq!(attach, Attach::Fresh);
}

#[tokio::test]
async fn test_subscriber_limit_is_enforced() {
    let handle = SyncServer::builder(AdminList::new([ADMIN]))
        .config(ServerConfig {
            session: SessionConfig {
                max_subscribers: 1,
                ..SessionConfig::default()
            },
            ..ServerConfig::default()
        })
        .spawn();
    let (tx, _rx) = mpsc::unbounded_channel();
    handle.subscribe(ClientId(10), tx.clone()).await.unwrap();

    let result = handle.subscribe(ClientId(11), tx).await;

    assert!(matches!(result, Err(SyncError::Session(SessionError::Full(1)))));
}

#[tokio::test]
async fn test_dropped_receiver_is_detached_on_broadcast() {
    let handle = spawn();
    let (tx, rx) = mpsc::unbounded_channel();
    handle.subscribe(PLAYER, tx).await.unwrap();
    drop(rx);

    handle
        .update_configs(ADMIN, UpdateConfigs::add(entry("sword", b"1")))
        .await
        .unwrap();

    // The failed delivery detached the client, so it may subscribe again.
    let (tx, _rx) = mpsc::unbounded_channel();
    let attach = handle.subscribe(PLAYER, tx).await.unwrap();
    assert_eq!(attach, Attach::Resumed { attach_count: 2 });
}

#[tokio::test]
async fn test_colocated_registry_follows_commits() {
    let registry = ConfigRegistry::new()
        .with_group(MemoryGroup::new("Weapon"))
        .unwrap();
    let handle = SyncServer::builder(AdminList::new([ADMIN]))
        .local_registry(registry)
        .spawn();

    handle
        .update_configs(ADMIN, UpdateConfigs::add(entry("sword", b"1")))
        .await
        .unwrap();
    handle
        .update_configs(ADMIN, UpdateConfigs::add(entry("axe", b"2")))
        .await
        .unwrap();
    handle
        .update_configs(ADMIN, UpdateConfigs::remove(key("sword")))
        .await
        .unwrap();

    let local = handle.local_configs().await.unwrap();
    assert_eq!(local, Some(vec![entry("axe", b"2")]));
}

#[tokio::test]
async fn test_local_configs_without_registry_is_none() {
    let handle = spawn();

    assert_eq!(handle.local_configs().await.unwrap(), None);
}

#[tokio::test]
async fn test_handle_after_shutdown_is_unavailable() {
    let handle = spawn();
    handle.shutdown().await.unwrap();

    // The actor may still be draining; wait for its receiver to close.
    let mut result = handle.snapshot().await;
    for _ in 0..10 {
        if result.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        result = handle.snapshot().await;
    }

    assert!(matches!(result, Err(SyncError::Unavailable)));
}
