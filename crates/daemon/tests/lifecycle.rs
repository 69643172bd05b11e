//! Object lifetimes and storage-availability behaviour.

mod support;

use std::time::Duration;

use pretty_assertions::assert_eq;
use signet_core::{IdentityId, SessionData, UiPolicy};
use signet_daemon::{DaemonEvent, IdentitySignal};
use signet_error::ErrorKind;
use signet_eventbus::Event;
use signet_ui::keys as ui_keys;
use support::*;

#[tokio::test(start_paused = true)]
async fn idle_session_self_destructs() {
    let bed = testbed();
    let session = bed
        .daemon
        .get_auth_session(&peer_a(), IdentityId::NEW, "password")
        .await
        .unwrap();

    assert_eq!(
        session.query_available_mechanisms(&[]).await.unwrap(),
        vec!["password".to_owned()]
    );

    // Past the idle timeout the core is gone and the handle is dead.
    tokio::time::sleep(Duration::from_secs(301)).await;
    let err = session.query_available_mechanisms(&[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalCommunication);
}

#[tokio::test(start_paused = true)]
async fn idle_identity_objects_are_reaped() {
    let bed = testbed();
    let identity = bed.daemon.register_new_identity(&peer_a());
    let mut signals = identity.subscribe();

    tokio::time::sleep(Duration::from_secs(301)).await;
    // Any facade operation sweeps expired objects.
    let _other = bed.daemon.register_new_identity(&peer_a());

    assert_eq!(signals.recv().await.unwrap(), IdentitySignal::Unregistered);
}

#[tokio::test]
async fn queued_requests_wait_for_store_readiness() {
    let bed = testbed();
    bed.store.set_ready(false);

    let session = bed
        .daemon
        .get_auth_session(&peer_a(), IdentityId::NEW, "password")
        .await
        .unwrap();
    let mut params = SessionData::new();
    params.set_secret("p");
    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.process(&peer_a(), params, "password").await }
    });
    settle().await;
    assert!(!pending.is_finished());

    bed.store.set_ready(true);
    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("request starts once storage is ready")
        .unwrap()
        .unwrap();
    assert_eq!(result.secret(), Some("p"));
}

#[tokio::test]
async fn stop_all_sessions_flushes_pending_requests() {
    let bed = testbed();

    bed.ui.push_hang();
    let session = bed
        .daemon
        .get_auth_session(&peer_a(), IdentityId::NEW, "password")
        .await
        .unwrap();
    let pending = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .process(&peer_a(), SessionData::new(), "password")
                .await
        }
    });
    settle().await;

    bed.daemon.stop_all_sessions();
    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("shutdown resolves pending requests")
        .unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::SessionCanceled);
}

#[tokio::test]
async fn closed_secrets_storage_raises_hints_and_flags() {
    let bed = testbed();
    let peer = peer_a();
    let identity = bed.daemon.register_new_identity(&peer);
    let id = identity
        .store(&peer, &storable_identity("u", "p"))
        .await
        .unwrap();

    // Validate the record first.
    let session = bed
        .daemon
        .get_auth_session(&peer, id, "password")
        .await
        .unwrap();
    session
        .process(&peer, SessionData::new(), "password")
        .await
        .unwrap();

    bed.store.set_secrets_open(false);
    let mut events = bed.daemon.subscribe_events();

    // Force a dialog while the secrets database is closed.
    let gate = bed.ui.push_gate();
    let mut params = SessionData::new();
    params.set_ui_policy(UiPolicy::RequestPassword);
    let pending = tokio::spawn({
        let session = session.clone();
        let peer = peer.clone();
        async move { session.process(&peer, params, "password").await }
    });
    settle().await;

    // The dialog was told that no storage keys are available.
    {
        let queries = bed.ui.queries.lock();
        let last = queries.last().expect("a dialog was raised");
        assert_eq!(
            last.bool_value(ui_keys::STORAGE_KEYS_UNAVAILABLE),
            Some(true)
        );
    }

    let mut reply = SessionData::new();
    reply.insert(ui_keys::ERROR, signet_ui::UiError::None.raw());
    reply.set_secret("typed");
    gate.send(reply).unwrap();

    tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Finalising after the dialog published the secure-storage hint.
    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("hint event arrives")
        .unwrap();
    assert_eq!(
        event,
        Event::Next(DaemonEvent::SecureStorageUnavailable {
            id,
            method: "password".to_owned()
        })
    );
}
