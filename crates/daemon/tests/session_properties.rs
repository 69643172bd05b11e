//! Queue and hygiene properties of the session engine.

mod support;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use signet_access::PeerContext;
use signet_core::{IdentityId, SessionData, UiPolicy, keys};
use signet_error::ErrorKind;
use signet_store::CredentialsStore;
use signet_ui::{UiError, keys as ui_keys};
use support::*;

async fn store_test_identity(bed: &TestBed, peer: &PeerContext) -> IdentityId {
    let identity = bed.daemon.register_new_identity(peer);
    identity
        .store(peer, &storable_identity("u", "p"))
        .await
        .expect("storing a fresh identity succeeds")
}

#[tokio::test]
async fn replies_follow_enqueue_order() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    let session = bed
        .daemon
        .get_auth_session(&peer, id, "password")
        .await
        .unwrap();

    // First request blocks in a dialog; the second could answer
    // instantly but must wait its turn.
    let gate = bed.ui.push_gate();
    let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    let mut first_params = SessionData::new();
    first_params.set_ui_policy(UiPolicy::RequestPassword);
    let first = tokio::spawn({
        let session = session.clone();
        let peer = peer.clone();
        let order = order.clone();
        async move {
            let result = session.process(&peer, first_params, "password").await;
            order.lock().push(1);
            result
        }
    });
    settle().await;

    let mut second_params = SessionData::new();
    second_params.set_secret("p");
    let second = tokio::spawn({
        let session = session.clone();
        let peer = peer.clone();
        let order = order.clone();
        async move {
            let result = session.process(&peer, second_params, "password").await;
            order.lock().push(2);
            result
        }
    });
    settle().await;

    // At most one request is active: only the first ever reached the
    // dialog, the second has not started.
    assert_eq!(bed.ui.query_count(), 1);
    assert!(order.lock().is_empty());

    let mut reply = SessionData::new();
    reply.insert(ui_keys::ERROR, UiError::None.raw());
    reply.set_user_name("u");
    reply.set_secret("typed");
    gate.send(reply).unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), first)
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), second)
        .await
        .unwrap()
        .unwrap();

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(*order.lock(), vec![1, 2]);
    // The second request needed no dialog of its own.
    assert_eq!(bed.ui.query_count(), 1);
}

#[tokio::test]
async fn secrets_are_suppressed_outside_the_password_method() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    // get_info never returns a secret.
    let (_, info_map) = bed.daemon.get_identity(&peer, id).await.unwrap();
    assert!(!info_map.contains(keys::SECRET));
    assert_eq!(info_map.user_name(), Some("u"));

    // A foreign method's result loses the secret field.
    let session = bed.daemon.get_auth_session(&peer, id, "echo").await.unwrap();
    let result = session
        .process(&peer, SessionData::new(), "plain")
        .await
        .unwrap();
    assert_eq!(result.user_name(), Some("u"));
    assert_eq!(result.secret(), None);

    // The built-in password method keeps it.
    let session = bed
        .daemon
        .get_auth_session(&peer, id, "password")
        .await
        .unwrap();
    let result = session
        .process(&peer, SessionData::new(), "password")
        .await
        .unwrap();
    assert_eq!(result.secret(), Some("p"));
}

#[tokio::test]
async fn validated_identity_freezes_the_user_name() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    let session = bed
        .daemon
        .get_auth_session(&peer, id, "password")
        .await
        .unwrap();

    // First authentication validates the record.
    session
        .process(&peer, SessionData::new(), "password")
        .await
        .unwrap();
    assert!(bed.store.credentials(id, false).await.unwrap().validated);

    // A caller-supplied alternate name cannot impersonate it now.
    let mut params = SessionData::new();
    params.set_user_name("evil");
    params.set_secret("p");
    let result = session.process(&peer, params, "password").await.unwrap();
    assert_eq!(result.user_name(), Some("u"));
    assert_eq!(bed.store.credentials(id, false).await.unwrap().user_name, "u");
}

#[tokio::test]
async fn store_requires_a_resolvable_owner() {
    let bed = testbed();

    // Unknown peer, no owner list: nobody would own the result.
    let ghost = PeerContext::new(":ghost", 1);
    let identity = bed.daemon.register_new_identity(&ghost);
    let err = identity
        .store(&ghost, &storable_identity("u", "p"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);

    // A resolvable peer becomes the owner by default.
    let id = store_test_identity(&bed, &peer_a()).await;
    let info = bed.store.credentials(id, false).await.unwrap();
    assert_eq!(
        info.owners,
        vec![signet_core::SecurityContext::from_legacy(APP_A)]
    );
}

#[tokio::test]
async fn acl_widening_is_rejected_and_nothing_is_stored() {
    let bed = testbed();
    let peer = peer_a();

    let mut map = storable_identity("u", "p");
    map.insert(keys::ACL, serde_json::json!(["app-b"]));
    let identity = bed.daemon.register_new_identity(&peer);
    let err = identity.store(&peer, &map).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let mut map = storable_identity("u", "p");
    map.insert(keys::OWNER, serde_json::json!(["app-b"]));
    let identity = bed.daemon.register_new_identity(&peer);
    let err = identity.store(&peer, &map).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let all = bed
        .store
        .query_identities(&signet_core::IdentityFilter::all())
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn cancellation_leaves_no_store_writes_and_unblocks_the_queue() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    bed.ui.push_hang();
    let session = bed
        .daemon
        .get_auth_session(&peer, id, "password")
        .await
        .unwrap();
    let mut params = SessionData::new();
    params.set_ui_policy(UiPolicy::RequestPassword);
    let pending = tokio::spawn({
        let session = session.clone();
        let peer = peer.clone();
        async move { session.process(&peer, params, "password").await }
    });
    settle().await;

    session.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::SessionCanceled);

    // No finalisation write happened for the canceled request.
    assert!(!bed.store.credentials(id, false).await.unwrap().validated);

    // The next request begins processing and completes.
    let mut ok_params = SessionData::new();
    ok_params.set_secret("p");
    session
        .process(&peer, ok_params, "password")
        .await
        .unwrap();
    assert!(bed.store.credentials(id, false).await.unwrap().validated);
}

#[tokio::test]
async fn references_are_idempotent_and_checked() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    let (handle, _) = bed.daemon.get_identity(&peer, id).await.unwrap();
    handle.add_reference(&peer, "mail-setup").await.unwrap();
    handle.add_reference(&peer, "mail-setup").await.unwrap();
    assert_eq!(bed.store.references_of(id).len(), 1);

    handle.remove_reference(&peer, "mail-setup").await.unwrap();
    let err = handle
        .remove_reference(&peer, "mail-setup")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferenceNotFound);
}

#[tokio::test]
async fn state_changes_are_signalled_per_handle() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    let session = bed
        .daemon
        .get_auth_session(&peer, id, "password")
        .await
        .unwrap();
    let mut signals = session.subscribe();

    let mut params = SessionData::new();
    params.set_secret("p");
    session.process(&peer, params, "password").await.unwrap();

    let signet_daemon::SessionSignal::StateChanged {
        session_key,
        state,
        ..
    } = tokio::time::timeout(Duration::from_secs(1), signals.recv())
        .await
        .expect("a state change is broadcast")
        .unwrap();
    assert_eq!(session_key, session.object_path());
    assert_eq!(state, signet_plugin::PluginState::Started);
}

#[tokio::test]
async fn verify_secret_checks_against_the_store() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    let (handle, _) = bed.daemon.get_identity(&peer, id).await.unwrap();
    assert!(handle.verify_secret(&peer, "p").await.unwrap());
    assert!(!handle.verify_secret(&peer, "wrong").await.unwrap());
}

#[tokio::test]
async fn request_credentials_update_stores_the_new_secret() {
    let bed = testbed();
    let peer = peer_a();
    let id = store_test_identity(&bed, &peer).await;

    bed.ui.push_reply(dialog_entry("fresh-secret"));
    let (handle, _) = bed.daemon.get_identity(&peer, id).await.unwrap();
    let returned = handle
        .request_credentials_update(&peer, "please confirm your new password")
        .await
        .unwrap();
    assert_eq!(returned, id);

    let info = bed.store.credentials(id, true).await.unwrap();
    assert_eq!(info.secret, signet_core::SecretString::new("fresh-secret"));

    // A canceled dialog surfaces as an aborted operation.
    bed.ui.push_reply(dialog_canceled());
    let err = handle
        .request_credentials_update(&peer, "again")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationCanceled);
}
