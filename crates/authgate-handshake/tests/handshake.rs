//! Handshake state machine, driven end to end with in-memory fakes.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use authgate_crypto::{SECRET_LEN, ServerKeyPair, SharedSecret, encrypt_for_server, session_hash};
use authgate_handshake::{
    HandshakeError, HandshakeMachine, LoginChannel, Resolution, SERVER_ID,
    Verdict, reasons,
};
use authgate_protocol::{LoginStart, PlayerId, ProfileProperty};
use authgate_session::SessionRegistry;
use authgate_store::{
    CredentialRecord, CredentialStore, MemoryCredentialStore, StoreError,
};
use authgate_verify::{ConfirmedIdentity, IdentityAuthority};
use tokio::sync::Notify;
use uuid::Uuid;

// =========================================================================
// Fakes
// =========================================================================

fn keys() -> Arc<ServerKeyPair> {
    static KEYS: OnceLock<Arc<ServerKeyPair>> = OnceLock::new();
    Arc::clone(KEYS.get_or_init(|| Arc::new(ServerKeyPair::generate().expect("keygen"))))
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Records everything the machine asks of the connection.
struct RecordingChannel {
    key: SocketAddr,
    challenges: Mutex<Vec<(String, Vec<u8>, Vec<u8>)>>,
    reinjected: Mutex<Vec<LoginStart>>,
    disconnects: Mutex<Vec<String>>,
}

impl RecordingChannel {
    fn at(port: u16) -> Self {
        Self {
            key: addr(port),
            challenges: Mutex::default(),
            reinjected: Mutex::default(),
            disconnects: Mutex::default(),
        }
    }

    fn last_token(&self) -> Vec<u8> {
        self.challenges.lock().unwrap().last().expect("challenge").2.clone()
    }

    fn take_reinjected(&self) -> Option<LoginStart> {
        self.reinjected.lock().unwrap().pop()
    }

    fn reinjected_count(&self) -> usize {
        self.reinjected.lock().unwrap().len()
    }

    fn disconnect_reasons(&self) -> Vec<String> {
        self.disconnects.lock().unwrap().clone()
    }
}

impl LoginChannel for RecordingChannel {
    fn connection_key(&self) -> SocketAddr {
        self.key
    }

    async fn send_challenge(
        &self,
        server_id: &str,
        public_key: &[u8],
        verify_token: &[u8],
    ) -> Result<(), HandshakeError> {
        self.challenges.lock().unwrap().push((
            server_id.to_string(),
            public_key.to_vec(),
            verify_token.to_vec(),
        ));
        Ok(())
    }

    async fn reinject(&self, message: LoginStart) -> Result<(), HandshakeError> {
        self.reinjected.lock().unwrap().push(message);
        Ok(())
    }

    async fn disconnect(&self, reason: &str) {
        self.disconnects.lock().unwrap().push(reason.to_string());
    }
}

/// Scripted identity authority.
#[derive(Default)]
struct FakeAuthority {
    existing: HashSet<String>,
    confirmation: Option<ConfirmedIdentity>,
    /// When set, `confirm_identity` parks until notified.
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
    exists_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
    seen_hash: Mutex<Option<String>>,
    seen_ip: Mutex<Option<IpAddr>>,
}

impl FakeAuthority {
    fn confirming(identity: ConfirmedIdentity) -> Self {
        Self {
            confirmation: Some(identity),
            ..Self::default()
        }
    }

    fn with_existing(mut self, name: &str) -> Self {
        self.existing.insert(name.to_string());
        self
    }
}

impl IdentityAuthority for FakeAuthority {
    async fn identity_exists(&self, name: &str) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.existing.contains(name)
    }

    async fn confirm_identity(
        &self,
        _name: &str,
        session_hash: &str,
        ip: Option<IpAddr>,
    ) -> Option<ConfirmedIdentity> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_hash.lock().unwrap() = Some(session_hash.to_string());
        *self.seen_ip.lock().unwrap() = ip;
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.confirmation.clone()
    }
}

/// A store whose every lookup fails.
struct BrokenStore;

impl CredentialStore for BrokenStore {
    async fn lookup_verified_flag(&self, _: &str) -> Result<Option<bool>, StoreError> {
        Err(StoreError::LockPoisoned)
    }

    async fn lookup_password_hash(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::LockPoisoned)
    }

    async fn upsert_credential(&self, _: CredentialRecord) -> Result<(), StoreError> {
        Err(StoreError::LockPoisoned)
    }
}

fn notch() -> ConfirmedIdentity {
    ConfirmedIdentity {
        id: PlayerId(Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap()),
        name: "Notch".into(),
        properties: vec![ProfileProperty {
            name: "textures".into(),
            value: "e30=".into(),
            signature: Some("c2ln".into()),
        }],
    }
}

type Machine = HandshakeMachine<MemoryCredentialStore, FakeAuthority>;

/// A machine plus a handle on its authority, for call inspection.
struct Harness {
    machine: Arc<Machine>,
    authority: Arc<FakeAuthority>,
}

impl Harness {
    fn new(store: MemoryCredentialStore, authority: FakeAuthority) -> Self {
        let authority = Arc::new(authority);
        let machine = Arc::new(HandshakeMachine::new(
            keys(),
            Arc::new(store),
            Arc::clone(&authority),
            Arc::new(SessionRegistry::new()),
        ));
        Self { machine, authority }
    }

    /// A store that already knows `name` as a verified account.
    fn verified(name: &str, authority: FakeAuthority) -> Self {
        let store = MemoryCredentialStore::with_records([CredentialRecord::verified(
            PlayerId::offline(name),
            name,
            None,
        )]);
        Self::new(store, authority)
    }

    /// Runs a LoginStart for `name` on `channel` up to the challenge.
    async fn challenged(&self, channel: &RecordingChannel, name: &str) -> Vec<u8> {
        let verdict = self
            .machine
            .on_login_start(channel, LoginStart::new(name))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Held);
        channel.last_token()
    }
}

/// Client side: encrypt `secret` and `token` for the server key.
fn answer(token: &[u8], secret: &[u8; SECRET_LEN]) -> (Vec<u8>, Vec<u8>) {
    let keys = keys();
    let der = keys.public_key_der();
    (
        encrypt_for_server(der, secret).unwrap(),
        encrypt_for_server(der, token).unwrap(),
    )
}

// =========================================================================
// Scenario A: verified success
// =========================================================================

#[tokio::test]
async fn test_verified_login_confirms_rewrites_and_passes_once() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40001);
    let mut start = LoginStart::new("Notch");
    start.profile_id = Some(PlayerId(Uuid::from_u128(666)));

    let verdict = h.machine.on_login_start(&channel, start).await.unwrap();
    assert_eq!(verdict, Verdict::Held);
    assert!(h.machine.is_pending("Notch"));

    let (server_id, public_key, token) =
        channel.challenges.lock().unwrap()[0].clone();
    assert_eq!(server_id, SERVER_ID);
    assert_eq!(public_key, keys().public_key_der());
    assert_eq!(token.len(), 4);

    let secret = [0x42u8; SECRET_LEN];
    let (enc_secret, enc_token) = answer(&token, &secret);
    let verdict = h
        .machine
        .on_encryption_response(&channel, &enc_secret, &enc_token)
        .await
        .unwrap();
    assert_eq!(verdict, Verdict::Held);

    // The authority saw the hash the client computes on its side.
    let expected_hash = session_hash(
        "",
        keys().public_key_der(),
        &SharedSecret::from_bytes(&secret).unwrap(),
    );
    assert_eq!(
        h.authority.seen_hash.lock().unwrap().as_deref(),
        Some(expected_hash.as_str())
    );

    // Session exists before the re-injected message comes back.
    let sessions = h.machine.sessions();
    assert!(sessions.is_authenticated(&notch().id));
    assert!(sessions.get(&notch().id).unwrap().verified_identity);

    let reinjected = channel.take_reinjected().expect("reinjected");
    assert_eq!(reinjected.name, "Notch");
    assert_eq!(reinjected.profile_id, Some(notch().id));
    assert_eq!(reinjected.properties, notch().properties);

    let verdict = h
        .machine
        .on_login_start(&channel, reinjected.clone())
        .await
        .unwrap();
    match verdict {
        Verdict::Pass { message, resolution } => {
            assert_eq!(message, reinjected);
            assert_eq!(resolution.identity("Notch"), notch().id);
            assert!(resolution.is_verified());
        }
        other => panic!("expected Pass, got {other:?}"),
    }

    assert!(!h.machine.is_pending("Notch"));
    assert!(!h.machine.has_ticket("Notch"));
    assert!(!h.machine.is_tracking(&addr(40001)));
    assert!(channel.disconnect_reasons().is_empty());
    assert_eq!(channel.reinjected_count(), 0);
}

#[tokio::test]
async fn test_unknown_name_with_remote_profile_takes_verified_path() {
    let h = Harness::new(
        MemoryCredentialStore::new(),
        FakeAuthority::confirming(notch()).with_existing("Notch"),
    );
    let channel = RecordingChannel::at(40002);

    h.challenged(&channel, "Notch").await;

    assert_eq!(h.authority.exists_calls.load(Ordering::SeqCst), 1);
    assert_eq!(channel.challenges.lock().unwrap().len(), 1);
    assert_eq!(channel.reinjected_count(), 0);
}

#[tokio::test]
async fn test_confirm_by_default_passes_peer_ip() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40003);
    let token = h.challenged(&channel, "Notch").await;

    let (s, t) = answer(&token, &[1; SECRET_LEN]);
    h.machine.on_encryption_response(&channel, &s, &t).await.unwrap();

    assert_eq!(*h.authority.seen_ip.lock().unwrap(), Some(addr(40003).ip()));
}

#[tokio::test]
async fn test_forward_client_ip_disabled_sends_no_ip() {
    let authority = Arc::new(FakeAuthority::confirming(notch()));
    let store = MemoryCredentialStore::with_records([CredentialRecord::verified(
        PlayerId::offline("Notch"),
        "Notch",
        None,
    )]);
    let machine = HandshakeMachine::new(
        keys(),
        Arc::new(store),
        Arc::clone(&authority),
        Arc::new(SessionRegistry::new()),
    )
    .forward_client_ip(false);
    let channel = RecordingChannel::at(40004);

    machine
        .on_login_start(&channel, LoginStart::new("Notch"))
        .await
        .unwrap();
    let (s, t) = answer(&channel.last_token(), &[1; SECRET_LEN]);
    machine.on_encryption_response(&channel, &s, &t).await.unwrap();

    assert_eq!(authority.confirm_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*authority.seen_ip.lock().unwrap(), None);
}

// =========================================================================
// Scenario B: local path
// =========================================================================

#[tokio::test]
async fn test_unknown_name_without_profile_released_unmodified() {
    let h = Harness::new(MemoryCredentialStore::new(), FakeAuthority::default());
    let channel = RecordingChannel::at(40010);
    let mut start = LoginStart::new("steve");
    start.profile_id = Some(PlayerId(Uuid::from_u128(7)));

    let verdict = h.machine.on_login_start(&channel, start.clone()).await.unwrap();

    assert_eq!(verdict, Verdict::Held);
    assert!(channel.challenges.lock().unwrap().is_empty());
    assert!(h.machine.sessions().is_empty());
    let reinjected = channel.take_reinjected().expect("reinjected");
    assert_eq!(reinjected, start);

    let verdict = h.machine.on_login_start(&channel, reinjected).await.unwrap();
    match verdict {
        Verdict::Pass { resolution, .. } => {
            assert_eq!(resolution, Resolution::Local);
            // The client's own id is not the identity it plays as.
            assert_eq!(resolution.identity("steve"), PlayerId::offline("steve"));
        }
        other => panic!("expected Pass, got {other:?}"),
    }
    assert!(!h.machine.is_pending("steve"));
    assert!(h.machine.sessions().is_empty());
}

#[tokio::test]
async fn test_known_local_name_skips_existence_probe() {
    let store = MemoryCredentialStore::with_records([CredentialRecord::local(
        PlayerId::offline("alice"),
        "alice",
        "$2b$hash",
        None,
    )]);
    let h = Harness::new(store, FakeAuthority::default().with_existing("alice"));
    let channel = RecordingChannel::at(40011);

    h.machine
        .on_login_start(&channel, LoginStart::new("alice"))
        .await
        .unwrap();

    assert_eq!(h.authority.exists_calls.load(Ordering::SeqCst), 0);
    assert_eq!(channel.reinjected_count(), 1);
}

#[tokio::test]
async fn test_ticket_only_passes_on_issuing_connection() {
    let h = Harness::new(MemoryCredentialStore::new(), FakeAuthority::default());
    let first = RecordingChannel::at(40012);
    let second = RecordingChannel::at(40013);

    h.machine
        .on_login_start(&first, LoginStart::new("steve"))
        .await
        .unwrap();
    assert!(h.machine.has_ticket("steve"));

    // Another connection claiming the same name while the first is
    // being released is a duplicate, not a free pass.
    let result = h.machine.on_login_start(&second, LoginStart::new("steve")).await;
    assert!(matches!(result, Err(HandshakeError::DuplicateLogin { .. })));
    assert_eq!(second.disconnect_reasons(), vec![reasons::FAILED.to_string()]);

    let reinjected = first.take_reinjected().unwrap();
    let verdict = h.machine.on_login_start(&first, reinjected).await.unwrap();
    assert!(matches!(verdict, Verdict::Pass { .. }));
}

// =========================================================================
// Scenario C: forged token
// =========================================================================

#[tokio::test]
async fn test_forged_token_rejected_and_purged() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40020);
    let token = h.challenged(&channel, "Notch").await;

    let mut forged = token.clone();
    forged[0] ^= 0xff;
    let (s, t) = answer(&forged, &[9; SECRET_LEN]);
    let result = h.machine.on_encryption_response(&channel, &s, &t).await;

    assert!(matches!(result, Err(HandshakeError::TokenMismatch { .. })));
    assert_eq!(channel.disconnect_reasons(), vec![reasons::INVALID_TOKEN.to_string()]);
    assert_eq!(h.authority.confirm_calls.load(Ordering::SeqCst), 0);
    assert!(!h.machine.is_pending("Notch"));
    assert!(!h.machine.is_tracking(&addr(40020)));
    assert!(h.machine.sessions().is_empty());
    assert_eq!(channel.reinjected_count(), 0);
}

#[tokio::test]
async fn test_undecryptable_secret_rejected_with_encryption_error() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40021);
    let token = h.challenged(&channel, "Notch").await;
    let (_, t) = answer(&token, &[1; SECRET_LEN]);

    let result = h
        .machine
        .on_encryption_response(&channel, b"garbage", &t)
        .await;

    assert!(matches!(result, Err(HandshakeError::Crypto(_))));
    assert_eq!(channel.disconnect_reasons(), vec![reasons::ENCRYPTION_ERROR.to_string()]);
    assert!(!h.machine.is_pending("Notch"));
}

// =========================================================================
// Scenario D: confirmation refused
// =========================================================================

#[tokio::test]
async fn test_confirmation_refused_rejects_without_fallback() {
    let h = Harness::verified("Notch", FakeAuthority::default());
    let channel = RecordingChannel::at(40030);
    let token = h.challenged(&channel, "Notch").await;

    let (s, t) = answer(&token, &[3; SECRET_LEN]);
    let result = h.machine.on_encryption_response(&channel, &s, &t).await;

    assert!(matches!(result, Err(HandshakeError::ConfirmationFailed { .. })));
    assert_eq!(channel.disconnect_reasons(), vec![reasons::TRY_AGAIN.to_string()]);
    assert_eq!(channel.reinjected_count(), 0);
    assert!(!h.machine.has_ticket("Notch"));
    assert!(!h.machine.is_pending("Notch"));
    assert!(h.machine.sessions().is_empty());
}

// =========================================================================
// Responses without a matching challenge
// =========================================================================

#[tokio::test]
async fn test_response_from_unknown_connection_is_session_error() {
    let h = Harness::new(MemoryCredentialStore::new(), FakeAuthority::default());
    let channel = RecordingChannel::at(40040);

    let result = h.machine.on_encryption_response(&channel, b"x", b"y").await;

    assert!(matches!(result, Err(HandshakeError::SessionNotFound)));
    assert_eq!(channel.disconnect_reasons(), vec![reasons::SESSION_ERROR.to_string()]);
}

#[tokio::test]
async fn test_response_after_success_never_forwards_twice() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40041);
    let token = h.challenged(&channel, "Notch").await;
    let (s, t) = answer(&token, &[5; SECRET_LEN]);

    h.machine.on_encryption_response(&channel, &s, &t).await.unwrap();
    let again = h.machine.on_encryption_response(&channel, &s, &t).await;

    assert!(matches!(again, Err(HandshakeError::SessionNotFound)));
    assert_eq!(channel.reinjected_count(), 1);
    assert_eq!(h.authority.confirm_calls.load(Ordering::SeqCst), 1);
    // The unused ticket's session goes with the rejected connection.
    assert!(h.machine.sessions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_response_while_confirming_never_double_forwards() {
    let gate = Arc::new(Notify::new());
    let mut authority = FakeAuthority::confirming(notch());
    authority.gate = Some(Arc::clone(&gate));
    let h = Harness::verified("Notch", authority);
    let channel = Arc::new(RecordingChannel::at(40042));
    let token = h.challenged(&channel, "Notch").await;
    let (s, t) = answer(&token, &[6; SECRET_LEN]);

    let first = {
        let machine = Arc::clone(&h.machine);
        let channel = Arc::clone(&channel);
        let (s, t) = (s.clone(), t.clone());
        tokio::spawn(async move {
            machine.on_encryption_response(channel.as_ref(), &s, &t).await
        })
    };
    h.authority.entered.notified().await;

    let second = h.machine.on_encryption_response(channel.as_ref(), &s, &t).await;
    assert!(matches!(second, Err(HandshakeError::SessionNotFound)));

    gate.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.unwrap(), Verdict::Abandoned);

    assert_eq!(channel.reinjected_count(), 0);
    assert_eq!(h.authority.confirm_calls.load(Ordering::SeqCst), 1);
    assert!(h.machine.sessions().is_empty());
}

// =========================================================================
// Duplicate names
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_same_name_admit_exactly_one() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));

    let mut tasks = Vec::new();
    for port in 0..16u16 {
        let machine = Arc::clone(&h.machine);
        tasks.push(tokio::spawn(async move {
            let channel = RecordingChannel::at(41000 + port);
            machine.on_login_start(&channel, LoginStart::new("Notch")).await
        }));
    }

    let mut held = 0;
    let mut duplicates = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(Verdict::Held) => held += 1,
            Err(HandshakeError::DuplicateLogin { .. }) => duplicates += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(held, 1);
    assert_eq!(duplicates, 15);
    assert_eq!(h.machine.pending_len(), 1);
}

#[tokio::test]
async fn test_second_login_start_on_same_connection_rejected() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40050);
    h.challenged(&channel, "Notch").await;

    let result = h.machine.on_login_start(&channel, LoginStart::new("Other")).await;

    assert!(matches!(result, Err(HandshakeError::AlreadyInProgress)));
    assert!(!h.machine.is_pending("Other"));
}

// =========================================================================
// Store failures
// =========================================================================

#[tokio::test]
async fn test_store_failure_rejects_connection() {
    let machine = HandshakeMachine::new(
        keys(),
        Arc::new(BrokenStore),
        Arc::new(FakeAuthority::default().with_existing("Notch")),
        Arc::new(SessionRegistry::new()),
    );
    let channel = RecordingChannel::at(40060);

    let result = machine.on_login_start(&channel, LoginStart::new("Notch")).await;

    assert!(matches!(result, Err(HandshakeError::Store(_))));
    assert_eq!(channel.disconnect_reasons(), vec![reasons::FAILED.to_string()]);
    assert_eq!(channel.reinjected_count(), 0);
    assert!(!machine.is_pending("Notch"));
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_connection_closed_while_challenged_purges_silently() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40070);
    let token = h.challenged(&channel, "Notch").await;

    h.machine.connection_closed(addr(40070));

    assert!(!h.machine.is_pending("Notch"));
    assert!(!h.machine.is_tracking(&addr(40070)));
    assert!(channel.disconnect_reasons().is_empty());

    // A late response finds nothing.
    let (s, t) = answer(&token, &[1; SECRET_LEN]);
    let late = h.machine.on_encryption_response(&channel, &s, &t).await;
    assert!(matches!(late, Err(HandshakeError::SessionNotFound)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connection_closed_while_confirming_discards_result() {
    let gate = Arc::new(Notify::new());
    let mut authority = FakeAuthority::confirming(notch());
    authority.gate = Some(Arc::clone(&gate));
    let h = Harness::verified("Notch", authority);
    let channel = Arc::new(RecordingChannel::at(40071));
    let token = h.challenged(&channel, "Notch").await;
    let (s, t) = answer(&token, &[2; SECRET_LEN]);

    let pending = {
        let machine = Arc::clone(&h.machine);
        let channel = Arc::clone(&channel);
        tokio::spawn(async move {
            machine.on_encryption_response(channel.as_ref(), &s, &t).await
        })
    };
    h.authority.entered.notified().await;
    h.machine.connection_closed(addr(40071));
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), Verdict::Abandoned);
    assert_eq!(channel.reinjected_count(), 0);
    assert!(h.machine.sessions().is_empty());
    assert!(!h.machine.has_ticket("Notch"));
}

#[tokio::test]
async fn test_connection_closed_before_ticket_used_drops_verified_session() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40072);
    let token = h.challenged(&channel, "Notch").await;
    let (s, t) = answer(&token, &[4; SECRET_LEN]);
    h.machine.on_encryption_response(&channel, &s, &t).await.unwrap();
    assert!(h.machine.sessions().is_authenticated(&notch().id));

    h.machine.connection_closed(addr(40072));

    assert!(!h.machine.has_ticket("Notch"));
    assert!(h.machine.sessions().is_empty());
}

#[tokio::test]
async fn test_connection_closed_after_newer_login_keeps_newer_session() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40074);
    let token = h.challenged(&channel, "Notch").await;
    let (s, t) = answer(&token, &[4; SECRET_LEN]);
    h.machine.on_encryption_response(&channel, &s, &t).await.unwrap();
    h.machine.sessions().create(notch().id, true, addr(40075));

    h.machine.connection_closed(addr(40074));

    let session = h.machine.sessions().get(&notch().id).unwrap();
    assert_eq!(session.owner, addr(40075));
}

#[tokio::test]
async fn test_expire_disconnects_with_session_expired() {
    let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
    let channel = RecordingChannel::at(40073);
    h.challenged(&channel, "Notch").await;

    h.machine.expire(&channel).await;

    assert_eq!(channel.disconnect_reasons(), vec![reasons::EXPIRED.to_string()]);
    assert!(!h.machine.is_pending("Notch"));
}

// =========================================================================
// Properties
// =========================================================================

mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any echoed token other than the issued one is rejected and
        /// leaves no session behind.
        #[test]
        fn mismatched_token_always_rejects(
            wrong in proptest::collection::vec(any::<u8>(), 0..8),
            secret in any::<[u8; SECRET_LEN]>(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let outcome = runtime.block_on(async {
                let h = Harness::verified("Notch", FakeAuthority::confirming(notch()));
                let channel = RecordingChannel::at(42000);
                let token = h.challenged(&channel, "Notch").await;
                if wrong == token {
                    return None;
                }
                let (s, t) = answer(&wrong, &secret);
                let result = h.machine.on_encryption_response(&channel, &s, &t).await;
                Some((result, h.machine.sessions().len(), channel.reinjected_count()))
            });

            if let Some((result, sessions, reinjected)) = outcome {
                let is_token_mismatch = matches!(result, Err(HandshakeError::TokenMismatch { .. }));
                prop_assert!(is_token_mismatch);
                prop_assert_eq!(sessions, 0);
                prop_assert_eq!(reinjected, 0);
            }
        }
    }
}
