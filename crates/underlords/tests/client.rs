//! Integration tests for `GcClient` against an in-memory transport.
//!
//! Time is paused, so hello timers only fire when a test advances the
//! clock. `settle()` yields long enough for the client task to drain its
//! queues before assertions run.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::time;
use underlords::prelude::*;
use underlords::{GcPayload, SessionState, TransportError};
use underlords_protocol::{EMsg, FieldValue, MessageBuilder, decode_named};
use underlords_transport::MemoryTransport;

const GABEN: &str = "76561197960287930";
const GABEN_ACCOUNT: u32 = 22202;

// =========================================================================
// Helpers
// =========================================================================

const ALL_KINDS: [EventKind; 9] = [
    EventKind::ConnectedToGc,
    EventKind::DisconnectedFromGc,
    EventKind::ConnectionStatus,
    EventKind::PlayersProfile,
    EventKind::MatchList,
    EventKind::Match,
    EventKind::FriendRanks,
    EventKind::SpectateUser,
    EventKind::Debug,
];

type Seen = Arc<Mutex<Vec<GcEvent>>>;

struct Harness {
    transport: Arc<MemoryTransport>,
    client: GcClient,
    seen: Seen,
}

impl Harness {
    /// Domain events seen so far, without `Debug` noise.
    fn events(&self) -> Vec<GcEvent> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() != EventKind::Debug)
            .cloned()
            .collect()
    }

    fn debug_lines(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                GcEvent::Debug(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.seen.lock().unwrap().iter().filter(|e| e.kind() == kind).count()
    }

    fn hellos(&self) -> usize {
        self.transport.sent_of_type(EMsg::ClientHello.id()).len()
    }

    fn inject(&self, event: TransportEvent) {
        assert!(self.transport.inject(event));
    }

    /// Launches the app, lets the first hello go out and answers it.
    async fn connect(&self) {
        self.inject(TransportEvent::AppLaunched(AppId::UNDERLORDS));
        settle().await;
        time::advance(ms(500)).await;
        settle().await;
        self.inject(gc(EMsg::ClientWelcome, Vec::new()));
        settle().await;
    }
}

async fn harness() -> Harness {
    let (transport, events) = MemoryTransport::new();
    let transport = Arc::new(transport);
    transport.set_steam_id(Some(SteamId::individual(1)));

    let client = GcClient::builder()
        .spawn(transport.clone(), events)
        .expect("client starts");

    let seen = Seen::default();
    for kind in ALL_KINDS {
        let seen = Arc::clone(&seen);
        client.on(kind, move |event| seen.lock().unwrap().push(event.clone()));
    }
    settle().await;

    Harness {
        transport,
        client,
        seen,
    }
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn gc(msg: EMsg, body: Vec<u8>) -> TransportEvent {
    TransportEvent::ReceivedFromGc {
        app_id: AppId::UNDERLORDS,
        msg_type: msg.id(),
        payload: GcPayload::Protobuf(Bytes::from(body)),
    }
}

fn status_body(status: GcConnectionStatus) -> Vec<u8> {
    MessageBuilder::for_msg(EMsg::ClientConnectionStatus)
        .and_then(|b| b.set("status", FieldValue::EnumNumber(status.as_i32())))
        .unwrap()
        .encode()
}

fn match_list_body(result: u32) -> Vec<u8> {
    MessageBuilder::for_msg(EMsg::GetMatchHistoryResponse)
        .and_then(|b| b.set("result", FieldValue::U32(result)))
        .unwrap()
        .encode()
}

fn last_body(h: &Harness, msg: EMsg) -> Decoded {
    let sent = h.transport.sent_of_type(msg.id());
    let last = sent.last().expect("message was sent");
    assert!(last.payload.is_protobuf());
    decode_named(msg.schema().unwrap(), last.payload.bytes()).unwrap()
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_app_launch_sends_hello_after_500ms() {
    let h = harness().await;
    h.inject(TransportEvent::AppLaunched(AppId::UNDERLORDS));
    settle().await;

    time::advance(ms(499)).await;
    settle().await;
    assert_eq!(h.hellos(), 0);

    time::advance(ms(1)).await;
    settle().await;
    assert_eq!(h.hellos(), 1);
    assert_eq!(
        h.transport.sent()[0].app_id,
        AppId::UNDERLORDS,
        "hello goes to the owned app"
    );
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_hellos_back_off() {
    let h = harness().await;
    h.inject(TransportEvent::AppLaunched(AppId::UNDERLORDS));
    settle().await;

    // Hellos at 500, 1500, 3500, 7500 ms.
    let mut counts = Vec::new();
    for step in [500, 1000, 2000, 4000] {
        time::advance(ms(step)).await;
        settle().await;
        counts.push(h.hellos());
    }
    assert_eq!(counts, vec![1, 2, 3, 4]);

    time::advance(ms(7999)).await;
    settle().await;
    assert_eq!(h.hellos(), 4);

    let status = h.client.status().await.unwrap();
    assert_eq!(status.state, SessionState::AwaitingWelcome);
    assert_eq!(status.hello_interval, Some(ms(8000)));
}

#[tokio::test(start_paused = true)]
async fn test_launch_of_other_app_sends_nothing() {
    let h = harness().await;
    h.inject(TransportEvent::AppLaunched(AppId::new(570)));
    settle().await;
    time::advance(ms(5000)).await;
    settle().await;
    assert_eq!(h.hellos(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_welcome_connects_once_and_stops_hellos() {
    let h = harness().await;
    h.connect().await;

    assert_eq!(h.events(), vec![GcEvent::ConnectedToGc]);
    assert!(h.client.have_session().await.unwrap());

    // A duplicate welcome does not reconnect.
    h.inject(gc(EMsg::ClientWelcome, Vec::new()));
    settle().await;
    assert_eq!(h.count(EventKind::ConnectedToGc), 1);

    let hellos = h.hellos();
    time::advance(ms(120_000)).await;
    settle().await;
    assert_eq!(h.hellos(), hellos);

    let status = h.client.status().await.unwrap();
    assert_eq!(status.state, SessionState::HaveSession);
    assert_eq!(status.hello_interval, Some(ms(1000)));
}

#[tokio::test(start_paused = true)]
async fn test_responder_welcome_completes_handshake() {
    let h = harness().await;
    h.transport.set_responder(|sent| {
        if sent.msg_type == EMsg::ClientHello.id() {
            vec![gc(EMsg::ClientWelcome, Vec::new())]
        } else {
            Vec::new()
        }
    });

    h.inject(TransportEvent::AppLaunched(AppId::UNDERLORDS));
    settle().await;
    time::advance(ms(500)).await;
    settle().await;

    assert_eq!(h.count(EventKind::ConnectedToGc), 1);
    assert_eq!(h.hellos(), 1);
}

// =========================================================================
// Connection status and lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_status_no_session_disconnects_once_and_rehandshakes() {
    let h = harness().await;
    h.connect().await;
    let hellos = h.hellos();

    h.inject(gc(
        EMsg::ClientConnectionStatus,
        status_body(GcConnectionStatus::NoSession),
    ));
    settle().await;

    let events = h.events();
    assert_eq!(events.len(), 3, "{events:?}");
    assert_eq!(events[0], GcEvent::ConnectedToGc);
    assert!(matches!(
        events[1],
        GcEvent::ConnectionStatus {
            status: GcConnectionStatus::NoSession,
            ..
        }
    ));
    assert_eq!(
        events[2],
        GcEvent::DisconnectedFromGc(GcConnectionStatus::NoSession)
    );
    assert!(!h.client.have_session().await.unwrap());

    time::advance(ms(500)).await;
    settle().await;
    assert_eq!(h.hellos(), hellos + 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_without_field_reads_as_have_session() {
    let h = harness().await;
    h.connect().await;

    h.inject(gc(EMsg::ClientConnectionStatus, Vec::new()));
    settle().await;

    match h.events().last() {
        Some(GcEvent::ConnectionStatus { status, raw }) => {
            assert_eq!(*status, GcConnectionStatus::HaveSession);
            assert_eq!(raw.get("status"), Some(&Decoded::Null));
        }
        other => panic!("expected connection status, got {other:?}"),
    }
    assert_eq!(h.count(EventKind::DisconnectedFromGc), 0);
    assert!(h.client.have_session().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_app_quit_while_connected_is_silent() {
    let h = harness().await;
    h.connect().await;

    h.inject(TransportEvent::AppQuit(AppId::UNDERLORDS));
    settle().await;

    assert_eq!(h.count(EventKind::DisconnectedFromGc), 0);
    let status = h.client.status().await.unwrap();
    assert_eq!(status.state, SessionState::NoApp);
    assert!(!status.have_session);
    assert_eq!(status.hello_interval, None);
}

#[tokio::test(start_paused = true)]
async fn test_app_quit_when_not_in_app_is_noop() {
    let h = harness().await;
    h.inject(TransportEvent::AppQuit(AppId::UNDERLORDS));
    settle().await;

    assert!(h.seen.lock().unwrap().is_empty());
    assert_eq!(h.client.status().await.unwrap().state, SessionState::NoApp);
}

#[tokio::test(start_paused = true)]
async fn test_transport_disconnect_reports_no_session() {
    let h = harness().await;
    h.connect().await;

    h.inject(TransportEvent::Disconnected);
    settle().await;

    assert_eq!(
        h.events().last(),
        Some(&GcEvent::DisconnectedFromGc(GcConnectionStatus::NoSession))
    );
    assert_eq!(h.client.status().await.unwrap().state, SessionState::NoApp);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_while_awaiting_stops_hellos_silently() {
    let h = harness().await;
    h.inject(TransportEvent::AppLaunched(AppId::UNDERLORDS));
    settle().await;

    h.inject(TransportEvent::Error(TransportError::ConnectionClosed(
        "reset".into(),
    )));
    settle().await;
    time::advance(ms(10_000)).await;
    settle().await;

    assert_eq!(h.hellos(), 0);
    assert!(h.events().is_empty());
}

// =========================================================================
// Routing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_unknown_opcode_emits_only_debug() {
    let h = harness().await;
    h.inject(TransportEvent::ReceivedFromGc {
        app_id: AppId::UNDERLORDS,
        msg_type: 31337,
        payload: GcPayload::Raw(Bytes::from_static(&[1, 2, 3, 4])),
    });
    settle().await;

    assert!(h.events().is_empty());
    assert_eq!(h.debug_lines(), vec!["Got unhandled GC message 31337"]);

    // The client keeps working afterwards.
    h.inject(gc(EMsg::GetFriendRanksResponse, Vec::new()));
    settle().await;
    assert_eq!(h.count(EventKind::FriendRanks), 1);
}

#[tokio::test(start_paused = true)]
async fn test_messages_for_other_apps_are_ignored() {
    let h = harness().await;
    h.inject(TransportEvent::ReceivedFromGc {
        app_id: AppId::new(570),
        msg_type: EMsg::GetProfileResponse.id(),
        payload: GcPayload::Protobuf(Bytes::new()),
    });
    settle().await;

    assert!(h.seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_response_is_reported_not_emitted() {
    let h = harness().await;
    h.inject(gc(EMsg::GetProfileResponse, vec![0x12, 0x7F]));
    settle().await;

    assert_eq!(h.count(EventKind::PlayersProfile), 0);
    let lines = h.debug_lines();
    assert_eq!(lines[0], "Got handled GC message GetProfileResponse (protobuf)");
    assert!(lines[1].starts_with("Failed to decode GC message GetProfileResponse"));
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_request_matches_sends_history_request_and_registers_once() {
    let h = harness().await;
    let (tx, rx) = tokio::sync::oneshot::channel();

    let sent = h.client.request_matches_with(MatchesRequest::new(GABEN).rows(2), move |data| {
        let _ = tx.send(data);
    });
    settle().await;

    assert!(sent);
    let body = last_body(&h, EMsg::GetMatchHistory);
    assert_eq!(body.get("account_id"), Some(&Decoded::Int(i64::from(GABEN_ACCOUNT))));
    assert_eq!(body.get("request_rows"), Some(&Decoded::Int(2)));
    // A zero cursor is not put on the wire.
    assert_eq!(body.get("match_id_cursor"), Some(&Decoded::Null));

    h.inject(gc(EMsg::GetMatchHistoryResponse, match_list_body(1)));
    settle().await;

    let data = rx.await.expect("callback fired");
    assert_eq!(data.get("result"), Some(&Decoded::Int(1)));
    assert_eq!(data.get("matches"), Some(&Decoded::List(vec![])));
}

#[tokio::test(start_paused = true)]
async fn test_spectate_user_defaults_region_mode() {
    let h = harness().await;
    assert!(h.client.spectate_user(SpectateRequest::new(123)));
    settle().await;

    let sent = h.transport.sent_of_type(EMsg::SpectateUser.id());
    assert_eq!(sent.len(), 1);
    // Only spectate_account_id = 123 is on the wire; region_mode is 0.
    assert_eq!(&sent[0].payload.bytes()[..], &[0x08u8, 123][..]);
    let body = last_body(&h, EMsg::SpectateUser);
    assert_eq!(body.get("spectate_account_id"), Some(&Decoded::Int(123)));
    assert_eq!(body.get("region_mode"), Some(&Decoded::Null));
}

#[tokio::test(start_paused = true)]
async fn test_request_profile_invalid_id_sends_nothing() {
    let h = harness().await;

    for bad in ["[U:1:22202:4]", "[U:2:22202]", "[g:1:4]", "not-a-steam-id"] {
        assert!(!h.client.request_profile(ProfileRequest::new(bad)), "{bad}");
    }
    settle().await;

    assert!(h.transport.sent().is_empty());
    assert!(h.seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_request_without_login_returns_false() {
    let h = harness().await;
    h.transport.set_steam_id(None);

    assert!(!h.client.request_profile(ProfileRequest::new(GABEN)));
    assert!(!h.client.get_friend_ranks());
    settle().await;

    assert!(h.transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_request_match_and_friend_ranks_use_their_opcodes() {
    let h = harness().await;
    assert!(h.client.request_match(MatchRequest::new(129_784_686)));
    assert!(h.client.get_friend_ranks());
    settle().await;

    let body = last_body(&h, EMsg::GetPostMatchStats);
    assert_eq!(body.get("match_id").and_then(Decoded::as_u64), Some(129_784_686));
    let ranks = h.transport.sent_of_type(EMsg::GetFriendRanks.id());
    assert_eq!(ranks.len(), 1);
    assert!(ranks[0].payload.bytes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_outstanding_requests_are_answered_in_order() {
    let h = harness().await;
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let order = Arc::clone(&order);
        assert!(h.client.request_matches_with(MatchesRequest::new(GABEN), move |data| {
            order.lock().unwrap().push((tag, data.get("result").cloned()));
        }));
    }
    settle().await;

    h.inject(gc(EMsg::GetMatchHistoryResponse, match_list_body(10)));
    settle().await;
    assert_eq!(
        *order.lock().unwrap(),
        vec![("first", Some(Decoded::Int(10)))]
    );

    h.inject(gc(EMsg::GetMatchHistoryResponse, match_list_body(20)));
    h.inject(gc(EMsg::GetMatchHistoryResponse, match_list_body(30)));
    settle().await;
    assert_eq!(
        *order.lock().unwrap(),
        vec![
            ("first", Some(Decoded::Int(10))),
            ("second", Some(Decoded::Int(20))),
        ]
    );
    assert_eq!(h.count(EventKind::MatchList), 3);
}

#[tokio::test(start_paused = true)]
async fn test_sends_are_announced_on_debug() {
    let h = harness().await;
    h.client.request_profile(ProfileRequest::new(GABEN));
    settle().await;
    h.inject(gc(EMsg::GetProfileResponse, Vec::new()));
    settle().await;

    assert_eq!(
        h.debug_lines(),
        vec![
            "Sending GC message GetProfile",
            "Got handled GC message GetProfileResponse (protobuf)",
        ]
    );
}

// =========================================================================
// fetch_*, listeners, shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_profile_resolves_with_response() {
    let h = harness().await;
    h.transport.set_responder(|sent| {
        if sent.msg_type != EMsg::GetProfile.id() {
            return Vec::new();
        }
        let profile = MessageBuilder::new("CMsgPlayerProfile")
            .and_then(|b| b.set("account_id", FieldValue::U32(GABEN_ACCOUNT)))
            .and_then(|b| b.set("level", FieldValue::U32(7)))
            .unwrap();
        let body = MessageBuilder::for_msg(EMsg::GetProfileResponse)
            .and_then(|b| b.set("player_profile", FieldValue::Message(profile.message().clone())))
            .unwrap()
            .encode();
        vec![gc(EMsg::GetProfileResponse, body)]
    });

    let data = h.client.fetch_profile(ProfileRequest::new(GABEN)).await.unwrap();

    let profile = data.get("player_profile").unwrap();
    assert_eq!(profile.get("account_id"), Some(&Decoded::Int(i64::from(GABEN_ACCOUNT))));
    assert_eq!(profile.get("level"), Some(&Decoded::Int(7)));
    assert_eq!(profile.get("xp"), Some(&Decoded::Null));
    assert_eq!(profile.get("equipped_items"), Some(&Decoded::List(vec![])));
    assert_eq!(data.get("result"), Some(&Decoded::Null));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_with_invalid_id_is_not_sent() {
    let h = harness().await;
    let result = h.client.fetch_matches(MatchesRequest::new("[U:1:22202:4]")).await;
    assert!(matches!(result, Err(GcError::NotSent)));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_spectate_roundtrip_json() {
    let h = harness().await;
    h.transport.set_responder(|sent| {
        if sent.msg_type != EMsg::SpectateUser.id() {
            return Vec::new();
        }
        let body = MessageBuilder::for_msg(EMsg::SpectateUserResponse)
            .and_then(|b| b.set("lobby_id", FieldValue::U64(26_000_000_001)))
            .unwrap()
            .encode();
        vec![gc(EMsg::SpectateUserResponse, body)]
    });

    let data = h.client.fetch_spectate(SpectateRequest::new(123)).await.unwrap();

    assert_eq!(data.to_json()["lobby_id"], serde_json::json!("26000000001"));
    assert_eq!(data.to_json()["server_steam_id"], serde_json::Value::Null);
    assert_eq!(data.to_json()["spectator_token"], serde_json::Value::Null);
}

#[tokio::test(start_paused = true)]
async fn test_once_and_off() {
    let h = harness().await;
    let hits = Arc::new(Mutex::new(0));

    let once_hits = Arc::clone(&hits);
    h.client.once(EventKind::FriendRanks, move |_| *once_hits.lock().unwrap() += 1);
    let every_hits = Arc::clone(&hits);
    let id = h.client.on(EventKind::FriendRanks, move |_| *every_hits.lock().unwrap() += 10);
    settle().await;

    h.inject(gc(EMsg::GetFriendRanksResponse, Vec::new()));
    settle().await;
    assert_eq!(*hits.lock().unwrap(), 11);

    h.client.off(id);
    settle().await;
    h.inject(gc(EMsg::GetFriendRanksResponse, Vec::new()));
    settle().await;
    assert_eq!(*hits.lock().unwrap(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_independent_once_listeners_all_fire_and_keep_clear_of_requests() {
    let h = harness().await;
    let hits: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let hit = |tag: &'static str| {
        let hits = Arc::clone(&hits);
        move |_: &GcEvent| hits.lock().unwrap().push(tag)
    };

    h.client.once(EventKind::ConnectedToGc, hit("a"));
    h.client.once(EventKind::ConnectedToGc, hit("b"));
    h.client.once(EventKind::MatchList, hit("monitor"));
    settle().await;

    h.connect().await;
    let request_hits = Arc::clone(&hits);
    assert!(h.client.request_matches_with(MatchesRequest::new(GABEN), move |_| {
        request_hits.lock().unwrap().push("request");
    }));
    settle().await;
    h.inject(gc(EMsg::GetMatchHistoryResponse, match_list_body(1)));
    settle().await;

    assert_eq!(*hits.lock().unwrap(), vec!["a", "b", "monitor", "request"]);

    // Once listeners are gone after their first event.
    h.inject(gc(EMsg::ClientConnectionStatus, status_body(GcConnectionStatus::NoSession)));
    settle().await;
    time::advance(ms(500)).await;
    settle().await;
    h.inject(gc(EMsg::ClientWelcome, Vec::new()));
    settle().await;
    assert_eq!(hits.lock().unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_client() {
    let h = harness().await;
    h.client.shutdown();
    settle().await;

    assert!(matches!(h.client.status().await, Err(GcError::ClientClosed)));
    assert!(!h.client.request_profile(ProfileRequest::new(GABEN)));
}

#[tokio::test(start_paused = true)]
async fn test_clients_do_not_share_state() {
    let a = harness().await;
    let b = harness().await;
    a.connect().await;

    assert!(a.client.have_session().await.unwrap());
    assert!(!b.client.have_session().await.unwrap());
    assert_eq!(b.count(EventKind::ConnectedToGc), 0);
}
