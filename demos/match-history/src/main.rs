//! Connects to a scripted in-memory coordinator, then pulls a player's
//! recent matches and profile and prints them as JSON.
//!
//! Run with `RUST_LOG=debug` to see the handshake.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use underlords::prelude::*;
use underlords_protocol::{EMsg, FieldValue, MessageBuilder, ProtocolError, decode_named};
use underlords_transport::{GcPayload, MemoryTransport, SentMessage};

const PLAYER: &str = "76561199218271603";
const BOT: u64 = 76561197960287930;

// ---------------------------------------------------------------------------
// Scripted coordinator
// ---------------------------------------------------------------------------

fn reply(msg: EMsg, body: Result<MessageBuilder, ProtocolError>) -> Vec<TransportEvent> {
    match body {
        Ok(body) => vec![TransportEvent::ReceivedFromGc {
            app_id: AppId::UNDERLORDS,
            msg_type: msg.id(),
            payload: GcPayload::Protobuf(body.encode().into()),
        }],
        Err(e) => {
            tracing::warn!(error = %e, %msg, "coordinator script failed to build reply");
            Vec::new()
        }
    }
}

fn history(requested_rows: u64) -> Result<MessageBuilder, ProtocolError> {
    let matches = (0..requested_rows.min(3))
        .map(|i| {
            MessageBuilder::new("CMsgClientToGCGetMatchHistoryResponse.Match")?
                .set("match_id", FieldValue::U64(129_784_686 - i))
                .and_then(|m| m.set("final_place", FieldValue::U32(1 + i as u32 * 3)))
                .and_then(|m| m.set("mmr_change", FieldValue::I32(40 - i as i32 * 35)))
                .map(|m| FieldValue::Message(m.message().clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    MessageBuilder::for_msg(EMsg::GetMatchHistoryResponse)?
        .set("result", FieldValue::U32(1))?
        .set("matches", FieldValue::List(matches))
}

fn profile(account_id: u32) -> Result<MessageBuilder, ProtocolError> {
    let player = MessageBuilder::new("CMsgPlayerProfile")?
        .set("account_id", FieldValue::U32(account_id))?
        .set("level", FieldValue::U32(42))?
        .set("rank_tier", FieldValue::U32(31))?;

    MessageBuilder::for_msg(EMsg::GetProfileResponse)?
        .set("result", FieldValue::U32(1))?
        .set("player_profile", FieldValue::Message(player.message().clone()))
}

fn coordinator(sent: &SentMessage) -> Vec<TransportEvent> {
    let Some(msg) = EMsg::from_id(sent.msg_type) else {
        return Vec::new();
    };
    let request = msg
        .schema()
        .and_then(|schema| decode_named(schema, sent.payload.bytes()).ok());
    let field = |name: &str| {
        request
            .as_ref()
            .and_then(|r| r.get(name))
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    };

    match msg {
        EMsg::ClientHello => reply(EMsg::ClientWelcome, MessageBuilder::for_msg(EMsg::ClientWelcome)),
        EMsg::GetMatchHistory => reply(EMsg::GetMatchHistoryResponse, history(field("request_rows"))),
        EMsg::GetProfile => reply(
            EMsg::GetProfileResponse,
            profile(u32::try_from(field("account_id")).unwrap_or_default()),
        ),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (transport, events) = MemoryTransport::new();
    transport.set_steam_id(Some(SteamId::new(BOT)));
    transport.set_responder(coordinator);
    let transport = Arc::new(transport);

    let client = GcClient::builder().spawn(transport.clone(), events)?;
    client.on(EventKind::Debug, |event| {
        if let GcEvent::Debug(line) = event {
            tracing::debug!("{line}");
        }
    });

    let (connected_tx, connected_rx) = oneshot::channel();
    client.once(EventKind::ConnectedToGc, move |_| {
        let _ = connected_tx.send(());
    });

    transport.inject(TransportEvent::AppLaunched(AppId::UNDERLORDS));
    tokio::time::timeout(Duration::from_secs(5), connected_rx).await??;
    tracing::info!("connected to coordinator");

    let matches = client
        .fetch_matches(MatchesRequest::new(PLAYER).rows(2))
        .await?;
    println!("{}", serde_json::to_string_pretty(&matches.to_json())?);

    let player = client.fetch_profile(ProfileRequest::new(PLAYER)).await?;
    println!("{}", serde_json::to_string_pretty(&player.to_json())?);

    client.shutdown();
    Ok(())
}
