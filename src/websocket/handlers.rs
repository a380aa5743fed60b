//! Command handlers
//!
//! Each handler runs to completion inside the connection's dispatch
//! loop and queues its replies on the outbound channel.

use crate::websocket::dispatcher::{Connection, ConnectionMode};
use crate::websocket::protocol::Envelope;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use salon_core::{GroupAction, RoomSession, SessionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Route one parsed frame to its handler
pub(crate) async fn dispatch(conn: &mut Connection, request: &Envelope) -> Result<()> {
    match request.action.as_str() {
        "mode" => handle_mode(conn, request).await,
        "rooms" => handle_rooms(conn, request).await,
        "librarians" => handle_librarians(conn, request).await,
        "voice" => handle_voice(conn, request).await,
        action => match conn.state.registry.resolve_action(action) {
            Some((session, GroupAction::Converse)) => {
                run_turn(conn, session, request, &request.content).await
            }
            Some((session, GroupAction::ChangeRoom)) => {
                handle_change_room(conn, session, request).await
            }
            // Not an error: clients distinguish unimplemented features
            // from protocol failures by this reply shape.
            None => {
                debug!(action, "Unregistered action");
                conn.send(
                    request
                        .reply(action.to_string())
                        .with_sub_action("unknown")
                        .with_content(format!("unknown action '{action}'")),
                )
                .await;
                Ok(())
            }
        },
    }
}

async fn handle_mode(conn: &mut Connection, request: &Envelope) -> Result<()> {
    conn.mode = match request.sub_action.as_str() {
        "editor" => ConnectionMode::Editor,
        "app" => ConnectionMode::App,
        other => bail!("unknown mode '{other}'"),
    };
    debug!(mode = ?conn.mode, "Connection mode set");
    conn.send(request.reply("mode").with_sub_action(request.sub_action.clone()))
        .await;
    Ok(())
}

async fn handle_rooms(conn: &mut Connection, request: &Envelope) -> Result<()> {
    match request.sub_action.as_str() {
        "get" => {
            let mut reply = request.reply("rooms").with_sub_action("get");
            reply.groups = Some(conn.state.registry.roster().await);
            conn.send(reply).await;
            Ok(())
        }
        "change" => {
            let session = conn.state.registry.require(&request.room)?;
            let room = session.switch_room(&request.sub_room).await?;
            let mut reply = request.reply("rooms").with_sub_action("change");
            reply.sub_room = room;
            conn.send(reply).await;
            Ok(())
        }
        "reset" => {
            let session = conn.state.registry.require(&request.room)?;
            let auto_start = session.reset().await;
            conn.send(request.reply("rooms").with_sub_action("reset"))
                .await;
            if auto_start {
                run_turn(conn, session, request, "start").await?;
            }
            Ok(())
        }
        other => bail!("unknown rooms sub-action '{other}'"),
    }
}

async fn handle_librarians(conn: &mut Connection, request: &Envelope) -> Result<()> {
    let mut reply = request.reply("librarians");
    reply.librarians = Some(conn.state.registry.all_librarians().clone());
    conn.send(reply).await;
    Ok(())
}

async fn handle_voice(conn: &mut Connection, request: &Envelope) -> Result<()> {
    conn.voice = match request.sub_action.as_str() {
        "on" => true,
        "off" => false,
        other => bail!("unknown voice sub-action '{other}'"),
    };
    conn.send(request.reply("voice").with_sub_action(request.sub_action.clone()))
        .await;
    Ok(())
}

async fn handle_change_room(
    conn: &mut Connection,
    session: Arc<RoomSession>,
    request: &Envelope,
) -> Result<()> {
    let target = if request.sub_room.is_empty() {
        &request.content
    } else {
        &request.sub_room
    };
    let room = session.switch_room(target).await?;
    let mut reply = request.reply(request.action.clone());
    reply.room = session.group().name.clone();
    reply.sub_room = room;
    conn.send(reply).await;
    Ok(())
}

/// Run one conversation turn, forwarding its event stream as envelopes.
///
/// Editors get every snapshot; both modes get one reply frame per
/// finished agent turn, a change-room frame on handoff, and a complete
/// frame at the end.
async fn run_turn(
    conn: &mut Connection,
    session: Arc<RoomSession>,
    request: &Envelope,
    text: &str,
) -> Result<()> {
    let group = session.group().name.clone();
    let author = if request.user_id.is_empty() {
        "User".to_string()
    } else {
        request.user_id.clone()
    };
    let text = text.to_string();

    let (tx, mut rx) = mpsc::channel(64);
    let sink = salon_core::SnapshotSink::new(tx);
    let cancel = conn.cancel.clone();
    let task_session = Arc::clone(&session);
    let task = tokio::spawn(async move {
        task_session.converse(&author, &text, &sink, &cancel).await
    });

    // (agent, response text) of the turn currently streaming
    let mut pending: Option<(String, String)> = None;

    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Snapshot(snapshot) => {
                if snapshot.turn_started {
                    flush_reply(conn, request, &group, pending.take()).await;
                }
                if let Some(agent) = &snapshot.agent {
                    let response = snapshot
                        .hints
                        .get("response")
                        .map(|h| h.content.clone())
                        .unwrap_or_default();
                    pending = Some((agent.clone(), response));
                }
                if conn.mode == ConnectionMode::Editor {
                    let mut frame = request.reply(group.clone()).with_sub_action("snapshot");
                    frame.room = group.clone();
                    frame.agent = snapshot.agent.clone();
                    frame.snapshot = Some(snapshot);
                    conn.send(frame).await;
                }
            }
            SessionEvent::RoomChanged { room, context } => {
                flush_reply(conn, request, &group, pending.take()).await;
                let mut frame = request
                    .reply(format!("{group}-change-room"))
                    .with_content(context);
                frame.room = group.clone();
                frame.sub_room = room;
                conn.send(frame).await;
            }
            SessionEvent::Completed { reason } => {
                flush_reply(conn, request, &group, pending.take()).await;
                let mut frame = request
                    .reply(group.clone())
                    .with_sub_action("complete")
                    .with_content(reason.unwrap_or_default());
                frame.room = group.clone();
                conn.send(frame).await;
            }
        }
    }

    task.await.context("turn task panicked")??;
    Ok(())
}

/// Emit the finished agent reply (and optional audio) for one turn
async fn flush_reply(
    conn: &Connection,
    request: &Envelope,
    group: &str,
    pending: Option<(String, String)>,
) {
    let Some((agent, response)) = pending else {
        return;
    };
    if response.is_empty() {
        return;
    }

    let mut frame = request
        .reply(group.to_string())
        .with_sub_action("reply")
        .with_content(response.clone());
    frame.room = group.to_string();
    frame.agent = Some(agent.clone());
    conn.send(frame).await;

    if conn.voice {
        if let Some(bytes) = conn.state.speech.synthesize(&response).await {
            let mut audio = request
                .reply(group.to_string())
                .with_sub_action("audio-chunk");
            audio.room = group.to_string();
            audio.agent = Some(agent);
            audio.audio = Some(BASE64.encode(bytes));
            conn.send(audio).await;
        }
    }
}
