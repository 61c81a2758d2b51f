//! Request dispatch: turns a decoded [`InboundMessage`] into a reply by taking ring
//! snapshots, evaluating metric specifiers, or answering a command.

use crate::metric::{ChannelBundle, ParamValue};
use crate::protocol::{not_recognized, InboundMessage, Reply};
use crate::state::NodeState;
use bytes::Bytes;
use ring_store::{Snapshot, TimeWindow};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

const UNKNOWN_METRIC_OR_CHANNEL: &str = "unknown metric and/or channel";
const READY: &[u8] = b"READY";
const SHUTDOWN_POLL: std::time::Duration = std::time::Duration::from_millis(200);

/// Splits a metric specifier `name[:ch1[,ch2…][:param…]]` into its name, channel
/// list, and extra parameters.
fn parse_specifier(spec: &str) -> (String, Vec<String>, Vec<String>) {
    let parts: Vec<&str> = spec.split(':').collect();
    let name = parts[0].to_string();
    if parts.len() < 2 {
        return (name, Vec::new(), Vec::new());
    }
    let channels = parts[1].split(',').map(str::to_string).collect();
    let params = parts[2..].iter().map(|s| (*s).to_string()).collect();
    (name, channels, params)
}

/// The reply-mapping key for a specifier: `:` and `,` replaced with `_`.
fn specifier_key(spec: &str) -> String {
    spec.replace(':', "_").replace(',', "_")
}

struct Snapshots {
    primary: Option<Snapshot>,
    secondary: Option<Vec<Snapshot>>,
}

fn take_snapshots(state: &NodeState, window: TimeWindow) -> Snapshots {
    Snapshots {
        primary: state.primary.as_ref().map(|ring| ring.snapshot(window)),
        secondary: state.secondary.as_ref().map(|bank| bank.snapshot_all(window)),
    }
}

fn channel_data(state: &NodeState, name: &str, snaps: &Snapshots) -> Option<Vec<f64>> {
    if let Some(idx) = state.primary_index(name) {
        return snaps.primary.as_ref().map(|s| s.data[idx].clone());
    }
    if let Some(idx) = state.secondary_index(name) {
        return snaps
            .secondary
            .as_ref()
            .and_then(|all| all.get(idx))
            .map(|s| s.data[0].clone());
    }
    None
}

fn channel_ages(state: &NodeState, name: &str, snaps: &Snapshots) -> Option<Vec<f64>> {
    if state.primary_index(name).is_some() {
        return snaps.primary.as_ref().map(|s| s.ages.clone());
    }
    if let Some(idx) = state.secondary_index(name) {
        return snaps
            .secondary
            .as_ref()
            .and_then(|all| all.get(idx))
            .map(|s| s.ages.clone());
    }
    None
}

/// Evaluates a list of metric specifiers against a single time-window.
pub fn dispatch_metric(state: &NodeState, specifiers: &[String], window: TimeWindow) -> Reply {
    let snaps = take_snapshots(state, window);
    let mut results = serde_json::Map::new();

    for spec in specifiers {
        let key = specifier_key(spec);
        let (name, channels, params) = parse_specifier(spec);
        let all_known = state.channel_names();
        let channels_found = !channels.is_empty() && channels.iter().all(|c| all_known.contains(c));

        if !channels_found || !state.metrics.contains(&name) {
            results.insert(key, Value::String(UNKNOWN_METRIC_OR_CHANNEL.to_string()));
            continue;
        }

        let mut bundle = ChannelBundle::default();
        for ch in &channels {
            bundle.channels.push(channel_data(state, ch, &snaps).unwrap_or_default());
        }
        let params: Vec<ParamValue> = params.iter().map(|p| ParamValue::coerce(p)).collect();

        match state.metrics.invoke(&name, &bundle, &params) {
            Ok(value) => {
                results.insert(key, value);
            }
            Err(message) => {
                results.insert(key, Value::String(message));
            }
        }
    }

    Value::Object(results)
}

/// Returns `{data, time}` for each requested channel.
pub fn dispatch_data(state: &NodeState, channels: &[String], window: TimeWindow) -> Reply {
    let snaps = take_snapshots(state, window);
    let mut results = serde_json::Map::new();

    for ch in channels {
        match (channel_data(state, ch, &snaps), channel_ages(state, ch, &snaps)) {
            (Some(data), Some(time)) => {
                results.insert(ch.clone(), serde_json::json!({ "data": data, "time": time }));
            }
            _ => {
                results.insert(ch.clone(), Value::String(UNKNOWN_METRIC_OR_CHANNEL.to_string()));
            }
        }
    }

    Value::Object(results)
}

fn get_nodeinfo(state: &NodeState) -> Reply {
    let buffer_full = state.primary.as_ref().is_some_and(|ring| ring.is_full());
    serde_json::json!({
        "name": state.config.identity.name,
        "type": state.config.identity.kind,
        "id": state.config.identity.id,
        "description": state.config.identity.description,
        "channel_names": state.config.primary.channel_names,
        "channel_names_secondary": state.config.secondary.channel_names,
        "buffer_full": buffer_full,
    })
}

fn get_data_list(state: &NodeState) -> Reply {
    let mut map = serde_json::Map::new();
    for (name, desc) in state
        .config
        .primary
        .channel_names
        .iter()
        .zip(&state.config.primary.channel_descriptions)
    {
        map.insert(name.clone(), Value::String(desc.clone()));
    }
    for (name, desc) in state
        .config
        .secondary
        .channel_names
        .iter()
        .zip(&state.config.secondary.channel_descriptions)
    {
        map.insert(name.clone(), Value::String(desc.clone()));
    }
    Value::Object(map)
}

/// Dispatches a single command string of form `name[:arg…]`. Unrecognized commands
/// yield the literal string `"unknown command"`.
pub fn dispatch_command(state: &NodeState, command: &str) -> Reply {
    let mut parts = command.split(':');
    let name = parts.next().unwrap_or("");

    match name {
        "get_metric_list" => serde_json::to_value(state.metrics.list()).unwrap_or(Value::Null),
        "get_nodeinfo" => get_nodeinfo(state),
        "get_publisher" => state
            .config
            .publisher_url()
            .map_or(Value::Null, Value::String),
        "get_data_list" => get_data_list(state),
        "get_topic_list" => serde_json::to_value(&state.topics).unwrap_or(Value::Null),
        _ => Value::String("unknown command".to_string()),
    }
}

/// Dispatches a fully decoded inbound message to the matching handler. A missing or
/// unrecognized `type`, or one whose type-specific fields are absent, yields
/// `{"error": "not recognized"}`.
pub fn dispatch(state: &NodeState, msg: &InboundMessage) -> Reply {
    match msg.kind() {
        Some("metric") => match msg.timewindow() {
            Some(window) => dispatch_metric(state, &msg.parameters(), window),
            None => not_recognized(),
        },
        Some("data") => match msg.timewindow() {
            Some(window) => dispatch_data(state, &msg.parameters(), window),
            None => not_recognized(),
        },
        Some("command") => match msg.command() {
            Some(command) => dispatch_command(state, command),
            None => not_recognized(),
        },
        _ => not_recognized(),
    }
}

/// Connects to the broker's back end, sends the ready sentinel, and serves requests
/// until the backend connection closes or `run_flag` clears. The broker re-attaches
/// the ready sentinel after each forwarded reply, so this loop never sends it again
/// itself.
pub async fn run_responder(
    backend_url: &str,
    state: Arc<NodeState>,
    run_flag: Arc<AtomicBool>,
) -> Result<(), zeromq::ZmqError> {
    let span = tracing::info_span!("responder", backend = backend_url);
    let _enter = span.enter();

    let mut socket = ReqSocket::new();
    socket.connect(backend_url).await?;
    socket.send(Bytes::from_static(READY).into()).await?;
    info!("responder ready");

    while run_flag.load(Ordering::Relaxed) {
        let request = tokio::select! {
            result = socket.recv() => result,
            () = tokio::time::sleep(SHUTDOWN_POLL) => continue,
        };
        let Ok(request) = request else {
            info!("backend closed, responder exiting");
            return Ok(());
        };

        let mut frames = request.into_vec();
        if frames.is_empty() {
            continue;
        }
        let address = frames.remove(0).to_vec();
        let payload = frames.into_iter().next().unwrap_or_default();

        let reply = match InboundMessage::parse(address.clone(), &payload) {
            Some(msg) => dispatch(&state, &msg),
            None => not_recognized(),
        };

        let mut out: ZmqMessage = Bytes::from(address).into();
        out.push_back(Bytes::from(serde_json::to_vec(&reply).unwrap_or_default()));
        socket.send(out).await?;
    }
    Ok(())
}
