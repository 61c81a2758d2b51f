//! End-to-end demonstration of a measurement node: a fake sample source feeding the
//! primary ring, a couple of registered metrics, and a command-line dump of the
//! replies a responder would produce.
//!
//! This binary does not open real sockets; it drives the same dispatch functions the
//! broker/responder pair uses internally, against an in-process node state, so the
//! demo runs without any external stream or network dependency.

use node_runtime::metric::{ChannelBundle, ParamValue};
use node_runtime::{responder, MetricRegistry, NodeConfig, NodeState};
use ring_store::{PrimaryRing, SecondaryBank, TimeWindow};
use std::collections::HashMap;
use std::sync::Arc;

fn mean(bundle: &ChannelBundle, _params: &[ParamValue]) -> Result<serde_json::Value, String> {
    let values = bundle.channels.first().ok_or("mean requires one channel")?;
    if values.is_empty() {
        return Ok(serde_json::json!(null));
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Ok(serde_json::json!(mean))
}

fn scale(bundle: &ChannelBundle, params: &[ParamValue]) -> Result<serde_json::Value, String> {
    let values = bundle.channels.first().ok_or("scale requires one channel")?;
    let ParamValue::Number(factor) = params.first().ok_or("scale requires a numeric factor")? else {
        return Err("scale's parameter must be numeric".to_string());
    };
    Ok(serde_json::json!(values.iter().map(|v| v * factor).collect::<Vec<_>>()))
}

/// A metric with no real use beyond exercising the dispatch path without touching
/// ring data at all — picks one of two fixed replies at random.
fn pingpong(_bundle: &ChannelBundle, _params: &[ParamValue]) -> Result<serde_json::Value, String> {
    use rand::seq::SliceRandom;
    let reply = ["ping", "pong"].choose(&mut rand::thread_rng()).copied().unwrap_or("ping");
    Ok(serde_json::json!(reply))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    println!("Measurement node demo\n");

    let mut raw = HashMap::new();
    raw.insert("nodename".to_string(), "demo01".to_string());
    raw.insert("nodetype".to_string(), "eeg".to_string());
    raw.insert("ip".to_string(), "127.0.0.1".to_string());
    raw.insert("n_channels".to_string(), "2".to_string());
    raw.insert("channel_names".to_string(), "fp1,fp2".to_string());
    raw.insert("channel_descriptions".to_string(), "frontal left,frontal right".to_string());
    raw.insert("sampling_rate".to_string(), "250".to_string());
    raw.insert("buffer_size_s".to_string(), "2".to_string());
    raw.insert("n_channels_secondary".to_string(), "1".to_string());
    raw.insert("channel_names_secondary".to_string(), "alpha_power".to_string());
    raw.insert("run_publisher".to_string(), "true".to_string());
    raw.insert("port_publisher".to_string(), "5003".to_string());

    let config = NodeConfig::from_map(&raw).expect("valid demo configuration");
    println!("Node: {} ({})", config.identity.name, config.identity.kind);
    println!("Primary buffer: {} samples at {} Hz", config.primary.buffer_size, config.primary.sampling_rate);

    let primary = Arc::new(PrimaryRing::new(config.primary.n_channels, config.primary.buffer_size, config.primary.sampling_rate).unwrap());
    let secondary = Arc::new(SecondaryBank::new(&[config.secondary.buffer_size.max(1)]).unwrap());

    let mut t = 0.0;
    for i in 0..600u32 {
        t += 1.0 / config.primary.sampling_rate;
        let fp1 = (t * 10.0).sin();
        let fp2 = (t * 10.0).cos();
        primary.append(&[fp1, fp2], Some(t)).unwrap();
        if i % 50 == 0 {
            secondary.push_sample(0, t, fp1.abs()).unwrap();
        }
    }

    let mut metrics = MetricRegistry::new();
    metrics.register("mean", "arithmetic mean of a channel", Arc::new(mean));
    metrics.register("scale", "scales a channel by a numeric factor", Arc::new(scale));
    metrics.register("pingpong", "returns ping or pong at random", Arc::new(pingpong));

    let state = NodeState {
        config,
        primary: Some(primary),
        secondary: Some(secondary),
        metrics,
        topics: HashMap::from([("alerts".to_string(), "threshold-crossing notifications".to_string())]),
    };

    println!("\n--- get_nodeinfo ---");
    println!("{}", responder::dispatch_command(&state, "get_nodeinfo"));

    println!("\n--- get_metric_list ---");
    println!("{}", responder::dispatch_command(&state, "get_metric_list"));

    println!("\n--- get_publisher ---");
    println!("{}", responder::dispatch_command(&state, "get_publisher"));

    println!("\n--- metric: mean:fp1 over last 1s ---");
    println!(
        "{}",
        responder::dispatch_metric(&state, &["mean:fp1".to_string()], TimeWindow::new(0.0, 1.0))
    );

    println!("\n--- metric: scale:fp2:2.0 ---");
    println!(
        "{}",
        responder::dispatch_metric(&state, &["scale:fp2:2.0".to_string()], TimeWindow::new(0.0, 0.1))
    );

    println!("\n--- metric: unknown specifier ---");
    println!(
        "{}",
        responder::dispatch_metric(&state, &["nope:fp1".to_string()], TimeWindow::new(0.0, 1.0))
    );

    println!("\n--- metric: pingpong:fp1 ---");
    println!(
        "{}",
        responder::dispatch_metric(&state, &["pingpong:fp1".to_string()], TimeWindow::new(0.0, 1.0))
    );

    println!("\n--- data: alpha_power ---");
    println!(
        "{}",
        responder::dispatch_data(&state, &["alpha_power".to_string()], TimeWindow::new(0.0, 2.0))
    );

    println!("\nDone.");
}
