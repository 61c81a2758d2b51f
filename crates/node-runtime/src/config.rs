//! Typed node configuration assembled from a generic string key/value mapping — the
//! shape any external loader (an ini file, environment variables, a CLI) would hand to
//! the node. Parsing that external source is out of scope; turning its output into a
//! validated [`NodeConfig`] is this module's job.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Identity and endpoint information for a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeIdentity {
    pub name: String,
    pub kind: String,
    pub id: String,
    pub description: String,
    pub ip: IpAddr,
    pub port_frontend: u16,
    pub port_backend: u16,
    pub port_publisher: Option<u16>,
}

/// Layout of a node's primary channels.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryLayout {
    pub lsl_stream_name: String,
    pub n_channels: usize,
    pub channel_names: Vec<String>,
    pub channel_descriptions: Vec<String>,
    pub sampling_rate: f64,
    pub buffer_size: usize,
}

/// Layout of a node's secondary channels.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryLayout {
    pub n_channels: usize,
    pub channel_names: Vec<String>,
    pub channel_descriptions: Vec<String>,
    pub buffer_size: usize,
}

/// The fully validated, typed configuration of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub identity: NodeIdentity,
    pub primary_node: bool,
    pub run_publisher: bool,
    pub n_workers: usize,
    pub primary: PrimaryLayout,
    pub secondary_data: bool,
    pub default_channel: String,
    pub secondary: SecondaryLayout,
}

fn get<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(String::as_str)
}

fn str2bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_bool(map: &HashMap<String, String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match get(map, key) {
        Some(v) => str2bool(key, v),
        None => Ok(default),
    }
}

fn parse_usize(map: &HashMap<String, String>, key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match get(map, key) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            key,
            value: v.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_f64(map: &HashMap<String, String>, key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match get(map, key) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            key,
            value: v.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_port(map: &HashMap<String, String>, key: &'static str, default: u16) -> Result<u16, ConfigError> {
    Ok(parse_usize(map, key, default as usize)? as u16)
}

fn listify(map: &HashMap<String, String>, key: &str) -> Vec<String> {
    match get(map, key) {
        Some(v) if !v.trim().is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

fn pad_descriptions(mut descriptions: Vec<String>, n: usize) -> Vec<String> {
    descriptions.resize(n, String::new());
    descriptions
}

fn validate_channel_names(key: &'static str, names: &[String], n: usize) -> Result<(), ConfigError> {
    if names.len() != n {
        return Err(ConfigError::ChannelListLength {
            key,
            expected: n,
            found: names.len(),
        });
    }
    Ok(())
}

fn resolve_ip(value: &str) -> Result<IpAddr, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => auto_ip(),
        "localhost" => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        literal => literal
            .parse()
            .map_err(|_| ConfigError::InvalidIp(value.to_string())),
    }
}

/// Finds the machine's non-loopback IPv4 address by opening a UDP socket toward a
/// well-known external address and reading back the local endpoint it bound to — no
/// packet is actually sent.
fn auto_ip() -> Result<IpAddr, ConfigError> {
    let socket = UdpSocket::bind("0.0.0.0:0").map_err(|_| ConfigError::NoAutoAddress)?;
    socket
        .connect("8.8.8.8:80")
        .map_err(|_| ConfigError::NoAutoAddress)?;
    socket
        .local_addr()
        .map(|addr| addr.ip())
        .map_err(|_| ConfigError::NoAutoAddress)
}

impl NodeConfig {
    /// Assembles a [`NodeConfig`] from a generic string map, applying defaults,
    /// lenient boolean/number coercion, list splitting, and IP resolution.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let name = get(map, "nodename").unwrap_or("basenode").to_string();
        let kind = get(map, "nodetype").unwrap_or("").to_string();
        let id = get(map, "nodeid").unwrap_or("00").to_string();
        let description = get(map, "nodedesc").unwrap_or("base node").to_string();
        let ip = resolve_ip(get(map, "ip").unwrap_or("auto"))?;

        let primary_node = parse_bool(map, "primary_node", true)?;
        let port_frontend = parse_port(map, "port_frontend", 5001)?;
        let port_backend = parse_port(map, "port_backend", 5002)?;
        let run_publisher = parse_bool(map, "run_publisher", false)?;
        let port_publisher = if run_publisher {
            Some(parse_port(map, "port_publisher", 5003)?)
        } else {
            None
        };
        let n_workers = parse_usize(map, "n_workers", 5)?;

        let lsl_stream_name = get(map, "lsl_stream_name").unwrap_or("").to_string();
        let n_channels = parse_usize(map, "n_channels", 0)?;
        let channel_names = listify(map, "channel_names");
        validate_channel_names("channel_names", &channel_names, n_channels)?;
        let channel_descriptions = pad_descriptions(listify(map, "channel_descriptions"), n_channels);
        let sampling_rate = parse_f64(map, "sampling_rate", 1.0)?;
        let buffer_size_s = parse_f64(map, "buffer_size_s", 30.0)?;
        let buffer_size = (buffer_size_s * sampling_rate).ceil() as usize;

        let secondary_data = parse_bool(map, "secondary_data", false)?;
        let default_channel = get(map, "default_channel").unwrap_or("").to_string();
        let n_channels_secondary = parse_usize(map, "n_channels_secondary", 0)?;
        let channel_names_secondary = listify(map, "channel_names_secondary");
        validate_channel_names(
            "channel_names_secondary",
            &channel_names_secondary,
            n_channels_secondary,
        )?;
        let channel_descriptions_secondary = pad_descriptions(
            listify(map, "channel_descriptions_secondary"),
            n_channels_secondary,
        );
        let buffer_size_secondary = parse_usize(map, "buffer_size_secondary", 0)?;

        Ok(Self {
            identity: NodeIdentity {
                name,
                kind,
                id,
                description,
                ip,
                port_frontend,
                port_backend,
                port_publisher,
            },
            primary_node,
            run_publisher,
            n_workers,
            primary: PrimaryLayout {
                lsl_stream_name,
                n_channels,
                channel_names,
                channel_descriptions,
                sampling_rate,
                buffer_size,
            },
            secondary_data,
            default_channel,
            secondary: SecondaryLayout {
                n_channels: n_channels_secondary,
                channel_names: channel_names_secondary,
                channel_descriptions: channel_descriptions_secondary,
                buffer_size: buffer_size_secondary,
            },
        })
    }

    /// `tcp://ip:port` URL of the publisher socket, if enabled.
    pub fn publisher_url(&self) -> Option<String> {
        self.identity
            .port_publisher
            .map(|port| format!("tcp://{}:{}", self.identity.ip, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_map() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("nodename".into(), "eeg01".into());
        m.insert("ip".into(), "10.0.0.1".into());
        m.insert("n_channels".into(), "2".into());
        m.insert("channel_names".into(), "ch1,ch2".into());
        m.insert("sampling_rate".into(), "250".into());
        m.insert("buffer_size_s".into(), "4".into());
        m
    }

    #[test]
    fn assembles_defaults_for_missing_keys() {
        let cfg = NodeConfig::from_map(&base_map()).unwrap();
        assert_eq!(cfg.identity.name, "eeg01");
        assert_eq!(cfg.identity.port_frontend, 5001);
        assert!(cfg.primary_node);
        assert!(!cfg.run_publisher);
        assert_eq!(cfg.identity.port_publisher, None);
    }

    #[test]
    fn computes_buffer_size_from_seconds_and_rate() {
        let cfg = NodeConfig::from_map(&base_map()).unwrap();
        assert_eq!(cfg.primary.buffer_size, 1000);
    }

    #[test]
    fn lenient_bool_parsing_accepts_common_spellings() {
        let mut m = base_map();
        for (v, expected) in [("1", true), ("yes", true), ("TRUE", true), ("0", false), ("no", false)] {
            m.insert("primary_node".into(), v.into());
            let cfg = NodeConfig::from_map(&m).unwrap();
            assert_eq!(cfg.primary_node, expected, "input {v}");
        }
    }

    #[test]
    fn rejects_unrecognized_bool_spelling() {
        let mut m = base_map();
        m.insert("primary_node".into(), "maybe".into());
        assert!(matches!(
            NodeConfig::from_map(&m),
            Err(ConfigError::InvalidBool { key: "primary_node", .. })
        ));
    }

    #[test]
    fn rejects_channel_name_count_mismatch() {
        let mut m = base_map();
        m.insert("n_channels".into(), "3".into());
        assert_eq!(
            NodeConfig::from_map(&m).unwrap_err(),
            ConfigError::ChannelListLength {
                key: "channel_names",
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn localhost_resolves_to_loopback() {
        let mut m = base_map();
        m.insert("ip".into(), "localhost".into());
        let cfg = NodeConfig::from_map(&m).unwrap();
        assert_eq!(cfg.identity.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn missing_descriptions_default_to_empty_strings() {
        let cfg = NodeConfig::from_map(&base_map()).unwrap();
        assert_eq!(cfg.primary.channel_descriptions, vec!["".to_string(), "".to_string()]);
    }

    #[test]
    fn publisher_url_is_none_when_disabled() {
        let cfg = NodeConfig::from_map(&base_map()).unwrap();
        assert_eq!(cfg.publisher_url(), None);
    }

    #[test]
    fn publisher_url_reflects_ip_and_port_when_enabled() {
        let mut m = base_map();
        m.insert("run_publisher".into(), "true".into());
        m.insert("port_publisher".into(), "5003".into());
        let cfg = NodeConfig::from_map(&m).unwrap();
        assert_eq!(cfg.publisher_url().as_deref(), Some("tcp://10.0.0.1:5003"));
    }
}
