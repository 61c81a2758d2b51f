use thiserror::Error;

/// Failures raised while assembling a [`crate::config::NodeConfig`] from a raw
/// key/value mapping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("key `{key}` is not a valid boolean: `{value}`")]
    InvalidBool { key: &'static str, value: String },

    #[error("key `{key}` is not a valid number: `{value}`")]
    InvalidNumber { key: &'static str, value: String },

    #[error("key `{key}` expected {expected} entries, found {found}")]
    ChannelListLength {
        key: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("could not resolve a non-loopback IPv4 address for `auto`")]
    NoAutoAddress,

    #[error("ip value `{0}` is neither a literal address, `auto`, nor `localhost`")]
    InvalidIp(String),
}

/// Failures raised by core runtime plumbing: transport setup, registration, and
/// lifecycle control. Wire-protocol errors (metric/command dispatch) are returned as
/// plain strings per the request/reply contract, not as this type.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ring error: {0}")]
    Ring(#[from] ring_store::RingError),

    #[error("transport error: {0}")]
    Transport(#[from] zeromq::ZmqError),

    #[error("node is already running")]
    AlreadyRunning,
}
