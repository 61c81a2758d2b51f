//! Runtime for a distributed measurement node.
//!
//! A node ingests a live sample stream into a bounded primary ring buffer, lets
//! user-supplied workers fill independent secondary ring buffers, serves metric/data/
//! command queries over a request/reply broker, optionally publishes asynchronous
//! notifications over a pub/sub socket, and announces itself periodically over a UDP
//! beacon. See [`supervisor::Supervisor`] for the entry point that wires all of this
//! together.

pub mod beacon;
pub mod broker;
pub mod config;
pub mod error;
pub mod metric;
pub mod protocol;
pub mod publisher;
pub mod receiver;
pub mod responder;
pub mod state;
pub mod supervisor;

pub use config::{NodeConfig, NodeIdentity, PrimaryLayout, SecondaryLayout};
pub use error::{ConfigError, NodeError};
pub use metric::{ChannelBundle, MetricFn, MetricRegistry, ParamValue};
pub use protocol::{ClientAddress, InboundMessage, Reply};
pub use receiver::SampleSource;
pub use state::NodeState;
pub use supervisor::Supervisor;
