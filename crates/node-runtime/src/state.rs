//! The shared, read-mostly state a responder needs to serve a request: configuration,
//! ring handles, the metric registry, and the topic list.

use crate::config::NodeConfig;
use crate::metric::MetricRegistry;
use ring_store::{PrimaryRing, SecondaryBank};
use std::collections::HashMap;
use std::sync::Arc;

pub struct NodeState {
    pub config: NodeConfig,
    pub primary: Option<Arc<PrimaryRing>>,
    pub secondary: Option<Arc<SecondaryBank>>,
    pub metrics: MetricRegistry,
    pub topics: HashMap<String, String>,
}

impl NodeState {
    pub fn channel_names(&self) -> Vec<String> {
        let mut names = self.config.primary.channel_names.clone();
        names.extend(self.config.secondary.channel_names.iter().cloned());
        names
    }

    pub fn primary_index(&self, name: &str) -> Option<usize> {
        self.config.primary.channel_names.iter().position(|n| n == name)
    }

    pub fn secondary_index(&self, name: &str) -> Option<usize> {
        self.config.secondary.channel_names.iter().position(|n| n == name)
    }
}
