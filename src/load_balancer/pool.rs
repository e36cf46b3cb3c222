//! Weighted relay node pool.
//!
//! # Responsibilities
//! - Expand node weights into a slot table
//! - Map a URL hash and escalation level to a node
//! - Build relay endpoint URLs

use crate::config::RelayNodeConfig;
use crate::load_balancer::HostSelector;

/// A relay node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayNode {
    pub name: String,
    pub host: String,
    pub weight: u32,
}

/// Relay nodes with a weighted slot table.
///
/// Slots interleave nodes round by round, so a node with weight 3 next to
/// one with weight 1 yields `a b a a` rather than `a a a b`.
#[derive(Debug)]
pub struct RelayPool {
    nodes: Vec<RelayNode>,
    /// Indices into `nodes`.
    slots: Vec<usize>,
    scheme: String,
}

impl RelayPool {
    /// Create a pool from configuration. Zero-weight nodes are skipped.
    pub fn new(configs: &[RelayNodeConfig], scheme: &str) -> Self {
        let mut nodes = Vec::with_capacity(configs.len());
        for config in configs {
            if config.weight == 0 {
                tracing::warn!(node = %config.name, "Skipping relay node with zero weight");
                continue;
            }
            nodes.push(RelayNode {
                name: config.name.clone(),
                host: config.host.clone(),
                weight: config.weight,
            });
        }

        let rounds = nodes.iter().map(|n| n.weight).max().unwrap_or(0);
        let mut slots = Vec::new();
        for round in 0..rounds {
            for (i, node) in nodes.iter().enumerate() {
                if node.weight > round {
                    slots.push(i);
                }
            }
        }

        Self {
            nodes,
            slots,
            scheme: scheme.to_string(),
        }
    }

    pub fn nodes(&self) -> &[RelayNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl HostSelector for RelayPool {
    fn select_host(&self, url_hash: u32, level: u32) -> Option<String> {
        if self.slots.is_empty() {
            return None;
        }
        let base = self.slots[url_hash as usize % self.slots.len()];
        let index = match level {
            0 | 1 => base,
            k => (base + (k as usize - 1)) % self.nodes.len(),
        };
        let node = &self.nodes[index];
        tracing::debug!(node = %node.name, level, "Selected relay node");
        Some(node.host.clone())
    }

    fn build_url(&self, host: &str, endpoint: &str) -> String {
        format!("{}://{}/{}", self.scheme, host, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, weight: u32) -> RelayNodeConfig {
        RelayNodeConfig {
            name: name.into(),
            host: format!("{name}.relay.test"),
            weight,
        }
    }

    #[test]
    fn test_weighted_slots_interleave() {
        let pool = RelayPool::new(&[config("a", 3), config("b", 1)], "https");
        let hosts: Vec<_> = (0..4).map(|h| pool.select_host(h, 1).unwrap()).collect();
        assert_eq!(
            hosts,
            ["a.relay.test", "b.relay.test", "a.relay.test", "a.relay.test"]
        );
    }

    #[test]
    fn test_same_hash_is_stable() {
        let pool = RelayPool::new(&[config("a", 1), config("b", 1), config("c", 1)], "https");
        assert_eq!(pool.select_host(7, 0), pool.select_host(7, 1));
        assert_eq!(pool.select_host(7, 1), pool.select_host(7, 1));
    }

    #[test]
    fn test_escalation_moves_to_other_nodes() {
        let pool = RelayPool::new(&[config("a", 1), config("b", 1), config("c", 1)], "https");
        let l1 = pool.select_host(0, 1).unwrap();
        let l2 = pool.select_host(0, 2).unwrap();
        let l3 = pool.select_host(0, 3).unwrap();
        assert_eq!(l1, "a.relay.test");
        assert_eq!(l2, "b.relay.test");
        assert_eq!(l3, "c.relay.test");
        assert_eq!(pool.select_host(0, 4).unwrap(), l1);
    }

    #[test]
    fn test_empty_pool() {
        let pool = RelayPool::new(&[config("a", 0)], "https");
        assert!(pool.is_empty());
        assert_eq!(pool.select_host(1, 1), None);
    }

    #[test]
    fn test_build_url() {
        let pool = RelayPool::new(&[config("a", 1)], "http");
        assert_eq!(pool.build_url("a.relay.test:8443", "http"), "http://a.relay.test:8443/http");
    }
}
