//! Teleporter links with cooldown
//!
//! A trigger relocates the object to the linked teleporter and puts both ends
//! of the link on cooldown, so the arrival cannot bounce the object straight
//! back.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::consts::TELEPORT_COOLDOWN_MS;
use crate::level::Teleporter;

#[derive(Debug, Clone)]
struct Node {
    position: Vec3,
    linked_to: String,
    /// Triggers are ignored until the layer clock reaches this (ms)
    cooldown_until_ms: f64,
}

/// A completed teleport
#[derive(Debug, Clone, PartialEq)]
pub struct Teleport {
    pub from: String,
    pub to: String,
    pub destination: Vec3,
}

/// All teleporters of a level
#[derive(Debug, Clone, Default)]
pub struct TeleporterNetwork {
    nodes: BTreeMap<String, Node>,
}

impl TeleporterNetwork {
    pub fn new(teleporters: &[Teleporter]) -> Self {
        let nodes = teleporters
            .iter()
            .map(|t| {
                (
                    t.id.clone(),
                    Node {
                        position: t.position,
                        linked_to: t.linked_to_id.clone(),
                        cooldown_until_ms: f64::NEG_INFINITY,
                    },
                )
            })
            .collect();
        Self { nodes }
    }

    pub fn contains(&self, teleporter_id: &str) -> bool {
        self.nodes.contains_key(teleporter_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_cooling_down(&self, teleporter_id: &str, now_ms: f64) -> bool {
        self.nodes
            .get(teleporter_id)
            .is_some_and(|n| now_ms < n.cooldown_until_ms)
    }

    /// Try to teleport through `teleporter_id` at `now_ms`
    pub fn trigger(&mut self, teleporter_id: &str, now_ms: f64) -> Option<Teleport> {
        let node = self.nodes.get(teleporter_id)?;
        if now_ms < node.cooldown_until_ms {
            log::debug!("Teleporter {} cooling down, trigger ignored", teleporter_id);
            return None;
        }
        let linked_to = node.linked_to.clone();
        let Some(destination) = self.nodes.get(&linked_to).map(|n| n.position) else {
            log::warn!(
                "Teleporter {} links to missing {}",
                teleporter_id,
                linked_to
            );
            return None;
        };

        let until = now_ms + TELEPORT_COOLDOWN_MS;
        for id in [teleporter_id, linked_to.as_str()] {
            if let Some(node) = self.nodes.get_mut(id) {
                node.cooldown_until_ms = until;
            }
        }

        Some(Teleport {
            from: teleporter_id.to_string(),
            to: linked_to,
            destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::fixtures::teleporter;

    fn pair() -> TeleporterNetwork {
        TeleporterNetwork::new(&[
            teleporter("portal1", "portal2", 2.0),
            teleporter("portal2", "portal1", 6.0),
        ])
    }

    #[test]
    fn test_trigger_moves_to_linked() {
        let mut net = pair();
        let tp = net.trigger("portal1", 0.0).unwrap();
        assert_eq!(tp.to, "portal2");
        assert_eq!(tp.destination, Vec3::new(6.0, 0.0, 0.0));
    }

    #[test]
    fn test_cooldown_blocks_retrigger() {
        let mut net = pair();
        assert!(net.trigger("portal1", 0.0).is_some());
        assert!(net.trigger("portal1", 999.0).is_none());
        assert!(net.trigger("portal1", 1000.0).is_some());
    }

    #[test]
    fn test_arrival_end_cools_down_too() {
        let mut net = pair();
        net.trigger("portal1", 0.0);
        assert!(net.is_cooling_down("portal2", 10.0));
        assert!(net.trigger("portal2", 10.0).is_none());
    }

    #[test]
    fn test_missing_link_is_noop() {
        let mut net = TeleporterNetwork::new(&[teleporter("lonely", "gone", 0.0)]);
        assert!(net.trigger("lonely", 0.0).is_none());
        assert!(!net.is_cooling_down("lonely", 0.0));
        assert!(net.trigger("unknown", 0.0).is_none());
    }
}
