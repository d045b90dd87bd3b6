//! Level descriptors
//!
//! A `LevelDefinition` is read-only for the whole session. It comes from the
//! bundled catalog or from the backend and is validated before use.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEFAULT_GRAVITY;

/// A ball the player has to deliver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub id: String,
    pub position: Vec3,
    pub color: String,
}

/// Box-shaped goal volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetZone {
    pub id: String,
    pub position: Vec3,
    pub size: Vec3,
}

/// One end of a teleporter link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teleporter {
    pub id: String,
    pub position: Vec3,
    pub linked_to_id: String,
    pub color: String,
}

/// What an enemy hand does when it is not chasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyBehavior {
    /// Walk the patrol path in a loop
    #[default]
    Patrol,
    /// Hold position
    Guard,
}

impl EnemyBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnemyBehavior::Patrol => "patrol",
            EnemyBehavior::Guard => "guard",
        }
    }

    /// Unknown behaviors fall back to `Guard`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "patrol" => EnemyBehavior::Patrol,
            _ => EnemyBehavior::Guard,
        }
    }
}

/// Enemy hand placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySpec {
    pub id: String,
    pub position: Vec3,
    pub behavior: EnemyBehavior,
    /// Cyclic list of waypoints (empty = stay put)
    pub patrol_path: Vec<Vec3>,
}

/// One-shot gravity change, measured from level load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityShiftTrigger {
    pub fire_at_ms: u64,
    pub new_gravity: Vec3,
}

/// Immutable level descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Mechanic tags shown on the level select screen
    pub mechanics: Vec<String>,
    pub balls: Vec<Ball>,
    pub targets: Vec<TargetZone>,
    pub teleporters: Vec<Teleporter>,
    pub enemies: Vec<EnemySpec>,
    pub gravity: Vec3,
    pub gravity_shift: Option<GravityShiftTrigger>,
    pub time_limit_ms: Option<u64>,
    pub voiceover: Option<String>,
    pub environment: String,
    /// Position in the campaign (1-based)
    pub order: u32,
}

/// Why a level definition cannot be played
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("level {0} has no balls")]
    NoBalls(String),
    #[error("level {level} defines id {id} more than once")]
    DuplicateId { level: String, id: String },
    #[error("teleporter {teleporter} links to missing teleporter {linked_to}")]
    DanglingLink { teleporter: String, linked_to: String },
    #[error("teleporter {0} links to itself")]
    SelfLink(String),
    #[error("teleporter {teleporter} is the destination of {incoming} teleporters (expected 1)")]
    OpenLink { teleporter: String, incoming: usize },
}

impl LevelDefinition {
    /// Empty level with default gravity
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            mechanics: Vec::new(),
            balls: Vec::new(),
            targets: Vec::new(),
            teleporters: Vec::new(),
            enemies: Vec::new(),
            gravity: DEFAULT_GRAVITY,
            gravity_shift: None,
            time_limit_ms: None,
            voiceover: None,
            environment: String::new(),
            order: 0,
        }
    }

    pub fn ball_count(&self) -> usize {
        self.balls.len()
    }

    pub fn has_ball(&self, ball_id: &str) -> bool {
        self.balls.iter().any(|b| b.id == ball_id)
    }

    pub fn ball_ids(&self) -> impl Iterator<Item = &str> {
        self.balls.iter().map(|b| b.id.as_str())
    }

    pub fn target(&self, target_id: &str) -> Option<&TargetZone> {
        self.targets.iter().find(|t| t.id == target_id)
    }

    pub fn teleporter(&self, teleporter_id: &str) -> Option<&Teleporter> {
        self.teleporters.iter().find(|t| t.id == teleporter_id)
    }

    /// Check the structural rules every playable level must satisfy.
    ///
    /// Teleporter links must form a permutation: every link points at an
    /// existing teleporter other than itself, and every teleporter is the
    /// destination of exactly one link. That makes the link graph a set of
    /// closed cycles (pairs in practice).
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.balls.is_empty() {
            return Err(LevelError::NoBalls(self.id.clone()));
        }

        let mut seen = BTreeSet::new();
        let ids = self
            .balls
            .iter()
            .map(|b| &b.id)
            .chain(self.targets.iter().map(|t| &t.id))
            .chain(self.teleporters.iter().map(|t| &t.id))
            .chain(self.enemies.iter().map(|e| &e.id));
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(LevelError::DuplicateId {
                    level: self.id.clone(),
                    id: id.clone(),
                });
            }
        }

        let mut incoming: BTreeMap<&str, usize> = self
            .teleporters
            .iter()
            .map(|t| (t.id.as_str(), 0))
            .collect();
        for teleporter in &self.teleporters {
            if teleporter.linked_to_id == teleporter.id {
                return Err(LevelError::SelfLink(teleporter.id.clone()));
            }
            match incoming.get_mut(teleporter.linked_to_id.as_str()) {
                Some(count) => *count += 1,
                None => {
                    return Err(LevelError::DanglingLink {
                        teleporter: teleporter.id.clone(),
                        linked_to: teleporter.linked_to_id.clone(),
                    });
                }
            }
        }
        if let Some((id, count)) = incoming.iter().find(|(_, count)| **count != 1) {
            return Err(LevelError::OpenLink {
                teleporter: (*id).to_string(),
                incoming: *count,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn ball(id: &str, x: f32) -> Ball {
        Ball {
            id: id.to_string(),
            position: Vec3::new(x, 2.0, 0.0),
            color: "#ff6b6b".to_string(),
        }
    }

    pub fn teleporter(id: &str, linked_to: &str, x: f32) -> Teleporter {
        Teleporter {
            id: id.to_string(),
            position: Vec3::new(x, 0.0, 0.0),
            linked_to_id: linked_to.to_string(),
            color: "#ff9ff3".to_string(),
        }
    }

    /// Level with the given balls and a single target
    pub fn level_with_balls(id: &str, ball_ids: &[&str]) -> LevelDefinition {
        let mut level = LevelDefinition::new(id, id);
        level.balls = ball_ids
            .iter()
            .enumerate()
            .map(|(i, b)| ball(b, i as f32))
            .collect();
        level.targets.push(TargetZone {
            id: "target1".to_string(),
            position: Vec3::new(3.0, 0.0, 0.0),
            size: Vec3::new(1.0, 0.5, 1.0),
        });
        level.order = 1;
        level
    }
}
