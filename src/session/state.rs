//! Level session state
//!
//! One `LevelSession` per attempt. Restart throws it away and builds a new one.

use std::collections::BTreeSet;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::level::LevelDefinition;

/// Lifecycle of a level attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Level loaded, waiting for the first grab
    Idle,
    /// Clock running
    Running,
    /// All balls delivered (terminal)
    Complete,
}

/// Interaction counters for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub grabs: u32,
    pub releases: u32,
    pub teleports: u32,
}

/// Mutable state of the active attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSession {
    pub level_id: String,
    pub phase: SessionPhase,
    /// Play time, advances only while Running (ms)
    pub elapsed_ms: f64,
    pub current_gravity: Vec3,
    /// Ball ids currently inside a target zone
    pub balls_in_target: BTreeSet<String>,
    pub gravity_shifted: bool,
    pub voiceover_visible: bool,
    pub stats: SessionStats,
    /// Wall-clock reference recorded by `start` (ms)
    pub started_at_ms: Option<f64>,
}

impl LevelSession {
    /// Fresh Idle session for a level
    pub fn new(definition: &LevelDefinition) -> Self {
        Self {
            level_id: definition.id.clone(),
            phase: SessionPhase::Idle,
            elapsed_ms: 0.0,
            current_gravity: definition.gravity,
            balls_in_target: BTreeSet::new(),
            gravity_shifted: false,
            voiceover_visible: definition.voiceover.is_some(),
            stats: SessionStats::default(),
            started_at_ms: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.phase != SessionPhase::Idle
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    /// Every ball of the level is inside a target
    pub fn all_balls_delivered(&self, definition: &LevelDefinition) -> bool {
        definition
            .ball_ids()
            .all(|id| self.balls_in_target.contains(id))
    }
}
