//! Hand of Gravity - grab, carry and drop balls into target zones while gravity shifts
//!
//! Core modules:
//! - `level`: Immutable level descriptors and validation
//! - `catalog`: Bundled level / hand skin / achievement catalog
//! - `session`: Level session state machine (load, play, win, restart)
//! - `interaction`: Grab/release, teleporters and enemy hands
//! - `profile`: Player profile store (unlocks, statistics, settings)
//! - `persistence`: Backend client and local snapshot
//! - `audio`: Cue dispatch with a single music track
//! - `platform`: Browser/native platform abstraction
//! - `game`: Wires everything together for one frame loop

pub mod audio;
pub mod catalog;
pub mod game;
pub mod interaction;
pub mod level;
pub mod persistence;
pub mod platform;
pub mod profile;
pub mod session;

pub use catalog::Catalog;
pub use game::{Game, GameError};
pub use level::LevelDefinition;
pub use profile::{GameProfile, ProfileAction, ProfileStore};
pub use session::{LevelSessionController, SessionEvent, SessionPhase};

/// Game configuration constants
pub mod consts {
    use glam::Vec3;

    /// Gravity used when a level does not specify one
    pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

    /// How long voiceover text stays on screen after level load (ms)
    pub const VOICEOVER_DISPLAY_MS: f64 = 4000.0;

    /// Teleporter cooldown after a trigger (ms)
    pub const TELEPORT_COOLDOWN_MS: f64 = 1000.0;

    /// Enemy hysteresis band: start chasing below, give up above
    pub const CHASE_ENTER_DISTANCE: f32 = 3.0;
    pub const CHASE_EXIT_DISTANCE: f32 = 5.0;

    /// Patrol waypoint counts as reached within this distance
    pub const WAYPOINT_REACHED_DISTANCE: f32 = 0.5;
    /// Enemy movement speed (units/s)
    pub const ENEMY_SPEED: f32 = 2.0;

    /// Hand must be this close to a ball to pick it up
    pub const GRAB_RADIUS: f32 = 2.0;
    /// Hand never goes below this height
    pub const HAND_MIN_HEIGHT: f32 = 0.5;

    /// Frame deltas are clamped to this to avoid huge jumps after a stall (ms)
    pub const MAX_FRAME_DELTA_MS: f64 = 100.0;

    /// Level unlocked for every new profile
    pub const FIRST_LEVEL_ID: &str = "level1";
    /// Hand skin every profile owns
    pub const DEFAULT_HAND_SKIN_ID: &str = "default";
    /// Music played outside of levels
    pub const MENU_TRACK: &str = "menu";
}

/// Clamp a frame delta into `[0, MAX_FRAME_DELTA_MS]`, treating NaN as zero
#[inline]
pub fn clamp_frame_delta(delta_ms: f64) -> f64 {
    if delta_ms.is_nan() {
        return 0.0;
    }
    delta_ms.clamp(0.0, consts::MAX_FRAME_DELTA_MS)
}
