//! Level session module
//!
//! Everything that changes during one attempt at a level lives here. It must
//! stay free of rendering, audio and network code:
//! - Driven only by frame deltas and discrete events
//! - Timers belong to a generation and die with it
//! - Outputs are queued `SessionEvent`s

pub mod controller;
pub mod state;
pub mod timers;

pub use controller::{CompletionReport, LevelSessionController, SessionEvent};
pub use state::{LevelSession, SessionPhase, SessionStats};
pub use timers::{FiredTimer, Scheduler, TimerHandle, TimerKind};
