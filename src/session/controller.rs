//! Level session controller
//!
//! Owns the authoritative lifecycle of one level attempt:
//!
//! ```text
//! load_level ──▶ Idle ──start──▶ Running ──all balls in──▶ Complete
//!                 ▲                 │
//!                 └──── restart ────┘  (time limit, or on request)
//! ```
//!
//! Side effects (audio, persistence) are not performed here. The controller
//! queues `SessionEvent`s which the caller drains once per frame.

use glam::Vec3;

use super::state::{LevelSession, SessionPhase, SessionStats};
use super::timers::{FiredTimer, Scheduler, TimerKind};
use crate::consts::VOICEOVER_DISPLAY_MS;
use crate::interaction::InteractionEvent;
use crate::level::LevelDefinition;

/// Data handed to whoever records a finished level
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub level_id: String,
    pub elapsed_ms: f64,
    pub stats: SessionStats,
}

/// Something the rest of the game should react to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A level was loaded from scratch (not a restart)
    Loaded { level_id: String },
    /// Idle -> Running
    Started { level_id: String },
    /// The one-shot gravity trigger fired
    GravityShifted { gravity: Vec3 },
    /// Voiceover display window ended
    VoiceoverHidden,
    /// Time ran out; a restart follows immediately
    TimeLimitExpired { level_id: String, elapsed_ms: f64 },
    /// Session rebuilt from the same definition
    Restarted { level_id: String },
    /// All balls delivered. Emitted at most once per session.
    Completed(CompletionReport),
    /// Level left; nothing from it will fire any more
    Unloaded { level_id: String },
}

/// Level session state machine
#[derive(Debug, Default)]
pub struct LevelSessionController {
    definition: Option<LevelDefinition>,
    session: Option<LevelSession>,
    timers: Scheduler,
    events: Vec<SessionEvent>,
}

impl LevelSessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&LevelSession> {
        self.session.as_ref()
    }

    pub fn definition(&self) -> Option<&LevelDefinition> {
        self.definition.as_ref()
    }

    pub fn phase(&self) -> Option<SessionPhase> {
        self.session.as_ref().map(|s| s.phase)
    }

    /// Pending timers of the live session, in due order
    pub fn pending_timers(&self) -> Vec<TimerKind> {
        self.timers.pending_kinds()
    }

    /// Take everything queued since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Load a level and leave the session Idle.
    ///
    /// Any previous level's timers are cancelled first. The definition is
    /// expected to have passed `LevelDefinition::validate`.
    pub fn load_level(&mut self, definition: LevelDefinition) {
        if let Some(previous) = &self.definition
            && previous.id != definition.id
        {
            log::info!("Switching level {} -> {}", previous.id, definition.id);
        }
        let level_id = definition.id.clone();
        self.definition = Some(definition);
        self.reset_session();
        log::info!("Level {} loaded", level_id);
        self.events.push(SessionEvent::Loaded { level_id });
    }

    /// Leave the current level. Pending timers and a not-yet-drained
    /// completion from it are discarded.
    pub fn unload(&mut self) {
        self.timers.reset();
        self.session = None;
        self.events
            .retain(|e| !matches!(e, SessionEvent::Completed(_)));
        if let Some(definition) = self.definition.take() {
            log::info!("Level {} unloaded", definition.id);
            self.events.push(SessionEvent::Unloaded {
                level_id: definition.id,
            });
        }
    }

    /// Idle -> Running. No-op in any other phase.
    pub fn start(&mut self, now_ms: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.phase != SessionPhase::Idle {
            return;
        }
        session.phase = SessionPhase::Running;
        session.started_at_ms = Some(now_ms);
        log::info!("Level {} started", session.level_id);
        self.events.push(SessionEvent::Started {
            level_id: session.level_id.clone(),
        });

        // Balls may already be resting in a target when play begins
        self.evaluate_win();
    }

    /// Advance level time by one frame.
    ///
    /// Timers run on level time from load regardless of phase; the play
    /// clock and the time limit only apply while Running.
    pub fn tick(&mut self, delta_ms: f64) {
        if self.session.is_none() {
            return;
        }
        let delta_ms = if delta_ms.is_finite() {
            delta_ms.max(0.0)
        } else {
            0.0
        };

        for fired in self.timers.advance(delta_ms) {
            self.fire_timer(fired);
        }

        let Some(definition) = self.definition.as_ref() else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.phase != SessionPhase::Running {
            return;
        }

        session.elapsed_ms += delta_ms;
        if let Some(limit) = definition.time_limit_ms
            && session.elapsed_ms >= limit as f64
        {
            log::info!(
                "Level {} time limit reached ({:.0} ms), restarting",
                session.level_id,
                session.elapsed_ms
            );
            self.events.push(SessionEvent::TimeLimitExpired {
                level_id: session.level_id.clone(),
                elapsed_ms: session.elapsed_ms,
            });
            self.restart();
        }
    }

    /// Rebuild the session from the same definition, back to Idle
    pub fn restart(&mut self) {
        let Some(level_id) = self.definition.as_ref().map(|d| d.id.clone()) else {
            return;
        };
        self.reset_session();
        log::info!("Level {} restarted", level_id);
        self.events.push(SessionEvent::Restarted { level_id });
    }

    pub fn on_ball_enter_target(&mut self, ball_id: &str) {
        if !self.accepts_membership_change(ball_id) {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.balls_in_target.insert(ball_id.to_string());
        }
        self.evaluate_win();
    }

    pub fn on_ball_exit_target(&mut self, ball_id: &str) {
        if !self.accepts_membership_change(ball_id) {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.balls_in_target.remove(ball_id);
        }
        self.evaluate_win();
    }

    /// Route an interaction event: update counters and target membership
    pub fn handle_interaction(&mut self, event: &InteractionEvent) {
        match event {
            InteractionEvent::BallEnterTarget { ball_id, .. } => {
                self.on_ball_enter_target(ball_id);
            }
            InteractionEvent::BallExitTarget { ball_id, .. } => {
                self.on_ball_exit_target(ball_id);
            }
            InteractionEvent::GrabStart => self.count(|s| s.grabs += 1),
            InteractionEvent::GrabEnd => self.count(|s| s.releases += 1),
            InteractionEvent::TeleportTrigger { .. } => self.count(|s| s.teleports += 1),
            InteractionEvent::EnemyProximity { .. } => {}
        }
    }

    fn count(&mut self, bump: impl FnOnce(&mut SessionStats)) {
        if let Some(session) = self.session.as_mut()
            && session.phase != SessionPhase::Complete
        {
            bump(&mut session.stats);
        }
    }

    fn accepts_membership_change(&self, ball_id: &str) -> bool {
        let (Some(definition), Some(session)) = (&self.definition, &self.session) else {
            return false;
        };
        if session.phase == SessionPhase::Complete {
            // Result is final; later physics jitter must not undo it
            return false;
        }
        if !definition.has_ball(ball_id) {
            log::warn!("Ignoring target event for unknown ball {}", ball_id);
            return false;
        }
        true
    }

    fn reset_session(&mut self) {
        self.timers.reset();
        let Some(definition) = self.definition.as_ref() else {
            self.session = None;
            return;
        };

        if let Some(shift) = &definition.gravity_shift {
            self.timers
                .schedule(TimerKind::GravityShift, shift.fire_at_ms as f64);
        }
        if definition.voiceover.is_some() {
            self.timers
                .schedule(TimerKind::VoiceoverHide, VOICEOVER_DISPLAY_MS);
        }
        self.session = Some(LevelSession::new(definition));
    }

    fn fire_timer(&mut self, fired: FiredTimer) {
        if !self.timers.is_current(fired.generation) {
            log::debug!("Dropping stale {:?} timer", fired.kind);
            return;
        }
        let (Some(definition), Some(session)) = (&self.definition, self.session.as_mut()) else {
            return;
        };

        match fired.kind {
            TimerKind::GravityShift => {
                let Some(shift) = &definition.gravity_shift else {
                    return;
                };
                if session.gravity_shifted {
                    return;
                }
                session.current_gravity = shift.new_gravity;
                session.gravity_shifted = true;
                log::info!(
                    "Gravity shifted to {:?} in level {}",
                    shift.new_gravity,
                    session.level_id
                );
                self.events.push(SessionEvent::GravityShifted {
                    gravity: shift.new_gravity,
                });
            }
            TimerKind::VoiceoverHide => {
                session.voiceover_visible = false;
                self.events.push(SessionEvent::VoiceoverHidden);
            }
        }
    }

    fn evaluate_win(&mut self) {
        let (Some(definition), Some(session)) = (&self.definition, self.session.as_mut()) else {
            return;
        };
        if session.phase != SessionPhase::Running || !session.all_balls_delivered(definition) {
            return;
        }

        session.phase = SessionPhase::Complete;
        log::info!(
            "Level {} complete in {:.0} ms ({} grabs, {} releases, {} teleports)",
            session.level_id,
            session.elapsed_ms,
            session.stats.grabs,
            session.stats.releases,
            session.stats.teleports
        );
        self.events.push(SessionEvent::Completed(CompletionReport {
            level_id: session.level_id.clone(),
            elapsed_ms: session.elapsed_ms,
            stats: session.stats,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::GravityShiftTrigger;
    use crate::level::fixtures::level_with_balls;
    use proptest::prelude::*;

    fn completions(events: &[SessionEvent]) -> Vec<&CompletionReport> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Completed(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    fn restarts(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Restarted { .. }))
            .count()
    }

    #[test]
    fn test_two_ball_scenario() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("level2", &["ball1", "ball2"]));
        ctl.start(0.0);
        ctl.tick(16.0);

        ctl.on_ball_enter_target("ball1");
        assert_eq!(ctl.phase(), Some(SessionPhase::Running));

        ctl.tick(16.0);
        ctl.on_ball_enter_target("ball2");
        assert_eq!(ctl.phase(), Some(SessionPhase::Complete));

        let events = ctl.drain_events();
        let done = completions(&events);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].level_id, "level2");
        assert!(done[0].elapsed_ms > 0.0);
    }

    #[test]
    fn test_single_ball_completes_on_enter() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("level1", &["ball1"]));
        ctl.start(0.0);
        assert_eq!(ctl.phase(), Some(SessionPhase::Running));

        ctl.on_ball_enter_target("ball1");
        assert_eq!(ctl.phase(), Some(SessionPhase::Complete));
    }

    #[test]
    fn test_no_win_while_idle() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("level1", &["ball1"]));
        ctl.on_ball_enter_target("ball1");
        assert_eq!(ctl.phase(), Some(SessionPhase::Idle));

        // Ball already resting in the target when play starts
        ctl.start(0.0);
        assert_eq!(ctl.phase(), Some(SessionPhase::Complete));
    }

    #[test]
    fn test_exit_before_last_enter_blocks_win() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("l", &["ball1", "ball2"]));
        ctl.start(0.0);

        ctl.on_ball_enter_target("ball1");
        ctl.on_ball_exit_target("ball1");
        ctl.on_ball_enter_target("ball2");
        assert_eq!(ctl.phase(), Some(SessionPhase::Running));

        // Duplicate enter is idempotent
        ctl.on_ball_enter_target("ball2");
        assert_eq!(ctl.session().map(|s| s.balls_in_target.len()), Some(1));
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("l", &["ball1"]));
        ctl.start(0.0);
        ctl.on_ball_enter_target("ball1");
        ctl.on_ball_exit_target("ball1");
        ctl.on_ball_enter_target("ball1");
        ctl.start(10.0);

        assert_eq!(ctl.phase(), Some(SessionPhase::Complete));
        assert_eq!(completions(&ctl.drain_events()).len(), 1);
    }

    #[test]
    fn test_unknown_ball_ignored() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("l", &["ball1", "ball2"]));
        ctl.start(0.0);
        ctl.on_ball_enter_target("ball1");
        ctl.on_ball_enter_target("ghost");
        assert_eq!(ctl.phase(), Some(SessionPhase::Running));
    }

    #[test]
    fn test_time_limit_restarts_once() {
        let mut level = level_with_balls("level5", &["ball1", "ball2"]);
        level.time_limit_ms = Some(5000);
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level);
        ctl.start(0.0);
        ctl.on_ball_enter_target("ball1");
        ctl.drain_events();

        for _ in 0..4 {
            ctl.tick(1000.0);
        }
        assert_eq!(ctl.phase(), Some(SessionPhase::Running));

        ctl.tick(1000.0);
        ctl.tick(1000.0);
        ctl.tick(1000.0);

        let events = ctl.drain_events();
        assert_eq!(restarts(&events), 1);
        let session = ctl.session().unwrap();
        assert_eq!(session.phase, SessionPhase::Idle);
        assert_eq!(session.elapsed_ms, 0.0);
        assert!(session.balls_in_target.is_empty());
    }

    #[test]
    fn test_tick_ignored_while_idle() {
        let mut level = level_with_balls("l", &["ball1"]);
        level.time_limit_ms = Some(100);
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level);
        ctl.tick(500.0);

        let session = ctl.session().unwrap();
        assert_eq!(session.elapsed_ms, 0.0);
        assert_eq!(restarts(&ctl.drain_events()), 0);
    }

    #[test]
    fn test_gravity_shift_fires_once() {
        let mut level = level_with_balls("level2", &["ball1"]);
        level.gravity_shift = Some(GravityShiftTrigger {
            fire_at_ms: 10_000,
            new_gravity: Vec3::new(0.0, 9.81, 0.0),
        });
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level);
        ctl.start(0.0);

        ctl.tick(9_999.0);
        assert_eq!(ctl.session().unwrap().current_gravity.y, -9.81);
        ctl.tick(1.0);
        assert_eq!(ctl.session().unwrap().current_gravity.y, 9.81);
        ctl.tick(50_000.0);

        let shifts = ctl
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::GravityShifted { .. }))
            .count();
        assert_eq!(shifts, 1);
    }

    #[test]
    fn test_voiceover_hidden_after_window() {
        let mut level = level_with_balls("level1", &["ball1"]);
        level.voiceover = Some("A hand...".to_string());
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level);

        assert!(ctl.session().unwrap().voiceover_visible);
        ctl.tick(3999.0);
        assert!(ctl.session().unwrap().voiceover_visible);
        ctl.tick(1.0);
        assert!(!ctl.session().unwrap().voiceover_visible);
    }

    #[test]
    fn test_restart_twice_matches_fresh_load() {
        let mut level = level_with_balls("level5", &["ball1", "ball2"]);
        level.voiceover = Some("one final reach".to_string());
        level.gravity_shift = Some(GravityShiftTrigger {
            fire_at_ms: 15_000,
            new_gravity: Vec3::new(9.81, 0.0, 0.0),
        });

        let mut fresh = LevelSessionController::new();
        fresh.load_level(level.clone());

        let mut restarted = LevelSessionController::new();
        restarted.load_level(level);
        restarted.start(0.0);
        restarted.on_ball_enter_target("ball1");
        restarted.tick(20_000.0);
        restarted.restart();
        restarted.restart();

        assert_eq!(restarted.session(), fresh.session());
        assert_eq!(restarted.pending_timers(), fresh.pending_timers());
    }

    #[test]
    fn test_switching_levels_cancels_old_timers() {
        let mut first = level_with_balls("level2", &["ball1"]);
        first.gravity_shift = Some(GravityShiftTrigger {
            fire_at_ms: 100,
            new_gravity: Vec3::new(0.0, 9.81, 0.0),
        });
        let second = level_with_balls("level3", &["ball1"]);

        let mut ctl = LevelSessionController::new();
        ctl.load_level(first);
        ctl.load_level(second);
        ctl.tick(1000.0);

        assert!(ctl.pending_timers().is_empty());
        assert_eq!(ctl.session().unwrap().current_gravity.y, -9.81);
        assert!(
            !ctl.drain_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::GravityShifted { .. }))
        );
    }

    #[test]
    fn test_unload_drops_undelivered_completion() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("l", &["ball1"]));
        ctl.start(0.0);
        ctl.on_ball_enter_target("ball1");
        ctl.unload();

        let events = ctl.drain_events();
        assert!(completions(&events).is_empty());
        assert!(ctl.session().is_none());
        // Nothing to do without a level
        ctl.tick(100.0);
        ctl.start(0.0);
        assert!(ctl.drain_events().is_empty());
    }

    #[test]
    fn test_interaction_counters() {
        let mut ctl = LevelSessionController::new();
        ctl.load_level(level_with_balls("l", &["ball1"]));
        ctl.start(0.0);
        ctl.handle_interaction(&InteractionEvent::GrabStart);
        ctl.handle_interaction(&InteractionEvent::GrabEnd);
        ctl.handle_interaction(&InteractionEvent::TeleportTrigger {
            teleporter_id: "portal1".to_string(),
        });
        ctl.handle_interaction(&InteractionEvent::BallEnterTarget {
            ball_id: "ball1".to_string(),
            target_id: "target1".to_string(),
        });

        let events = ctl.drain_events();
        let report = completions(&events)[0];
        assert_eq!(
            report.stats,
            SessionStats {
                grabs: 1,
                releases: 1,
                teleports: 1
            }
        );
    }

    proptest! {
        #[test]
        fn prop_restart_shape_is_stable(
            deltas in proptest::collection::vec(0.0f64..2000.0, 0..20),
            entered in proptest::collection::vec(any::<bool>(), 3),
        ) {
            let mut level = level_with_balls("l", &["ball1", "ball2", "ball3"]);
            level.voiceover = Some("vo".to_string());
            level.time_limit_ms = Some(10_000);

            let mut fresh = LevelSessionController::new();
            fresh.load_level(level.clone());

            let mut ctl = LevelSessionController::new();
            ctl.load_level(level);
            ctl.start(0.0);
            for (i, inside) in entered.iter().enumerate() {
                if *inside {
                    ctl.on_ball_enter_target(&format!("ball{}", i + 1));
                }
            }
            for d in deltas {
                ctl.tick(d);
            }
            ctl.restart();
            ctl.restart();

            prop_assert_eq!(ctl.session(), fresh.session());
            prop_assert_eq!(ctl.pending_timers(), fresh.pending_timers());
        }
    }
}
