//! Interaction layer
//!
//! Turns raw input and the physics engine's collision reports into
//! `InteractionEvent`s. The physics engine itself is a black box: it reports
//! body positions and enter/exit of registered volumes, and reads back
//! `BodyCommand`s (mode toggles, relocations) once per frame.

pub mod enemy;
pub mod input;
pub mod teleport;

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;

pub use enemy::{EnemyAgent, EnemyMode};
pub use input::{
    BodyMode, GrabController, GrabSource, GrabTransition, InputSignal, Key, PointerButton,
    TrackedBody,
};
pub use teleport::{Teleport, TeleporterNetwork};

use crate::level::LevelDefinition;

/// Discrete gameplay event, consumed once
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    GrabStart,
    GrabEnd,
    BallEnterTarget { ball_id: String, target_id: String },
    BallExitTarget { ball_id: String, target_id: String },
    TeleportTrigger { teleporter_id: String },
    /// An enemy switched mode at this distance from the hand
    EnemyProximity { enemy_id: String, distance: f32 },
}

/// Instruction for the physics engine
#[derive(Debug, Clone, PartialEq)]
pub enum BodyCommand {
    SetMode { body_id: String, mode: BodyMode },
    Relocate { body_id: String, position: Vec3 },
}

/// Per-level interaction state
#[derive(Debug, Clone, Default)]
pub struct InteractionLayer {
    /// Level time (ms), drives teleporter cooldowns
    clock_ms: f64,
    grab: GrabController,
    bodies: BTreeMap<String, TrackedBody>,
    targets: BTreeSet<String>,
    teleporters: TeleporterNetwork,
    enemies: Vec<EnemyAgent>,
    commands: Vec<BodyCommand>,
}

impl InteractionLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild everything from a level definition
    pub fn load(&mut self, definition: &LevelDefinition) {
        *self = Self {
            bodies: definition
                .balls
                .iter()
                .map(|b| {
                    (
                        b.id.clone(),
                        TrackedBody {
                            id: b.id.clone(),
                            position: b.position,
                            mode: BodyMode::Dynamic,
                        },
                    )
                })
                .collect(),
            targets: definition.targets.iter().map(|t| t.id.clone()).collect(),
            teleporters: TeleporterNetwork::new(&definition.teleporters),
            enemies: definition.enemies.iter().map(EnemyAgent::from_spec).collect(),
            ..Self::default()
        };
    }

    /// Drop the level. A held ball is released first and the resulting
    /// mode command stays queued for the physics engine.
    pub fn clear(&mut self) {
        self.release_grab();
        let commands = std::mem::take(&mut self.commands);
        *self = Self {
            commands,
            ..Self::default()
        };
    }

    /// Back to the spawn layout after a restart. A held ball is let go and
    /// every ball is handed back to physics at its spawn point.
    pub fn reset(&mut self, definition: &LevelDefinition) {
        self.release_grab();
        let mut commands = std::mem::take(&mut self.commands);
        self.load(definition);
        for ball in &definition.balls {
            commands.push(BodyCommand::SetMode {
                body_id: ball.id.clone(),
                mode: BodyMode::Dynamic,
            });
            commands.push(BodyCommand::Relocate {
                body_id: ball.id.clone(),
                position: ball.position,
            });
        }
        self.commands = commands;
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn hand_position(&self) -> Vec3 {
        self.grab.hand_position()
    }

    pub fn is_grabbing(&self) -> bool {
        self.grab.is_grabbing()
    }

    pub fn held(&self) -> Option<&str> {
        self.grab.held()
    }

    pub fn body(&self, body_id: &str) -> Option<&TrackedBody> {
        self.bodies.get(body_id)
    }

    pub fn enemies(&self) -> &[EnemyAgent] {
        &self.enemies
    }

    pub fn teleporters(&self) -> &TeleporterNetwork {
        &self.teleporters
    }

    /// Take the physics commands queued since the last call
    pub fn drain_body_commands(&mut self) -> Vec<BodyCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Feed a button/key signal
    pub fn input(&mut self, signal: InputSignal) -> Vec<InteractionEvent> {
        let transition = self.grab.handle(signal, &mut self.bodies);
        self.apply_transition(transition)
    }

    /// Force the current grab to end (focus lost, pause)
    pub fn release_grab(&mut self) -> Vec<InteractionEvent> {
        let transition = self.grab.force_release(&mut self.bodies);
        self.apply_transition(transition)
    }

    pub fn move_hand(&mut self, position: Vec3) {
        self.grab.move_hand(position, &mut self.bodies);
    }

    /// Position reported by the physics engine. Held bodies follow the hand
    /// instead, so reports for them are ignored.
    pub fn sync_body(&mut self, body_id: &str, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(body_id)
            && body.mode == BodyMode::Dynamic
        {
            body.position = position;
        }
    }

    /// Physics says `object_id` entered volume `zone_id`
    pub fn collision_enter(&mut self, object_id: &str, zone_id: &str) -> Vec<InteractionEvent> {
        if self.targets.contains(zone_id) {
            if self.bodies.contains_key(object_id) {
                return vec![InteractionEvent::BallEnterTarget {
                    ball_id: object_id.to_string(),
                    target_id: zone_id.to_string(),
                }];
            }
            return Vec::new();
        }

        if self.teleporters.contains(zone_id) && self.bodies.contains_key(object_id) {
            let Some(teleport) = self.teleporters.trigger(zone_id, self.clock_ms) else {
                return Vec::new();
            };
            if let Some(body) = self.bodies.get_mut(object_id) {
                body.position = teleport.destination;
            }
            log::debug!(
                "{} teleported {} -> {}",
                object_id,
                teleport.from,
                teleport.to
            );
            self.commands.push(BodyCommand::Relocate {
                body_id: object_id.to_string(),
                position: teleport.destination,
            });
            return vec![InteractionEvent::TeleportTrigger {
                teleporter_id: teleport.from,
            }];
        }

        Vec::new()
    }

    /// Physics says `object_id` left volume `zone_id`
    pub fn collision_exit(&mut self, object_id: &str, zone_id: &str) -> Vec<InteractionEvent> {
        if self.targets.contains(zone_id) && self.bodies.contains_key(object_id) {
            return vec![InteractionEvent::BallExitTarget {
                ball_id: object_id.to_string(),
                target_id: zone_id.to_string(),
            }];
        }
        Vec::new()
    }

    /// Advance the layer clock and run enemy AI
    pub fn advance(&mut self, delta_ms: f64) -> Vec<InteractionEvent> {
        let delta_ms = delta_ms.max(0.0);
        self.clock_ms += delta_ms;

        let player = self.grab.hand_position();
        let dt_secs = (delta_ms / 1000.0) as f32;
        let mut events = Vec::new();
        for enemy in &mut self.enemies {
            if let Some(mode) = enemy.update(dt_secs, player) {
                let distance = enemy.position.distance(player);
                log::debug!("Enemy {} now {:?} at {:.2}", enemy.id, mode, distance);
                events.push(InteractionEvent::EnemyProximity {
                    enemy_id: enemy.id.clone(),
                    distance,
                });
            }
        }
        events
    }

    fn apply_transition(&mut self, transition: Option<GrabTransition>) -> Vec<InteractionEvent> {
        match transition {
            Some(GrabTransition::Started { held }) => {
                if let Some(body_id) = held {
                    self.commands.push(BodyCommand::SetMode {
                        body_id,
                        mode: BodyMode::Kinematic,
                    });
                }
                vec![InteractionEvent::GrabStart]
            }
            Some(GrabTransition::Ended { released }) => {
                if let Some(body_id) = released {
                    self.commands.push(BodyCommand::SetMode {
                        body_id,
                        mode: BodyMode::Dynamic,
                    });
                }
                vec![InteractionEvent::GrabEnd]
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::fixtures::{level_with_balls, teleporter};
    use crate::level::{EnemyBehavior, EnemySpec};

    fn portal_level() -> LevelDefinition {
        let mut level = level_with_balls("level3", &["ball1"]);
        level.teleporters.push(teleporter("portal1", "portal2", 2.0));
        level.teleporters.push(teleporter("portal2", "portal1", 6.0));
        level
    }

    #[test]
    fn test_target_events_only_for_balls() {
        let mut layer = InteractionLayer::new();
        layer.load(&level_with_balls("l", &["ball1"]));

        assert_eq!(
            layer.collision_enter("ball1", "target1"),
            vec![InteractionEvent::BallEnterTarget {
                ball_id: "ball1".to_string(),
                target_id: "target1".to_string()
            }]
        );
        assert!(layer.collision_enter("hand", "target1").is_empty());
        assert_eq!(layer.collision_exit("ball1", "target1").len(), 1);
        assert!(layer.collision_exit("ball1", "nowhere").is_empty());
    }

    #[test]
    fn test_teleport_relocates_and_cools_down() {
        let mut layer = InteractionLayer::new();
        layer.load(&portal_level());

        let events = layer.collision_enter("ball1", "portal1");
        assert_eq!(
            events,
            vec![InteractionEvent::TeleportTrigger {
                teleporter_id: "portal1".to_string()
            }]
        );
        let arrived = layer.body("ball1").unwrap().position;
        assert_eq!(arrived, Vec3::new(6.0, 0.0, 0.0));

        // Physics moves the ball back onto portal1 within the cooldown
        layer.advance(500.0);
        layer.sync_body("ball1", Vec3::new(2.0, 0.0, 0.0));
        assert!(layer.collision_enter("ball1", "portal1").is_empty());
        assert_eq!(layer.body("ball1").unwrap().position, Vec3::new(2.0, 0.0, 0.0));

        layer.advance(500.0);
        assert_eq!(layer.collision_enter("ball1", "portal1").len(), 1);
    }

    #[test]
    fn test_grab_emits_body_commands() {
        let mut layer = InteractionLayer::new();
        layer.load(&level_with_balls("l", &["ball1"]));
        layer.move_hand(Vec3::new(0.0, 2.0, 0.0));

        assert_eq!(
            layer.input(InputSignal::PointerDown(PointerButton::Primary)),
            vec![InteractionEvent::GrabStart]
        );
        layer.move_hand(Vec3::new(9.0, 9.0, 0.0));
        assert_eq!(
            layer.input(InputSignal::PointerUp(PointerButton::Primary)),
            vec![InteractionEvent::GrabEnd]
        );

        assert_eq!(
            layer.drain_body_commands(),
            vec![
                BodyCommand::SetMode {
                    body_id: "ball1".to_string(),
                    mode: BodyMode::Kinematic
                },
                BodyCommand::SetMode {
                    body_id: "ball1".to_string(),
                    mode: BodyMode::Dynamic
                },
            ]
        );
    }

    #[test]
    fn test_held_body_ignores_physics_reports() {
        let mut layer = InteractionLayer::new();
        layer.load(&level_with_balls("l", &["ball1"]));
        layer.move_hand(Vec3::new(0.0, 2.0, 0.0));
        layer.input(InputSignal::KeyDown(Key::Space));

        layer.sync_body("ball1", Vec3::new(0.0, -5.0, 0.0));
        assert_eq!(layer.body("ball1").unwrap().position, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_enemy_mode_change_reported() {
        let mut level = level_with_balls("level4", &["ball1"]);
        level.enemies.push(EnemySpec {
            id: "shadow1".to_string(),
            position: Vec3::new(2.0, 1.0, 0.0),
            behavior: EnemyBehavior::Guard,
            patrol_path: Vec::new(),
        });
        let mut layer = InteractionLayer::new();
        layer.load(&level);

        layer.move_hand(Vec3::new(20.0, 2.0, 0.0));
        assert!(layer.advance(16.0).is_empty());

        layer.move_hand(Vec3::new(3.0, 1.0, 0.0));
        let events = layer.advance(16.0);
        assert!(matches!(
            events.as_slice(),
            [InteractionEvent::EnemyProximity { enemy_id, .. }] if enemy_id == "shadow1"
        ));
        assert_eq!(layer.enemies()[0].mode(), EnemyMode::Chasing);
    }

    #[test]
    fn test_reset_returns_held_ball_to_physics() {
        let level = level_with_balls("l", &["ball1", "ball2"]);
        let mut layer = InteractionLayer::new();
        layer.load(&level);
        layer.move_hand(Vec3::new(0.0, 2.0, 0.0));
        layer.input(InputSignal::PointerDown(PointerButton::Primary));
        layer.move_hand(Vec3::new(5.0, 4.0, 0.0));
        layer.drain_body_commands();

        layer.reset(&level);
        assert!(!layer.is_grabbing());
        assert_eq!(layer.body("ball1").unwrap().position, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(layer.body("ball1").unwrap().mode, BodyMode::Dynamic);

        let commands = layer.drain_body_commands();
        assert_eq!(
            commands[0],
            BodyCommand::SetMode {
                body_id: "ball1".to_string(),
                mode: BodyMode::Dynamic
            }
        );
        for ball in &level.balls {
            assert!(commands.contains(&BodyCommand::Relocate {
                body_id: ball.id.clone(),
                position: ball.position,
            }));
        }

        // The button coming up later is not a second release
        assert!(
            layer
                .input(InputSignal::PointerUp(PointerButton::Primary))
                .is_empty()
        );
    }

    #[test]
    fn test_reload_resets_cooldowns() {
        let mut layer = InteractionLayer::new();
        layer.load(&portal_level());
        layer.collision_enter("ball1", "portal1");
        layer.load(&portal_level());
        assert_eq!(layer.clock_ms(), 0.0);
        assert_eq!(layer.collision_enter("ball1", "portal1").len(), 1);
    }
}
