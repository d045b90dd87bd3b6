//! Grab / release input
//!
//! Primary pointer button or spacebar grabs, the matching up-event releases.
//! Only one grab can be active. The held ball is switched to kinematic for
//! the duration of the grab and always switched back on release.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::consts::{GRAB_RADIUS, HAND_MIN_HEIGHT};

/// Pointer buttons as reported by the DOM (`MouseEvent.button`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

impl PointerButton {
    pub fn from_dom(button: i16) -> Self {
        match button {
            0 => PointerButton::Primary,
            1 => PointerButton::Middle,
            _ => PointerButton::Secondary,
        }
    }
}

/// Keys the game cares about (`KeyboardEvent.code`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Other,
}

impl Key {
    pub fn from_code(code: &str) -> Self {
        match code {
            "Space" => Key::Space,
            _ => Key::Other,
        }
    }
}

/// Raw discrete input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSignal {
    PointerDown(PointerButton),
    PointerUp(PointerButton),
    KeyDown(Key),
    KeyUp(Key),
}

/// Which device started the active grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabSource {
    Pointer,
    Keyboard,
}

/// Simulation mode of a rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Affected by gravity and collisions
    #[default]
    Dynamic,
    /// Pinned to the hand
    Kinematic,
}

/// A ball as seen by the interaction layer
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedBody {
    pub id: String,
    pub position: Vec3,
    pub mode: BodyMode,
}

/// Result of feeding a signal to the grab controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrabTransition {
    Started { held: Option<String> },
    Ended { released: Option<String> },
}

#[derive(Debug, Clone)]
struct ActiveGrab {
    source: GrabSource,
    held: Option<String>,
}

/// Hand position and grab state
#[derive(Debug, Clone)]
pub struct GrabController {
    hand: Vec3,
    active: Option<ActiveGrab>,
}

impl Default for GrabController {
    fn default() -> Self {
        Self {
            hand: Vec3::new(0.0, 2.0, 0.0),
            active: None,
        }
    }
}

impl GrabController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hand_position(&self) -> Vec3 {
        self.hand
    }

    pub fn is_grabbing(&self) -> bool {
        self.active.is_some()
    }

    pub fn source(&self) -> Option<GrabSource> {
        self.active.as_ref().map(|a| a.source)
    }

    /// Id of the ball currently held, if the grab caught one
    pub fn held(&self) -> Option<&str> {
        self.active.as_ref().and_then(|a| a.held.as_deref())
    }

    /// Move the hand (kept above the floor). A held ball follows it.
    pub fn move_hand(&mut self, target: Vec3, bodies: &mut BTreeMap<String, TrackedBody>) {
        self.hand = Vec3::new(target.x, target.y.max(HAND_MIN_HEIGHT), target.z);
        if let Some(id) = self.held()
            && let Some(body) = bodies.get_mut(id)
        {
            body.position = self.hand;
        }
    }

    /// Feed one input signal
    pub fn handle(
        &mut self,
        signal: InputSignal,
        bodies: &mut BTreeMap<String, TrackedBody>,
    ) -> Option<GrabTransition> {
        match signal {
            InputSignal::PointerDown(PointerButton::Primary) => {
                self.begin(GrabSource::Pointer, bodies)
            }
            InputSignal::KeyDown(Key::Space) => self.begin(GrabSource::Keyboard, bodies),
            InputSignal::PointerUp(PointerButton::Primary) => {
                self.end_from(GrabSource::Pointer, bodies)
            }
            InputSignal::KeyUp(Key::Space) => self.end_from(GrabSource::Keyboard, bodies),
            _ => None,
        }
    }

    /// Drop whatever is held (focus loss, level change)
    pub fn force_release(
        &mut self,
        bodies: &mut BTreeMap<String, TrackedBody>,
    ) -> Option<GrabTransition> {
        let active = self.active.take()?;
        Some(Self::release(active, bodies))
    }

    fn begin(
        &mut self,
        source: GrabSource,
        bodies: &mut BTreeMap<String, TrackedBody>,
    ) -> Option<GrabTransition> {
        if self.active.is_some() {
            return None;
        }

        let hand = self.hand;
        let held = bodies
            .values_mut()
            .filter(|b| b.position.distance(hand) < GRAB_RADIUS)
            .min_by(|a, b| {
                a.position
                    .distance(hand)
                    .total_cmp(&b.position.distance(hand))
            })
            .map(|body| {
                body.mode = BodyMode::Kinematic;
                body.position = hand;
                body.id.clone()
            });

        self.active = Some(ActiveGrab {
            source,
            held: held.clone(),
        });
        Some(GrabTransition::Started { held })
    }

    fn end_from(
        &mut self,
        source: GrabSource,
        bodies: &mut BTreeMap<String, TrackedBody>,
    ) -> Option<GrabTransition> {
        if self.source() != Some(source) {
            return None;
        }
        let active = self.active.take()?;
        Some(Self::release(active, bodies))
    }

    fn release(active: ActiveGrab, bodies: &mut BTreeMap<String, TrackedBody>) -> GrabTransition {
        // Revert no matter where the hand is now
        if let Some(id) = &active.held
            && let Some(body) = bodies.get_mut(id)
        {
            body.mode = BodyMode::Dynamic;
        }
        GrabTransition::Ended {
            released: active.held,
        }
    }
}
