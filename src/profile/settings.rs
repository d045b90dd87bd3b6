//! Player settings and preferences
//!
//! Three categories (audio, graphics, controls). Updates arrive as partial
//! patches and are merged field by field, with every value clamped into its
//! valid range.

use serde::{Deserialize, Serialize};

pub const MIN_SENSITIVITY: f32 = 0.1;
pub const MAX_SENSITIVITY: f32 = 5.0;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "low",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Whether shadow casting is worth enabling at this preset
    pub fn shadows_by_default(&self) -> bool {
        !matches!(self, QualityPreset::Low)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 0.7,
            sfx_volume: 0.8,
            music_volume: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphicsSettings {
    pub quality: QualityPreset,
    pub shadows: bool,
    pub particles: bool,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            shadows: true,
            particles: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Pointer sensitivity multiplier
    pub sensitivity: f32,
    pub invert_y: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            invert_y: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub graphics: GraphicsSettings,
    #[serde(default)]
    pub controls: ControlSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_volume: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sfx_volume: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_volume: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphicsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityPreset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadows: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particles: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert_y: Option<bool>,
}

/// Partial settings update; `None` leaves the current value alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphics: Option<GraphicsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls: Option<ControlsPatch>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.graphics.is_none() && self.controls.is_none()
    }

    pub fn volumes(master: f32, sfx: f32, music: f32) -> Self {
        Self {
            audio: Some(AudioPatch {
                master_volume: Some(master),
                sfx_volume: Some(sfx),
                music_volume: Some(music),
            }),
            ..Self::default()
        }
    }

    pub fn quality(preset: QualityPreset) -> Self {
        Self {
            graphics: Some(GraphicsPatch {
                quality: Some(preset),
                ..GraphicsPatch::default()
            }),
            ..Self::default()
        }
    }
}

fn volume(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn sensitivity(v: f32) -> f32 {
    if v.is_nan() {
        1.0
    } else {
        v.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    }
}

impl Settings {
    /// Merge a patch. Returns true if anything actually changed.
    pub fn apply(&mut self, patch: &SettingsPatch) -> bool {
        let before = self.clone();

        if let Some(audio) = &patch.audio {
            if let Some(v) = audio.master_volume {
                self.audio.master_volume = volume(v);
            }
            if let Some(v) = audio.sfx_volume {
                self.audio.sfx_volume = volume(v);
            }
            if let Some(v) = audio.music_volume {
                self.audio.music_volume = volume(v);
            }
        }
        if let Some(graphics) = &patch.graphics {
            if let Some(q) = graphics.quality {
                self.graphics.quality = q;
            }
            if let Some(s) = graphics.shadows {
                self.graphics.shadows = s;
            }
            if let Some(p) = graphics.particles {
                self.graphics.particles = p;
            }
        }
        if let Some(controls) = &patch.controls {
            if let Some(s) = controls.sensitivity {
                self.controls.sensitivity = sensitivity(s);
            }
            if let Some(i) = controls.invert_y {
                self.controls.invert_y = i;
            }
        }

        *self != before
    }

    /// Force every value back into range (used after loading untrusted data)
    pub fn sanitize(&mut self) {
        self.audio.master_volume = volume(self.audio.master_volume);
        self.audio.sfx_volume = volume(self.audio.sfx_volume);
        self.audio.music_volume = volume(self.audio.music_volume);
        self.controls.sensitivity = sensitivity(self.controls.sensitivity);
    }

    /// Pointer delta after sensitivity and inversion
    pub fn scale_pointer(&self, dx: f32, dy: f32) -> (f32, f32) {
        let s = self.controls.sensitivity;
        let dy = if self.controls.invert_y { -dy } else { dy };
        (dx * s, dy * s)
    }
}
