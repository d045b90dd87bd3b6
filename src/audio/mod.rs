//! Audio cue dispatch
//!
//! Fire-and-forget: sound effects may overlap, music is a single track that
//! is always stopped before the next one starts. Audio never affects
//! gameplay, so every backend failure is logged and swallowed here.

#[cfg(target_arch = "wasm32")]
pub mod web;

use thiserror::Error;

use crate::profile::settings::AudioSettings;

/// Named one-shot sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    /// Hand closes
    Grab,
    /// Hand opens
    Release,
    /// Object went through a teleporter
    Teleport,
    /// Gravity direction changed
    GravityShift,
    /// All balls delivered
    LevelComplete,
    /// Achievement unlocked
    Achievement,
}

impl SoundEffect {
    pub const ALL: &[SoundEffect] = &[
        SoundEffect::Grab,
        SoundEffect::Release,
        SoundEffect::Teleport,
        SoundEffect::GravityShift,
        SoundEffect::LevelComplete,
        SoundEffect::Achievement,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SoundEffect::Grab => "grab",
            SoundEffect::Release => "release",
            SoundEffect::Teleport => "teleport",
            SoundEffect::GravityShift => "gravityShift",
            SoundEffect::LevelComplete => "levelComplete",
            SoundEffect::Achievement => "achievement",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("audio output unavailable")]
    Unavailable,
    #[error("unknown sound: {0}")]
    UnknownSound(String),
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Opaque id of a playing music track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicHandle(pub u64);

/// Something that can actually make noise
pub trait AudioBackend {
    fn play_sfx(&mut self, effect: SoundEffect, volume: f32) -> Result<(), AudioError>;
    fn start_music(&mut self, track: &str, volume: f32) -> Result<MusicHandle, AudioError>;
    fn stop_music(&mut self, handle: MusicHandle) -> Result<(), AudioError>;
    fn set_music_volume(&mut self, handle: MusicHandle, volume: f32) -> Result<(), AudioError>;
    fn play_voiceover(&mut self, level_id: &str, volume: f32) -> Result<(), AudioError>;
    /// Unlock output after a user gesture (browsers start suspended)
    fn resume(&mut self) {}
}

/// Backend for native/headless runs
#[derive(Debug, Default)]
pub struct SilentBackend {
    next_handle: u64,
}

impl AudioBackend for SilentBackend {
    fn play_sfx(&mut self, effect: SoundEffect, volume: f32) -> Result<(), AudioError> {
        log::debug!("sfx {} @ {:.2}", effect.name(), volume);
        Ok(())
    }

    fn start_music(&mut self, track: &str, volume: f32) -> Result<MusicHandle, AudioError> {
        self.next_handle += 1;
        log::debug!("music {} @ {:.2}", track, volume);
        Ok(MusicHandle(self.next_handle))
    }

    fn stop_music(&mut self, _handle: MusicHandle) -> Result<(), AudioError> {
        Ok(())
    }

    fn set_music_volume(&mut self, _handle: MusicHandle, _volume: f32) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_voiceover(&mut self, level_id: &str, _volume: f32) -> Result<(), AudioError> {
        log::debug!("voiceover {}", level_id);
        Ok(())
    }
}

/// Owns the backend and the one current music track
pub struct AudioDispatcher<B: AudioBackend> {
    backend: B,
    current_music: Option<(String, MusicHandle)>,
    volumes: AudioSettings,
    muted: bool,
}

impl<B: AudioBackend> AudioDispatcher<B> {
    pub fn new(backend: B, volumes: AudioSettings) -> Self {
        Self {
            backend,
            current_music: None,
            volumes,
            muted: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current_music.as_ref().map(|(track, _)| track.as_str())
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn sfx_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volumes.master_volume * self.volumes.sfx_volume
        }
    }

    fn music_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volumes.master_volume * self.volumes.music_volume
        }
    }

    pub fn resume(&mut self) {
        self.backend.resume();
    }

    /// Start `track`, stopping whatever was playing first (even the same track)
    pub fn play_music(&mut self, track: &str) {
        self.stop_music();
        match self.backend.start_music(track, self.music_volume()) {
            Ok(handle) => self.current_music = Some((track.to_string(), handle)),
            Err(e) => log::warn!("Music {} skipped: {}", track, e),
        }
    }

    pub fn stop_music(&mut self) {
        if let Some((track, handle)) = self.current_music.take()
            && let Err(e) = self.backend.stop_music(handle)
        {
            log::warn!("Stopping music {} failed: {}", track, e);
        }
    }

    pub fn play_sfx(&mut self, effect: SoundEffect) {
        let volume = self.sfx_volume();
        if volume <= 0.0 {
            return;
        }
        if let Err(e) = self.backend.play_sfx(effect, volume) {
            log::warn!("SFX {} skipped: {}", effect.name(), e);
        }
    }

    /// Play an effect by its cue name; unknown names are logged and ignored
    pub fn play_sfx_named(&mut self, name: &str) {
        match SoundEffect::from_name(name) {
            Some(effect) => self.play_sfx(effect),
            None => log::warn!("SFX skipped: {}", AudioError::UnknownSound(name.to_string())),
        }
    }

    pub fn play_voiceover(&mut self, level_id: &str) {
        let volume = if self.muted {
            0.0
        } else {
            self.volumes.master_volume
        };
        if volume <= 0.0 {
            return;
        }
        if let Err(e) = self.backend.play_voiceover(level_id, volume) {
            log::warn!("Voiceover {} skipped: {}", level_id, e);
        }
    }

    /// Apply new volume settings, including to the playing track
    pub fn set_volumes(&mut self, volumes: &AudioSettings) {
        self.volumes = volumes.clone();
        self.refresh_music_volume();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.refresh_music_volume();
    }

    fn refresh_music_volume(&mut self) {
        let volume = self.music_volume();
        if let Some((track, handle)) = &self.current_music
            && let Err(e) = self.backend.set_music_volume(*handle, volume)
        {
            log::warn!("Volume change for {} skipped: {}", track, e);
        }
    }
}
