//! Web Audio backend
//!
//! Everything is synthesized from oscillators, no asset files.

use std::collections::BTreeMap;

use web_sys::{AudioContext, AudioContextState, GainNode, OscillatorNode, OscillatorType};

use super::{AudioBackend, AudioError, MusicHandle, SoundEffect};

fn js_err(e: wasm_bindgen::JsValue) -> AudioError {
    AudioError::Playback(format!("{:?}", e))
}

/// A looping drone standing in for a music track
struct MusicVoice {
    oscs: Vec<OscillatorNode>,
    gain: GainNode,
}

pub struct WebAudioBackend {
    ctx: Option<AudioContext>,
    music: BTreeMap<u64, MusicVoice>,
    next_handle: u64,
}

impl Default for WebAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WebAudioBackend {
    pub fn new() -> Self {
        // Fails outside a secure context
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        Self {
            ctx,
            music: BTreeMap::new(),
            next_handle: 0,
        }
    }

    fn context(&self) -> Result<&AudioContext, AudioError> {
        let ctx = self.ctx.as_ref().ok_or(AudioError::Unavailable)?;
        if ctx.state() == AudioContextState::Suspended {
            let _ = ctx.resume();
        }
        Ok(ctx)
    }

    fn create_osc(
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
    ) -> Result<(OscillatorNode, GainNode), AudioError> {
        let osc = ctx.create_oscillator().map_err(js_err)?;
        let gain = ctx.create_gain().map_err(js_err)?;

        osc.set_type(osc_type);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).map_err(js_err)?;
        gain.connect_with_audio_node(&ctx.destination())
            .map_err(js_err)?;

        Ok((osc, gain))
    }

    /// Short decaying note starting `delay` seconds from now
    fn note(
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
        vol: f32,
        delay: f64,
        length: f64,
    ) -> Result<(), AudioError> {
        let (osc, gain) = Self::create_osc(ctx, freq, osc_type)?;
        let t = ctx.current_time() + delay;
        gain.gain().set_value_at_time(vol, t).map_err(js_err)?;
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + length * 0.8)
            .map_err(js_err)?;
        osc.start_with_when(t).map_err(js_err)?;
        osc.stop_with_when(t + length).map_err(js_err)?;
        Ok(())
    }

    /// Single oscillator sliding from `from` to `to` Hz
    fn sweep(
        ctx: &AudioContext,
        from: f32,
        to: f32,
        osc_type: OscillatorType,
        vol: f32,
        length: f64,
    ) -> Result<(), AudioError> {
        let (osc, gain) = Self::create_osc(ctx, from, osc_type)?;
        let t = ctx.current_time();
        gain.gain().set_value_at_time(vol, t).map_err(js_err)?;
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + length)
            .map_err(js_err)?;
        osc.frequency().set_value_at_time(from, t).map_err(js_err)?;
        osc.frequency()
            .exponential_ramp_to_value_at_time(to, t + length * 0.8)
            .map_err(js_err)?;
        osc.start().map_err(js_err)?;
        osc.stop_with_when(t + length + 0.05).map_err(js_err)?;
        Ok(())
    }

    /// Teleport - portal warble rising then falling
    fn play_teleport(ctx: &AudioContext, vol: f32) -> Result<(), AudioError> {
        let (osc, gain) = Self::create_osc(ctx, 300.0, OscillatorType::Sine)?;
        let t = ctx.current_time();
        gain.gain().set_value_at_time(vol * 0.35, t).map_err(js_err)?;
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + 0.35)
            .map_err(js_err)?;
        osc.frequency().set_value_at_time(300.0, t).map_err(js_err)?;
        osc.frequency()
            .exponential_ramp_to_value_at_time(1200.0, t + 0.15)
            .map_err(js_err)?;
        osc.frequency()
            .exponential_ramp_to_value_at_time(200.0, t + 0.3)
            .map_err(js_err)?;
        osc.start().map_err(js_err)?;
        osc.stop_with_when(t + 0.4).map_err(js_err)?;

        // Shimmer on top
        Self::note(ctx, 2400.0, OscillatorType::Triangle, vol * 0.08, 0.05, 0.2)
    }

    /// Base pitch of a track's drone
    fn track_root(track: &str) -> f32 {
        match track {
            "menu" => 110.0,
            "level1" => 130.81,
            "level2" => 146.83,
            "level3" => 164.81,
            "level4" => 98.0,
            "level5" => 87.31,
            _ => 123.47,
        }
    }
}

impl AudioBackend for WebAudioBackend {
    fn play_sfx(&mut self, effect: SoundEffect, vol: f32) -> Result<(), AudioError> {
        let ctx = self.context()?;
        match effect {
            // Solid thump
            SoundEffect::Grab => Self::sweep(ctx, 150.0, 60.0, OscillatorType::Sine, vol * 0.6, 0.1),
            // Higher ping
            SoundEffect::Release => Self::note(ctx, 400.0, OscillatorType::Sine, vol * 0.3, 0.0, 0.1),
            SoundEffect::Teleport => Self::play_teleport(ctx, vol),
            // Long descending hum
            SoundEffect::GravityShift => {
                Self::sweep(ctx, 300.0, 40.0, OscillatorType::Sawtooth, vol * 0.3, 0.8)
            }
            SoundEffect::LevelComplete => {
                for (i, freq) in [400.0, 500.0, 600.0, 800.0].iter().enumerate() {
                    Self::note(ctx, *freq, OscillatorType::Triangle, vol * 0.3, i as f64 * 0.1, 0.5)?;
                }
                Ok(())
            }
            SoundEffect::Achievement => {
                for (i, freq) in [500.0, 600.0, 700.0, 800.0, 1000.0].iter().enumerate() {
                    Self::note(ctx, *freq, OscillatorType::Triangle, vol * 0.25, i as f64 * 0.08, 0.3)?;
                }
                Ok(())
            }
        }
    }

    fn start_music(&mut self, track: &str, vol: f32) -> Result<MusicHandle, AudioError> {
        let ctx = self.context()?;
        let root = Self::track_root(track);

        let gain = ctx.create_gain().map_err(js_err)?;
        gain.gain().set_value(vol * 0.15);
        gain.connect_with_audio_node(&ctx.destination())
            .map_err(js_err)?;

        // Root and fifth, slightly detuned
        let mut oscs = Vec::new();
        for (freq, osc_type) in [
            (root, OscillatorType::Sine),
            (root * 1.5 + 0.7, OscillatorType::Triangle),
        ] {
            let osc = ctx.create_oscillator().map_err(js_err)?;
            osc.set_type(osc_type);
            osc.frequency().set_value(freq);
            osc.connect_with_audio_node(&gain).map_err(js_err)?;
            osc.start().map_err(js_err)?;
            oscs.push(osc);
        }

        self.next_handle += 1;
        self.music.insert(self.next_handle, MusicVoice { oscs, gain });
        Ok(MusicHandle(self.next_handle))
    }

    fn stop_music(&mut self, handle: MusicHandle) -> Result<(), AudioError> {
        let Some(voice) = self.music.remove(&handle.0) else {
            return Ok(());
        };
        for osc in &voice.oscs {
            osc.stop().map_err(js_err)?;
        }
        voice.gain.disconnect().map_err(js_err)?;
        Ok(())
    }

    fn set_music_volume(&mut self, handle: MusicHandle, vol: f32) -> Result<(), AudioError> {
        if let Some(voice) = self.music.get(&handle.0) {
            voice.gain.gain().set_value(vol * 0.15);
        }
        Ok(())
    }

    /// No recorded speech; a low two-note murmur marks the line
    fn play_voiceover(&mut self, _level_id: &str, vol: f32) -> Result<(), AudioError> {
        let ctx = self.context()?;
        Self::note(ctx, 180.0, OscillatorType::Sine, vol * 0.2, 0.0, 0.6)?;
        Self::note(ctx, 150.0, OscillatorType::Sine, vol * 0.2, 0.5, 0.8)
    }

    fn resume(&mut self) {
        if let Some(ctx) = &self.ctx {
            let _ = ctx.resume();
        }
    }
}
