//! Game orchestrator
//!
//! One `Game` per running app. It owns every stateful component and moves
//! data between them once per frame:
//!
//! ```text
//! input / physics ─▶ InteractionLayer ─▶ LevelSessionController ─▶ ProfileStore ─▶ PersistenceClient
//!                          │                      │                                       │
//!                          └────────── AudioDispatcher ◀──────────┘        responses ◀────┘
//! ```

use glam::Vec3;
use thiserror::Error;

use crate::audio::{AudioBackend, AudioDispatcher, SoundEffect};
use crate::catalog::{Catalog, CatalogError};
use crate::clamp_frame_delta;
use crate::consts::MENU_TRACK;
use crate::interaction::{BodyCommand, InputSignal, InteractionEvent, InteractionLayer};
use crate::level::LevelDefinition;
use crate::persistence::local;
use crate::persistence::{ApiCall, ApiReply, ApiResponse, PersistenceClient, Transport};
use crate::platform;
use crate::profile::settings::SettingsPatch;
use crate::profile::{GameProfile, ProfileAction, ProfileChange, ProfileError, ProfileStore};
use crate::session::{LevelSessionController, SessionEvent, SessionPhase};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("level {0} does not exist")]
    LevelNotFound(String),
    #[error("level {0} is locked")]
    LevelLocked(String),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

pub struct Game<B: AudioBackend, T: Transport> {
    store: ProfileStore,
    audio: AudioDispatcher<B>,
    controller: LevelSessionController,
    interaction: InteractionLayer,
    client: PersistenceClient<T>,
    /// Remote session id for the level being played
    session_id: Option<String>,
    notices: Vec<String>,
}

impl<B: AudioBackend, T: Transport> Game<B, T> {
    pub fn new(store: ProfileStore, backend: B, client: PersistenceClient<T>) -> Self {
        let audio = AudioDispatcher::new(backend, store.profile().settings.audio.clone());
        Self {
            store,
            audio,
            controller: LevelSessionController::new(),
            interaction: InteractionLayer::new(),
            client,
            session_id: None,
            notices: Vec::new(),
        }
    }

    /// Start from the locally saved profile when there is one
    pub fn restore(catalog: Catalog, backend: B, client: PersistenceClient<T>) -> Self {
        let store = match local::load_profile() {
            Some(profile) => ProfileStore::with_profile(catalog, profile),
            None => ProfileStore::new(catalog),
        };
        Self::new(store, backend, client)
    }

    pub fn profile(&self) -> &GameProfile {
        self.store.profile()
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        self.store.catalog()
    }

    pub fn controller(&self) -> &LevelSessionController {
        &self.controller
    }

    pub fn interaction(&self) -> &InteractionLayer {
        &self.interaction
    }

    pub fn audio(&self) -> &AudioDispatcher<B> {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioDispatcher<B> {
        &mut self.audio
    }

    pub fn client(&self) -> &PersistenceClient<T> {
        &self.client
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Gravity the physics engine should use right now
    pub fn gravity(&self) -> Option<Vec3> {
        self.controller.session().map(|s| s.current_gravity)
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Menu screen
    pub fn open_menu(&mut self) {
        self.audio.play_music(MENU_TRACK);
    }

    /// Ask the backend for the player's state and the catalogs
    pub fn sync_with_backend(&mut self) {
        self.client.fetch_game_state();
        self.client.fetch_levels();
        self.client.fetch_hand_skins();
        self.client.fetch_achievements();
    }

    /// Enter the play view for `level_id`.
    ///
    /// Missing or locked levels leave everything untouched.
    pub fn enter_level(&mut self, level_id: &str) -> Result<(), GameError> {
        let Some(definition) = self.store.catalog().level(level_id).cloned() else {
            log::warn!("Level {} not found", level_id);
            return Err(GameError::LevelNotFound(level_id.to_string()));
        };
        if !self.store.profile().is_level_unlocked(level_id) {
            log::warn!("Level {} is locked", level_id);
            return Err(GameError::LevelLocked(level_id.to_string()));
        }
        self.store
            .dispatch(ProfileAction::SetCurrentLevel(level_id.to_string()))?;

        if self.controller.definition().is_some() {
            self.controller.unload();
        }
        self.session_id = None;
        self.load(definition);

        self.audio.play_music(level_id);
        self.client.start_session(level_id);
        local::save_profile(self.store.profile());
        Ok(())
    }

    fn load(&mut self, definition: LevelDefinition) {
        let voiceover = definition.voiceover.is_some();
        let level_id = definition.id.clone();
        self.interaction.load(&definition);
        self.controller.load_level(definition);
        if voiceover {
            self.audio.play_voiceover(&level_id);
        }
    }

    /// Back to the menu. Timers and an undelivered completion are dropped.
    pub fn leave_level(&mut self) {
        self.interaction.clear();
        self.controller.unload();
        self.session_id = None;
        self.open_menu();
    }

    /// Player asked to start the level over
    pub fn restart_level(&mut self) {
        self.controller.restart();
        self.pump_session_events();
    }

    pub fn input(&mut self, signal: InputSignal) {
        let events = self.interaction.input(signal);
        self.route(events);
    }

    /// Window lost focus
    pub fn release_grab(&mut self) {
        let events = self.interaction.release_grab();
        self.route(events);
    }

    pub fn pointer_moved(&mut self, position: Vec3) {
        self.interaction.move_hand(position);
    }

    pub fn sync_body(&mut self, body_id: &str, position: Vec3) {
        self.interaction.sync_body(body_id, position);
    }

    pub fn collision_enter(&mut self, object_id: &str, zone_id: &str) {
        let events = self.interaction.collision_enter(object_id, zone_id);
        self.route(events);
    }

    pub fn collision_exit(&mut self, object_id: &str, zone_id: &str) {
        let events = self.interaction.collision_exit(object_id, zone_id);
        self.route(events);
    }

    /// Physics commands queued since the last call
    pub fn drain_body_commands(&mut self) -> Vec<BodyCommand> {
        self.interaction.drain_body_commands()
    }

    pub fn select_hand_skin(&mut self, skin_id: &str) -> Result<(), GameError> {
        let changes = self
            .store
            .dispatch(ProfileAction::SelectHandSkin(skin_id.to_string()))?;
        if !changes.is_empty() {
            local::save_profile(self.store.profile());
        }
        Ok(())
    }

    /// Returns whether anything changed
    pub fn update_settings(&mut self, patch: SettingsPatch) -> bool {
        let changed = self
            .store
            .dispatch(ProfileAction::UpdateSettings(patch))
            .map(|changes| !changes.is_empty())
            .unwrap_or(false);
        if changed {
            self.audio.set_volumes(&self.store.profile().settings.audio);
            local::save_profile(self.store.profile());
        }
        changed
    }

    pub fn reset_profile(&mut self) {
        if let Err(e) = self.store.dispatch(ProfileAction::Reset) {
            log::warn!("Profile reset failed: {}", e);
            return;
        }
        self.audio.set_volumes(&self.store.profile().settings.audio);
        local::save_profile(self.store.profile());
    }

    /// Run one frame
    pub fn frame(&mut self, delta_ms: f64) {
        let delta_ms = clamp_frame_delta(delta_ms);

        let events = self.interaction.advance(delta_ms);
        self.route(events);
        self.controller.tick(delta_ms);
        self.pump_session_events();

        for request in self.store.drain_outbox() {
            self.client.persist(&request);
        }
        for response in self.client.drain() {
            self.on_response(response);
        }
    }

    fn pump_session_events(&mut self) {
        for event in self.controller.drain_events() {
            self.on_session_event(event);
        }
    }

    fn route(&mut self, events: Vec<InteractionEvent>) {
        for event in events {
            match &event {
                InteractionEvent::GrabStart => {
                    if self.controller.phase() == Some(SessionPhase::Idle) {
                        self.controller.start(platform::now_ms());
                    }
                    self.audio.play_sfx(SoundEffect::Grab);
                }
                InteractionEvent::GrabEnd => self.audio.play_sfx(SoundEffect::Release),
                InteractionEvent::TeleportTrigger { .. } => {
                    self.audio.play_sfx(SoundEffect::Teleport)
                }
                _ => {}
            }
            self.controller.handle_interaction(&event);
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::GravityShifted { .. } => self.audio.play_sfx(SoundEffect::GravityShift),
            SessionEvent::Restarted { .. } => {
                // Balls go back to their spawn points
                if let Some(definition) = self.controller.definition() {
                    self.interaction.reset(definition);
                }
            }
            SessionEvent::TimeLimitExpired { level_id, .. } => {
                self.notices
                    .push(format!("Time is up on {}. Try again!", level_id));
            }
            SessionEvent::Completed(report) => {
                self.audio.play_sfx(SoundEffect::LevelComplete);
                let action = ProfileAction::CompleteLevel {
                    level_id: report.level_id.clone(),
                    time_ms: report.elapsed_ms.max(0.0).round() as u64,
                    stats: report.stats,
                };
                match self.store.dispatch(action) {
                    Ok(changes) => {
                        self.announce(&changes);
                        local::save_profile(self.store.profile());
                    }
                    Err(e) => {
                        log::warn!("Completion of {} not recorded: {}", report.level_id, e);
                        self.notices
                            .push(format!("Could not record completion: {}", e));
                    }
                }
            }
            SessionEvent::Loaded { .. }
            | SessionEvent::Started { .. }
            | SessionEvent::VoiceoverHidden
            | SessionEvent::Unloaded { .. } => {}
        }
    }

    fn announce(&mut self, changes: &[ProfileChange]) {
        for change in changes {
            if let ProfileChange::AchievementUnlocked(_) = change {
                self.audio.play_sfx(SoundEffect::Achievement);
            }
        }
    }

    fn on_response(&mut self, response: ApiResponse) {
        let ApiResponse { call, result } = response;
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                self.notices
                    .push(format!("Could not {}: {}", call.describe(), e.message()));
                return;
            }
        };

        match reply {
            ApiReply::GameState(remote) => {
                let changes = self.store.reconcile(&remote);
                if !changes.is_empty() {
                    log::info!("Merged {} changes from the server", changes.len());
                    local::save_profile(self.store.profile());
                }
            }
            ApiReply::Levels(levels) => self.update_catalog(|c| c.replace_levels(levels)),
            ApiReply::Level(level) => {
                let level = *level;
                let mut levels = self.store.catalog().levels().to_vec();
                match levels.iter_mut().find(|l| l.id == level.id) {
                    Some(slot) => *slot = level,
                    None => levels.push(level),
                }
                self.update_catalog(|c| c.replace_levels(levels));
            }
            ApiReply::HandSkins(skins) => self.update_catalog(|c| {
                c.replace_hand_skins(skins);
                Ok(())
            }),
            ApiReply::Achievements(achievements) => self.update_catalog(|c| {
                c.replace_achievements(achievements);
                Ok(())
            }),
            ApiReply::SessionStarted { session_id } => {
                let current = self.controller.definition().map(|d| d.id.as_str());
                match &call {
                    ApiCall::StartSession(level_id) if Some(level_id.as_str()) == current => {
                        log::info!("Game session {} started for {}", session_id, level_id);
                        self.session_id = Some(session_id);
                    }
                    _ => log::debug!("Ignoring stale session {}", session_id),
                }
            }
            ApiReply::Health(health) => {
                log::info!("Server says: {} (v{})", health.message, health.version)
            }
            ApiReply::Acknowledged => log::debug!("Server acknowledged: {}", call.describe()),
        }
    }

    fn update_catalog(
        &mut self,
        apply: impl FnOnce(&mut Catalog) -> Result<(), CatalogError>,
    ) {
        let mut catalog = self.store.catalog().clone();
        match apply(&mut catalog) {
            Ok(()) => self.store.replace_catalog(catalog),
            Err(e) => {
                log::warn!("Keeping bundled catalog: {}", e);
                self.notices.push(format!("Server catalog rejected: {}", e));
            }
        }
    }
}
