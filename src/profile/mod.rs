//! Game profile store
//!
//! The player's durable state: unlocked and completed levels, hand skins,
//! achievements, statistics and settings. Consumers read through
//! [`ProfileStore::profile`] and change things only by dispatching a
//! [`ProfileAction`]. Every durable change also queues a [`PersistRequest`]
//! in the outbox; the local state is applied first and never rolled back.

pub mod settings;
pub mod unlocks;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::consts::{DEFAULT_HAND_SKIN_ID, FIRST_LEVEL_ID};
use crate::session::SessionStats;
use settings::{Settings, SettingsPatch};
use unlocks::{UnlockCondition, UnlockContext};

/// Per-level record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level_id: String,
    pub completed: bool,
    pub best_time_ms: Option<u64>,
    pub attempts: u32,
}

impl LevelProgress {
    fn new(level_id: &str) -> Self {
        Self {
            level_id: level_id.to_string(),
            completed: false,
            best_time_ms: None,
            attempts: 0,
        }
    }
}

/// Lifetime totals
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub total_grabs: u64,
    pub total_releases: u64,
    pub total_teleports: u64,
    pub fastest_time_ms: Option<u64>,
    pub levels_completed: u32,
    pub total_play_time_secs: u64,
}

fn min_time(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameProfile {
    pub player_id: String,
    pub current_level_id: String,
    pub unlocked_level_ids: BTreeSet<String>,
    pub completed_level_ids: BTreeSet<String>,
    pub selected_hand_skin_id: String,
    pub unlocked_hand_skin_ids: BTreeSet<String>,
    pub unlocked_achievement_ids: BTreeSet<String>,
    pub level_progress: BTreeMap<String, LevelProgress>,
    pub statistics: Statistics,
    pub settings: Settings,
}

impl Default for GameProfile {
    fn default() -> Self {
        Self::new("default")
    }
}

impl GameProfile {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            current_level_id: FIRST_LEVEL_ID.to_string(),
            unlocked_level_ids: BTreeSet::from([FIRST_LEVEL_ID.to_string()]),
            completed_level_ids: BTreeSet::new(),
            selected_hand_skin_id: DEFAULT_HAND_SKIN_ID.to_string(),
            unlocked_hand_skin_ids: BTreeSet::from([DEFAULT_HAND_SKIN_ID.to_string()]),
            unlocked_achievement_ids: BTreeSet::new(),
            level_progress: BTreeMap::new(),
            statistics: Statistics::default(),
            settings: Settings::default(),
        }
    }

    pub fn is_level_unlocked(&self, level_id: &str) -> bool {
        self.unlocked_level_ids.contains(level_id)
    }

    pub fn is_level_completed(&self, level_id: &str) -> bool {
        self.completed_level_ids.contains(level_id)
    }

    pub fn is_hand_skin_unlocked(&self, skin_id: &str) -> bool {
        self.unlocked_hand_skin_ids.contains(skin_id)
    }

    pub fn is_achievement_unlocked(&self, achievement_id: &str) -> bool {
        self.unlocked_achievement_ids.contains(achievement_id)
    }

    pub fn best_time_ms(&self, level_id: &str) -> Option<u64> {
        self.level_progress.get(level_id).and_then(|p| p.best_time_ms)
    }

    /// Re-establish the structural invariants after loading or merging
    pub fn normalize(&mut self) {
        self.unlocked_level_ids.insert(FIRST_LEVEL_ID.to_string());
        self.unlocked_hand_skin_ids
            .insert(DEFAULT_HAND_SKIN_ID.to_string());
        // A completed level was necessarily playable
        self.unlocked_level_ids
            .extend(self.completed_level_ids.iter().cloned());
        if !self.unlocked_hand_skin_ids.contains(&self.selected_hand_skin_id) {
            self.selected_hand_skin_id = DEFAULT_HAND_SKIN_ID.to_string();
        }
        if !self.unlocked_level_ids.contains(&self.current_level_id) {
            self.current_level_id = FIRST_LEVEL_ID.to_string();
        }
        self.statistics.levels_completed = self.completed_level_ids.len() as u32;
        self.settings.sanitize();
    }
}

/// Named mutations of the profile
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileAction {
    SetCurrentLevel(String),
    CompleteLevel {
        level_id: String,
        time_ms: u64,
        stats: SessionStats,
    },
    SelectHandSkin(String),
    UpdateSettings(SettingsPatch),
    /// Back to a fresh profile (local only)
    Reset,
}

/// What a dispatched action actually changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileChange {
    CurrentLevelChanged(String),
    LevelCompleted { level_id: String, first_time: bool },
    LevelUnlocked(String),
    HandSkinUnlocked(String),
    AchievementUnlocked(String),
    HandSkinSelected(String),
    SettingsChanged,
    Reset,
}

/// Level completion as it goes to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCompletion {
    pub level_id: String,
    pub completion_time_ms: u64,
    pub grabs: u32,
    pub releases: u32,
    pub teleports: u32,
}

/// Durable change waiting to be sent
#[derive(Debug, Clone, PartialEq)]
pub enum PersistRequest {
    CompleteLevel(LevelCompletion),
    SelectHandSkin(String),
    UpdateSettings(Settings),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("unknown level: {0}")]
    UnknownLevel(String),
    #[error("level {0} is locked")]
    LevelLocked(String),
    #[error("unknown hand skin: {0}")]
    UnknownHandSkin(String),
    #[error("hand skin {0} is locked")]
    HandSkinLocked(String),
}

pub struct ProfileStore {
    profile: GameProfile,
    catalog: Catalog,
    outbox: Vec<PersistRequest>,
}

impl ProfileStore {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_profile(catalog, GameProfile::default())
    }

    /// Start from a saved profile (e.g. a local snapshot)
    pub fn with_profile(catalog: Catalog, mut profile: GameProfile) -> Self {
        profile.normalize();
        Self {
            profile,
            catalog,
            outbox: Vec::new(),
        }
    }

    pub fn profile(&self) -> &GameProfile {
        &self.profile
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Swap in a fresher catalog (from the backend)
    pub fn replace_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    pub fn has_pending_persistence(&self) -> bool {
        !self.outbox.is_empty()
    }

    pub fn drain_outbox(&mut self) -> Vec<PersistRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Completed share of the catalog, 0..=100
    pub fn progress_percent(&self) -> f32 {
        let total = self.catalog.levels().len();
        if total == 0 {
            return 0.0;
        }
        let done = self
            .catalog
            .levels()
            .iter()
            .filter(|l| self.profile.is_level_completed(&l.id))
            .count();
        done as f32 / total as f32 * 100.0
    }

    pub fn dispatch(&mut self, action: ProfileAction) -> Result<Vec<ProfileChange>, ProfileError> {
        match action {
            ProfileAction::SetCurrentLevel(level_id) => self.set_current_level(level_id),
            ProfileAction::CompleteLevel {
                level_id,
                time_ms,
                stats,
            } => self.complete_level(&level_id, time_ms, stats),
            ProfileAction::SelectHandSkin(skin_id) => self.select_hand_skin(skin_id),
            ProfileAction::UpdateSettings(patch) => Ok(self.update_settings(&patch)),
            ProfileAction::Reset => {
                let player_id = self.profile.player_id.clone();
                self.profile = GameProfile::new(player_id);
                log::info!("Profile reset");
                Ok(vec![ProfileChange::Reset])
            }
        }
    }

    fn set_current_level(&mut self, level_id: String) -> Result<Vec<ProfileChange>, ProfileError> {
        if self.catalog.level(&level_id).is_none() {
            return Err(ProfileError::UnknownLevel(level_id));
        }
        if !self.profile.is_level_unlocked(&level_id) {
            return Err(ProfileError::LevelLocked(level_id));
        }
        if self.profile.current_level_id == level_id {
            return Ok(Vec::new());
        }
        self.profile.current_level_id = level_id.clone();
        Ok(vec![ProfileChange::CurrentLevelChanged(level_id)])
    }

    fn complete_level(
        &mut self,
        level_id: &str,
        time_ms: u64,
        stats: SessionStats,
    ) -> Result<Vec<ProfileChange>, ProfileError> {
        if self.catalog.level(level_id).is_none() {
            return Err(ProfileError::UnknownLevel(level_id.to_string()));
        }

        let progress = self
            .profile
            .level_progress
            .entry(level_id.to_string())
            .or_insert_with(|| LevelProgress::new(level_id));
        progress.completed = true;
        progress.attempts += 1;
        progress.best_time_ms = min_time(progress.best_time_ms, Some(time_ms));

        let first_time = self
            .profile
            .completed_level_ids
            .insert(level_id.to_string());

        let totals = &mut self.profile.statistics;
        totals.total_grabs += u64::from(stats.grabs);
        totals.total_releases += u64::from(stats.releases);
        totals.total_teleports += u64::from(stats.teleports);
        totals.fastest_time_ms = min_time(totals.fastest_time_ms, Some(time_ms));
        totals.total_play_time_secs += time_ms / 1000;
        totals.levels_completed = self.profile.completed_level_ids.len() as u32;

        log::info!(
            "Level {} complete in {} ms (first time: {})",
            level_id,
            time_ms,
            first_time
        );

        let mut changes = vec![ProfileChange::LevelCompleted {
            level_id: level_id.to_string(),
            first_time,
        }];

        if let Some(next) = self.catalog.next_level(level_id)
            && self.profile.unlocked_level_ids.insert(next.id.clone())
        {
            log::info!("Unlocked level {}", next.id);
            changes.push(ProfileChange::LevelUnlocked(next.id.clone()));
        }

        changes.extend(self.check_unlocks(Some(time_ms)));

        self.outbox
            .push(PersistRequest::CompleteLevel(LevelCompletion {
                level_id: level_id.to_string(),
                completion_time_ms: time_ms,
                grabs: stats.grabs,
                releases: stats.releases,
                teleports: stats.teleports,
            }));

        Ok(changes)
    }

    /// Latch every skin and achievement whose condition now holds
    fn check_unlocks(&mut self, completion_time_ms: Option<u64>) -> Vec<ProfileChange> {
        let level_ids = self.catalog.level_ids();
        let ctx = UnlockContext {
            completed_level_ids: &self.profile.completed_level_ids,
            catalog_level_ids: &level_ids,
            total_teleports: self.profile.statistics.total_teleports,
            completion_time_ms,
        };

        let skins: Vec<String> = self
            .catalog
            .hand_skins()
            .iter()
            .filter(|s| !self.profile.unlocked_hand_skin_ids.contains(&s.id))
            .filter(|s| {
                s.unlock_requirement
                    .as_deref()
                    .is_some_and(|req| UnlockCondition::parse(req).is_met(&ctx))
            })
            .map(|s| s.id.clone())
            .collect();

        let achievements: Vec<String> = self
            .catalog
            .achievements()
            .iter()
            .filter(|a| !self.profile.unlocked_achievement_ids.contains(&a.id))
            .filter(|a| UnlockCondition::parse(&a.unlock_condition).is_met(&ctx))
            .map(|a| a.id.clone())
            .collect();

        let mut changes = Vec::new();
        for id in skins {
            log::info!("Unlocked hand skin {}", id);
            self.profile.unlocked_hand_skin_ids.insert(id.clone());
            changes.push(ProfileChange::HandSkinUnlocked(id));
        }
        for id in achievements {
            log::info!("Achievement unlocked: {}", id);
            self.profile.unlocked_achievement_ids.insert(id.clone());
            changes.push(ProfileChange::AchievementUnlocked(id));
        }
        changes
    }

    fn select_hand_skin(&mut self, skin_id: String) -> Result<Vec<ProfileChange>, ProfileError> {
        if !self.profile.is_hand_skin_unlocked(&skin_id) {
            return Err(if self.catalog.hand_skin(&skin_id).is_some() {
                ProfileError::HandSkinLocked(skin_id)
            } else {
                ProfileError::UnknownHandSkin(skin_id)
            });
        }
        if self.profile.selected_hand_skin_id == skin_id {
            return Ok(Vec::new());
        }
        self.profile.selected_hand_skin_id = skin_id.clone();
        self.outbox
            .push(PersistRequest::SelectHandSkin(skin_id.clone()));
        Ok(vec![ProfileChange::HandSkinSelected(skin_id)])
    }

    fn update_settings(&mut self, patch: &SettingsPatch) -> Vec<ProfileChange> {
        if !self.profile.settings.apply(patch) {
            return Vec::new();
        }
        self.outbox
            .push(PersistRequest::UpdateSettings(self.profile.settings.clone()));
        vec![ProfileChange::SettingsChanged]
    }

    /// Merge a profile fetched from the backend.
    ///
    /// Sets are unioned and counters take the larger value, so applying the
    /// same remote state twice (or out of order) converges. Local settings,
    /// selection and current level win.
    pub fn reconcile(&mut self, remote: &GameProfile) -> Vec<ProfileChange> {
        let before = self.profile.clone();
        let local = &mut self.profile;

        local
            .unlocked_level_ids
            .extend(remote.unlocked_level_ids.iter().cloned());
        local
            .completed_level_ids
            .extend(remote.completed_level_ids.iter().cloned());
        local
            .unlocked_hand_skin_ids
            .extend(remote.unlocked_hand_skin_ids.iter().cloned());
        local
            .unlocked_achievement_ids
            .extend(remote.unlocked_achievement_ids.iter().cloned());

        for (id, theirs) in &remote.level_progress {
            let ours = local
                .level_progress
                .entry(id.clone())
                .or_insert_with(|| LevelProgress::new(id));
            ours.completed |= theirs.completed;
            ours.attempts = ours.attempts.max(theirs.attempts);
            ours.best_time_ms = min_time(ours.best_time_ms, theirs.best_time_ms);
        }

        let (ours, theirs) = (&mut local.statistics, &remote.statistics);
        ours.total_grabs = ours.total_grabs.max(theirs.total_grabs);
        ours.total_releases = ours.total_releases.max(theirs.total_releases);
        ours.total_teleports = ours.total_teleports.max(theirs.total_teleports);
        ours.total_play_time_secs = ours.total_play_time_secs.max(theirs.total_play_time_secs);
        ours.fastest_time_ms = min_time(ours.fastest_time_ms, theirs.fastest_time_ms);

        local.normalize();

        let mut changes = Vec::new();
        let after = &self.profile;
        changes.extend(
            after
                .unlocked_level_ids
                .difference(&before.unlocked_level_ids)
                .map(|id| ProfileChange::LevelUnlocked(id.clone())),
        );
        changes.extend(
            after
                .unlocked_hand_skin_ids
                .difference(&before.unlocked_hand_skin_ids)
                .map(|id| ProfileChange::HandSkinUnlocked(id.clone())),
        );
        changes.extend(
            after
                .unlocked_achievement_ids
                .difference(&before.unlocked_achievement_ids)
                .map(|id| ProfileChange::AchievementUnlocked(id.clone())),
        );
        if !changes.is_empty() {
            log::info!("Reconciled remote profile: {} new unlocks", changes.len());
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> ProfileStore {
        ProfileStore::new(Catalog::builtin().unwrap())
    }

    fn complete(store: &mut ProfileStore, level: &str, time_ms: u64) -> Vec<ProfileChange> {
        store
            .dispatch(ProfileAction::CompleteLevel {
                level_id: level.to_string(),
                time_ms,
                stats: SessionStats {
                    grabs: 3,
                    releases: 2,
                    teleports: 1,
                },
            })
            .unwrap()
    }

    #[test]
    fn test_fresh_profile() {
        let s = store();
        let p = s.profile();
        assert!(p.is_level_unlocked("level1"));
        assert!(!p.is_level_unlocked("level2"));
        assert_eq!(p.selected_hand_skin_id, "default");
        assert_eq!(s.progress_percent(), 0.0);
    }

    #[test]
    fn test_completion_unlocks_next_level() {
        let mut s = store();
        let changes = complete(&mut s, "level1", 45_000);
        assert!(changes.contains(&ProfileChange::LevelUnlocked("level2".to_string())));
        assert!(changes.contains(&ProfileChange::AchievementUnlocked("first_touch".to_string())));
        assert_eq!(s.profile().statistics.levels_completed, 1);
        assert_eq!(s.profile().statistics.total_grabs, 3);
        assert_eq!(s.profile().statistics.total_play_time_secs, 45);
        assert_eq!(s.progress_percent(), 20.0);
    }

    #[test]
    fn test_completing_twice_is_idempotent_for_sets() {
        let mut s = store();
        complete(&mut s, "level1", 45_000);
        let again = complete(&mut s, "level1", 40_000);

        assert_eq!(s.profile().completed_level_ids.len(), 1);
        assert_eq!(
            again,
            vec![ProfileChange::LevelCompleted {
                level_id: "level1".to_string(),
                first_time: false
            }]
        );
        // Counters still add up and best time improves
        assert_eq!(s.profile().statistics.total_grabs, 6);
        assert_eq!(s.profile().best_time_ms("level1"), Some(40_000));
        assert_eq!(s.profile().level_progress["level1"].attempts, 2);
    }

    #[test]
    fn test_fastest_time_is_minimum() {
        let mut s = store();
        complete(&mut s, "level1", 20_000);
        complete(&mut s, "level1", 50_000);
        assert_eq!(s.profile().statistics.fastest_time_ms, Some(20_000));
    }

    #[test]
    fn test_fast_completion_achievement() {
        let mut s = store();
        let changes = complete(&mut s, "level1", 29_000);
        assert!(changes.contains(&ProfileChange::AchievementUnlocked("speed_demon".to_string())));
    }

    #[test]
    fn test_skin_unlocks_from_requirement() {
        let mut s = store();
        complete(&mut s, "level1", 40_000);
        let changes = complete(&mut s, "level2", 40_000);
        assert!(changes.contains(&ProfileChange::HandSkinUnlocked("robotic".to_string())));
        assert!(s.dispatch(ProfileAction::SelectHandSkin("robotic".to_string())).is_ok());
        assert_eq!(s.profile().selected_hand_skin_id, "robotic");
    }

    #[test]
    fn test_select_locked_skin_rejected() {
        let mut s = store();
        let err = s
            .dispatch(ProfileAction::SelectHandSkin("shadow".to_string()))
            .unwrap_err();
        assert_eq!(err, ProfileError::HandSkinLocked("shadow".to_string()));
        assert_eq!(s.profile().selected_hand_skin_id, "default");

        let err = s
            .dispatch(ProfileAction::SelectHandSkin("golden".to_string()))
            .unwrap_err();
        assert_eq!(err, ProfileError::UnknownHandSkin("golden".to_string()));
        assert!(!s.has_pending_persistence());
    }

    #[test]
    fn test_set_current_level_requires_unlock() {
        let mut s = store();
        assert_eq!(
            s.dispatch(ProfileAction::SetCurrentLevel("level3".to_string())),
            Err(ProfileError::LevelLocked("level3".to_string()))
        );
        assert_eq!(
            s.dispatch(ProfileAction::SetCurrentLevel("level99".to_string())),
            Err(ProfileError::UnknownLevel("level99".to_string()))
        );
    }

    #[test]
    fn test_all_levels_unlocks_shadow_and_perfectionist() {
        let mut s = store();
        let mut last = Vec::new();
        for level in ["level1", "level2", "level3", "level4", "level5"] {
            last = complete(&mut s, level, 40_000);
        }
        assert!(last.contains(&ProfileChange::HandSkinUnlocked("shadow".to_string())));
        assert!(last.contains(&ProfileChange::AchievementUnlocked("perfectionist".to_string())));
        assert_eq!(s.progress_percent(), 100.0);
    }

    #[test]
    fn test_outbox_records_durable_actions() {
        let mut s = store();
        complete(&mut s, "level1", 40_000);
        s.dispatch(ProfileAction::UpdateSettings(SettingsPatch::volumes(0.5, 0.5, 0.5)))
            .unwrap();
        s.dispatch(ProfileAction::SetCurrentLevel("level2".to_string()))
            .unwrap();

        let outbox = s.drain_outbox();
        assert_eq!(outbox.len(), 2);
        assert!(matches!(outbox[0], PersistRequest::CompleteLevel(_)));
        assert!(matches!(outbox[1], PersistRequest::UpdateSettings(_)));
        assert!(s.drain_outbox().is_empty());
    }

    #[test]
    fn test_reset_keeps_player() {
        let mut s = store();
        complete(&mut s, "level1", 40_000);
        s.dispatch(ProfileAction::Reset).unwrap();
        assert!(s.profile().completed_level_ids.is_empty());
        assert_eq!(s.profile().player_id, "default");
    }

    #[test]
    fn test_reconcile_merges() {
        let mut s = store();
        complete(&mut s, "level1", 40_000);

        let mut remote = GameProfile::default();
        remote.completed_level_ids.insert("level3".to_string());
        remote.unlocked_hand_skin_ids.insert("ethereal".to_string());
        remote.statistics.total_grabs = 100;
        remote.statistics.fastest_time_ms = Some(10_000);
        remote.selected_hand_skin_id = "ethereal".to_string();

        let changes = s.reconcile(&remote);
        let p = s.profile();
        assert!(p.is_level_completed("level1") && p.is_level_completed("level3"));
        assert!(p.is_level_unlocked("level3"));
        assert_eq!(p.statistics.total_grabs, 100);
        assert_eq!(p.statistics.fastest_time_ms, Some(10_000));
        assert_eq!(p.statistics.levels_completed, 2);
        // Local selection wins
        assert_eq!(p.selected_hand_skin_id, "default");
        assert!(changes.contains(&ProfileChange::HandSkinUnlocked("ethereal".to_string())));
    }

    #[test]
    fn test_normalize_repairs_selection() {
        let mut p = GameProfile::default();
        p.selected_hand_skin_id = "shadow".to_string();
        p.unlocked_level_ids.clear();
        p.normalize();
        assert_eq!(p.selected_hand_skin_id, "default");
        assert!(p.is_level_unlocked("level1"));
    }

    proptest! {
        #[test]
        fn prop_reconcile_is_idempotent(
            grabs in 0u64..1000,
            teleports in 0u64..1000,
            fastest in proptest::option::of(1u64..100_000),
            completed in proptest::collection::btree_set("level[1-5]", 0..5),
        ) {
            let mut remote = GameProfile::default();
            remote.statistics.total_grabs = grabs;
            remote.statistics.total_teleports = teleports;
            remote.statistics.fastest_time_ms = fastest;
            remote.completed_level_ids = completed;

            let mut s = store();
            s.reconcile(&remote);
            let once = s.profile().clone();
            let again = s.reconcile(&remote);
            prop_assert!(again.is_empty());
            prop_assert_eq!(s.profile(), &once);
        }
    }
}
