//! Backend wire format
//!
//! The backend speaks snake_case JSON with its own field names. These DTOs
//! mirror it exactly; the `From` impls are the only place where wire names
//! are translated to the in-game model.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_GRAVITY, DEFAULT_HAND_SKIN_ID, FIRST_LEVEL_ID};
use crate::level::{
    Ball, EnemyBehavior, EnemySpec, GravityShiftTrigger, LevelDefinition, TargetZone, Teleporter,
};
use crate::profile::settings::Settings;
use crate::profile::{GameProfile, LevelCompletion, LevelProgress, Statistics};

/// Every `/game/*` response is wrapped in this
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: String,
}

// === Levels ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallDto {
    pub id: String,
    pub position: Vec3,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDto {
    pub id: String,
    pub position: Vec3,
    pub size: Vec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleporterDto {
    pub id: String,
    pub position: Vec3,
    pub linked_to: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyHandDto {
    pub id: String,
    pub position: Vec3,
    pub behavior: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patrol_path: Option<Vec<Vec3>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GravityShiftDto {
    /// ms after level load
    pub time: u64,
    pub new_gravity: Vec3,
}

fn default_gravity() -> Vec3 {
    DEFAULT_GRAVITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mechanics: Vec<String>,
    pub balls: Vec<BallDto>,
    #[serde(default)]
    pub targets: Vec<TargetDto>,
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teleporters: Option<Vec<TeleporterDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemy_hands: Option<Vec<EnemyHandDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity_shift_trigger: Option<GravityShiftDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    #[serde(default)]
    pub voiceover: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub order: u32,
}

impl From<LevelDto> for LevelDefinition {
    fn from(dto: LevelDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            description: dto.description,
            mechanics: dto.mechanics,
            balls: dto
                .balls
                .into_iter()
                .map(|b| Ball {
                    id: b.id,
                    position: b.position,
                    color: b.color,
                })
                .collect(),
            targets: dto
                .targets
                .into_iter()
                .map(|t| TargetZone {
                    id: t.id,
                    position: t.position,
                    size: t.size,
                })
                .collect(),
            teleporters: dto
                .teleporters
                .unwrap_or_default()
                .into_iter()
                .map(|t| Teleporter {
                    id: t.id,
                    position: t.position,
                    linked_to_id: t.linked_to,
                    color: t.color,
                })
                .collect(),
            enemies: dto
                .enemy_hands
                .unwrap_or_default()
                .into_iter()
                .map(|e| EnemySpec {
                    id: e.id,
                    position: e.position,
                    behavior: EnemyBehavior::parse(&e.behavior),
                    patrol_path: e.patrol_path.unwrap_or_default(),
                })
                .collect(),
            gravity: dto.gravity,
            gravity_shift: dto.gravity_shift_trigger.map(|g| GravityShiftTrigger {
                fire_at_ms: g.time,
                new_gravity: g.new_gravity,
            }),
            time_limit_ms: dto.time_limit,
            voiceover: Some(dto.voiceover).filter(|v| !v.trim().is_empty()),
            environment: dto.environment,
            order: dto.order,
        }
    }
}

impl From<&LevelDefinition> for LevelDto {
    fn from(level: &LevelDefinition) -> Self {
        let teleporters: Vec<TeleporterDto> = level
            .teleporters
            .iter()
            .map(|t| TeleporterDto {
                id: t.id.clone(),
                position: t.position,
                linked_to: t.linked_to_id.clone(),
                color: t.color.clone(),
            })
            .collect();
        let enemy_hands: Vec<EnemyHandDto> = level
            .enemies
            .iter()
            .map(|e| EnemyHandDto {
                id: e.id.clone(),
                position: e.position,
                behavior: e.behavior.as_str().to_string(),
                patrol_path: Some(e.patrol_path.clone()).filter(|p| !p.is_empty()),
            })
            .collect();

        Self {
            id: level.id.clone(),
            name: level.name.clone(),
            description: level.description.clone(),
            mechanics: level.mechanics.clone(),
            balls: level
                .balls
                .iter()
                .map(|b| BallDto {
                    id: b.id.clone(),
                    position: b.position,
                    color: b.color.clone(),
                })
                .collect(),
            targets: level
                .targets
                .iter()
                .map(|t| TargetDto {
                    id: t.id.clone(),
                    position: t.position,
                    size: t.size,
                })
                .collect(),
            gravity: level.gravity,
            teleporters: Some(teleporters).filter(|t| !t.is_empty()),
            enemy_hands: Some(enemy_hands).filter(|e| !e.is_empty()),
            gravity_shift_trigger: level.gravity_shift.map(|g| GravityShiftDto {
                time: g.fire_at_ms,
                new_gravity: g.new_gravity,
            }),
            time_limit: level.time_limit_ms,
            voiceover: level.voiceover.clone().unwrap_or_default(),
            environment: level.environment.clone(),
            order: level.order,
        }
    }
}

// === Player state ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelProgressDto {
    pub level_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub best_time: Option<u64>,
    #[serde(default)]
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsDto {
    pub total_grabs: u64,
    pub total_releases: u64,
    pub total_teleports: u64,
    pub fastest_time: Option<u64>,
    pub levels_completed: u32,
    /// seconds
    pub total_play_time: u64,
}

fn default_player() -> String {
    "default".to_string()
}

fn default_current_level() -> String {
    FIRST_LEVEL_ID.to_string()
}

fn default_unlocked_levels() -> Vec<String> {
    vec![FIRST_LEVEL_ID.to_string()]
}

fn default_skin() -> String {
    DEFAULT_HAND_SKIN_ID.to_string()
}

fn default_unlocked_skins() -> Vec<String> {
    vec![DEFAULT_HAND_SKIN_ID.to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStateDto {
    #[serde(default = "default_player")]
    pub player_id: String,
    #[serde(default = "default_current_level")]
    pub current_level: String,
    #[serde(default = "default_unlocked_levels")]
    pub unlocked_levels: Vec<String>,
    #[serde(default)]
    pub completed_levels: Vec<String>,
    #[serde(default = "default_skin")]
    pub selected_hand_skin: String,
    #[serde(default = "default_unlocked_skins")]
    pub unlocked_hand_skins: Vec<String>,
    #[serde(default)]
    pub level_progress: Vec<LevelProgressDto>,
    #[serde(default)]
    pub unlocked_achievements: Vec<String>,
    #[serde(default)]
    pub statistics: StatisticsDto,
    #[serde(default)]
    pub settings: Settings,
}

impl From<PlayerStateDto> for GameProfile {
    fn from(dto: PlayerStateDto) -> Self {
        let level_progress: BTreeMap<String, LevelProgress> = dto
            .level_progress
            .into_iter()
            .map(|p| {
                (
                    p.level_id.clone(),
                    LevelProgress {
                        level_id: p.level_id,
                        completed: p.completed,
                        best_time_ms: p.best_time,
                        attempts: p.attempts,
                    },
                )
            })
            .collect();

        let mut profile = Self {
            player_id: dto.player_id,
            current_level_id: dto.current_level,
            unlocked_level_ids: dto.unlocked_levels.into_iter().collect(),
            completed_level_ids: dto.completed_levels.into_iter().collect(),
            selected_hand_skin_id: dto.selected_hand_skin,
            unlocked_hand_skin_ids: dto.unlocked_hand_skins.into_iter().collect(),
            unlocked_achievement_ids: dto.unlocked_achievements.into_iter().collect::<BTreeSet<_>>(),
            level_progress,
            statistics: Statistics {
                total_grabs: dto.statistics.total_grabs,
                total_releases: dto.statistics.total_releases,
                total_teleports: dto.statistics.total_teleports,
                fastest_time_ms: dto.statistics.fastest_time,
                levels_completed: dto.statistics.levels_completed,
                total_play_time_secs: dto.statistics.total_play_time,
            },
            settings: dto.settings,
        };
        profile.normalize();
        profile
    }
}

impl From<&GameProfile> for PlayerStateDto {
    fn from(p: &GameProfile) -> Self {
        Self {
            player_id: p.player_id.clone(),
            current_level: p.current_level_id.clone(),
            unlocked_levels: p.unlocked_level_ids.iter().cloned().collect(),
            completed_levels: p.completed_level_ids.iter().cloned().collect(),
            selected_hand_skin: p.selected_hand_skin_id.clone(),
            unlocked_hand_skins: p.unlocked_hand_skin_ids.iter().cloned().collect(),
            level_progress: p
                .level_progress
                .values()
                .map(|lp| LevelProgressDto {
                    level_id: lp.level_id.clone(),
                    completed: lp.completed,
                    best_time: lp.best_time_ms,
                    attempts: lp.attempts,
                })
                .collect(),
            unlocked_achievements: p.unlocked_achievement_ids.iter().cloned().collect(),
            statistics: StatisticsDto {
                total_grabs: p.statistics.total_grabs,
                total_releases: p.statistics.total_releases,
                total_teleports: p.statistics.total_teleports,
                fastest_time: p.statistics.fastest_time_ms,
                levels_completed: p.statistics.levels_completed,
                total_play_time: p.statistics.total_play_time_secs,
            },
            settings: p.settings.clone(),
        }
    }
}

// === Requests ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteLevelRequest {
    pub level_id: String,
    /// ms
    pub completion_time: u64,
    pub grabs_count: u32,
    pub releases_count: u32,
    pub teleports_count: u32,
}

impl From<&LevelCompletion> for CompleteLevelRequest {
    fn from(c: &LevelCompletion) -> Self {
        Self {
            level_id: c.level_id.clone(),
            completion_time: c.completion_time_ms,
            grabs_count: c.grabs,
            releases_count: c.releases,
            teleports_count: c.teleports,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectHandSkinRequest {
    pub hand_skin_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub level_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: String,
}

/// Play-time deltas; `play_time` in seconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatsRequest {
    pub grabs: u32,
    pub releases: u32,
    pub teleports: u32,
    pub play_time: u64,
}

/// `GET /api/` body (not enveloped)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDto {
    pub message: String,
    #[serde(default)]
    pub version: String,
}
