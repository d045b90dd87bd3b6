//! Level, hand-skin and achievement catalog
//!
//! The built-in catalog ships inside the binary in the backend's wire format,
//! so the game is playable without a server. A catalog fetched from the
//! backend replaces it.

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;

use crate::level::{LevelDefinition, LevelError};
use crate::persistence::wire::LevelDto;
use crate::profile::unlocks::{Achievement, HandSkin};

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidLevel(#[from] LevelError),
    #[error("catalog defines level {0} more than once")]
    DuplicateLevel(String),
    #[error("catalog defines level order {0} more than once")]
    DuplicateOrder(u32),
    #[error("catalog has no levels")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CatalogDto {
    levels: Vec<LevelDto>,
    #[serde(default)]
    hand_skins: Vec<HandSkin>,
    #[serde(default)]
    achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    /// Sorted by `order`
    levels: Vec<LevelDefinition>,
    hand_skins: Vec<HandSkin>,
    achievements: Vec<Achievement>,
}

impl Catalog {
    /// Validate and sort. Every level must be playable.
    pub fn new(
        mut levels: Vec<LevelDefinition>,
        hand_skins: Vec<HandSkin>,
        achievements: Vec<Achievement>,
    ) -> Result<Self, CatalogError> {
        if levels.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut ids = BTreeSet::new();
        let mut orders = BTreeSet::new();
        for level in &levels {
            level.validate()?;
            if !ids.insert(level.id.as_str()) {
                return Err(CatalogError::DuplicateLevel(level.id.clone()));
            }
            if !orders.insert(level.order) {
                return Err(CatalogError::DuplicateOrder(level.order));
            }
        }
        levels.sort_by_key(|l| l.order);
        Ok(Self {
            levels,
            hand_skins,
            achievements,
        })
    }

    /// The catalog bundled with the game
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse a `{levels, hand_skins, achievements}` document in wire format
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let dto: CatalogDto = serde_json::from_str(json)?;
        Self::new(
            dto.levels.into_iter().map(Into::into).collect(),
            dto.hand_skins,
            dto.achievements,
        )
    }

    pub fn levels(&self) -> &[LevelDefinition] {
        &self.levels
    }

    pub fn level(&self, level_id: &str) -> Option<&LevelDefinition> {
        self.levels.iter().find(|l| l.id == level_id)
    }

    pub fn level_ids(&self) -> Vec<String> {
        self.levels.iter().map(|l| l.id.clone()).collect()
    }

    pub fn first_level(&self) -> Option<&LevelDefinition> {
        self.levels.first()
    }

    /// Level whose order directly follows `level_id`'s
    pub fn next_level(&self, level_id: &str) -> Option<&LevelDefinition> {
        let order = self.level(level_id)?.order;
        self.levels.iter().find(|l| l.order == order + 1)
    }

    pub fn hand_skins(&self) -> &[HandSkin] {
        &self.hand_skins
    }

    pub fn hand_skin(&self, skin_id: &str) -> Option<&HandSkin> {
        self.hand_skins.iter().find(|s| s.id == skin_id)
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn achievement(&self, achievement_id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == achievement_id)
    }

    /// Swap in levels fetched from the backend; keeps the old ones on error
    pub fn replace_levels(&mut self, levels: Vec<LevelDefinition>) -> Result<(), CatalogError> {
        let fresh = Self::new(levels, Vec::new(), Vec::new())?;
        self.levels = fresh.levels;
        Ok(())
    }

    pub fn replace_hand_skins(&mut self, hand_skins: Vec<HandSkin>) {
        self.hand_skins = hand_skins;
    }

    pub fn replace_achievements(&mut self, achievements: Vec<Achievement>) {
        self.achievements = achievements;
    }
}
