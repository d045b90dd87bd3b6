//! Cosmetic and achievement unlocks

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A selectable hand appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandSkin {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub texture: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    /// Unlocked from the start when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_requirement: Option<String>,
}

fn default_roughness() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub unlock_condition: String,
}

/// Parsed form of `unlock_requirement` / `unlock_condition`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockCondition {
    /// `complete_level_N`
    CompleteLevel(String),
    /// `complete_all_levels`
    CompleteAllLevels,
    /// `teleports_N`: lifetime teleports at least N
    Teleports(u64),
    /// `fast_completion_Ns`: the triggering completion took under N seconds
    FastCompletion { under_ms: u64 },
    /// Never met
    Unknown(String),
}

/// What a condition is checked against
#[derive(Debug, Clone, Copy)]
pub struct UnlockContext<'a> {
    pub completed_level_ids: &'a BTreeSet<String>,
    pub catalog_level_ids: &'a [String],
    pub total_teleports: u64,
    /// Only set while evaluating right after a completion
    pub completion_time_ms: Option<u64>,
}

impl UnlockCondition {
    pub fn parse(raw: &str) -> Self {
        if raw == "complete_all_levels" {
            return UnlockCondition::CompleteAllLevels;
        }
        if let Some(n) = raw.strip_prefix("complete_level_")
            && !n.is_empty()
            && n.chars().all(|c| c.is_ascii_digit())
        {
            return UnlockCondition::CompleteLevel(format!("level{}", n));
        }
        if let Some(n) = raw.strip_prefix("teleports_")
            && let Ok(n) = n.parse()
        {
            return UnlockCondition::Teleports(n);
        }
        if let Some(secs) = raw
            .strip_prefix("fast_completion_")
            .and_then(|s| s.strip_suffix('s'))
            && let Ok(secs) = secs.parse::<u64>()
            && let Some(under_ms) = secs.checked_mul(1000)
        {
            return UnlockCondition::FastCompletion { under_ms };
        }
        UnlockCondition::Unknown(raw.to_string())
    }

    pub fn is_met(&self, ctx: &UnlockContext<'_>) -> bool {
        match self {
            UnlockCondition::CompleteLevel(level_id) => ctx.completed_level_ids.contains(level_id),
            UnlockCondition::CompleteAllLevels => {
                !ctx.catalog_level_ids.is_empty()
                    && ctx
                        .catalog_level_ids
                        .iter()
                        .all(|id| ctx.completed_level_ids.contains(id))
            }
            UnlockCondition::Teleports(n) => ctx.total_teleports >= *n,
            UnlockCondition::FastCompletion { under_ms } => {
                ctx.completion_time_ms.is_some_and(|t| t < *under_ms)
            }
            UnlockCondition::Unknown(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(completed: &'a BTreeSet<String>, catalog: &'a [String]) -> UnlockContext<'a> {
        UnlockContext {
            completed_level_ids: completed,
            catalog_level_ids: catalog,
            total_teleports: 0,
            completion_time_ms: None,
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            UnlockCondition::parse("complete_level_2"),
            UnlockCondition::CompleteLevel("level2".to_string())
        );
        assert_eq!(UnlockCondition::parse("complete_all_levels"), UnlockCondition::CompleteAllLevels);
        assert_eq!(UnlockCondition::parse("teleports_10"), UnlockCondition::Teleports(10));
        assert_eq!(
            UnlockCondition::parse("fast_completion_30s"),
            UnlockCondition::FastCompletion { under_ms: 30_000 }
        );
        assert!(matches!(UnlockCondition::parse("complete_level_"), UnlockCondition::Unknown(_)));
        assert!(matches!(UnlockCondition::parse("be_nice"), UnlockCondition::Unknown(_)));
    }

    #[test]
    fn test_huge_fast_completion_is_unknown() {
        assert!(matches!(
            UnlockCondition::parse("fast_completion_99999999999999999s"),
            UnlockCondition::Unknown(_)
        ));
        assert_eq!(
            UnlockCondition::parse("fast_completion_18446744073709551s"),
            UnlockCondition::FastCompletion {
                under_ms: 18_446_744_073_709_551_000
            }
        );
    }

    #[test]
    fn test_all_levels_needs_every_catalog_level() {
        let catalog = vec!["level1".to_string(), "level2".to_string()];
        let mut done = BTreeSet::from(["level1".to_string()]);
        assert!(!UnlockCondition::CompleteAllLevels.is_met(&ctx(&done, &catalog)));
        done.insert("level2".to_string());
        assert!(UnlockCondition::CompleteAllLevels.is_met(&ctx(&done, &catalog)));
        // Empty catalog never counts as "all done"
        assert!(!UnlockCondition::CompleteAllLevels.is_met(&ctx(&done, &[])));
    }

    #[test]
    fn test_fast_completion_is_strict() {
        let done = BTreeSet::new();
        let cond = UnlockCondition::parse("fast_completion_30s");
        let mut c = ctx(&done, &[]);
        assert!(!cond.is_met(&c));
        c.completion_time_ms = Some(30_000);
        assert!(!cond.is_met(&c));
        c.completion_time_ms = Some(29_999);
        assert!(cond.is_met(&c));
    }

    #[test]
    fn test_teleport_threshold() {
        let done = BTreeSet::new();
        let mut c = ctx(&done, &[]);
        c.total_teleports = 9;
        assert!(!UnlockCondition::Teleports(10).is_met(&c));
        c.total_teleports = 10;
        assert!(UnlockCondition::Teleports(10).is_met(&c));
    }

    #[test]
    fn test_skin_wire_defaults() {
        let skin: HandSkin =
            serde_json::from_str(r#"{"id":"default","name":"Human"}"#).unwrap();
        assert_eq!(skin.roughness, 0.5);
        assert!(skin.unlock_requirement.is_none());
    }
}
