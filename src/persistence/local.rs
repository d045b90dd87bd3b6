//! Local profile snapshot
//!
//! The profile is mirrored into LocalStorage after every durable change so a
//! reload (or a dead backend) does not lose progress. Native builds keep
//! nothing.

use serde::{Deserialize, Serialize};

use crate::profile::GameProfile;

const STORAGE_KEY: &str = "hand_of_gravity_profile";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    profile: GameProfile,
}

pub fn encode(profile: &GameProfile) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Snapshot {
        version: SNAPSHOT_VERSION,
        profile: profile.clone(),
    })
}

/// `None` for unreadable or foreign-version snapshots
pub fn decode(json: &str) -> Option<GameProfile> {
    let snapshot: Snapshot = match serde_json::from_str(json) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Discarding unreadable profile snapshot: {}", e);
            return None;
        }
    };
    if snapshot.version != SNAPSHOT_VERSION {
        log::warn!("Discarding profile snapshot version {}", snapshot.version);
        return None;
    }
    let mut profile = snapshot.profile;
    profile.normalize();
    Some(profile)
}

/// Load the saved profile from LocalStorage (WASM only)
#[cfg(target_arch = "wasm32")]
pub fn load_profile() -> Option<GameProfile> {
    let storage = web_sys::window()
        .and_then(|w| w.local_storage().ok())
        .flatten()?;
    let json = storage.get_item(STORAGE_KEY).ok().flatten()?;
    let profile = decode(&json)?;
    log::info!("Loaded profile from LocalStorage");
    Some(profile)
}

/// Save the profile to LocalStorage (WASM only)
#[cfg(target_arch = "wasm32")]
pub fn save_profile(profile: &GameProfile) {
    let Some(storage) = web_sys::window()
        .and_then(|w| w.local_storage().ok())
        .flatten()
    else {
        return;
    };
    match encode(profile) {
        Ok(json) => {
            if storage.set_item(STORAGE_KEY, &json).is_err() {
                log::warn!("LocalStorage rejected profile snapshot");
            }
        }
        Err(e) => log::warn!("Profile snapshot failed: {}", e),
    }
}

/// Native stubs
#[cfg(not(target_arch = "wasm32"))]
pub fn load_profile() -> Option<GameProfile> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
pub fn save_profile(_profile: &GameProfile) {
    log::trace!("Profile snapshot skipped ({} not available natively)", STORAGE_KEY);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trip_keeps_progress() {
        let mut profile = GameProfile::default();
        profile.completed_level_ids.insert("level1".to_string());
        profile.unlocked_level_ids.insert("level2".to_string());

        let restored = decode(&encode(&profile).unwrap()).unwrap();
        assert!(restored.is_level_completed("level1"));
        assert!(restored.is_level_unlocked("level2"));
        assert_eq!(restored.statistics.levels_completed, 1);
    }

    #[test]
    fn test_bad_snapshots_are_ignored() {
        assert!(decode("not json").is_none());
        let json = encode(&GameProfile::default())
            .unwrap()
            .replace("\"version\":1", "\"version\":99");
        assert!(decode(&json).is_none());
    }
}
