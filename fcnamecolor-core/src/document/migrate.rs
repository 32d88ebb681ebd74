use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    CharacterId, ColorGroup, GuildId, GuildRecord, MemberRecord, Rgba, DEFAULT_GROUP, OTHER_GROUP,
};

use super::{Configuration, CURRENT_VERSION};

/// Fields of the single-guild layouts (versions 0 and 1).
/// They are only ever read, and emptied once migrated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegacyFields {
    #[serde(alias = "UiColor", skip_serializing_if = "Option::is_none")]
    pub ui_color: Option<u16>,
    #[serde(alias = "Color", skip_serializing_if = "Option::is_none")]
    pub color: Option<LegacyColor>,
    /// Version 0 and 1: the own free company, keyed by character id
    #[serde(
        rename = "playerFCs",
        alias = "PlayerFCs",
        skip_serializing_if = "Option::is_none"
    )]
    pub player_fcs: Option<HashMap<CharacterId, LegacyGuild>>,
    /// Version 1: a flat list of extra free companies, all drawn with one color
    #[serde(
        rename = "trackedFCs",
        alias = "TrackedFCs",
        skip_serializing_if = "Option::is_none"
    )]
    pub tracked_fcs: Option<Vec<LegacyGuild>>,
    #[serde(alias = "OtherUiColor", skip_serializing_if = "Option::is_none")]
    pub other_ui_color: Option<u16>,
}

/// A normalized color, either as `[r, g, b, a]` or as a vector with `X`, `Y`, `Z`, `W` channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyColor {
    Channels([f32; 4]),
    Vector {
        #[serde(rename = "X")]
        x: f32,
        #[serde(rename = "Y")]
        y: f32,
        #[serde(rename = "Z")]
        z: f32,
        #[serde(rename = "W")]
        w: f32,
    },
}

impl From<LegacyColor> for Rgba {
    fn from(color: LegacyColor) -> Self {
        match color {
            LegacyColor::Channels(channels) => Rgba::from_floats(channels),
            LegacyColor::Vector { x, y, z, w } => Rgba::from_floats([x, y, z, w]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegacyGuild {
    #[serde(alias = "ID")]
    pub id: GuildId,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "World")]
    pub world: Option<String>,
    #[serde(alias = "Members")]
    pub members: Vec<LegacyMember>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyMember {
    #[serde(alias = "ID")]
    pub id: CharacterId,
    #[serde(alias = "Name")]
    pub name: String,
}

impl LegacyGuild {
    fn into_record(self, fallback_world: &str) -> GuildRecord {
        GuildRecord {
            world: self.world.unwrap_or_else(|| fallback_world.to_string()),
            // Without a timestamp the roster is treated as stale and refreshed
            last_updated: self.last_updated.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            members: self
                .members
                .into_iter()
                .map(|m| MemberRecord {
                    id: m.id,
                    name: m.name,
                })
                .collect(),
            id: self.id,
            name: self.name,
        }
    }
}

impl Configuration {
    /// Brings an older document up to [CURRENT_VERSION].
    /// Returns true if anything changed and the document should be saved.
    pub fn migrate(&mut self) -> bool {
        let mut changed = false;

        if self.version < CURRENT_VERSION {
            info!(
                "Migrating configuration from version {} to {}",
                self.version, CURRENT_VERSION
            );

            self.migrate_groups();
            self.migrate_own_guilds();
            self.migrate_tracked_guilds();

            self.legacy = Default::default();
            self.version = CURRENT_VERSION;
            changed = true;
        }

        let group_count = self.color_groups.len();
        self.ensure_builtin_groups();

        changed || group_count != self.color_groups.len()
    }

    fn migrate_groups(&mut self) {
        let mut default_group = ColorGroup::builtin_default();
        let mut other_group = ColorGroup::builtin_other();

        if let Some(ui_color) = self.legacy.ui_color {
            default_group.ui_color = ui_color;
        }

        if let Some(color) = self.legacy.color {
            default_group.rgba = color.into();
            other_group.rgba = default_group.rgba;
        }

        if let Some(ui_color) = self.legacy.other_ui_color {
            other_group.ui_color = ui_color;
        }

        let legacy = &self.legacy;
        let has_default_colors = legacy.ui_color.is_some() || legacy.color.is_some();
        let has_other_colors = legacy.other_ui_color.is_some() || legacy.color.is_some();

        // Older layouts never stored groups, so the legacy colors win over the defaults
        if has_default_colors {
            self.upsert_group(default_group);
        }

        if has_other_colors {
            self.upsert_group(other_group);
        }
    }

    /// Old own-guild entries were keyed by character id, so they are linked back
    /// to every character key that resolved to that id.
    fn migrate_own_guilds(&mut self) {
        let Some(player_fcs) = self.legacy.player_fcs.take() else {
            return;
        };

        for (character_id, legacy) in player_fcs {
            let players: Vec<_> = self
                .player_ids
                .iter()
                .filter(|(_, id)| **id == character_id)
                .map(|(key, _)| key.clone())
                .collect();

            let fallback_world = players
                .first()
                .and_then(|key| key.as_str().rsplit_once('@'))
                .map(|(_, world)| world.to_string())
                .unwrap_or_default();

            let record = legacy.into_record(&fallback_world);

            for player in players {
                self.player_guilds.insert(player.clone(), record.id.clone());
                self.assign(&player, &record.id, DEFAULT_GROUP);
            }

            self.guilds.insert(record.id.clone(), record);
        }
    }

    /// Previously tracked guilds all shared one color, which is now the "Other FC" group.
    fn migrate_tracked_guilds(&mut self) {
        let Some(tracked) = self.legacy.tracked_fcs.take() else {
            return;
        };

        let players: Vec<_> = self.player_ids.keys().cloned().collect();

        for legacy in tracked {
            let record = legacy.into_record("");

            self.track_guild(&record.id);
            for player in &players {
                let is_own = self.player_guilds.get(player) == Some(&record.id);

                if !is_own {
                    self.assign(player, &record.id, OTHER_GROUP);
                }
            }

            self.guilds.insert(record.id.clone(), record);
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{Configuration, PlayerIdentity, CURRENT_VERSION, DEFAULT_GROUP, OTHER_GROUP};

    const VERSION_ZERO: &str = r#"{
        "enabled": true,
        "uiColor": 17,
        "color": [1.0, 0.0, 0.0, 1.0],
        "playerIds": { "Aria@Gaia": "4410" },
        "playerFCs": {
            "4410": {
                "ID": "9231",
                "Name": "Brass Blades",
                "Members": [
                    { "ID": "4410", "Name": "Aria" },
                    { "ID": "4411", "Name": "Bryn" }
                ]
            }
        }
    }"#;

    const VERSION_ONE: &str = r#"{
        "version": 1,
        "playerIds": { "Aria@Gaia": "4410" },
        "otherUiColor": 22,
        "trackedFCs": [
            { "id": "7000", "name": "Iron Owls", "world": "Ixion", "members": [] }
        ]
    }"#;

    const PASCAL_CASE_LAYOUT: &str = r#"{
        "Version": 0,
        "Enabled": true,
        "IncludeSelf": false,
        "OnlyColorFCTag": true,
        "Glow": false,
        "UiColor": 17,
        "Color": { "X": 1.0, "Y": 0.0, "Z": 0.0, "W": 1.0 },
        "PlayerIDs": { "Aria@Gaia": "4410" },
        "PlayerFCs": {
            "4410": {
                "ID": "9231",
                "Name": "Brass Blades",
                "Members": [
                    { "ID": "4410", "Name": "Aria" },
                    { "ID": "4411", "Name": "Bryn" }
                ]
            }
        },
        "IgnoredPlayers": { "Cato": "Cato" }
    }"#;

    #[test]
    fn pascal_case_layout_keeps_cached_data() {
        let mut document: Configuration = serde_json::from_str(PASCAL_CASE_LAYOUT).unwrap();
        let aria = PlayerIdentity::new("Aria", "Gaia").key();

        assert!(document.migrate());

        assert_eq!(document.player_ids[&aria], "4410");
        assert_eq!(document.player_guilds.get(&aria).map(String::as_str), Some("9231"));
        assert_eq!(document.guilds["9231"].members.len(), 2);
        assert_eq!(document.group_assignments[&aria]["9231"], DEFAULT_GROUP);

        assert!(!document.settings.include_self);
        assert!(document.settings.only_color_fc_tag);
        assert!(!document.settings.glow);
        assert!(document.ignored_players.contains("Cato"));

        let default_group = document.group(DEFAULT_GROUP).unwrap();
        assert_eq!(default_group.ui_color, 17);
        assert_eq!(default_group.rgba.r, 255);
        assert_eq!(default_group.rgba.g, 0);
    }

    #[test]
    fn migrated_document_reads_back_in_current_layout() {
        let mut document: Configuration = serde_json::from_str(PASCAL_CASE_LAYOUT).unwrap();
        document.migrate();

        let json = serde_json::to_string(&document).unwrap();
        let mut restored: Configuration = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, document);
        assert!(!restored.migrate());
    }

    #[test]
    fn version_zero_moves_own_guild_to_default_group() {
        let mut document: Configuration = serde_json::from_str(VERSION_ZERO).unwrap();
        let aria = PlayerIdentity::new("Aria", "Gaia").key();

        assert_eq!(document.version, 0);
        assert!(document.migrate());

        assert_eq!(document.version, CURRENT_VERSION);
        assert_eq!(document.player_guilds[&aria], "9231");
        assert_eq!(document.group_assignments[&aria]["9231"], DEFAULT_GROUP);

        let record = &document.guilds["9231"];
        assert_eq!(record.world, "Gaia");
        assert_eq!(record.members.len(), 2);
        assert_eq!(record.members[1].name, "Bryn");

        let default_group = document.group(DEFAULT_GROUP).unwrap();
        assert_eq!(default_group.ui_color, 17);
        assert_eq!(default_group.rgba.r, 255);
        assert!(document.legacy.player_fcs.is_none());
    }

    #[test]
    fn version_one_moves_tracked_guilds_to_other_group() {
        let mut document: Configuration = serde_json::from_str(VERSION_ONE).unwrap();
        let aria = PlayerIdentity::new("Aria", "Gaia").key();

        assert!(document.migrate());

        assert_eq!(document.tracked_guilds, vec!["7000".to_string()]);
        assert_eq!(document.group_assignments[&aria]["7000"], OTHER_GROUP);
        assert_eq!(document.guilds["7000"].world, "Ixion");
        assert_eq!(document.group(OTHER_GROUP).unwrap().ui_color, 22);
    }

    #[test]
    fn current_documents_are_left_alone() {
        let mut document = Configuration::default();

        assert!(!document.migrate());
    }
}
