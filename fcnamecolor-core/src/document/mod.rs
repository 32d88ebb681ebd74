use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

use crate::{CharacterId, ColorGroup, GuildId, GuildRecord, PlayerKey};

mod migrate;
pub use migrate::*;

/// The version written by this build. Older documents are migrated on load.
pub const CURRENT_VERSION: u32 = 2;

/// User-facing toggles that steer the nameplate classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(alias = "Enabled")]
    pub enabled: bool,
    #[serde(alias = "IncludeSelf")]
    pub include_self: bool,
    #[serde(alias = "IncludeDuties")]
    pub include_duties: bool,
    #[serde(alias = "OnlyColorFCTag")]
    pub only_color_fc_tag: bool,
    #[serde(alias = "OnlyDuties")]
    pub only_duties: bool,
    #[serde(alias = "IgnoreFriends")]
    pub ignore_friends: bool,
    #[serde(alias = "Glow")]
    pub glow: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            include_self: true,
            include_duties: true,
            only_color_fc_tag: false,
            only_duties: false,
            ignore_friends: false,
            glow: true,
        }
    }
}

/// The persisted cache document.
///
/// Every field has a default, so new fields can be added without breaking older files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default = "legacy_version", alias = "Version")]
    pub version: u32,
    #[serde(flatten)]
    pub settings: Settings,
    #[serde(alias = "IgnoredPlayers", deserialize_with = "ignored_players")]
    pub ignored_players: BTreeSet<String>,

    /// Character ids, resolved once per character and kept forever
    #[serde(alias = "PlayerIDs")]
    pub player_ids: HashMap<PlayerKey, CharacterId>,
    /// The own free company of each character, if any
    pub player_guilds: HashMap<PlayerKey, GuildId>,
    pub guilds: HashMap<GuildId, GuildRecord>,
    /// Additionally tracked free companies, in the order they were added
    pub tracked_guilds: Vec<GuildId>,
    /// Per character, which color group each guild is drawn with
    pub group_assignments: HashMap<PlayerKey, BTreeMap<GuildId, String>>,
    pub color_groups: Vec<ColorGroup>,

    #[serde(flatten)]
    pub legacy: LegacyFields,
}

fn legacy_version() -> u32 {
    0
}

/// Older documents stored the ignore list as a name to name dictionary
fn ignored_players<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IgnoreList {
        Names(BTreeSet<String>),
        Dictionary(BTreeMap<String, IgnoredAny>),
    }

    Ok(match IgnoreList::deserialize(deserializer)? {
        IgnoreList::Names(names) => names,
        IgnoreList::Dictionary(names) => names.into_keys().collect(),
    })
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            settings: Default::default(),
            ignored_players: Default::default(),
            player_ids: Default::default(),
            player_guilds: Default::default(),
            guilds: Default::default(),
            tracked_guilds: Default::default(),
            group_assignments: Default::default(),
            color_groups: vec![ColorGroup::builtin_default(), ColorGroup::builtin_other()],
            legacy: Default::default(),
        }
    }
}

impl Configuration {
    /// Recreates the built-in groups if they are missing
    pub fn ensure_builtin_groups(&mut self) {
        for builtin in [ColorGroup::builtin_default(), ColorGroup::builtin_other()] {
            if self.group(&builtin.name).is_none() {
                self.color_groups.push(builtin);
            }
        }
    }

    pub fn group(&self, name: &str) -> Option<&ColorGroup> {
        self.color_groups.iter().find(|g| g.name == name)
    }

    /// Inserts or replaces a group by name
    pub fn upsert_group(&mut self, group: ColorGroup) {
        match self.color_groups.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => *existing = group,
            None => self.color_groups.push(group),
        }
    }

    pub fn own_guild_id(&self, player: &PlayerKey) -> Option<&GuildId> {
        self.player_guilds.get(player)
    }

    /// Adds a guild to the tracked list, keeping insertion order
    pub fn track_guild(&mut self, guild_id: &GuildId) {
        if !self.tracked_guilds.contains(guild_id) {
            self.tracked_guilds.push(guild_id.clone());
        }
    }

    /// Removes a tracked guild along with every assignment referring to it.
    ///
    /// The roster is kept if the guild is still some character's own free company.
    pub fn untrack_guild(&mut self, guild_id: &GuildId) {
        self.tracked_guilds.retain(|id| id != guild_id);

        let is_own_somewhere = self.player_guilds.values().any(|id| id == guild_id);

        for (player, assignments) in self.group_assignments.iter_mut() {
            if self.player_guilds.get(player) != Some(guild_id) {
                assignments.remove(guild_id);
            }
        }

        if !is_own_somewhere {
            self.guilds.remove(guild_id);
        }
    }

    pub fn assign(&mut self, player: &PlayerKey, guild_id: &GuildId, group: &str) {
        self.group_assignments
            .entry(player.clone())
            .or_default()
            .insert(guild_id.clone(), group.to_string());
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{MemberRecord, PlayerIdentity, DEFAULT_GROUP, OTHER_GROUP};

    #[test]
    fn default_document_has_builtin_groups() {
        let document = Configuration::default();

        assert_eq!(document.version, CURRENT_VERSION);
        assert!(document.group(DEFAULT_GROUP).is_some());
        assert!(document.group(OTHER_GROUP).is_some());
    }

    #[test]
    fn missing_builtin_groups_are_recreated() {
        let mut document = Configuration {
            color_groups: vec![],
            ..Default::default()
        };

        document.ensure_builtin_groups();

        assert_eq!(document.color_groups.len(), 2);
    }

    #[test]
    fn guild_record_survives_a_round_trip() {
        let key = PlayerIdentity::new("Aria", "Gaia").key();
        let record = GuildRecord {
            id: "9231".into(),
            name: "Brass Blades".into(),
            world: "Gaia".into(),
            last_updated: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap(),
            members: ["Aria", "Bryn", "Cato"]
                .iter()
                .enumerate()
                .map(|(i, name)| MemberRecord {
                    id: i.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        };

        let mut document = Configuration::default();
        document.player_guilds.insert(key, record.id.clone());
        document.guilds.insert(record.id.clone(), record.clone());

        let json = serde_json::to_string(&document).unwrap();
        let restored: Configuration = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.guilds["9231"], record);
        assert_eq!(restored, document);
    }

    #[test]
    fn unknown_fields_default() {
        let restored: Configuration =
            serde_json::from_str(r#"{ "version": 2, "glow": false }"#).unwrap();

        assert!(!restored.settings.glow);
        assert!(restored.settings.enabled);
        assert!(restored.guilds.is_empty());
    }

    #[test]
    fn untracking_drops_assignments_but_keeps_own_guilds() {
        let aria = PlayerIdentity::new("Aria", "Gaia").key();
        let mut document = Configuration::default();

        document.player_guilds.insert(aria.clone(), "own".into());
        document.guilds.insert(
            "own".into(),
            GuildRecord::placeholder("own".into(), "Own".into(), "Gaia".into()),
        );
        document.guilds.insert(
            "other".into(),
            GuildRecord::placeholder("other".into(), "Other".into(), "Gaia".into()),
        );
        document.track_guild(&"other".to_string());
        document.assign(&aria, &"other".to_string(), OTHER_GROUP);
        document.assign(&aria, &"own".to_string(), DEFAULT_GROUP);

        document.untrack_guild(&"other".to_string());
        document.untrack_guild(&"own".to_string());

        assert!(document.tracked_guilds.is_empty());
        assert!(!document.guilds.contains_key("other"));
        assert!(document.guilds.contains_key("own"));
        assert_eq!(document.group_assignments[&aria].len(), 1);
    }
}
