use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    ColorGroup, Configuration, GuildId, GuildRecord, PlayerKey, Settings, DEFAULT_GROUP,
    OTHER_GROUP,
};

/// A guild roster with a name index for constant time lookups.
#[derive(Debug)]
struct IndexedGuild {
    id: GuildId,
    name: String,
    world: String,
    member_names: HashSet<String>,
}

impl From<&GuildRecord> for IndexedGuild {
    fn from(record: &GuildRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            world: record.world.clone(),
            member_names: record.members.iter().map(|m| m.name.clone()).collect(),
        }
    }
}

/// Which guild a player was matched to, and how they should be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub guild_id: GuildId,
    pub guild_name: String,
    /// True if the player is in the local player's own free company
    pub own_guild: bool,
    pub group: ColorGroup,
}

/// An immutable view of everything the classifier needs for the active character.
///
/// Snapshots are rebuilt and swapped as a whole, a reader never observes a partially
/// updated roster.
#[derive(Debug)]
pub struct RosterSnapshot {
    revision: u64,
    player: Option<PlayerKey>,
    settings: Settings,
    ignored_players: HashSet<String>,
    own: Option<IndexedGuild>,
    tracked: Vec<IndexedGuild>,
    assignments: BTreeMap<GuildId, String>,
    groups: HashMap<String, ColorGroup>,
}

impl RosterSnapshot {
    pub fn build(document: &Configuration, player: Option<&PlayerKey>, revision: u64) -> Self {
        let own_id = player.and_then(|p| document.own_guild_id(p));

        let own = own_id
            .and_then(|id| document.guilds.get(id))
            .map(IndexedGuild::from);

        let tracked = document
            .tracked_guilds
            .iter()
            .filter(|id| Some(*id) != own_id)
            .filter_map(|id| document.guilds.get(id))
            .map(IndexedGuild::from)
            .collect();

        let assignments = player
            .and_then(|p| document.group_assignments.get(p))
            .cloned()
            .unwrap_or_default();

        let groups = document
            .color_groups
            .iter()
            .map(|g| (g.name.clone(), g.clone()))
            .collect();

        Self {
            revision,
            player: player.cloned(),
            settings: document.settings.clone(),
            ignored_players: document.ignored_players.iter().cloned().collect(),
            own,
            tracked,
            assignments,
            groups,
        }
    }

    /// A snapshot with no roster data, used before anyone logs in
    pub fn empty(document: &Configuration, revision: u64) -> Self {
        Self::build(document, None, revision)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn player(&self) -> Option<&PlayerKey> {
        self.player.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True once there is any roster to match against
    pub fn is_loaded(&self) -> bool {
        self.own.is_some() || !self.tracked.is_empty()
    }

    pub fn own_guild_id(&self) -> Option<&GuildId> {
        self.own.as_ref().map(|g| &g.id)
    }

    pub fn own_member_count(&self) -> usize {
        self.own.as_ref().map(|g| g.member_names.len()).unwrap_or_default()
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored_players.contains(name)
    }

    /// Finds the guild a player belongs to.
    ///
    /// The own guild is matched by name only. Tracked guilds must also match the
    /// player's home world, and the first one in tracking order wins.
    pub fn membership(&self, name: &str, world: &str) -> Option<Membership> {
        if let Some(own) = self.own.as_ref().filter(|g| g.member_names.contains(name)) {
            return Some(Membership {
                guild_id: own.id.clone(),
                guild_name: own.name.clone(),
                own_guild: true,
                group: self.resolve_group(&own.id, DEFAULT_GROUP),
            });
        }

        self.tracked
            .iter()
            .find(|g| g.world == world && g.member_names.contains(name))
            .map(|guild| Membership {
                guild_id: guild.id.clone(),
                guild_name: guild.name.clone(),
                own_guild: false,
                group: self.resolve_group(&guild.id, OTHER_GROUP),
            })
    }

    /// Returns the group assigned to a guild, or the fallback group if there is no assignment
    /// or the assigned group no longer exists.
    pub fn resolve_group(&self, guild_id: &GuildId, fallback: &str) -> ColorGroup {
        self.assignments
            .get(guild_id)
            .and_then(|name| self.groups.get(name))
            .or_else(|| self.groups.get(fallback))
            .cloned()
            .unwrap_or_else(|| match fallback {
                OTHER_GROUP => ColorGroup::builtin_other(),
                _ => ColorGroup::builtin_default(),
            })
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::RosterSnapshot;
    use crate::{
        ColorGroup, Configuration, GuildRecord, MemberRecord, PlayerIdentity, Rgba, DEFAULT_GROUP,
        OTHER_GROUP,
    };

    fn guild(id: &str, world: &str, members: &[&str]) -> GuildRecord {
        GuildRecord {
            id: id.into(),
            name: format!("Guild {id}"),
            world: world.into(),
            last_updated: Utc::now(),
            members: members
                .iter()
                .map(|name| MemberRecord {
                    id: format!("{id}-{name}"),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    fn document() -> Configuration {
        let aria = PlayerIdentity::new("Aria", "Gaia").key();
        let mut document = Configuration::default();

        for record in [
            guild("own", "Gaia", &["Aria", "Bryn"]),
            guild("a", "Ixion", &["Cato", "Dara"]),
            guild("b", "Gaia", &["Cato"]),
            guild("c", "Gaia", &["Cato", "Eda"]),
        ] {
            document.guilds.insert(record.id.clone(), record);
        }

        document.player_guilds.insert(aria.clone(), "own".into());
        for id in ["a", "b", "c"] {
            document.track_guild(&id.to_string());
        }

        document.upsert_group(ColorGroup::new("Friends", 12, Rgba::new(1, 2, 3, 255)));
        document.assign(&aria, &"b".to_string(), "Friends");
        document.assign(&aria, &"c".to_string(), "Deleted");
        document
    }

    #[test]
    fn own_guild_ignores_world() {
        let aria = PlayerIdentity::new("Aria", "Gaia").key();
        let snapshot = RosterSnapshot::build(&document(), Some(&aria), 1);

        let membership = snapshot.membership("Bryn", "Balmung").unwrap();

        assert!(membership.own_guild);
        assert_eq!(membership.group.name, DEFAULT_GROUP);
    }

    #[test]
    fn tracked_guilds_match_world_in_tracking_order() {
        let aria = PlayerIdentity::new("Aria", "Gaia").key();
        let snapshot = RosterSnapshot::build(&document(), Some(&aria), 1);

        let membership = snapshot.membership("Cato", "Gaia").unwrap();
        assert_eq!(membership.guild_id, "b");
        assert_eq!(membership.group.name, "Friends");

        let membership = snapshot.membership("Cato", "Ixion").unwrap();
        assert_eq!(membership.guild_id, "a");
        assert_eq!(membership.group.name, OTHER_GROUP);

        assert!(snapshot.membership("Dara", "Gaia").is_none());
    }

    #[test]
    fn names_match_exactly_and_case_sensitively() {
        let aria = PlayerIdentity::new("Aria", "Gaia").key();
        let snapshot = RosterSnapshot::build(&document(), Some(&aria), 1);

        assert!(snapshot.membership("Bryn", "Gaia").is_some());
        assert!(snapshot.membership("bryn", "Gaia").is_none());
        assert!(snapshot.membership("Bryn ", "Gaia").is_none());

        assert!(snapshot.membership("Eda", "Gaia").is_some());
        assert!(snapshot.membership("EDA", "Gaia").is_none());
        assert!(snapshot.membership("Ed", "Gaia").is_none());
    }

    #[test]
    fn deleted_group_falls_back() {
        let aria = PlayerIdentity::new("Aria", "Gaia").key();
        let snapshot = RosterSnapshot::build(&document(), Some(&aria), 1);

        let membership = snapshot.membership("Eda", "Gaia").unwrap();

        assert_eq!(membership.guild_id, "c");
        assert_eq!(membership.group.name, OTHER_GROUP);
    }

    #[test]
    fn snapshot_without_player_only_has_tracked_guilds() {
        let snapshot = RosterSnapshot::empty(&document(), 1);

        assert!(snapshot.own_guild_id().is_none());
        assert!(snapshot.membership("Bryn", "Gaia").is_none());
        assert_eq!(snapshot.tracked_count(), 3);
    }
}
