use log::info;

use crate::{
    ColorGroup, CommandError, Configuration, FcNameColor, GuildId, PlayerKey, RosterClient,
    Settings, DEFAULT_GROUP, OTHER_GROUP,
};

/// Commands that only change the cached document. Each one publishes a new snapshot,
/// clears the skip-cache, and saves.
impl<C> FcNameColor<C>
where
    C: RosterClient,
{
    /// Assigns a guild already known to the active character to another group.
    pub async fn assign_group(&self, guild_id: &GuildId, group: &str) -> Result<(), CommandError> {
        let player = self.active_player()?;

        self.change(|d| {
            if d.group(group).is_none() {
                return Err(CommandError::UnknownGroup(group.to_string()));
            }

            let is_known = d.own_guild_id(&player) == Some(guild_id)
                || d.tracked_guilds.contains(guild_id);

            if !is_known {
                return Err(CommandError::GuildNotFound(guild_id.clone()));
            }

            d.assign(&player, guild_id, group);
            Ok(())
        })
        .await
    }

    /// Stops tracking a guild and forgets its roster, unless it's someone's own guild.
    pub async fn remove_guild(&self, guild_id: &GuildId) -> Result<(), CommandError> {
        self.change(|d| {
            if !d.tracked_guilds.contains(guild_id) {
                return Err(CommandError::GuildNotFound(guild_id.clone()));
            }

            d.untrack_guild(guild_id);
            Ok(())
        })
        .await?;

        info!("Stopped tracking {}", guild_id);
        Ok(())
    }

    /// Creates a group or changes the colors of an existing one.
    pub async fn upsert_group(&self, group: ColorGroup) -> Result<(), CommandError> {
        self.change(|d| {
            d.upsert_group(group);
            Ok(())
        })
        .await
    }

    /// Deletes a user-defined group. Guilds assigned to it fall back to a built-in group.
    pub async fn delete_group(&self, name: &str) -> Result<(), CommandError> {
        if ColorGroup::is_builtin(name) {
            return Err(CommandError::ReservedGroup(name.to_string()));
        }

        self.change(|d| {
            if d.group(name).is_none() {
                return Err(CommandError::UnknownGroup(name.to_string()));
            }

            d.color_groups.retain(|g| g.name != name);
            reassign_deleted_group(d, name);

            Ok(())
        })
        .await
    }

    /// Never style this player's nameplate. Returns false if they were ignored already.
    pub async fn ignore_player(&self, name: &str) -> Result<bool, CommandError> {
        self.change(|d| Ok(d.ignored_players.insert(name.to_string())))
            .await
    }

    pub async fn unignore_player(&self, name: &str) -> Result<bool, CommandError> {
        self.change(|d| Ok(d.ignored_players.remove(name))).await
    }

    pub async fn update_settings<F>(&self, update: F) -> Result<(), CommandError>
    where
        F: FnOnce(&mut Settings),
    {
        self.change(|d| {
            update(&mut d.settings);
            Ok(())
        })
        .await
    }

    fn active_player(&self) -> Result<PlayerKey, CommandError> {
        self.context()
            .session
            .identity()
            .map(|i| i.key())
            .ok_or(CommandError::NoSession)
    }

    async fn change<F, R>(&self, change: F) -> Result<R, CommandError>
    where
        F: FnOnce(&mut Configuration) -> Result<R, CommandError>,
    {
        let context = self.context();
        let result = context.store.update(change)?;

        context.skip_cache.clear();
        context.store.persist().await?;

        Ok(result)
    }
}

fn reassign_deleted_group(document: &mut Configuration, deleted: &str) {
    let own_guilds = document.player_guilds.clone();

    for (player, assignments) in document.group_assignments.iter_mut() {
        for (guild_id, group) in assignments.iter_mut() {
            if group != deleted {
                continue;
            }

            *group = match own_guilds.get(player) {
                Some(own) if own == guild_id => DEFAULT_GROUP.to_string(),
                _ => OTHER_GROUP.to_string(),
            };
        }
    }
}
