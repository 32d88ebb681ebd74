use std::{collections::HashMap, sync::Arc};

use fcnamecolor_core::{
    FcNameColor, FrameState, HandlerRegistry, LocalPlayer, NamePlateHost, NamePlateUpdate,
    ObjectId, ObjectTable, PlayerCharacter, PlayerIdentity, RosterClient,
};
use log::info;

const LOCAL_PLAYER: ObjectId = 1;

/// Stands in for the game's object table, with every player alive and on screen
struct ConsoleObjects(HashMap<ObjectId, PlayerCharacter>);

impl ConsoleObjects {
    fn new(local: &PlayerIdentity, players: &[PlayerIdentity]) -> Self {
        let characters = std::iter::once(local)
            .chain(players)
            .zip(LOCAL_PLAYER..)
            .map(|(identity, object_id)| {
                let character = PlayerCharacter {
                    object_id,
                    name: identity.name.clone(),
                    world: identity.world.clone(),
                    current_hp: 1,
                    is_friend: false,
                    is_party_member: false,
                    is_alliance_member: false,
                };

                (object_id, character)
            })
            .collect();

        Self(characters)
    }
}

impl ObjectTable for ConsoleObjects {
    fn player(&self, object_id: ObjectId) -> Option<PlayerCharacter> {
        self.0.get(&object_id).cloned()
    }
}

/// Runs each player's nameplate through the classifier, the same way the game hook would,
/// and prints the result.
pub fn run<C>(engine: &FcNameColor<C>, local: &PlayerIdentity, players: &[PlayerIdentity])
where
    C: RosterClient,
{
    let registry = Arc::new(HandlerRegistry::new());
    let host: Arc<dyn NamePlateHost> = registry.clone();
    let _guard = engine.attach(&host);

    let objects = ConsoleObjects::new(local, players);
    let frame = FrameState {
        local_player: Some(LocalPlayer {
            object_id: LOCAL_PLAYER,
            world: local.world.clone(),
        }),
        in_duty: false,
        in_pvp: false,
    };

    for (identity, object_id) in players.iter().zip(LOCAL_PLAYER + 1..) {
        let mut update = NamePlateUpdate::player(object_id, &identity.name, "«FC»");
        registry.dispatch(&mut update, &frame, &objects);

        match engine.lookup(&identity.name, &identity.world) {
            Some(membership) => info!(
                "{} is in {} ({}), group {}: {}",
                identity.key(),
                membership.guild_name,
                membership.guild_id,
                membership.group.name,
                hex(&update.name.encode())
            ),
            None => info!("{} is not in a known free company", identity.key()),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod test {
    use fcnamecolor_core::{ObjectTable, PlayerIdentity};

    use super::{hex, ConsoleObjects, LOCAL_PLAYER};

    #[test]
    fn local_player_comes_first() {
        let objects = ConsoleObjects::new(
            &PlayerIdentity::new("Aria", "Gaia"),
            &[PlayerIdentity::new("Bryn", "Gaia")],
        );

        assert_eq!(objects.player(LOCAL_PLAYER).unwrap().name, "Aria");
        assert_eq!(objects.player(LOCAL_PLAYER + 1).unwrap().name, "Bryn");
        assert!(objects.player(LOCAL_PLAYER + 2).is_none());
    }

    #[test]
    fn bytes_format_as_hex() {
        assert_eq!(hex(&[0x02, 0x48, 0x03]), "02 48 03");
    }
}
