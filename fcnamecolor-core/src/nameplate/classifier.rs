use std::sync::Arc;

use log::{debug, trace};
use thiserror::Error;

use crate::{Membership, RosterStore, SkipCache};

use super::{FrameState, NamePlateUpdate, ObjectId, ObjectTable, PlateKind};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Object {0} is not in the object table")]
    UnknownObject(ObjectId),
}

/// Why a nameplate was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NotLoaded,
    PvP,
    NotPlayer,
    /// Already known not to match anything
    Cached,
    Ignored,
    SelfInDuty,
    OutsideDuty,
    SelfExcluded,
    Dead,
    Friend,
    NotMember,
}

/// Which parts of a nameplate get styled, and with which group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Styling {
    pub membership: Membership,
    pub replace_name: bool,
    pub style_name: bool,
    pub style_title: bool,
    pub style_free_company: bool,
    pub glow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Skip(SkipReason),
    Style(Styling),
}

/// Decides, for every player nameplate, whether and how it is recolored.
///
/// Runs on the render thread. It only reads the published roster snapshot and the
/// skip-cache, and never waits on the fetch pipeline.
pub struct Classifier {
    store: Arc<RosterStore>,
    skip_cache: Arc<SkipCache>,
}

impl Classifier {
    pub fn new(store: &Arc<RosterStore>, skip_cache: &Arc<SkipCache>) -> Self {
        Self {
            store: store.clone(),
            skip_cache: skip_cache.clone(),
        }
    }

    /// Classifies a nameplate. The checks run in a fixed order and stop at the first match.
    pub fn classify(
        &self,
        update: &NamePlateUpdate,
        frame: &FrameState,
        objects: &dyn ObjectTable,
    ) -> Result<Verdict, ClassifyError> {
        // The ticket must be taken before the snapshot is read
        let ticket = self.skip_cache.ticket();
        let snapshot = self.store.snapshot();
        let settings = snapshot.settings();
        let object_id = update.object_id;

        if !settings.enabled {
            return Ok(Verdict::Skip(SkipReason::Disabled));
        }

        if !snapshot.is_loaded() {
            return Ok(Verdict::Skip(SkipReason::NotLoaded));
        }

        if frame.in_pvp {
            return Ok(Verdict::Skip(SkipReason::PvP));
        }

        if update.kind != PlateKind::Player || object_id == 0 {
            return Ok(Verdict::Skip(SkipReason::NotPlayer));
        }

        if self.skip_cache.contains(object_id) {
            return Ok(Verdict::Skip(SkipReason::Cached));
        }

        // Loading screens and zone changes have no local player for a few frames
        let Some(local_player) = frame.local_player.as_ref() else {
            return Ok(Verdict::Skip(SkipReason::NotLoaded));
        };

        let target = objects
            .player(object_id)
            .ok_or(ClassifyError::UnknownObject(object_id))?;

        if snapshot.is_ignored(&target.name) {
            return Ok(Verdict::Skip(SkipReason::Ignored));
        }

        let is_local_player = local_player.object_id == object_id;

        if is_local_player && frame.in_duty {
            return Ok(Verdict::Skip(SkipReason::SelfInDuty));
        }

        if settings.only_duties && !frame.in_duty {
            return Ok(Verdict::Skip(SkipReason::OutsideDuty));
        }

        if is_local_player && !settings.include_self {
            return Ok(Verdict::Skip(SkipReason::SelfExcluded));
        }

        // Colored names of dead players are hard to read
        if target.current_hp == 0 {
            return Ok(Verdict::Skip(SkipReason::Dead));
        }

        if settings.ignore_friends && target.is_friend {
            return Ok(Verdict::Skip(SkipReason::Friend));
        }

        let Some(membership) = snapshot.membership(&target.name, &target.world) else {
            self.skip_cache.add(object_id, ticket);
            return Ok(Verdict::Skip(SkipReason::NotMember));
        };

        // Party and alliance members are styled like everyone else
        let replace_name = !settings.only_color_fc_tag && !is_local_player;
        let style_name = (frame.in_duty && settings.include_duties) || replace_name;

        debug!(
            "Name: {}, replace_name: {}, in_duty: {}, only_color_fc_tag: {}, party: {}, alliance: {}, local: {}",
            target.name,
            replace_name,
            frame.in_duty,
            settings.only_color_fc_tag,
            target.is_party_member,
            target.is_alliance_member,
            is_local_player
        );

        Ok(Verdict::Style(Styling {
            membership,
            replace_name,
            style_name,
            style_title: style_name && update.title_visible,
            // Outside duties the tag is styled whether or not the name is
            style_free_company: !frame.in_duty,
            glow: settings.glow,
        }))
    }

    /// Classifies and styles a nameplate in place.
    /// Failures are logged and leave the nameplate untouched.
    pub fn process(
        &self,
        update: &mut NamePlateUpdate,
        frame: &FrameState,
        objects: &dyn ObjectTable,
    ) -> Option<Verdict> {
        match self.classify(update, frame, objects) {
            Ok(verdict) => {
                match &verdict {
                    Verdict::Style(styling) => {
                        apply(styling, update);

                        debug!(
                            "Overriding player nameplate for {} (ObjectID {})",
                            update.name.text_value(),
                            update.object_id
                        );
                    }
                    Verdict::Skip(reason) => {
                        trace!("Skipping nameplate {}: {:?}", update.object_id, reason)
                    }
                }

                Some(verdict)
            }
            // Objects routinely leave the table between the hook firing and the lookup
            Err(e) => {
                debug!("Leaving nameplate {} as is: {}", update.object_id, e);
                None
            }
        }
    }
}

/// Writes the styling into the nameplate
pub fn apply(styling: &Styling, update: &mut NamePlateUpdate) {
    let group = &styling.membership.group;
    let glow = if styling.glow { group.ui_color } else { 0 };

    if styling.style_name {
        update.name = update.name.styled(group.ui_color, glow);
        update.colour = Some(group.rgba);
    }

    if styling.style_title {
        update.title = update.title.styled(group.ui_color, glow);
    }

    if styling.style_free_company {
        update.free_company = update.free_company.styled(group.ui_color, glow);
    }
}
