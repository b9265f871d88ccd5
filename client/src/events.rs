//! Applies inbound session events: received items, checked locations and
//! scout results.

use crate::messaging::{MessagingClient, SessionEvent};
use crate::session::Session;
use log::{debug, info, warn};
use shared::profile::{EffectKind, COMPLETE_INDEX};
use shared::NetworkItem;

impl<C: MessagingClient> Session<C> {
    pub(crate) fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ItemReceived { index, item } => {
                // Indices seen before are replays, from this run or an earlier one.
                let notify = self.state.mark_item_received(index);
                self.receive_item(item.item, notify);
            }
            SessionEvent::LocationsChecked(locations) => {
                for id in locations {
                    self.location_checked(id);
                }
            }
            SessionEvent::LocationInfo(items) => self.scouted(&items),
        }
    }

    /// Applies the state effect of an item and, when `notify` is set, grants it
    /// to the game or queues it until the player is in a level.
    pub fn receive_item(&mut self, item_id: i64, notify: bool) {
        let Some(item) = self.profile.item(item_id).cloned() else {
            warn!("Received unknown item {}", item_id);
            return;
        };

        let level_name = item
            .level
            .and_then(|level| self.profile.level_info(level))
            .map(|info| info.name.clone());
        let level = item.level.and_then(|level| self.state.level_mut(level));
        let mut caption = None;

        match self.profile.effect(item.doom_type) {
            EffectKind::Key(slot) => {
                if let Some(level) = level {
                    level.keys[slot] = true;
                    caption = level_name;
                }
            }
            EffectKind::MapReveal => {
                if let Some(level) = level {
                    level.has_map = true;
                    caption = level_name;
                }
            }
            EffectKind::LevelUnlock => {
                if let Some(level) = level {
                    level.unlocked = true;
                    caption = level_name;
                }
            }
            EffectKind::LevelComplete => {
                if let Some(level) = level {
                    level.completed = true;
                }
            }
            EffectKind::Backpack => {
                self.state.player.backpack = true;
                self.state.player.refresh_ammo_capacity(&self.profile.max_ammo);
            }
            EffectKind::Weapon(slot) => {
                if let Some(owned) = self.state.player.weapon_owned.get_mut(slot) {
                    *owned = true;
                }
            }
            EffectKind::Inventory => {}
        }

        if !notify {
            return;
        }
        if !self.in_game {
            debug!("Queueing {} until the player is in a level", item.name);
            self.state.pending_items.push_back(item_id);
            return;
        }

        info!("Giving {}", item.name);
        self.host.give_item(item.doom_type, item.level);
        if let Some(sprite) = self.profile.sprite(item.doom_type) {
            self.notifications.push(sprite, caption.unwrap_or_default());
        }
    }

    /// Records a location check confirmed by the server.
    pub fn location_checked(&mut self, location_id: i64) {
        let Some(location) = self.profile.resolve_location(location_id) else {
            warn!("Checked location {} is not part of {}", location_id, self.profile.game.name());
            return;
        };
        if location.index == COMPLETE_INDEX {
            return;
        }
        let Some(level) = self.state.level_mut(location.level) else {
            return;
        };
        if !level.is_checked(location.index) && !level.record_check(location.index) {
            warn!("{} already holds the maximum number of checks", location.level);
        }
    }

    fn scouted(&mut self, items: &[NetworkItem]) {
        let progressive = items.iter().filter(|item| item.is_progression());
        self.state
            .progressive_locations
            .extend(progressive.map(|item| item.location));
    }

    /// Grants every queued item. Each queued entry is granted at most once.
    pub(crate) fn drain_pending_items(&mut self) {
        let queued: Vec<i64> = self.state.pending_items.drain(..).collect();
        for item_id in queued {
            self.receive_item(item_id, true);
        }
    }
}
