//! Database entities.

#![allow(missing_docs)]

pub mod giveaway;
pub mod giveaway_claim;
pub mod giveaway_entry;
pub mod giveaway_log;
pub mod giveaway_winner;

pub use giveaway::Entity as Giveaway;
pub use giveaway_claim::Entity as GiveawayClaim;
pub use giveaway_entry::Entity as GiveawayEntry;
pub use giveaway_log::Entity as GiveawayLog;
pub use giveaway_winner::Entity as GiveawayWinner;
