//! Core giveaway engine for prizebot.
//!
//! [`GiveawayService`] owns the lifecycle state machine, the fair draw and
//! rerolls. [`ClaimService`] follows up with winners. Both persist through
//! [`prizebot_db::store::GiveawayStore`] and talk to the outside world only
//! through the [`Announcer`] and [`TranscriptReader`] traits.

pub mod services;

pub use services::*;
