//! Giveaway engine services.

pub mod announcer;
pub mod claim;
pub mod draw;
pub mod giveaway;
pub mod outcome;
pub mod transcript;

pub use announcer::{
    Announcer, ClaimNotice, DiscordWebhookAnnouncer, LiveUpdate, MessageRef, NoOpAnnouncer,
};
pub use claim::{CLAIM_EXPIRY_ACTOR, ClaimPolicy, ClaimService, SweepReport};
pub use draw::{DrawOptions, DrawOutcome, Ticket};
pub use giveaway::{
    CreateGiveawayInput, EndReport, EnterReport, EnterRequest, GiveawayService, MemberContext,
    RerollReport, RerollRequest, SYSTEM_ACTOR,
};
pub use outcome::{Outcome, Rejection};
pub use transcript::{
    DiscordTranscriptReader, NoOpTranscriptReader, TranscriptMessage, TranscriptReader,
};
