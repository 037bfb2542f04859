//! Repositories over the giveaway tables.

mod claim;
mod entry;
mod giveaway;
mod log;
mod winner;

pub use claim::ClaimRepository;
pub use entry::EntryRepository;
pub use giveaway::GiveawayRepository;
pub use log::LogRepository;
pub use winner::WinnerRepository;
