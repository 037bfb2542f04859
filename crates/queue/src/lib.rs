//! Background scheduling for prizebot.
//!
//! - **Scheduler**: independent periodic ticks (promote, end, live update,
//!   claim sweep, lock watchdog)
//! - **Executor**: tick bodies backed by the giveaway and claim services
//! - **Kill-switch**: stops every tick after repeated store authorization failures

pub mod executor;
pub mod kill_switch;
pub mod scheduler;

pub use executor::GiveawayJobExecutor;
pub use kill_switch::KillSwitch;
pub use scheduler::{JobExecutor, SchedulerConfig, Tick, TickReport, run_scheduler, run_tick};
