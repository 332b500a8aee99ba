#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Gridforge-Core
//! The Martingale state machine: the Cycle Manager's per-cycle ladder/take-profit logic
//! ([`cycle::CycleManager`]) and the Bot Supervisor's per-bot lifecycle operations
//! ([`supervisor::BotSupervisor`]) that create, start, stop, and delete bots, and route
//! execution reports from the Exchange Gateway to the right bot's cycle.

pub mod cycle;
pub mod error;
pub mod event;
pub mod ladder;
pub mod supervisor;
pub mod validation;

pub use cycle::{CycleManager, CycleOutcome, CycleState};
pub use error::CoreError;
pub use event::{CycleEvent, ExecutionReportEvent};
pub use supervisor::BotSupervisor;
