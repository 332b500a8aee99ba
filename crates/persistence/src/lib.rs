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
#![allow(clippy::too_many_arguments)]

//! # Gridforge-Persistence
//! The Order Repository plus the Bot and Cycle repositories it's persisted alongside -
//! the durable, transactional record that survives a crash between "order submitted" and "order
//! acknowledged".
//!
//! Every repository is a thin wrapper over a shared [`sqlx::PgPool`]; [`connection::connect`]
//! builds that pool once at process startup and [`connection::run_migrations`] brings the schema
//! up to date before anything else touches it.

pub mod bot_repository;
pub mod connection;
pub mod cycle_repository;
pub mod error;
pub mod models;
pub mod order_repository;

pub use bot_repository::BotRepository;
pub use connection::{connect, run_migrations};
pub use cycle_repository::CycleRepository;
pub use error::RepositoryError;
pub use order_repository::{ExecutionReport, OrderRepository};
