use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("failed to load connection configuration: {0}")]
    ConnectionConfig(String),

    #[error("database connection failed: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to (de)serialize bot params: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the requested row was not found")]
    NotFound,

    #[error("order {order_id} is in terminal status {status:?} and cannot be mutated")]
    TerminalStateImmutable { order_id: Uuid, status: String },

    #[error(
        "order {order_id} report attempted a non-monotonic transition from {from} to {to}; rejected"
    )]
    NonMonotonicTransition {
        order_id: Uuid,
        from: String,
        to: String,
    },

    #[error("more than one active cycle found for bot {bot_id}")]
    MultipleActiveCycles { bot_id: String },
}
