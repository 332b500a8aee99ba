use gridforge_execution::error::ClientError;
use gridforge_execution::order::id::BotId;
use gridforge_instrument::spec::QuantizeError;
use gridforge_persistence::RepositoryError;
use thiserror::Error;

/// Failure surfaced by the Cycle Manager or Bot Supervisor. Which variant fires determines whether
/// the bot is failed outright, the rung is skipped, or the event is retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),

    #[error("exchange client: {0}")]
    Client(#[from] ClientError),

    #[error("invalid bot params: {0}")]
    Validation(String),

    #[error("safety ladder invalid: {0}")]
    LadderInvalid(String),

    #[error("quantization: {0}")]
    Quantize(#[from] QuantizeError),

    #[error("bot {0} not found")]
    BotNotFound(BotId),

    #[error("bot {0} already has an active cycle")]
    CycleAlreadyActive(BotId),

    #[error("bot {0} is not active")]
    BotNotActive(BotId),
}
