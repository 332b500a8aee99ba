use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("repository error: {0}")]
    Repository(#[from] gridforge_persistence::RepositoryError),
    #[error("core error: {0}")]
    Core(#[from] gridforge_core::CoreError),
    #[error("unknown exchange account '{0}'")]
    UnknownExchangeAccount(String),
    #[error("exchange client error: {0}")]
    Client(#[from] gridforge_execution::error::ClientError),
    #[error("balance fetch timed out")]
    BalanceTimeout,
    #[error("failed to serialize event message: {0}")]
    Serialization(#[from] serde_json::Error),
}
