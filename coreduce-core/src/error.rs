use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Raised by the user-supplied reduce or map functions. The operator never wraps or retries it.
    #[error("UserDefined Error - {0}")]
    UserDefined(String),

    #[error("Sink Error - {0}")]
    Sink(String),

    #[error("Metrics Error - {0}")]
    Metrics(String),

    #[error("Config Error - {0}")]
    Config(String),

    #[error("Actor Error - {0}")]
    ActorPatternRecv(String),
}
