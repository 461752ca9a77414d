use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("no active subscription set; use `autopilot subscription --set <id>`")]
    NoActiveSubscription,

    #[error("no subscription found with ID: {0}")]
    UnknownSubscription(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("pricing API rate limit reached: {0}")]
    RateLimited(String),

    #[error("management API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Settings(#[from] ::config::ConfigError),
}
