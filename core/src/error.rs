use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncErr>;

#[derive(Debug, Error)]
pub enum SyncErr {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {reason}")]
    InvalidEnv { name: &'static str, reason: String },

    #[error("no device source is configured (set JAMF_URL, KANDJI_BASE_URL or INTUNE_*)")]
    NoSources,

    #[error("{0} was requested but is not configured")]
    SourceNotConfigured(crate::device::SourceKind),

    #[error("authentication with {service} failed: {reason}")]
    Auth {
        service: &'static str,
        reason: String,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Http {
        method: String,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("{url} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("Snipe-IT rejected the request: {0}")]
    Api(String),

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SyncErr {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SyncErr::Http { status, .. } => Some(*status),
            SyncErr::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SyncErr::Auth { .. })
            || matches!(
                self.status(),
                Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
            )
    }
}
