/// Core error type.
///
/// Adapter crates map their specific errors into this type so the engine can tell
/// expected access denials apart from real remote failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Permission denied or private scope. Expected for many channels.
    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("external error: {0}")]
    External(String),
}

const ABSENCE_MARKERS: &[&str] = &[
    "chat_admin_required",
    "channel_private",
    "chat_forbidden",
    "private",
    "permission",
];

impl Error {
    /// True for permission-denied / private-scope failures, which callers treat as
    /// "no information" rather than as errors.
    pub fn is_expected_absence(&self) -> bool {
        match self {
            Error::Forbidden(_) => true,
            Error::Remote(msg) => {
                let msg = msg.to_lowercase();
                ABSENCE_MARKERS.iter().any(|m| msg.contains(m))
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absence_covers_forbidden_and_private_remote_errors() {
        assert!(Error::Forbidden("x".to_string()).is_expected_absence());
        assert!(Error::Remote("RPC 400: CHAT_ADMIN_REQUIRED".to_string()).is_expected_absence());
        assert!(Error::Remote("CHANNEL_PRIVATE".to_string()).is_expected_absence());
        assert!(!Error::Remote("FLOOD_WAIT_30".to_string()).is_expected_absence());
        assert!(!Error::Config("PRIVATE".to_string()).is_expected_absence());
    }
}
