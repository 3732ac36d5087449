#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response from {path} (HTTP {status}): {source}")]
    Decode {
        path: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid backend URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub type LinkResult<T> = Result<T, LinkError>;
