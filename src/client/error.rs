use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl ClientError {
    /// Text shown to the user in place of the data that failed to load.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Status { status, .. } => format!("HTTP error! status: {}", status),
            ClientError::RequestFailed(_) => "The proxy could not be reached.".to_string(),
            ClientError::Decode(_) => "The response could not be read.".to_string(),
        }
    }
}
