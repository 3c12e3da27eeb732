use thiserror::Error;

use crate::models::SessionId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session already admitted: {0}")]
    DuplicateSession(SessionId),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Presence hub unavailable")]
    HubClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
