//! Errors - シーム（port）ごとのエラー型
//!
//! - QueueError: Queue Service（lease / delete / stats / purge）
//! - DispatchError: worker dispatch queue（spawn / purge）
//! - CredentialError / RemoteError: remote variant
//! - HandlerError: item 処理フック

use thiserror::Error;

use super::ids::ItemRef;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("item not found: {0}")]
    ItemNotFound(ItemRef),

    #[error("batch of {size} items exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("operation not supported by this queue: {0}")]
    Unsupported(&'static str),
}

impl From<RemoteError> for QueueError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized => QueueError::Unauthorized("remote rejected token".into()),
            RemoteError::NotFound(id) => QueueError::Transport(format!("remote task not found: {id}")),
            RemoteError::Transport(msg) => QueueError::Transport(msg),
        }
    }
}

impl From<CredentialError> for QueueError {
    fn from(err: CredentialError) -> Self {
        QueueError::Unauthorized(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("spawn batch of {size} tasks exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credentials for {0} are invalid")]
    Invalid(String),

    #[error("credential store failure: {0}")]
    Store(String),
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote rejected the access token")]
    Unauthorized,

    #[error("remote task not found: {0}")]
    NotFound(String),

    #[error("remote transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
#[error("item handler failed: {0}")]
pub struct HandlerError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_map_onto_queue_errors() {
        assert!(matches!(
            QueueError::from(RemoteError::Unauthorized),
            QueueError::Unauthorized(_)
        ));
        assert!(matches!(
            QueueError::from(RemoteError::Transport("503".into())),
            QueueError::Transport(msg) if msg == "503"
        ));
    }

    #[test]
    fn credential_errors_become_unauthorized() {
        let err = QueueError::from(CredentialError::Invalid("user-1".into()));
        assert!(err.to_string().contains("user-1"));
    }
}
