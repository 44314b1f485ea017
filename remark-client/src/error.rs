use crate::api::{self, CommentId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request did not make it to the store, or its answer could not be understood
    #[error("transport failure: {0:#}")]
    Transport(anyhow::Error),

    /// The store refused the request
    #[error(transparent)]
    Api(#[from] api::Error),

    #[error("comment {0:?} is not in the current snapshot")]
    UnknownTarget(CommentId),
}

impl Error {
    /// Sorts what a `Store` returned into errors reported by the store and transport failures
    pub fn from_store(err: anyhow::Error) -> Error {
        match err.downcast::<api::Error>() {
            Ok(err) => Error::Api(err),
            Err(err) => Error::Transport(err),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
