use std::path::PathBuf;

use crate::request::BodyChannel;

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    #[error("Request body already opened as {opened}")]
    AlreadyConsumed { opened: BodyChannel },

    #[error("Request body already consumed or supplied")]
    BodyAlreadyConsumed,

    #[error("Content type {requested:?} conflicts with the request's attachments")]
    ContentTypeConflict { requested: String },

    #[error("Unable to read attachment {}: {source}", path.display())]
    AttachmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read request body: {0}")]
    BodyRead(#[source] std::io::Error),

    #[error("Unknown character encoding: {0}")]
    UnknownEncoding(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, MockError>;
