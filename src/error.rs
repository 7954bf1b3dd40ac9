use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("no post with id {0}")]
    PostNotFound(String),
    #[error("post {post_id} has no reply with id {reply_id}")]
    ReplyNotFound { post_id: String, reply_id: String },
    #[error("{0} must not be empty")]
    BlankField(&'static str),
    #[error("ticker {0:?} has not been validated")]
    TickerNotValidated(String),
}
