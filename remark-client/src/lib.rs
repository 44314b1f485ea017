mod comment;
pub use comment::Comment;

mod config;
pub use config::{Config, DEFAULT_PAGE_SIZE};

mod cursor;
pub use cursor::{CursorTracker, Keyed};

mod error;
pub use error::Error;

mod http;
pub use http::HttpStore;

mod pagination;
pub use pagination::{PageStatus, Pagination, Scope};

mod posts;
pub use posts::PostFeed;

mod request;
pub use request::{Intent, Request, RequestContext, Response};

mod session;
pub use session::{Session, Update};

mod tree;
pub use tree::{Action, CommentTree};

mod visibility;
pub use visibility::{channel, Command, Commands, VisibilityNotifier};

#[cfg(test)]
mod tests;

pub mod api {
    pub use remark_api::*;
}
