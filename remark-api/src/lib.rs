use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod comment;
pub use comment::{Comment, CommentEdit, CommentId, NewComment};

mod error;
pub use error::Error;

mod page;
pub use page::{Bookmark, OrderingKey};

mod post;
pub use post::{NewPost, Post, PostId};

mod store;
pub use store::Store;

mod user;
pub use user::UserId;

// Validation functions are used both by the client before submitting, and by the stores to
// reject anything a well-behaved client would not have sent.

pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}

pub fn validate_contents(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    match s.trim().is_empty() {
        true => Err(Error::EmptyContents),
        false => Ok(()),
    }
}
