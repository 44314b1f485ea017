use uuid::Uuid;

use crate::{Error, OrderingKey, PostId, Time, UserId, STUB_UUID};

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    bolero::generator::TypeGenerator,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct CommentId(#[generator(bolero::generator::gen_arbitrary())] pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

/// A comment as the store returns it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub ordering_key: OrderingKey,

    /// Top-level comment this is a reply to, None for top-level comments
    pub parent_id: Option<CommentId>,

    pub author: UserId,
    pub mention: Option<UserId>,
    pub contents: String,
    pub created_at: Time,
    pub updated_at: Option<Time>,

    /// Number of replies currently stored for this comment (always 0 for replies)
    pub reply_count: usize,
}

/// A comment submitted for creation, the store assigns its id and ordering key
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author: UserId,
    pub mention: Option<UserId>,
    pub contents: String,
}

impl NewComment {
    // See comments on the `validate` functions in lib.rs
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_contents(&self.contents)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentEdit {
    pub contents: String,
}

impl CommentEdit {
    // See comments on the `validate` functions in lib.rs
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_contents(&self.contents)
    }
}
