use std::sync::Arc;

use crate::api::{self, CommentId, OrderingKey, PostId, Time, UserId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub ordering_key: OrderingKey,
    pub parent_id: Option<CommentId>,

    pub author: UserId,
    pub mention: Option<UserId>,
    pub contents: String,
    pub created_at: Time,
    pub updated_at: Option<Time>,

    /// Replies loaded so far, in ordering-key order
    ///
    /// Only top-level comments have replies, and only the pages that were fetched are in there.
    pub reply_window: Arc<Vec<Arc<Comment>>>,

    /// Number of replies the store reported, never less than `reply_window.len()`
    pub reply_total_count: usize,
}

impl From<api::Comment> for Comment {
    fn from(c: api::Comment) -> Comment {
        Comment {
            id: c.id,
            post_id: c.post_id,
            ordering_key: c.ordering_key,
            parent_id: c.parent_id,
            author: c.author,
            mention: c.mention,
            contents: c.contents,
            created_at: c.created_at,
            updated_at: c.updated_at,
            reply_window: Arc::new(Vec::new()),
            reply_total_count: c.reply_count,
        }
    }
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Returns true iff more replies are known to the store than are loaded
    pub fn has_unloaded_replies(&self) -> bool {
        self.reply_total_count > self.reply_window.len()
    }

    pub fn find_reply(&self, id: &CommentId) -> Option<&Arc<Comment>> {
        self.reply_window.iter().find(|r| r.id == *id)
    }
}
