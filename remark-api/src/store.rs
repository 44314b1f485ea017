use async_trait::async_trait;

use crate::{Bookmark, Comment, CommentId, NewComment, NewPost, Post, PostId};

/// The remote comment store
///
/// Listings return at most one page of items after the bookmark, in increasing ordering-key
/// order. Errors the store reports about the request itself are returned as an `Error` wrapped in
/// the `anyhow::Error`, anything else is a transport failure.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_posts(&self, after: Bookmark) -> anyhow::Result<Vec<Post>>;

    async fn create_post(&self, p: NewPost) -> anyhow::Result<Post>;

    /// Deletes a post, along with all its comments
    async fn delete_post(&self, id: PostId) -> anyhow::Result<()>;

    async fn list_top_level(&self, post: PostId, after: Bookmark) -> anyhow::Result<Vec<Comment>>;

    async fn list_replies(
        &self,
        post: PostId,
        parent: CommentId,
        after: Bookmark,
    ) -> anyhow::Result<Vec<Comment>>;

    async fn create(&self, c: NewComment) -> anyhow::Result<Comment>;

    /// Some stores echo the edited comment back, others only confirm the edit
    async fn update(&self, id: CommentId, contents: String) -> anyhow::Result<Option<Comment>>;

    async fn delete(&self, id: CommentId) -> anyhow::Result<()>;
}
