use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use remark_api::{
    self as api, Bookmark, CommentId, Error, NewComment, NewPost, OrderingKey, PostId, Store,
    UserId, Uuid,
};
use tokio::sync::{Mutex, MutexGuard};

/// In-memory comment store, with the knobs tests need to reproduce what a real store does
///
/// Ordering keys come from a logical clock that ticks on every creation. Freezing the clock makes
/// the next items share a key, the way items created concurrently can on a real store.
#[derive(Debug)]
pub struct MockServer {
    page_size: usize,
    clock: OrderingKey,
    frozen: bool,
    failures: usize,
    posts: Vec<api::Post>,

    // In creation order, which is also ordering-key order
    comments: Vec<api::Comment>,
}

impl MockServer {
    pub fn new(page_size: usize) -> MockServer {
        MockServer {
            page_size: std::cmp::max(page_size, 1),
            clock: 0,
            frozen: false,
            failures: 0,
            posts: Vec::new(),
            comments: Vec::new(),
        }
    }

    fn next_key(&mut self) -> OrderingKey {
        if !self.frozen {
            self.clock += 1;
        }
        self.clock
    }

    /// Makes items created from now on share the same ordering key, until `unfreeze_clock`
    pub fn freeze_clock(&mut self) {
        self.clock += 1;
        self.frozen = true;
    }

    pub fn unfreeze_clock(&mut self) {
        self.frozen = false;
    }

    /// Makes the next `n` requests fail as if the network had dropped them
    pub fn fail_next(&mut self, n: usize) {
        self.failures = n;
    }

    fn take_failure(&mut self) -> bool {
        match self.failures {
            0 => false,
            _ => {
                self.failures -= 1;
                true
            }
        }
    }

    /// Number of comments stored, replies included
    pub fn test_num_comments(&self) -> usize {
        self.comments.len()
    }

    pub fn admin_create_post(&mut self, author: UserId, title: String) -> Result<api::Post, Error> {
        self.create_post(NewPost { author, title })
    }

    pub fn create_post(&mut self, p: NewPost) -> Result<api::Post, Error> {
        p.validate()?;
        let post = api::Post {
            id: PostId(Uuid::new_v4()),
            ordering_key: self.next_key(),
            author: p.author,
            title: p.title,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.posts.push(post.clone());
        Ok(post)
    }

    /// Deletes a post, along with its comments
    pub fn delete_post(&mut self, id: PostId) -> Result<(), Error> {
        self.check_post(id)?;
        self.posts.retain(|p| p.id != id);
        self.comments.retain(|c| c.post_id != id);
        tracing::debug!(?id, "mock store deleted post");
        Ok(())
    }

    fn check_post(&self, post: PostId) -> Result<(), Error> {
        match self.posts.iter().any(|p| p.id == post) {
            true => Ok(()),
            false => Err(Error::PostNotFound(post)),
        }
    }

    fn comment(&self, id: CommentId) -> Result<&api::Comment, Error> {
        self.comments
            .iter()
            .find(|c| c.id == id)
            .ok_or(Error::CommentNotFound(id))
    }

    fn with_reply_count(&self, c: &api::Comment) -> api::Comment {
        let mut c = c.clone();
        c.reply_count = self
            .comments
            .iter()
            .filter(|r| r.parent_id == Some(c.id))
            .count();
        c
    }

    pub fn list_posts(&self, after: Bookmark) -> Vec<api::Post> {
        page(self.posts.iter(), after, self.page_size, |p: &api::Post| p.ordering_key)
            .cloned()
            .collect()
    }

    pub fn list_top_level(
        &self,
        post: PostId,
        after: Bookmark,
    ) -> Result<Vec<api::Comment>, Error> {
        self.check_post(post)?;
        let scope = self
            .comments
            .iter()
            .filter(move |c| c.post_id == post && c.parent_id.is_none());
        Ok(page(scope, after, self.page_size, |c: &api::Comment| c.ordering_key)
            .map(|c| self.with_reply_count(c))
            .collect())
    }

    pub fn list_replies(
        &self,
        post: PostId,
        parent: CommentId,
        after: Bookmark,
    ) -> Result<Vec<api::Comment>, Error> {
        self.check_post(post)?;
        self.comment(parent)?;
        let scope = self
            .comments
            .iter()
            .filter(move |c| c.post_id == post && c.parent_id == Some(parent));
        Ok(page(scope, after, self.page_size, |c: &api::Comment| c.ordering_key)
            .cloned()
            .collect())
    }

    pub fn create(&mut self, c: NewComment) -> Result<api::Comment, Error> {
        c.validate()?;
        self.check_post(c.post_id)?;
        if let Some(parent) = c.parent_id {
            if self.comment(parent)?.parent_id.is_some() {
                return Err(Error::NestingTooDeep(parent));
            }
        }
        let comment = api::Comment {
            id: CommentId(Uuid::new_v4()),
            post_id: c.post_id,
            ordering_key: self.next_key(),
            parent_id: c.parent_id,
            author: c.author,
            mention: c.mention,
            contents: c.contents,
            created_at: Utc::now(),
            updated_at: None,
            reply_count: 0,
        };
        tracing::debug!(id = ?comment.id, key = comment.ordering_key, "mock store created comment");
        self.comments.push(comment.clone());
        Ok(comment)
    }

    pub fn update(&mut self, id: CommentId, contents: String) -> Result<api::Comment, Error> {
        api::validate_contents(&contents)?;
        let c = self
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Error::CommentNotFound(id))?;
        c.contents = contents;
        c.updated_at = Some(Utc::now());
        let c = c.clone();
        Ok(self.with_reply_count(&c))
    }

    /// Deletes a comment, along with its replies
    pub fn delete(&mut self, id: CommentId) -> Result<(), Error> {
        self.comment(id)?;
        self.comments
            .retain(|c| c.id != id && c.parent_id != Some(id));
        Ok(())
    }
}

/// Items of a scope that come after `after`, at most one page of them
fn page<'a, T: 'a>(
    scope: impl Iterator<Item = &'a T> + 'a,
    after: Bookmark,
    page_size: usize,
    key: impl Fn(&T) -> OrderingKey + 'a,
) -> impl Iterator<Item = &'a T> + 'a {
    let mut prev = None;
    let mut rank = 0;
    scope
        .filter(move |item| {
            let k = key(item);
            match prev == Some(k) {
                true => rank += 1,
                false => {
                    prev = Some(k);
                    rank = 0;
                }
            }
            after.is_before(k, rank)
        })
        .take(page_size)
}

/// `Store` handle on a shared `MockServer`
#[derive(Clone, Debug)]
pub struct MockStore(Arc<Mutex<MockServer>>);

impl MockStore {
    pub fn new(server: MockServer) -> MockStore {
        MockStore(Arc::new(Mutex::new(server)))
    }

    pub async fn server(&self) -> MutexGuard<'_, MockServer> {
        self.0.lock().await
    }

    async fn lock(&self) -> anyhow::Result<MutexGuard<'_, MockServer>> {
        let mut server = self.0.lock().await;
        match server.take_failure() {
            true => Err(anyhow::anyhow!("injected transport failure")),
            false => Ok(server),
        }
    }
}

#[async_trait]
impl Store for MockStore {
    async fn list_posts(&self, after: Bookmark) -> anyhow::Result<Vec<api::Post>> {
        Ok(self.lock().await?.list_posts(after))
    }

    async fn create_post(&self, p: NewPost) -> anyhow::Result<api::Post> {
        Ok(self.lock().await?.create_post(p)?)
    }

    async fn delete_post(&self, id: PostId) -> anyhow::Result<()> {
        Ok(self.lock().await?.delete_post(id)?)
    }

    async fn list_top_level(
        &self,
        post: PostId,
        after: Bookmark,
    ) -> anyhow::Result<Vec<api::Comment>> {
        Ok(self.lock().await?.list_top_level(post, after)?)
    }

    async fn list_replies(
        &self,
        post: PostId,
        parent: CommentId,
        after: Bookmark,
    ) -> anyhow::Result<Vec<api::Comment>> {
        Ok(self.lock().await?.list_replies(post, parent, after)?)
    }

    async fn create(&self, c: NewComment) -> anyhow::Result<api::Comment> {
        Ok(self.lock().await?.create(c)?)
    }

    async fn update(
        &self,
        id: CommentId,
        contents: String,
    ) -> anyhow::Result<Option<api::Comment>> {
        Ok(Some(self.lock().await?.update(id, contents)?))
    }

    async fn delete(&self, id: CommentId) -> anyhow::Result<()> {
        Ok(self.lock().await?.delete(id)?)
    }
}
