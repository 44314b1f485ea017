use crate::{
    api::{self, Store},
    Error, Pagination,
};

/// Posts loaded so far, paginated the same way comments are
#[derive(Clone, Debug)]
pub struct PostFeed {
    posts: Vec<api::Post>,
    pagination: Pagination,
}

impl PostFeed {
    pub fn new(page_size: usize) -> PostFeed {
        PostFeed {
            posts: Vec::new(),
            pagination: Pagination::new(page_size),
        }
    }

    pub fn posts(&self) -> &[api::Post] {
        &self.posts
    }

    pub fn no_more(&self) -> bool {
        self.pagination.no_more()
    }

    /// Fetches the next page of posts, returning how many were added
    pub async fn fetch_more<S: Store + ?Sized>(&mut self, store: &S) -> Result<usize, Error> {
        if self.pagination.no_more() {
            return Ok(0);
        }
        self.fetch(store).await
    }

    async fn fetch<S: Store + ?Sized>(&mut self, store: &S) -> Result<usize, Error> {
        let bookmark = match self.pagination.begin() {
            Some(b) => b,
            None => return Ok(0),
        };
        tracing::debug!(cursor = bookmark.cursor, offset = bookmark.offset, "fetching posts");
        let res = store.list_posts(bookmark).await;
        self.pagination.finish(bookmark);
        match res {
            Ok(page) => {
                let added = page.len();
                self.pagination.page_loaded(added);
                self.posts.extend(page);
                self.pagination.observe(&self.posts);
                Ok(added)
            }
            Err(err) => match Error::from_store(err) {
                Error::Transport(err) => {
                    tracing::warn!(?err, "post listing failed, handling it as empty");
                    Ok(0)
                }
                err => Err(err),
            },
        }
    }

    /// Creates a post, then fetches what follows the loaded posts so a fully loaded feed shows it
    pub async fn create<S: Store + ?Sized>(
        &mut self,
        store: &S,
        post: api::NewPost,
    ) -> Result<api::Post, Error> {
        post.validate()?;
        let created = store.create_post(post).await.map_err(Error::from_store)?;
        tracing::debug!(id = ?created.id, "post created");
        self.fetch(store).await?;
        Ok(created)
    }

    /// Deletes a post, which takes its comments along on the store
    pub async fn delete<S: Store + ?Sized>(
        &mut self,
        store: &S,
        id: api::PostId,
    ) -> Result<(), Error> {
        store.delete_post(id).await.map_err(Error::from_store)?;
        tracing::debug!(?id, "post deleted");
        self.posts.retain(|p| p.id != id);
        self.pagination.observe(&self.posts);
        Ok(())
    }
}
