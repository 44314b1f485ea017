use anyhow::Context;
use async_trait::async_trait;

use crate::api::{
    self, Bookmark, CommentEdit, CommentId, NewComment, NewPost, OrderingKey, PostId, Store, Uuid,
};

#[derive(serde::Serialize)]
struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    post: Option<PostId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<CommentId>,
    cursor: OrderingKey,
    offset: usize,
}

/// Store reached over its REST API
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: reqwest::Client,
    host: String,
    token: Option<Uuid>,
}

impl HttpStore {
    pub fn new(host: String, token: Option<Uuid>) -> HttpStore {
        HttpStore {
            client: reqwest::Client::new(),
            host,
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, format!("{}/api/{}", self.host, path));
        match self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn list<T>(&self, path: &str, query: ListQuery) -> anyhow::Result<Vec<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let resp = send(self.request(reqwest::Method::GET, path).query(&query)).await?;
        resp.json()
            .await
            .with_context(|| format!("parsing listing of {}", path))
    }
}

/// Sends the request, turning error responses into the `api::Error` they carry
async fn send(req: reqwest::RequestBuilder) -> anyhow::Result<reqwest::Response> {
    let resp = req.send().await.context("sending request to the store")?;
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .with_context(|| format!("reading body of error response {}", status))?;
    let err = api::Error::parse(&body)
        .with_context(|| format!("parsing body of error response {}", status))?;
    Err(err.into())
}

#[async_trait]
impl Store for HttpStore {
    async fn list_posts(&self, after: Bookmark) -> anyhow::Result<Vec<api::Post>> {
        self.list(
            "posts",
            ListQuery {
                post: None,
                parent: None,
                cursor: after.cursor,
                offset: after.offset,
            },
        )
        .await
    }

    async fn create_post(&self, p: NewPost) -> anyhow::Result<api::Post> {
        send(self.request(reqwest::Method::POST, "posts").json(&p))
            .await?
            .json()
            .await
            .context("parsing created post")
    }

    async fn delete_post(&self, id: PostId) -> anyhow::Result<()> {
        let path = format!("posts/{}", id.0);
        send(self.request(reqwest::Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn list_top_level(
        &self,
        post: PostId,
        after: Bookmark,
    ) -> anyhow::Result<Vec<api::Comment>> {
        self.list(
            "comments",
            ListQuery {
                post: Some(post),
                parent: None,
                cursor: after.cursor,
                offset: after.offset,
            },
        )
        .await
    }

    async fn list_replies(
        &self,
        post: PostId,
        parent: CommentId,
        after: Bookmark,
    ) -> anyhow::Result<Vec<api::Comment>> {
        self.list(
            "comments",
            ListQuery {
                post: Some(post),
                parent: Some(parent),
                cursor: after.cursor,
                offset: after.offset,
            },
        )
        .await
    }

    async fn create(&self, c: NewComment) -> anyhow::Result<api::Comment> {
        send(self.request(reqwest::Method::POST, "comments").json(&c))
            .await?
            .json()
            .await
            .context("parsing created comment")
    }

    async fn update(
        &self,
        id: CommentId,
        contents: String,
    ) -> anyhow::Result<Option<api::Comment>> {
        let path = format!("comments/{}", id.0);
        let body = send(
            self.request(reqwest::Method::PATCH, &path)
                .json(&CommentEdit { contents }),
        )
        .await?
        .bytes()
        .await
        .context("reading updated comment")?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            serde_json::from_slice(&body).context("parsing updated comment")?,
        ))
    }

    async fn delete(&self, id: CommentId) -> anyhow::Result<()> {
        let path = format!("comments/{}", id.0);
        send(self.request(reqwest::Method::DELETE, &path)).await?;
        Ok(())
    }
}
