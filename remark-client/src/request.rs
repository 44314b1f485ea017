use crate::{
    api::{self, Bookmark, CommentId, NewComment, PostId, Store},
    Scope,
};

/// What to do with a page once it arrives
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Intent {
    /// Next page of the scope, appended to it
    FetchMore,

    /// Successors of the scope's loaded items, fetched after one of its comments was created or
    /// deleted
    Refresh,

    /// Successors of the scope's loaded items, fetched after the store confirmed an edit, which
    /// is applied along with them
    Edit {
        target_id: CommentId,
        contents: String,
    },
}

/// Everything a page request needs, captured when it is issued
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestContext {
    pub post: PostId,
    pub scope: Scope,
    pub bookmark: Bookmark,

    /// Epoch of the scope's pagination when the request was issued
    pub epoch: u64,

    pub intent: Intent,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Request {
    Page(RequestContext),
    Create {
        scope: Scope,
        comment: NewComment,
    },
    Update {
        scope: Scope,
        target_id: CommentId,
        contents: String,
    },
    Delete {
        scope: Scope,
        target_id: CommentId,
    },
}

#[derive(Debug)]
pub enum Response {
    Page {
        ctx: RequestContext,
        result: anyhow::Result<Vec<api::Comment>>,
    },
    Created {
        scope: Scope,
        result: anyhow::Result<api::Comment>,
    },
    Updated {
        scope: Scope,
        target_id: CommentId,
        contents: String,
        result: anyhow::Result<Option<api::Comment>>,
    },
    Deleted {
        scope: Scope,
        target_id: CommentId,
        result: anyhow::Result<()>,
    },
}

impl Request {
    /// Sends the request to the store, this is the only place the session waits on
    pub async fn send<S: Store + ?Sized>(self, store: &S) -> Response {
        match self {
            Request::Page(ctx) => {
                tracing::debug!(
                    scope = ?ctx.scope,
                    cursor = ctx.bookmark.cursor,
                    offset = ctx.bookmark.offset,
                    initial = ctx.bookmark.is_start(),
                    "fetching page"
                );
                let result = match ctx.scope {
                    Scope::TopLevel => store.list_top_level(ctx.post, ctx.bookmark).await,
                    Scope::Replies(parent) => {
                        store.list_replies(ctx.post, parent, ctx.bookmark).await
                    }
                };
                Response::Page { ctx, result }
            }
            Request::Create { scope, comment } => Response::Created {
                scope,
                result: store.create(comment).await,
            },
            Request::Update {
                scope,
                target_id,
                contents,
            } => {
                let result = store.update(target_id, contents.clone()).await;
                Response::Updated {
                    scope,
                    target_id,
                    contents,
                    result,
                }
            }
            Request::Delete { scope, target_id } => Response::Deleted {
                scope,
                target_id,
                result: store.delete(target_id).await,
            },
        }
    }
}
