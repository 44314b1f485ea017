use std::{collections::HashMap, sync::Arc};

use futures::{future::BoxFuture, select, stream::FuturesUnordered, FutureExt, Stream, StreamExt};

use crate::{
    api::{self, CommentId, NewComment, PostId, Store, UserId},
    Action, Command, CommentTree, Config, Error, Intent, PageStatus, Pagination, Request,
    RequestContext, Response, Scope,
};

/// What a running session reports to the rendering side
#[derive(Debug)]
pub enum Update {
    /// The tree changed, this is the new snapshot
    Snapshot(CommentTree),

    /// A request failed, the tree is untouched
    Failed(Error),
}

/// Keeps one post's comment tree in sync with the store
///
/// All state transitions are synchronous: the `request_*` functions build the request to send,
/// and `handle` applies the store's response, possibly asking for a follow-up request. Sending
/// requests is the only thing that waits, so they can be sent concurrently and their responses
/// handled one at a time in whatever order they come back.
pub struct Session<S: ?Sized> {
    store: Arc<S>,
    config: Config,
    post: PostId,
    user: UserId,
    tree: CommentTree,
    scopes: HashMap<Scope, Pagination>,
}

impl<S: Store + ?Sized> Session<S> {
    pub fn new(store: Arc<S>, config: Config, post: PostId, user: UserId) -> Session<S> {
        let mut scopes = HashMap::new();
        scopes.insert(
            Scope::TopLevel,
            Pagination::new(config.page_size_for(Scope::TopLevel)),
        );
        Session {
            store,
            config,
            post,
            user,
            tree: CommentTree::new(),
            scopes,
        }
    }

    pub fn post(&self) -> PostId {
        self.post
    }

    pub fn snapshot(&self) -> &CommentTree {
        &self.tree
    }

    /// Pagination status of a scope, None if the scope was never opened
    pub fn status(&self, scope: Scope) -> Option<PageStatus> {
        self.scopes.get(&scope).map(|p| p.status())
    }

    fn pagination(&mut self, scope: Scope) -> &mut Pagination {
        let page_size = self.config.page_size_for(scope);
        self.scopes
            .entry(scope)
            .or_insert_with(|| Pagination::new(page_size))
    }

    /// Applies an action to the tree, returns false if it was ignored
    pub fn dispatch(&mut self, action: &Action) -> bool {
        if !self.tree.dispatch(action) {
            tracing::warn!(?action, "ignoring action on a comment not in the tree");
            return false;
        }
        let scope = action.scope();
        tracing::debug!(?scope, kind = action_kind(action), "applied action");

        if let Action::Remove {
            parent_id: None,
            target_id,
        } = action
        {
            // Anything in flight for its replies will find the scope gone and be discarded
            self.scopes.remove(&Scope::Replies(*target_id));
        }

        let page_size = self.config.page_size_for(scope);
        let pagination = self
            .scopes
            .entry(scope)
            .or_insert_with(|| Pagination::new(page_size));
        if let Some(items) = self.tree.scope_items(scope) {
            pagination.observe(items);
        }
        true
    }

    /// Reserves the scope's current bookmark and builds the page request, None if that
    /// bookmark is already being fetched
    fn page_request(&mut self, scope: Scope, intent: Intent) -> Option<Request> {
        let post = self.post;
        let pagination = self.pagination(scope);
        let epoch = pagination.epoch();
        let bookmark = pagination.begin()?;
        Some(Request::Page(RequestContext {
            post,
            scope,
            bookmark,
            epoch,
            intent,
        }))
    }

    /// Fetches what comes after the scope's loaded items, whatever the last page looked like
    fn refresh(&mut self, scope: Scope) -> Option<Request> {
        if self.tree.scope_items(scope).is_none() {
            tracing::debug!(?scope, "not refreshing the replies of a gone comment");
            return None;
        }
        let req = self.page_request(scope, Intent::Refresh);
        if req.is_none() {
            tracing::debug!(?scope, "refresh deferred until the in-flight page arrives");
            self.pagination(scope).pending_refresh = true;
        }
        req
    }

    /// Asks for the next page of a scope, None if there is nothing to ask for
    pub fn request_more(&mut self, scope: Scope) -> Option<Request> {
        if self.tree.scope_items(scope).is_none() {
            tracing::warn!(?scope, "fetch-more for the replies of a comment not in the tree");
            return None;
        }
        if self.pagination(scope).no_more() {
            tracing::debug!(?scope, "fetch-more after the end of the listing");
            return None;
        }
        let req = self.page_request(scope, Intent::FetchMore);
        if req.is_none() {
            tracing::warn!(?scope, "suppressing fetch-more for a page already in flight");
        }
        req
    }

    /// Loads the first page of a comment's replies, if it has any that were not loaded yet
    pub fn request_replies(&mut self, parent: CommentId) -> Result<Option<Request>, Error> {
        let comment = self.tree.get(&parent).ok_or(Error::UnknownTarget(parent))?;
        let wanted = comment.reply_window.is_empty() && comment.reply_total_count > 0;
        let scope = Scope::Replies(parent);
        self.pagination(scope);
        match wanted {
            true => Ok(self.request_more(scope)),
            false => Ok(None),
        }
    }

    pub fn request_comment(&mut self, contents: String) -> Result<Request, Error> {
        let comment = NewComment {
            post_id: self.post,
            parent_id: None,
            author: self.user,
            mention: None,
            contents,
        };
        comment.validate()?;
        Ok(Request::Create {
            scope: Scope::TopLevel,
            comment,
        })
    }

    /// Replies to any comment
    ///
    /// Replies to a reply go to the same top-level comment, mentioning the author of the reply
    /// unless that is the current user.
    pub fn request_reply(&mut self, to: CommentId, contents: String) -> Result<Request, Error> {
        let target = self.tree.find(&to).ok_or(Error::UnknownTarget(to))?;
        let parent = target.parent_id.unwrap_or(target.id);
        let mention = match target.is_reply() && target.author != self.user {
            true => Some(target.author),
            false => None,
        };
        let comment = NewComment {
            post_id: self.post,
            parent_id: Some(parent),
            author: self.user,
            mention,
            contents,
        };
        comment.validate()?;
        let scope = Scope::Replies(parent);
        self.pagination(scope);
        Ok(Request::Create { scope, comment })
    }

    pub fn request_edit(
        &mut self,
        target_id: CommentId,
        contents: String,
    ) -> Result<Request, Error> {
        let target = self
            .tree
            .find(&target_id)
            .ok_or(Error::UnknownTarget(target_id))?;
        api::validate_contents(&contents)?;
        Ok(Request::Update {
            scope: Scope::of(target.parent_id),
            target_id,
            contents,
        })
    }

    pub fn request_delete(&mut self, target_id: CommentId) -> Result<Request, Error> {
        let target = self
            .tree
            .find(&target_id)
            .ok_or(Error::UnknownTarget(target_id))?;
        Ok(Request::Delete {
            scope: Scope::of(target.parent_id),
            target_id,
        })
    }

    /// Builds the request a command calls for
    pub fn command(&mut self, cmd: Command) -> Result<Option<Request>, Error> {
        match cmd {
            Command::FetchMore(scope) => Ok(self.request_more(scope)),
            Command::OpenReplies(parent) => self.request_replies(parent),
            Command::Comment(contents) => self.request_comment(contents).map(Some),
            Command::Reply { to, contents } => self.request_reply(to, contents).map(Some),
            Command::Edit {
                target_id,
                contents,
            } => self.request_edit(target_id, contents).map(Some),
            Command::Delete(target_id) => self.request_delete(target_id).map(Some),
        }
    }

    /// Applies the store's response to the tree, returning the follow-up request if any
    ///
    /// Failed mutations leave the tree untouched and are returned as errors. Page fetches that
    /// failed in transport are handled as empty pages.
    pub fn handle(&mut self, resp: Response) -> Result<Option<Request>, Error> {
        match resp {
            Response::Page { ctx, result } => self.handle_page(ctx, result),
            Response::Created { scope, result } => {
                let created = result.map_err(Error::from_store)?;
                tracing::debug!(?scope, id = ?created.id, "comment created");
                Ok(self.refresh(scope))
            }
            Response::Updated {
                scope,
                target_id,
                contents,
                result,
            } => {
                let contents = match result.map_err(Error::from_store)? {
                    Some(echoed) => echoed.contents,
                    None => contents,
                };
                tracing::debug!(?scope, ?target_id, "comment updated");
                if self.tree.scope_items(scope).is_none() {
                    tracing::warn!(?scope, "discarding edit in the replies of a gone comment");
                    return Ok(None);
                }
                let req = self.page_request(
                    scope,
                    Intent::Edit {
                        target_id,
                        contents: contents.clone(),
                    },
                );
                if req.is_none() {
                    self.dispatch(&Action::Modify {
                        parent_id: scope.parent_id(),
                        target_id,
                        contents,
                        payload: Vec::new(),
                    });
                    self.pagination(scope).pending_refresh = true;
                }
                Ok(req)
            }
            Response::Deleted {
                scope,
                target_id,
                result,
            } => {
                result.map_err(Error::from_store)?;
                tracing::debug!(?scope, ?target_id, "comment deleted");
                self.dispatch(&Action::Remove {
                    parent_id: scope.parent_id(),
                    target_id,
                });
                Ok(self.refresh(scope))
            }
        }
    }

    fn handle_page(
        &mut self,
        ctx: RequestContext,
        result: anyhow::Result<Vec<api::Comment>>,
    ) -> Result<Option<Request>, Error> {
        let pagination = match self.scopes.get_mut(&ctx.scope) {
            Some(p) => p,
            None => {
                tracing::debug!(scope = ?ctx.scope, "discarding page of a closed scope");
                return Ok(None);
            }
        };
        pagination.finish(ctx.bookmark);
        let stale = ctx.epoch != pagination.epoch();

        let (payload, failure) = match result {
            Ok(payload) => {
                if !stale {
                    pagination.page_loaded(payload.len());
                }
                (payload, None)
            }
            Err(err) => match Error::from_store(err) {
                Error::Transport(err) => {
                    tracing::warn!(
                        scope = ?ctx.scope,
                        ?err,
                        "page fetch failed, handling it as empty"
                    );
                    (Vec::new(), None)
                }
                err => (Vec::new(), Some(err)),
            },
        };
        let pending_refresh = std::mem::take(&mut pagination.pending_refresh);

        let parent_id = ctx.scope.parent_id();
        let mut refresh = pending_refresh;
        match (ctx.intent, stale) {
            (Intent::FetchMore, true) => {
                tracing::warn!(scope = ?ctx.scope, "discarding stale page");
            }
            (Intent::Refresh, true) => {
                tracing::warn!(scope = ?ctx.scope, "refresh went stale, reissuing it");
                refresh = true;
            }
            (
                Intent::Edit {
                    target_id,
                    contents,
                },
                true,
            ) => {
                tracing::warn!(scope = ?ctx.scope, "edit refresh went stale, reissuing it");
                self.dispatch(&Action::Modify {
                    parent_id,
                    target_id,
                    contents,
                    payload: Vec::new(),
                });
                refresh = true;
            }
            (Intent::FetchMore | Intent::Refresh, false) => {
                if !payload.is_empty() {
                    self.dispatch(&Action::Add { parent_id, payload });
                }
            }
            (
                Intent::Edit {
                    target_id,
                    contents,
                },
                false,
            ) => {
                self.dispatch(&Action::Modify {
                    parent_id,
                    target_id,
                    contents,
                    payload,
                });
            }
        }

        if let Some(err) = failure {
            if let Some(p) = self.scopes.get_mut(&ctx.scope) {
                p.pending_refresh |= refresh;
            }
            return Err(err);
        }
        match refresh {
            true => Ok(self.refresh(ctx.scope)),
            false => Ok(None),
        }
    }

    /// Sends a request and handles the responses until there is no follow-up left
    pub async fn settle(&mut self, req: Request) -> Result<(), Error> {
        let mut next = Some(req);
        while let Some(req) = next {
            let resp = req.send(&*self.store).await;
            next = self.handle(resp)?;
        }
        Ok(())
    }

    async fn settle_maybe(&mut self, req: Option<Request>) -> Result<(), Error> {
        match req {
            Some(req) => self.settle(req).await,
            None => Ok(()),
        }
    }

    /// Loads the first page of top-level comments, or the next one once the first is there
    pub async fn load(&mut self) -> Result<(), Error> {
        let req = self.request_more(Scope::TopLevel);
        self.settle_maybe(req).await
    }

    pub async fn open_replies(&mut self, parent: CommentId) -> Result<(), Error> {
        let req = self.request_replies(parent)?;
        self.settle_maybe(req).await
    }

    pub async fn fetch_more(&mut self, scope: Scope) -> Result<(), Error> {
        let req = self.request_more(scope);
        self.settle_maybe(req).await
    }

    pub async fn comment(&mut self, contents: String) -> Result<(), Error> {
        let req = self.request_comment(contents)?;
        self.settle(req).await
    }

    pub async fn reply(&mut self, to: CommentId, contents: String) -> Result<(), Error> {
        let req = self.request_reply(to, contents)?;
        self.settle(req).await
    }

    pub async fn edit(&mut self, target_id: CommentId, contents: String) -> Result<(), Error> {
        let req = self.request_edit(target_id, contents)?;
        self.settle(req).await
    }

    pub async fn delete(&mut self, target_id: CommentId) -> Result<(), Error> {
        let req = self.request_delete(target_id)?;
        self.settle(req).await
    }
}

impl<S: Store + ?Sized + 'static> Session<S> {
    fn send(&self, req: Request) -> BoxFuture<'static, Response> {
        let store = self.store.clone();
        async move { req.send(&*store).await }.boxed()
    }

    /// Runs commands as they come, with all their requests in flight at once
    ///
    /// `notify` is called with every new snapshot and every failure. Returns once the command
    /// feed has ended and every request it caused has been handled.
    pub async fn run<C>(&mut self, commands: C, mut notify: impl FnMut(Update))
    where
        C: Stream<Item = Command> + Unpin,
    {
        let mut commands = commands.fuse();
        let mut in_flight = FuturesUnordered::new();
        let mut last = self.tree.clone();
        loop {
            let next = select! {
                cmd = commands.next() => match cmd {
                    Some(cmd) => self.command(cmd),
                    None => Ok(None),
                },
                resp = in_flight.select_next_some() => self.handle(resp),
                complete => break,
            };
            match next {
                Ok(Some(req)) => in_flight.push(self.send(req)),
                Ok(None) => (),
                Err(err) => notify(Update::Failed(err)),
            }
            if !self.tree.ptr_eq(&last) {
                last = self.tree.clone();
                notify(Update::Snapshot(last.clone()));
            }
        }
        tracing::debug!(post = ?self.post, "session ended");
    }
}

fn action_kind(action: &Action) -> &'static str {
    match action {
        Action::Add { .. } => "add",
        Action::Modify { .. } => "modify",
        Action::Remove { .. } => "remove",
    }
}
