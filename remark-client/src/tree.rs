use std::{cmp, sync::Arc};

use crate::{
    api::{self, CommentId},
    Comment, Scope,
};

/// A state transition of the comment tree
///
/// The target coordinates are captured when the request that produced the action was issued, so
/// that a late response still lands in the branch it was meant for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Append newly visible comments to a scope
    Add {
        parent_id: Option<CommentId>,
        payload: Vec<api::Comment>,
    },

    /// Replace a comment's contents, then append the successors that were fetched along
    Modify {
        parent_id: Option<CommentId>,
        target_id: CommentId,
        contents: String,
        payload: Vec<api::Comment>,
    },

    /// Remove a comment, along with its replies if it is a top-level comment
    Remove {
        parent_id: Option<CommentId>,
        target_id: CommentId,
    },
}

impl Action {
    pub fn scope(&self) -> Scope {
        match self {
            Action::Add { parent_id, .. }
            | Action::Modify { parent_id, .. }
            | Action::Remove { parent_id, .. } => Scope::of(*parent_id),
        }
    }
}

/// Immutable snapshot of a post's loaded comments
///
/// Cloning is cheap, and applying an action never changes the snapshots that were handed out
/// before: untouched branches are shared with the new snapshot, touched ones are copied.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentTree {
    comments: Arc<Vec<Arc<Comment>>>,
}

impl CommentTree {
    pub fn new() -> CommentTree {
        CommentTree::default()
    }

    /// Top-level comments, in ordering-key order
    pub fn comments(&self) -> &[Arc<Comment>] {
        &self.comments
    }

    pub fn get(&self, id: &CommentId) -> Option<&Arc<Comment>> {
        self.comments.iter().find(|c| c.id == *id)
    }

    /// Finds a comment anywhere in the tree
    pub fn find(&self, id: &CommentId) -> Option<&Arc<Comment>> {
        self.get(id)
            .or_else(|| self.comments.iter().find_map(|c| c.find_reply(id)))
    }

    /// Items loaded for a scope, None if the scope's parent is not loaded
    pub fn scope_items(&self, scope: Scope) -> Option<&[Arc<Comment>]> {
        match scope {
            Scope::TopLevel => Some(&self.comments),
            Scope::Replies(parent) => self.get(&parent).map(|p| &p.reply_window[..]),
        }
    }

    /// Returns true iff both snapshots are the very same, without comparing their contents
    pub fn ptr_eq(&self, other: &CommentTree) -> bool {
        Arc::ptr_eq(&self.comments, &other.comments)
    }

    /// Computes the snapshot resulting from `action`
    ///
    /// Returns None if the action is addressed at a comment that is not in this snapshot, in
    /// which case the action is to be ignored altogether.
    pub fn apply(&self, action: &Action) -> Option<CommentTree> {
        let mut next = self.clone();
        match action {
            Action::Add {
                parent_id: None,
                payload,
            } => {
                extend(&mut next.comments, payload);
            }
            Action::Add {
                parent_id: Some(parent_id),
                payload,
            } => {
                let parent = find_mut(&mut next.comments, parent_id)?;
                let window = extend(&mut parent.reply_window, payload);
                // Only part of the replies may be loaded, so the store's count stays authoritative
                // until the window outgrows it
                parent.reply_total_count = cmp::max(parent.reply_total_count, window);
            }
            Action::Modify {
                parent_id: None,
                target_id,
                contents,
                payload,
            } => {
                find_mut(&mut next.comments, target_id)?.contents = contents.clone();
                extend(&mut next.comments, payload);
            }
            Action::Modify {
                parent_id: Some(parent_id),
                target_id,
                contents,
                payload,
            } => {
                let parent = find_mut(&mut next.comments, parent_id)?;
                find_mut(&mut parent.reply_window, target_id)?.contents = contents.clone();
                let window = extend(&mut parent.reply_window, payload);
                // The edit itself changes no count, the successors fetched along may
                parent.reply_total_count = cmp::max(parent.reply_total_count, window);
            }
            Action::Remove {
                parent_id: None,
                target_id,
            } => {
                let idx = position(&next.comments, target_id)?;
                Arc::make_mut(&mut next.comments).remove(idx);
            }
            Action::Remove {
                parent_id: Some(parent_id),
                target_id,
            } => {
                let parent = find_mut(&mut next.comments, parent_id)?;
                let idx = position(&parent.reply_window, target_id)?;
                let window = Arc::make_mut(&mut parent.reply_window);
                window.remove(idx);
                parent.reply_total_count = window.len();
            }
        }
        Some(next)
    }

    /// Replaces this snapshot with the result of `action`, returns false if it was ignored
    pub fn dispatch(&mut self, action: &Action) -> bool {
        match self.apply(action) {
            Some(next) => {
                *self = next;
                true
            }
            None => false,
        }
    }
}

fn position(comments: &[Arc<Comment>], id: &CommentId) -> Option<usize> {
    comments.iter().position(|c| c.id == *id)
}

// Looks the comment up before copying anything, so that a miss leaves `comments` shared
fn find_mut<'a>(
    comments: &'a mut Arc<Vec<Arc<Comment>>>,
    id: &CommentId,
) -> Option<&'a mut Comment> {
    let idx = position(comments, id)?;
    Some(Arc::make_mut(&mut Arc::make_mut(comments)[idx]))
}

/// Appends the payload, returning the new length
fn extend(comments: &mut Arc<Vec<Arc<Comment>>>, payload: &[api::Comment]) -> usize {
    if payload.is_empty() {
        return comments.len();
    }
    let comments = Arc::make_mut(comments);
    comments.extend(payload.iter().cloned().map(|c| Arc::new(Comment::from(c))));
    comments.len()
}
