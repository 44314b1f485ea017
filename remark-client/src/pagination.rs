use std::collections::HashSet;

use crate::{
    api::{Bookmark, CommentId, OrderingKey},
    CursorTracker, Keyed,
};

/// An independently paginated list: the top-level comments, or one comment's replies
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scope {
    TopLevel,
    Replies(CommentId),
}

impl Scope {
    pub fn of(parent_id: Option<CommentId>) -> Scope {
        match parent_id {
            None => Scope::TopLevel,
            Some(p) => Scope::Replies(p),
        }
    }

    pub fn parent_id(&self) -> Option<CommentId> {
        match self {
            Scope::TopLevel => None,
            Scope::Replies(p) => Some(*p),
        }
    }
}

/// What the rendering side needs to drive a scope's fetch-more
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageStatus {
    pub cursor: OrderingKey,
    pub offset: usize,
    pub no_more: bool,
}

/// Pagination state of one scope
#[derive(Clone, Debug)]
pub struct Pagination {
    page_size: usize,
    tracker: CursorTracker,
    bookmark: Bookmark,
    len: usize,

    /// Bumped every time the scope's items change, so that responses to requests issued
    /// before can be recognized
    epoch: u64,

    last_page_len: Option<usize>,
    in_flight: HashSet<Bookmark>,

    /// Set when a refresh was wanted while its bookmark was already being fetched
    pub(crate) pending_refresh: bool,
}

impl Pagination {
    pub fn new(page_size: usize) -> Pagination {
        Pagination {
            page_size: std::cmp::max(page_size, 1),
            tracker: CursorTracker::new(),
            bookmark: Bookmark::start(),
            len: 0,
            epoch: 0,
            last_page_len: None,
            in_flight: HashSet::new(),
            pending_refresh: false,
        }
    }

    pub fn bookmark(&self) -> Bookmark {
        self.bookmark
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns true iff the last page shows the store has nothing more for this scope
    ///
    /// A page shorter than the page size ends the listing. A full last page cannot be told apart
    /// from a full page with more to come, so it is followed by one more fetch, which comes back
    /// empty and ends the listing.
    pub fn no_more(&self) -> bool {
        match self.last_page_len {
            None => false,
            Some(0) => true,
            Some(len) => len % self.page_size != 0,
        }
    }

    pub fn status(&self) -> PageStatus {
        PageStatus {
            cursor: self.bookmark.cursor,
            offset: self.bookmark.offset,
            no_more: self.no_more(),
        }
    }

    /// Records the scope's items after a change
    pub fn observe<T: Keyed>(&mut self, items: &[T]) {
        let bookmark = self.tracker.bookmark(items);
        if bookmark != self.bookmark || items.len() != self.len {
            self.epoch += 1;
        }
        self.bookmark = bookmark;
        self.len = items.len();
    }

    /// Records the length of a page successfully received from the store
    pub fn page_loaded(&mut self, len: usize) {
        self.last_page_len = Some(len);
    }

    /// Reserves the current bookmark for a fetch, None if it is already being fetched
    pub fn begin(&mut self) -> Option<Bookmark> {
        match self.in_flight.insert(self.bookmark) {
            true => Some(self.bookmark),
            false => None,
        }
    }

    pub fn finish(&mut self, bookmark: Bookmark) {
        self.in_flight.remove(&bookmark);
    }
}
