use std::sync::Arc;

use crate::{
    api::{self, Bookmark, OrderingKey},
    Comment,
};

/// Anything listed in ordering-key order by the store
pub trait Keyed {
    fn ordering_key(&self) -> OrderingKey;
}

impl Keyed for OrderingKey {
    fn ordering_key(&self) -> OrderingKey {
        *self
    }
}

impl Keyed for api::Comment {
    fn ordering_key(&self) -> OrderingKey {
        self.ordering_key
    }
}

impl Keyed for api::Post {
    fn ordering_key(&self) -> OrderingKey {
        self.ordering_key
    }
}

impl Keyed for Comment {
    fn ordering_key(&self) -> OrderingKey {
        self.ordering_key
    }
}

impl<T: Keyed> Keyed for Arc<T> {
    fn ordering_key(&self) -> OrderingKey {
        (**self).ordering_key()
    }
}

/// Derives the bookmark to resume a scope's listing from the items already loaded
///
/// The tracker remembers where its previous scan ended, so that when the sequence only grew it
/// only has to look at the new tail. When the sequence shrank, any remembered position may point
/// past removed items, so it rescans everything.
///
/// The items must be in non-decreasing key order, and between two calls the sequence must have
/// either only grown at its end or only lost items.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CursorTracker {
    last_scan_end: usize,
    last_len: usize,

    /// Cursor returned by the previous computation, and how many items before `last_scan_end`
    /// carried it
    last_cursor: Option<OrderingKey>,
    matches_before_end: usize,
}

impl CursorTracker {
    pub fn new() -> CursorTracker {
        CursorTracker::default()
    }

    pub fn bookmark<T: Keyed>(&mut self, items: &[T]) -> Bookmark {
        let last = match items.last() {
            None => {
                // Nothing can be carried over from a scan of items that are all gone
                *self = CursorTracker::default();
                return Bookmark::start();
            }
            Some(last) => last,
        };
        let cursor = last.ordering_key();

        let offset = if items.len() < self.last_len {
            count_matches(items, cursor)
        } else {
            // The item at the previous end is rescanned, as newly appended items may share its key
            let carried = match self.last_cursor {
                Some(c) if c == cursor => self.matches_before_end,
                _ => 0,
            };
            carried + count_matches(&items[self.last_scan_end..], cursor)
        };

        self.last_scan_end = items.len() - 1;
        self.last_len = items.len();
        self.last_cursor = Some(cursor);
        // the last item always matches the cursor
        self.matches_before_end = offset - 1;

        Bookmark { cursor, offset }
    }
}

fn count_matches<T: Keyed>(items: &[T], cursor: OrderingKey) -> usize {
    items
        .iter()
        .filter(|i| i.ordering_key() == cursor)
        .count()
}
