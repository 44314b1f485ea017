/// Ordering key assigned by the store to every post and comment
///
/// Keys never decrease within a scope, but several items created in the same instant may share a
/// key, which is why a key alone is not enough to resume a listing.
pub type OrderingKey = i64;

/// Resumable position in a scope's listing
///
/// Asking the store for the items after a bookmark returns the items whose key is greater than
/// `cursor`, plus the items whose key equals `cursor` once the first `offset` of them have been
/// skipped.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Bookmark {
    pub cursor: OrderingKey,
    pub offset: usize,
}

impl Bookmark {
    /// Bookmark of an empty listing, that resumes from the very beginning
    pub fn start() -> Bookmark {
        Bookmark {
            cursor: 0,
            offset: 0,
        }
    }

    pub fn is_start(&self) -> bool {
        *self == Bookmark::start()
    }

    /// Returns true iff an item with key `key`, that is the `rank`-th (0-indexed) item with this
    /// key in its scope, comes after this bookmark
    pub fn is_before(&self, key: OrderingKey, rank: usize) -> bool {
        key > self.cursor || (key == self.cursor && rank >= self.offset)
    }
}

impl Default for Bookmark {
    fn default() -> Bookmark {
        Bookmark::start()
    }
}
