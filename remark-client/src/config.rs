use crate::Scope;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Client settings, these must agree with the store's own page sizes
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of top-level comments (and posts) the store returns per page
    pub page_size: usize,

    /// Number of replies the store returns per page
    pub reply_page_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            page_size: DEFAULT_PAGE_SIZE,
            reply_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn with_page_size(page_size: usize) -> Config {
        Config {
            page_size,
            reply_page_size: page_size,
        }
    }

    pub fn page_size_for(&self, scope: Scope) -> usize {
        match scope {
            Scope::TopLevel => self.page_size,
            Scope::Replies(_) => self.reply_page_size,
        }
    }
}
