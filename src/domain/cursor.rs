//! Listing cursor
//!
//! The listing starts without any token; every later request carries the
//! continuation token returned by the previous page.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListCursor {
    /// First request of a listing, no continuation token sent
    #[default]
    Start,
    /// Continue from an opaque token handed out by the remote
    Continue(String),
}

impl ListCursor {
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Start => None,
            Self::Continue(token) => Some(token),
        }
    }

    pub const fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }
}
