mod comment;
mod post;
mod style;

pub use self::comment::*;
pub use self::post::*;
pub use self::style::*;

use crate::model::PostBuilder;
use crate::site::Site;
use crate::text::Theme;

/// Lookups into the batch currently being parsed.
///
/// Shared read-only across parser workers, so implementations must be safe
/// for concurrent reads.
pub trait ParseCallback: Send + Sync {
    /// Is this post number part of the currently loaded set?
    fn is_internal(&self, no: u64) -> bool;

    /// Is this post number one of the user's own (saved) replies?
    fn is_saved(&self, no: u64) -> bool;
}

/// State a rule handler may touch while styling one post's comment.
pub struct ParseContext<'a> {
    pub theme: &'a Theme,
    pub site: &'a Site,
    pub post: &'a mut PostBuilder,
    pub callback: &'a dyn ParseCallback,
}
