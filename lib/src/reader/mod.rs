mod fourchan;

pub use self::fourchan::*;

use crate::error::ChanError;
use crate::loader::ProcessingQueue;

/// Structural decoder for a site's wire format.
///
/// A reader turns a raw response body into queue entries, reusing cached
/// posts where the wire content is unchanged. It never parses comment HTML;
/// that happens later in the parser pool.
pub trait ChanReader: Send + Sync {
    fn load_thread(&self, body: &str, queue: &mut ProcessingQueue) -> Result<(), ChanError>;
    fn load_catalog(&self, body: &str, queue: &mut ProcessingQueue) -> Result<(), ChanError>;
}
