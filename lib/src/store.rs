use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::model::{Board, PostFilter};

/// External per-user state the pipeline consults while parsing: the user's
/// own posts and their configured filters.
///
/// Read from parser workers, so implementations must tolerate concurrent
/// reads.
pub trait UserData: Send + Sync {
    fn is_saved_reply(&self, board: &Board, no: u64) -> bool;

    /// Filters to apply on this board, in declaration order.
    fn filters_for(&self, board: &Board) -> Vec<PostFilter>;
}

/// In-memory [`UserData`] implementation.
#[derive(Default)]
pub struct MemoryUserData {
    saved_replies: RwLock<BTreeSet<(String, u64)>>,
    filters: RwLock<Vec<PostFilter>>,
}

impl MemoryUserData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_reply(&self, board: &Board, no: u64) {
        self.saved_replies
            .write()
            .expect("saved replies lock poisoned")
            .insert((board.code.clone(), no));
    }

    pub fn add_filter(&self, filter: PostFilter) {
        self.filters.write().expect("filters lock poisoned").push(filter);
    }
}

impl UserData for MemoryUserData {
    fn is_saved_reply(&self, board: &Board, no: u64) -> bool {
        self.saved_replies
            .read()
            .expect("saved replies lock poisoned")
            .contains(&(board.code.clone(), no))
    }

    fn filters_for(&self, board: &Board) -> Vec<PostFilter> {
        self.filters
            .read()
            .expect("filters lock poisoned")
            .iter()
            .filter(|filter| filter.matches_board(board))
            .cloned()
            .collect()
    }
}
