use std::hash::{Hash, Hasher};

use super::Board;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadableMode {
    Catalog,
    Thread,
}

/// Identifies what is being viewed: a board catalog or a single thread.
///
/// Equality considers only the board and thread number, so a `Loadable` can be
/// used as the key to locate a pinned or watched thread regardless of scroll
/// position or title.
#[derive(Clone, Debug)]
pub struct Loadable {
    pub mode: LoadableMode,
    pub board: Board,
    /// Thread root post number. Zero in catalog mode.
    pub no: u64,
    /// Scroll position memo, used to restore position across reloads.
    pub list_index: usize,
    pub list_top: i32,
    pub title: Option<String>,
}

impl Loadable {
    pub fn catalog(board: Board) -> Self {
        Self {
            mode: LoadableMode::Catalog,
            board,
            no: 0,
            list_index: 0,
            list_top: 0,
            title: None,
        }
    }

    pub fn thread(board: Board, no: u64) -> Self {
        Self {
            mode: LoadableMode::Thread,
            board,
            no,
            list_index: 0,
            list_top: 0,
            title: None,
        }
    }

    pub fn is_thread_mode(&self) -> bool {
        self.mode == LoadableMode::Thread
    }

    pub fn is_catalog_mode(&self) -> bool {
        self.mode == LoadableMode::Catalog
    }
}

impl PartialEq for Loadable {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board && self.no == other.no
    }
}

impl Eq for Loadable {}

impl Hash for Loadable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.board.hash(state);
        self.no.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_scroll_position_and_title() {
        let board = Board::new("4chan", "g");

        let mut a = Loadable::thread(board.clone(), 123);
        a.list_index = 7;
        a.title = Some("some thread".to_owned());

        let b = Loadable::thread(board.clone(), 123);

        assert_eq!(a, b);
        assert_ne!(a, Loadable::thread(board, 124));
    }
}
