use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::ChanError;
use crate::text::{Color, StyledText};

use super::Board;

/// An image attached to a post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostImage {
    pub url: String,
    pub thumbnail_url: String,
    pub filename: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub spoiler: bool,
    /// Base64 MD5 of the file, as reported by the server.
    pub file_hash: Option<String>,
    pub deleted: bool,
}

/// OP moderation fields that are authoritative only from the root object of
/// the latest response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpMeta {
    pub sticky: bool,
    pub closed: bool,
    pub archived: bool,
    pub reply_count: u32,
    pub image_count: u32,
    pub unique_ips: u32,
}

/// A single post, immutable after construction.
///
/// The only interior-mutable fields are `deleted` and `replies_from`; both are
/// derived from the latest response set and recomputed during reconciliation
/// while the post is shared across snapshots.
#[derive(Debug)]
pub struct Post {
    pub no: u64,
    /// Thread root id. Equal to `no` for the root post itself.
    pub op_id: u64,
    pub board: Board,
    pub subject: Option<String>,
    pub name: Option<String>,
    pub tripcode: Option<String>,
    pub poster_id: Option<String>,
    pub capcode: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub raw_comment: String,
    pub styled_comment: StyledText,
    /// Post numbers this post quotes.
    pub replies_to: BTreeSet<u64>,
    replies_from: RwLock<BTreeSet<u64>>,
    pub images: Vec<PostImage>,
    pub sticky: bool,
    pub closed: bool,
    pub archived: bool,
    deleted: AtomicBool,
    pub reply_count: u32,
    pub image_count: u32,
    pub unique_ips: u32,
    pub filter_highlight: Option<Color>,
    pub filter_hide: bool,
    pub filter_remove: bool,
    pub is_saved_reply: bool,
}

impl Post {
    pub fn is_op(&self) -> bool {
        self.op_id == 0 || self.no == self.op_id
    }

    pub fn deleted(&self) -> bool {
        self.deleted.load(Ordering::Relaxed)
    }

    pub fn set_deleted(&self, deleted: bool) {
        self.deleted.store(deleted, Ordering::Relaxed);
    }

    /// Post numbers that quote this post.
    ///
    /// Derived: always the transpose of `replies_to` over the currently loaded
    /// post set, recomputed in full after every reconciliation.
    pub fn replies_from(&self) -> BTreeSet<u64> {
        self.replies_from.read().expect("replies_from lock poisoned").clone()
    }

    pub fn set_replies_from(&self, replies: BTreeSet<u64>) {
        *self.replies_from.write().expect("replies_from lock poisoned") = replies;
    }

    /// Copy of this post with the OP moderation fields overwritten.
    ///
    /// Used during reconciliation to merge the authoritative root-object data
    /// onto the root post without mutating the shared original.
    pub fn with_op_meta(&self, meta: &OpMeta) -> Post {
        Post {
            no: self.no,
            op_id: self.op_id,
            board: self.board.clone(),
            subject: self.subject.clone(),
            name: self.name.clone(),
            tripcode: self.tripcode.clone(),
            poster_id: self.poster_id.clone(),
            capcode: self.capcode.clone(),
            country_code: self.country_code.clone(),
            country_name: self.country_name.clone(),
            timestamp: self.timestamp,
            raw_comment: self.raw_comment.clone(),
            styled_comment: self.styled_comment.clone(),
            replies_to: self.replies_to.clone(),
            replies_from: RwLock::new(self.replies_from()),
            images: self.images.clone(),
            sticky: meta.sticky,
            closed: meta.closed,
            archived: meta.archived,
            deleted: AtomicBool::new(self.deleted()),
            reply_count: meta.reply_count,
            image_count: meta.image_count,
            unique_ips: meta.unique_ips,
            filter_highlight: self.filter_highlight,
            filter_hide: self.filter_hide,
            filter_remove: self.filter_remove,
            is_saved_reply: self.is_saved_reply,
        }
    }
}

/// Mutable accumulator for fields read from the wire format.
///
/// Setters tolerate any order since JSON key order is not guaranteed; nothing
/// is validated until [`PostBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct PostBuilder {
    pub no: u64,
    pub op_id: u64,
    pub op: bool,
    pub board: Option<Board>,
    pub subject: Option<String>,
    pub name: Option<String>,
    pub tripcode: Option<String>,
    pub poster_id: Option<String>,
    pub capcode: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub raw_comment: String,
    pub styled_comment: Option<StyledText>,
    pub replies_to: BTreeSet<u64>,
    pub images: Vec<PostImage>,
    pub op_meta: OpMeta,
    pub filter_highlight: Option<Color>,
    pub filter_hide: bool,
    pub filter_remove: bool,
    pub is_saved_reply: bool,
}

impl PostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&mut self, image: PostImage) {
        self.images.push(image);
    }

    pub fn add_reply_to(&mut self, no: u64) {
        self.replies_to.insert(no);
    }

    /// True when the comment is suppressed by a filter and HTML parsing can be
    /// skipped entirely.
    pub fn comment_suppressed(&self) -> bool {
        self.filter_hide || self.filter_remove
    }

    /// Finalize into an immutable [`Post`].
    ///
    /// The styled comment must already have been produced by the post parser;
    /// if it was not (empty raw comment, suppressed post), it defaults to the
    /// empty styled text.
    pub fn build(self) -> Result<Post, ChanError> {
        if self.no == 0 {
            return Err(ChanError::MalformedPost("post without a post number".into()));
        }

        let board = self
            .board
            .ok_or_else(|| ChanError::MalformedPost(format!("post {} without a board", self.no).into()))?;

        Ok(Post {
            no: self.no,
            op_id: if self.op { self.no } else { self.op_id },
            board,
            subject: self.subject,
            name: self.name,
            tripcode: self.tripcode,
            poster_id: self.poster_id,
            capcode: self.capcode,
            country_code: self.country_code,
            country_name: self.country_name,
            timestamp: self.timestamp,
            raw_comment: self.raw_comment,
            styled_comment: self.styled_comment.unwrap_or_default(),
            replies_to: self.replies_to,
            replies_from: RwLock::new(BTreeSet::new()),
            images: self.images,
            sticky: self.op_meta.sticky,
            closed: self.op_meta.closed,
            archived: self.op_meta.archived,
            deleted: AtomicBool::new(false),
            reply_count: self.op_meta.reply_count,
            image_count: self.op_meta.image_count,
            unique_ips: self.op_meta.unique_ips,
            filter_highlight: self.filter_highlight,
            filter_hide: self.filter_hide,
            filter_remove: self.filter_remove,
            is_saved_reply: self.is_saved_reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_mandatory_fields() {
        let builder = PostBuilder {
            board: Some(Board::new("4chan", "g")),
            ..Default::default()
        };
        assert!(builder.build().is_err());

        let builder = PostBuilder {
            no: 1,
            ..Default::default()
        };
        assert!(builder.build().is_err());

        let builder = PostBuilder {
            no: 1,
            op: true,
            board: Some(Board::new("4chan", "g")),
            ..Default::default()
        };

        let post = builder.build().unwrap();
        assert_eq!(post.op_id, 1);
        assert!(post.is_op());
        assert!(!post.deleted());
    }
}
