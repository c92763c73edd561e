use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use tracing::warn;

use crate::model::{apply_filters, Post, PostBuilder, PostFilter};
use crate::parser::{ParseCallback, PostParser};

/// Parse a batch of wire builders into finished posts across a scoped worker
/// pool.
///
/// Builders are split into contiguous chunks, one per worker, and the chunk
/// results are joined in submission order, so output order always matches
/// input order. Removed posts and posts whose builder fails validation are
/// dropped from the output.
pub fn parse_posts(
    parser: &PostParser,
    filters: &[PostFilter],
    callback: &dyn ParseCallback,
    to_parse: Vec<PostBuilder>,
) -> Vec<Arc<Post>> {
    if to_parse.is_empty() {
        return Vec::new();
    }

    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(to_parse.len());

    if workers <= 1 {
        return to_parse
            .into_iter()
            .filter_map(|builder| parse_one(parser, filters, callback, builder))
            .collect();
    }

    let chunk_size = to_parse.len().div_ceil(workers);
    let mut chunks: Vec<Vec<PostBuilder>> = Vec::with_capacity(workers);
    let mut rest = to_parse;

    while !rest.is_empty() {
        let tail = rest.split_off(rest.len().min(chunk_size));
        chunks.push(std::mem::replace(&mut rest, tail));
    }

    thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .into_iter()
                        .filter_map(|builder| parse_one(parser, filters, callback, builder))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(posts) => posts,
                Err(_) => {
                    warn!("Parser worker panicked; dropping its chunk");
                    Vec::new()
                }
            })
            .collect()
    })
}

fn parse_one(
    parser: &PostParser,
    filters: &[PostFilter],
    callback: &dyn ParseCallback,
    mut builder: PostBuilder,
) -> Option<Arc<Post>> {
    builder.is_saved_reply = callback.is_saved(builder.no);

    apply_filters(filters, &mut builder);

    if builder.filter_remove {
        return None;
    }

    match parser.parse(builder, callback) {
        Ok(post) => Some(Arc::new(post)),
        Err(err) => {
            warn!("Dropping unparsable post: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use regex::Regex;

    use crate::model::{Board, FilterAction, FilterField};
    use crate::site::{Site, SiteEndpoints, SiteKind};
    use crate::text::Theme;

    use super::*;

    struct NoneSaved;

    impl ParseCallback for NoneSaved {
        fn is_internal(&self, _no: u64) -> bool {
            false
        }

        fn is_saved(&self, _no: u64) -> bool {
            false
        }
    }

    fn parser() -> PostParser {
        PostParser::new(
            Arc::new(Site {
                name: "testchan".to_owned(),
                kind: SiteKind::Imageboard,
                archives: false,
                endpoints: SiteEndpoints {
                    thread: "https://a.example.org/{board}/thread/{no}.json".to_owned(),
                    catalog: "https://a.example.org/{board}/catalog.json".to_owned(),
                    image: "https://i.example.org/{board}/{tim}.{ext}".to_owned(),
                    thumbnail: "https://i.example.org/{board}/{tim}s.jpg".to_owned(),
                    flag: None,
                },
            }),
            Theme::default(),
        )
    }

    fn builders(count: u64) -> Vec<PostBuilder> {
        (1..=count)
            .map(|no| PostBuilder {
                no,
                op: no == 1,
                op_id: 1,
                board: Some(Board::new("testchan", "g")),
                raw_comment: format!("post number {}", no),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn preserves_submission_order() {
        let parser = parser();
        let posts = parse_posts(&parser, &[], &NoneSaved, builders(50));

        let nos: Vec<u64> = posts.iter().map(|post| post.no).collect();
        assert_eq!(nos, (1..=50).collect::<Vec<u64>>());
    }

    #[test]
    fn removed_posts_are_dropped_hidden_posts_are_kept() {
        let parser = parser();

        let filters = [
            PostFilter {
                boards: None,
                pattern: Regex::new("number 2$").unwrap(),
                fields: vec![FilterField::Comment],
                action: FilterAction::Remove,
            },
            PostFilter {
                boards: None,
                pattern: Regex::new("number 3$").unwrap(),
                fields: vec![FilterField::Comment],
                action: FilterAction::Hide,
            },
        ];

        let posts = parse_posts(&parser, &filters, &NoneSaved, builders(4));

        let nos: BTreeSet<u64> = posts.iter().map(|post| post.no).collect();
        assert_eq!(nos, [1, 3, 4].into_iter().collect());

        let hidden = posts.iter().find(|post| post.no == 3).unwrap();
        assert!(hidden.filter_hide);
        assert!(hidden.styled_comment.is_empty());
    }
}
