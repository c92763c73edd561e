use regex::Regex;

use crate::text::Color;

use super::{Board, PostBuilder};

/// What a matching filter does to a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterAction {
    /// Tag the post with a highlight color; parsing continues.
    Color(Color),
    /// Collapse the post to a stub; HTML parsing is skipped.
    Hide,
    /// Drop the post from the result set; HTML parsing is skipped.
    Remove,
}

/// Post field a filter pattern is matched against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterField {
    Comment,
    Subject,
    Name,
    Tripcode,
    PosterId,
    Filename,
    CountryCode,
}

/// An externally supplied post filter, read-only to the pipeline.
///
/// Applied to a [`PostBuilder`] before HTML parsing so that hide/remove
/// actions can short-circuit the parsing cost.
#[derive(Clone, Debug)]
pub struct PostFilter {
    /// Board codes this filter applies to. `None` means all boards.
    pub boards: Option<Vec<String>>,
    pub pattern: Regex,
    pub fields: Vec<FilterField>,
    pub action: FilterAction,
}

impl PostFilter {
    pub fn matches_board(&self, board: &Board) -> bool {
        match &self.boards {
            Some(boards) => boards.iter().any(|code| *code == board.code),
            None => true,
        }
    }

    pub fn matches(&self, post: &PostBuilder) -> bool {
        self.fields.iter().any(|field| {
            let value = match field {
                FilterField::Comment => Some(post.raw_comment.as_str()),
                FilterField::Subject => post.subject.as_deref(),
                FilterField::Name => post.name.as_deref(),
                FilterField::Tripcode => post.tripcode.as_deref(),
                FilterField::PosterId => post.poster_id.as_deref(),
                FilterField::Filename => post.images.first().map(|image| image.filename.as_str()),
                FilterField::CountryCode => post.country_code.as_deref(),
            };

            value.is_some_and(|value| self.pattern.is_match(value))
        })
    }
}

/// Apply board-scoped filters in declaration order.
///
/// The first matching hide/remove action wins and stops further matching;
/// color actions set the highlight marker and matching continues.
pub fn apply_filters(filters: &[PostFilter], post: &mut PostBuilder) {
    for filter in filters {
        if !filter.matches(post) {
            continue;
        }

        match filter.action {
            FilterAction::Color(color) => {
                post.filter_highlight = Some(color);
            }
            FilterAction::Hide => {
                post.filter_hide = true;
                break;
            }
            FilterAction::Remove => {
                post.filter_remove = true;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(pattern: &str, action: FilterAction) -> PostFilter {
        PostFilter {
            boards: None,
            pattern: Regex::new(pattern).unwrap(),
            fields: vec![FilterField::Comment, FilterField::Name],
            action,
        }
    }

    #[test]
    fn board_scope() {
        let mut f = filter("spam", FilterAction::Hide);
        f.boards = Some(vec!["g".to_owned(), "a".to_owned()]);

        assert!(f.matches_board(&Board::new("4chan", "g")));
        assert!(!f.matches_board(&Board::new("4chan", "v")));
    }

    #[test]
    fn first_hide_match_wins() {
        let mut post = PostBuilder {
            raw_comment: "buy spam now".to_owned(),
            ..Default::default()
        };

        apply_filters(
            &[
                filter("nomatch", FilterAction::Remove),
                filter("spam", FilterAction::Hide),
                filter("now", FilterAction::Remove),
            ],
            &mut post,
        );

        assert!(post.filter_hide);
        assert!(!post.filter_remove);
    }

    #[test]
    fn color_does_not_short_circuit() {
        let mut post = PostBuilder {
            raw_comment: "spam".to_owned(),
            ..Default::default()
        };

        apply_filters(
            &[
                filter("spam", FilterAction::Color(Color(0xFF0000))),
                filter("spam", FilterAction::Hide),
            ],
            &mut post,
        );

        assert_eq!(post.filter_highlight, Some(Color(0xFF0000)));
        assert!(post.filter_hide);
    }
}
