use std::sync::Arc;

use kuchikiki::{NodeData, NodeRef};
use tracing::warn;

use crate::error::ChanError;
use crate::html;
use crate::model::{Post, PostBuilder};
use crate::site::Site;
use crate::text::{StyledText, Theme};

use super::{CommentParser, ParseCallback, ParseContext};

/// Turns a wire-format post builder into a finished [`Post`], styling its
/// comment HTML along the way.
///
/// Shared read-only across the parser worker pool.
pub struct PostParser {
    comment_parser: CommentParser,
    theme: Theme,
    site: Arc<Site>,
}

impl PostParser {
    pub fn new(site: Arc<Site>, theme: Theme) -> Self {
        Self {
            comment_parser: CommentParser::default(),
            theme,
            site,
        }
    }

    /// Use a customized comment parser, for sites that extend the default
    /// rule table.
    pub fn with_comment_parser(site: Arc<Site>, theme: Theme, comment_parser: CommentParser) -> Self {
        Self {
            comment_parser,
            theme,
            site,
        }
    }

    pub fn parse(&self, mut builder: PostBuilder, callback: &dyn ParseCallback) -> Result<Post, ChanError> {
        if let Some(name) = &builder.name {
            builder.name = Some(html_escape::decode_html_entities(name).into_owned());
        }

        if let Some(subject) = &builder.subject {
            builder.subject = Some(html_escape::decode_html_entities(subject).into_owned());
        }

        if !builder.raw_comment.is_empty() && !builder.comment_suppressed() {
            // Soft hyphenation markers carry no content.
            let raw = builder.raw_comment.replace("<wbr>", "");

            let styled = match self.parse_comment(&raw, &mut builder, callback) {
                Ok(styled) => styled,
                Err(err) => {
                    warn!(post = builder.no, "Error parsing comment HTML: {}", err);

                    StyledText::new()
                }
            };

            builder.styled_comment = Some(styled);
        }

        builder.build()
    }

    fn parse_comment(
        &self,
        raw: &str,
        builder: &mut PostBuilder,
        callback: &dyn ParseCallback,
    ) -> Result<StyledText, ChanError> {
        let body = html::parse_fragment(raw)?;

        let mut ctx = ParseContext {
            theme: &self.theme,
            site: &self.site,
            post: builder,
            callback,
        };

        let mut result = StyledText::new();

        for child in body.children() {
            result.append(self.parse_node(&mut ctx, &child, true));
        }

        Ok(result)
    }

    /// Bottom-up: children are styled first, then the element's own rules run
    /// over their concatenation.
    ///
    /// `linkify` turns off URL and quote detection in text runs; link elements
    /// clear it for their subtree so their text is not classified twice.
    fn parse_node(&self, ctx: &mut ParseContext, node: &NodeRef, linkify: bool) -> StyledText {
        match node.data() {
            NodeData::Text(text) if linkify => self.comment_parser.handle_text(ctx, &text.borrow()),
            NodeData::Text(text) => StyledText::plain(text.borrow().as_str()),
            NodeData::Element(data) => {
                let child_linkify =
                    linkify && html::tag_name(data) != "a" && !html::has_class(data, "deadlink");

                let mut inner = StyledText::new();

                for child in node.children() {
                    inner.append(self.parse_node(ctx, &child, child_linkify));
                }

                self.comment_parser.handle_tag(ctx, node, data, inner)
            }
            _ => StyledText::new(),
        }
    }
}
