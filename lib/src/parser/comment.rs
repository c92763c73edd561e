use html5ever::local_name;
use kuchikiki::{ElementData, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::html;
use crate::text::{Color, PostLink, Style, StyledText, ThreadLink};

use super::{ParseContext, RuleTable, StyleAction};

const OP_REPLY_SUFFIX: &str = " (OP)";
const SAVED_REPLY_OTHER_SUFFIX: &str = " (You)";
const SAVED_REPLY_SELF_SUFFIX: &str = " (Me)";
const EXTERN_THREAD_SUFFIX: &str = " \u{2192}";

static FULL_QUOTE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(\w+)/\w+/(\d+)#p?(\d+)$").expect("invalid full quote pattern"));
static QUOTE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*#p?(\d+)$").expect("invalid quote pattern"));
static BOARD_LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?:?)?(?://boards\.4chan.*?\.org)?/(.*?)/(?:catalog)?$").expect("invalid board link pattern")
});
static BOARD_SEARCH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^//boards\.4chan.*?\.org/(.*?)/catalog#s=(.*)$").expect("invalid search pattern"));
static ABS_CROSS_THREAD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^//boards\.4chan.*?\.org/\w+/thread/\d+#p?\d+$").expect("invalid cross thread pattern"));
static TEXT_QUOTE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r">>(\d+)").expect("invalid text quote pattern"));

/// Rule-driven HTML element styler.
///
/// One instance is built per site and shared read-only across parser workers.
/// Elements with no matching rule pass their inner text through unchanged, so
/// unknown markup degrades to plain text instead of being lost.
pub struct CommentParser {
    rules: RuleTable,
}

impl CommentParser {
    /// A parser with only the structural line-break rules registered.
    pub fn new() -> Self {
        let mut rules = RuleTable::new();

        rules.map_tag("p", &[StyleAction::BlockLineBreak]);
        rules.map_tag("div", &[StyleAction::BlockLineBreak]);
        rules.map_tag("br", &[StyleAction::Newline]);

        Self { rules }
    }

    /// Register the shared default rules covering the common imageboard markup.
    pub fn with_default_rules(mut self) -> Self {
        let rules = &mut self.rules;

        rules.map_tag_class("span", "abbr", &[StyleAction::Discard]);
        rules.map_tag("iframe", &[StyleAction::Src]);

        rules.map_tag("strong", &[StyleAction::Bold]);
        rules.map_tag("b", &[StyleAction::Bold]);
        rules.map_tag("strike", &[StyleAction::Strikethrough]);
        rules.map_tag("i", &[StyleAction::Italic]);
        rules.map_tag("em", &[StyleAction::Italic]);
        rules.map_tag("u", &[StyleAction::Underline]);
        rules.map_tag("font", &[StyleAction::FontColor, StyleAction::FontSize]);

        rules.map_tag("span", &[StyleAction::InlineCss]);
        rules.map_tag_class("span", "quote", &[StyleAction::InlineQuoteColor]);
        rules.map_tag_class("span", "spoiler", &[StyleAction::Spoiler]);
        rules.map_tag_class("span", "deadlink", &[StyleAction::DeadLink]);
        rules.map_tag("s", &[StyleAction::Spoiler]);

        rules.map_tag("pre", &[StyleAction::Monospace]);
        rules.map_tag_class("pre", "prettyprint", &[StyleAction::Code, StyleAction::Chomp]);

        rules.map_tag("a", &[StyleAction::Anchor]);
        rules.map_tag("table", &[StyleAction::Table]);

        self
    }

    /// Merge per-site rules over the current table. Chains for tags registered
    /// on both sides are appended, not replaced.
    pub fn add_rules(&mut self, rules: &RuleTable) {
        self.rules.merge_with(rules);
    }

    /// Style an element given the already-styled concatenation of its children.
    pub fn handle_tag(&self, ctx: &mut ParseContext, node: &NodeRef, data: &ElementData, text: StyledText) -> StyledText {
        let tag = html::tag_name(data);
        let classes = html::classes(data);

        let mut result = text;
        let mut inline_css_applied = false;

        if let Some(chain) = self.rules.resolve(&tag, &classes) {
            for action in chain {
                if *action == StyleAction::InlineCss {
                    inline_css_applied = true;
                }

                result = self.apply_action(ctx, node, data, *action, result);
            }
        }

        // Inline CSS applies to every element, whether or not a rule names it,
        // but never twice.
        if !inline_css_applied {
            apply_inline_css(data, &mut result);
        }

        result
    }

    /// Style a bare text node, detecting unmarked URLs and `>>123` quotes.
    pub fn handle_text(&self, ctx: &mut ParseContext, text: &str) -> StyledText {
        let mut result = StyledText::new();
        let mut pos = 0;

        for fragment in scan_text_fragments(text) {
            result.push_str(&text[pos..fragment.start]);

            let fragment_text = &text[fragment.start..fragment.end];

            match fragment.kind {
                TextFragmentKind::Url => {
                    result.append(StyledText::styled(
                        fragment_text,
                        Style::Link(PostLink::Url(fragment_text.to_owned())),
                    ));
                }
                TextFragmentKind::Quote(no) => {
                    // Quotes only link when they resolve inside the loaded set;
                    // anything else stays plain text.
                    if ctx.callback.is_internal(no) {
                        let styled = self.add_reply(ctx, StyledText::plain(fragment_text), PostLink::Quote(no));
                        result.append(styled);
                    } else {
                        result.push_str(fragment_text);
                    }
                }
            }

            pos = fragment.end;
        }

        result.push_str(&text[pos..]);

        result
    }

    fn apply_action(
        &self,
        ctx: &mut ParseContext,
        node: &NodeRef,
        data: &ElementData,
        action: StyleAction,
        mut text: StyledText,
    ) -> StyledText {
        match action {
            StyleAction::Discard => StyledText::new(),
            StyleAction::BlockLineBreak => {
                if node.next_sibling().is_some() {
                    text.push_str("\n");
                }

                text
            }
            StyleAction::Newline => StyledText::plain("\n"),
            StyleAction::Src => StyledText::plain(html::get_attr(data, local_name!("src")).unwrap_or_default()),
            StyleAction::Chomp => {
                text.chomp();
                text
            }
            StyleAction::Bold => {
                text.apply(Style::Bold);
                text
            }
            StyleAction::Italic => {
                text.apply(Style::Italic);
                text
            }
            StyleAction::Underline => {
                text.apply(Style::Underline);
                text
            }
            StyleAction::Strikethrough => {
                text.apply(Style::Strikethrough);
                text
            }
            StyleAction::Monospace => {
                text.apply(Style::Monospace);
                text
            }
            StyleAction::Code => {
                text.apply(Style::Code);
                text
            }
            StyleAction::Spoiler => {
                text.apply(Style::Spoiler);
                text
            }
            StyleAction::InlineQuoteColor => {
                text.apply(Style::Foreground(ctx.theme.inline_quote));
                text
            }
            StyleAction::FontColor => {
                if let Some(color) = html::get_attr(data, local_name!("color")).and_then(|v| Color::parse(&v)) {
                    text.apply(Style::Foreground(color));
                }

                text
            }
            StyleAction::FontSize => {
                if let Some(scale) = html::get_attr(data, local_name!("size")).and_then(|v| font_size_scale(&v)) {
                    text.apply(Style::FontScale(scale));
                }

                text
            }
            StyleAction::InlineCss => {
                apply_inline_css(data, &mut text);
                text
            }
            StyleAction::Anchor => self.handle_anchor(ctx, data, text),
            StyleAction::DeadLink => self.handle_dead(ctx, node, text),
            StyleAction::Table => self.handle_table(node),
        }
    }

    fn handle_anchor(&self, ctx: &mut ParseContext, data: &ElementData, text: StyledText) -> StyledText {
        let Some(href) = html::get_attr(data, local_name!("href")) else {
            return text;
        };

        match self.match_anchor(ctx, &href) {
            Some(link) => self.add_reply(ctx, text, link),
            // Unclassifiable hrefs (javascript: and friends) render as plain text.
            None => text,
        }
    }

    /// Classify an anchor href into a link kind.
    fn match_anchor(&self, ctx: &ParseContext, href: &str) -> Option<PostLink> {
        // Absolute cross-board quotes carry a host; reduce them to their path
        // so one pattern covers both forms.
        let href = if ABS_CROSS_THREAD_PATTERN.is_match(href) {
            let after_scheme = &href[2..];
            &after_scheme[after_scheme.find('/')?..]
        } else {
            href
        };

        if let Some(caps) = FULL_QUOTE_PATTERN.captures(href) {
            let board = &caps[1];
            let thread_no: u64 = caps[2].parse().ok()?;
            let post_no: u64 = caps[3].parse().ok()?;

            let same_board = ctx.post.board.as_ref().map(|b| b.code.as_str()) == Some(board);
            if same_board && ctx.callback.is_internal(post_no) {
                return Some(PostLink::Quote(post_no));
            }

            let link = ThreadLink {
                board: board.to_owned(),
                thread_no: Some(thread_no),
                post_no: Some(post_no),
            };

            return Some(if ctx.site.is_archive() {
                PostLink::Archive(link)
            } else {
                PostLink::Thread(link)
            });
        }

        if let Some(caps) = QUOTE_PATTERN.captures(href) {
            return Some(PostLink::Quote(caps[1].parse().ok()?));
        }

        if let Some(caps) = BOARD_SEARCH_PATTERN.captures(href) {
            return Some(PostLink::Search {
                board: caps[1].to_owned(),
                query: percent_decode(&caps[2]),
            });
        }

        if let Some(caps) = BOARD_LINK_PATTERN.captures(href) {
            return Some(PostLink::Board(caps[1].to_owned()));
        }

        // Scheme-relative links inherit https.
        if let Some(rest) = href.strip_prefix("//") {
            return Some(PostLink::Url(format!("https://{rest}")));
        }

        match url::Url::parse(href) {
            Ok(parsed) if parsed.scheme() == "javascript" => None,
            Ok(_) => Some(PostLink::Url(href.to_owned())),
            // Leftover relative hrefs render as plain text.
            Err(_) => None,
        }
    }

    /// Record the quote relation and append the reader-facing suffixes, then
    /// span the whole run as a link.
    fn add_reply(&self, ctx: &mut ParseContext, mut text: StyledText, link: PostLink) -> StyledText {
        match &link {
            PostLink::Quote(no) => {
                let no = *no;
                ctx.post.add_reply_to(no);

                if no == ctx.post.op_id && !text.text().contains(OP_REPLY_SUFFIX) {
                    text.push_str(OP_REPLY_SUFFIX);
                }

                if ctx.callback.is_saved(no) {
                    let suffix = if ctx.post.is_saved_reply {
                        SAVED_REPLY_SELF_SUFFIX
                    } else {
                        SAVED_REPLY_OTHER_SUFFIX
                    };

                    if !text.text().contains(suffix) {
                        text.push_str(suffix);
                    }
                }
            }
            PostLink::Thread(_) => {
                if !text.text().contains(EXTERN_THREAD_SUFFIX) {
                    text.push_str(EXTERN_THREAD_SUFFIX);
                }
            }
            PostLink::Archive(thread_link) if thread_link.post_no.is_none() => {
                if !text.text().contains(EXTERN_THREAD_SUFFIX) {
                    text.push_str(EXTERN_THREAD_SUFFIX);
                }
            }
            _ => {}
        }

        text.apply(Style::Link(link));

        text
    }

    /// Dead `>>123` references: struck out, and resolvable through an archive
    /// when the site has one.
    fn handle_dead(&self, ctx: &mut ParseContext, node: &NodeRef, mut text: StyledText) -> StyledText {
        text.apply(Style::Foreground(ctx.theme.quote));
        text.apply(Style::Strikethrough);

        if !ctx.site.archives && !ctx.site.is_archive() {
            return text;
        }

        let content = node.text_contents();
        let Some(no) = content.strip_prefix(">>").and_then(|n| n.trim().parse::<u64>().ok()) else {
            return text;
        };

        let Some(board) = ctx.post.board.as_ref().map(|b| b.code.clone()) else {
            return text;
        };

        // In an OP a dead number refers to a previous thread; in a reply it is
        // a pruned post in the current thread.
        let link = if ctx.site.is_archive() {
            ThreadLink {
                board,
                thread_no: None,
                post_no: Some(no),
            }
        } else if ctx.post.op {
            ThreadLink {
                board,
                thread_no: Some(no),
                post_no: None,
            }
        } else {
            ThreadLink {
                board,
                thread_no: Some(ctx.post.op_id),
                post_no: Some(no),
            }
        };

        text.apply(Style::Link(PostLink::Archive(link)));

        text
    }

    /// Flatten tabular markup (EXIF dumps and the like) into "key: value" rows.
    fn handle_table(&self, node: &NodeRef) -> StyledText {
        let mut result = StyledText::new();
        let mut first_row = true;

        for row in html::find_elements_by_tag(node.clone(), local_name!("tr")) {
            if row.text_contents().trim().is_empty() {
                continue;
            }

            if !first_row {
                result.push_str("\n");
            }
            first_row = false;

            let cells: Vec<NodeRef> = html::find_elements_by_tag(row.clone(), local_name!("td")).collect();

            for (i, cell) in cells.iter().enumerate() {
                if i > 0 {
                    result.push_str(": ");
                }

                let mut part = StyledText::plain(cell.text_contents());

                // Header cells come through as bold markup.
                if html::find_elements_by_tag(cell.clone(), local_name!("b")).next().is_some() {
                    part.apply(Style::Bold);
                    part.apply(Style::Underline);
                }

                result.append(part);
            }
        }

        result
    }
}

impl Default for CommentParser {
    fn default() -> Self {
        Self::new().with_default_rules()
    }
}

/// Apply recognized properties from a `style="..."` attribute.
fn apply_inline_css(data: &ElementData, text: &mut StyledText) {
    let Some(style_attr) = html::get_attr(data, local_name!("style")) else {
        return;
    };

    for declaration in style_attr.split(';') {
        let mut parts = declaration.splitn(2, ':');
        let (Some(property), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };

        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();

        match property.as_str() {
            "color" => {
                if let Some(color) = Color::parse(value) {
                    text.apply(Style::Foreground(color));
                }
            }
            "background-color" => {
                if let Some(color) = Color::parse(value) {
                    text.apply(Style::Background(color));
                }
            }
            "font-weight" => {
                if is_bold_weight(value) {
                    text.apply(Style::Bold);
                }
            }
            "font-size" => {
                if let Some(scale) = css_font_scale(value) {
                    text.apply(Style::FontScale(scale));
                }
            }
            _ => {}
        }
    }
}

fn is_bold_weight(value: &str) -> bool {
    matches!(value, "bold" | "bolder") || value.parse::<u32>().map(|weight| weight >= 600).unwrap_or(false)
}

fn clamp_scale(percent: f32) -> u16 {
    percent.clamp(25.0, 175.0).round() as u16
}

/// Scale for a `<font size=...>` attribute: absolute 1-7 or relative +n/-n
/// around the default size 3.
fn font_size_scale(value: &str) -> Option<u16> {
    let value = value.trim();
    let relative = value.starts_with('+') || value.starts_with('-');
    let n: i32 = value.parse().ok()?;

    let size = if relative { 3 + n } else { n };

    Some(clamp_scale(size as f32 / 3.0 * 100.0))
}

/// Scale for a CSS font-size value: percent, px, pt or a size keyword.
fn css_font_scale(value: &str) -> Option<u16> {
    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(clamp_scale);
    }

    if let Some(px) = value.strip_suffix("px") {
        return px.trim().parse::<f32>().ok().map(|px| clamp_scale(px / 16.0 * 100.0));
    }

    if let Some(pt) = value.strip_suffix("pt") {
        return pt.trim().parse::<f32>().ok().map(|pt| clamp_scale(pt / 12.0 * 100.0));
    }

    let percent = match value {
        "xx-small" => 25.0,
        "x-small" => 50.0,
        "small" | "smaller" => 75.0,
        "medium" => 100.0,
        "large" | "larger" => 125.0,
        "x-large" => 150.0,
        "xx-large" => 175.0,
        _ => return None,
    };

    Some(clamp_scale(percent))
}

#[derive(Debug, PartialEq, Eq)]
enum TextFragmentKind {
    Url,
    Quote(u64),
}

#[derive(Debug)]
struct TextFragment {
    start: usize,
    end: usize,
    kind: TextFragmentKind,
}

/// Linkable fragments of a bare text run, in order and non-overlapping.
fn scan_text_fragments(text: &str) -> Vec<TextFragment> {
    let mut fragments: Vec<TextFragment> = scan_links(text)
        .into_iter()
        .map(|(start, end)| TextFragment {
            start,
            end,
            kind: TextFragmentKind::Url,
        })
        .collect();

    for caps in TEXT_QUOTE_PATTERN.captures_iter(text) {
        let whole = caps.get(0).expect("capture group 0 always present");

        if fragments.iter().any(|f| whole.start() < f.end && f.start < whole.end()) {
            continue;
        }

        let Ok(no) = caps[1].parse::<u64>() else {
            continue;
        };

        fragments.push(TextFragment {
            start: whole.start(),
            end: whole.end(),
            kind: TextFragmentKind::Quote(no),
        });
    }

    fragments.sort_by_key(|f| f.start);

    fragments
}

/// Find URLs by locating `://` and expanding to the surrounding boundaries.
/// Deliberately permissive about what counts as a URL.
fn scan_links(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find("://") {
        let anchor = pos + offset;

        let mut start = anchor;
        for (i, c) in text[..anchor].char_indices().rev() {
            if is_link_boundary(c) {
                break;
            }

            start = i;
        }

        let after_scheme = anchor + 3;
        let end = text[after_scheme..]
            .char_indices()
            .find(|(_, c)| is_link_boundary(*c))
            .map(|(i, _)| after_scheme + i)
            .unwrap_or(text.len());

        // A bare "://" with no scheme is not a link.
        if start < anchor && end > after_scheme {
            ranges.push((start, end));
        }

        pos = end.max(after_scheme);
    }

    ranges
}

fn is_link_boundary(c: char) -> bool {
    c.is_whitespace() || c == '>'
}

/// Minimal percent-decoding for search queries lifted out of catalog URLs.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok().and_then(|h| u8::from_str_radix(h, 16).ok());

                match hex {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 3;
                    }
                    None => {
                        decoded.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
