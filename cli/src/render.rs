use std::collections::BTreeSet;
use std::fmt::Write;

use yotsuba::model::Post;
use yotsuba::text::{Color, Span, Style, StyledText};

const RESET: &str = "\x1b[0m";

/// Renders posts as terminal text, optionally with ANSI styling.
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn post_header(&self, post: &Post) -> String {
        let mut header = String::new();

        let _ = write!(header, "No.{}", post.no);

        if let Some(name) = post.name.as_deref() {
            let _ = write!(header, " {}", name);
        }

        if let Some(tripcode) = post.tripcode.as_deref() {
            let _ = write!(header, " {}", tripcode);
        }

        if let Some(timestamp) = post.timestamp {
            let _ = write!(header, " {}", timestamp.format("%Y-%m-%d %H:%M:%S"));
        }

        let reply_count = post.replies_from().len();
        if reply_count > 0 {
            let _ = write!(header, " ({} replies)", reply_count);
        }

        for flag in [
            (post.sticky, "[sticky]"),
            (post.closed, "[closed]"),
            (post.archived, "[archived]"),
            (post.deleted(), "[deleted]"),
            (post.filter_hide, "[hidden]"),
        ]
        .iter()
        .filter_map(|(set, label)| set.then_some(label))
        {
            let _ = write!(header, " {}", flag);
        }

        header
    }

    pub fn comment(&self, text: &StyledText) -> String {
        if !self.color {
            return text.text().to_owned();
        }

        // Emit ANSI codes at span boundaries; the active style set is
        // recomputed per segment so nested spans come out right.
        let mut boundaries: BTreeSet<usize> = BTreeSet::new();
        boundaries.insert(0);
        boundaries.insert(text.len());

        for span in text.spans() {
            boundaries.insert(span.start);
            boundaries.insert(span.end);
        }

        let mut result = String::with_capacity(text.len());
        let offsets: Vec<usize> = boundaries.into_iter().collect();

        for window in offsets.windows(2) {
            let (start, end) = (window[0], window[1]);
            let segment = &text.text()[start..end];

            let covering: Vec<&Span> = text
                .spans()
                .iter()
                .filter(|span| span.start <= start && span.end >= end)
                .collect();

            let codes = ansi_codes(&covering);

            if codes.is_empty() {
                result.push_str(segment);
            } else {
                let _ = write!(result, "{}{}{}", codes, segment, RESET);
            }
        }

        result
    }
}

fn ansi_codes(spans: &[&Span]) -> String {
    let mut codes = String::new();
    let mut foreground: Option<Color> = None;

    for span in spans {
        match &span.style {
            Style::Bold => codes.push_str("\x1b[1m"),
            Style::Italic => codes.push_str("\x1b[3m"),
            Style::Underline => codes.push_str("\x1b[4m"),
            Style::Strikethrough => codes.push_str("\x1b[9m"),
            // Spoilers render as dim until revealed; there is no reveal in a
            // line-printing CLI.
            Style::Spoiler => codes.push_str("\x1b[2m"),
            // The last covering color wins.
            Style::Foreground(color) => foreground = Some(*color),
            Style::Link(_) => codes.push_str("\x1b[4m"),
            _ => {}
        }
    }

    if let Some(Color(rgb)) = foreground {
        let (r, g, b) = (rgb >> 16 & 0xFF, rgb >> 8 & 0xFF, rgb & 0xFF);
        let _ = write!(codes, "\x1b[38;2;{};{};{}m", r, g, b);
    }

    codes
}
