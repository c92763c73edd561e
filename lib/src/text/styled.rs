use std::borrow::Cow;

/// 24-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub u32);

impl Color {
    /// Parse a CSS-style color value: `#rgb`, `#rrggbb` or a named color.
    pub fn parse(value: &str) -> Option<Color> {
        let value = value.trim();

        if let Some(hex) = value.strip_prefix('#') {
            return match hex.len() {
                3 => {
                    let n = u32::from_str_radix(hex, 16).ok()?;
                    let (r, g, b) = ((n >> 8) & 0xF, (n >> 4) & 0xF, n & 0xF);

                    Some(Color((r * 0x11) << 16 | (g * 0x11) << 8 | (b * 0x11)))
                }
                6 => u32::from_str_radix(hex, 16).ok().map(Color),
                _ => None,
            };
        }

        let named = match value.to_ascii_lowercase().as_str() {
            "black" => 0x000000,
            "white" => 0xFFFFFF,
            "red" => 0xFF0000,
            "green" => 0x00FF00,
            "blue" => 0x0000FF,
            "yellow" => 0xFFFF00,
            "cyan" | "aqua" => 0x00FFFF,
            "magenta" | "fuchsia" => 0xFF00FF,
            "gray" | "grey" => 0x888888,
            "darkgray" | "darkgrey" => 0x444444,
            "lightgray" | "lightgrey" => 0xCCCCCC,
            "lime" => 0x00FF00,
            "maroon" => 0x800000,
            "navy" => 0x000080,
            "olive" => 0x808000,
            "orange" => 0xFFA500,
            "purple" => 0x800080,
            "silver" => 0xC0C0C0,
            "teal" => 0x008080,
            _ => return None,
        };

        Some(Color(named))
    }
}

/// Board, thread and post number combination identifying a post in another thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadLink {
    pub board: String,
    pub thread_no: Option<u64>,
    pub post_no: Option<u64>,
}

/// Click-behavior metadata attached to a span of styled text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostLink {
    /// Reference to a post in the currently loaded thread.
    Quote(u64),
    /// Reference to a post in another thread on the same site.
    Thread(ThreadLink),
    /// Reference that resolves through an archive site.
    Archive(ThreadLink),
    /// Bare board reference.
    Board(String),
    /// Catalog search on a board.
    Search { board: String, query: String },
    /// Generic external URL.
    Url(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Monospace,
    Code,
    Spoiler,
    Foreground(Color),
    Background(Color),
    /// Relative font size in percent of the base size.
    FontScale(u16),
    Link(PostLink),
}

/// A single style annotation over a byte range of the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub style: Style,
}

/// Text annotated with presentation and click-behavior metadata.
///
/// Spans are byte ranges into the text and may nest; they never overlap
/// partially since they are produced bottom-up over an element tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyledText {
    text: String,
    spans: Vec<Span>,
}

impl StyledText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        let mut result = Self::plain(text);
        result.apply(style);

        result
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append plain text with no styling.
    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Append another styled text, shifting its spans past the current end.
    pub fn append(&mut self, other: StyledText) {
        let offset = self.text.len();

        self.text.push_str(&other.text);
        self.spans.extend(other.spans.into_iter().map(|mut span| {
            span.start += offset;
            span.end += offset;
            span
        }));
    }

    /// Apply a style to the entire current text.
    pub fn apply(&mut self, style: Style) {
        if self.text.is_empty() {
            return;
        }

        self.spans.push(Span {
            start: 0,
            end: self.text.len(),
            style,
        });
    }

    /// Apply a style to a byte range of the current text.
    pub fn apply_range(&mut self, start: usize, end: usize, style: Style) {
        if start >= end || end > self.text.len() {
            return;
        }

        self.spans.push(Span { start, end, style });
    }

    /// Trim trailing whitespace, dropping or clamping spans that extended into it.
    pub fn chomp(&mut self) {
        let new_len = self.text.trim_end().len();
        if new_len == self.text.len() {
            return;
        }

        self.text.truncate(new_len);
        self.spans.retain_mut(|span| {
            span.end = span.end.min(new_len);
            span.start < span.end
        });
    }

    pub fn concat(parts: impl IntoIterator<Item = StyledText>) -> Self {
        let mut result = Self::new();

        for part in parts {
            result.append(part);
        }

        result
    }

    /// All link annotations in span order.
    pub fn links(&self) -> impl Iterator<Item = &PostLink> {
        self.spans.iter().filter_map(|span| match &span.style {
            Style::Link(link) => Some(link),
            _ => None,
        })
    }

    /// The text covered by a span.
    pub fn span_text(&self, span: &Span) -> &str {
        &self.text[span.start..span.end]
    }
}

impl From<&str> for StyledText {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

impl From<String> for StyledText {
    fn from(text: String) -> Self {
        Self::plain(text)
    }
}

impl From<Cow<'_, str>> for StyledText {
    fn from(text: Cow<'_, str>) -> Self {
        Self::plain(text.into_owned())
    }
}
