use super::Color;

/// Colors the styling engine embeds into parsed comments.
///
/// Read-only during parsing; safe to share across parser workers.
#[derive(Clone, Debug)]
pub struct Theme {
    /// Post link color (`>>123` quotes).
    pub quote: Color,
    /// Greentext color (`>implying`).
    pub inline_quote: Color,
    /// External link color.
    pub link: Color,
}

impl Default for Theme {
    fn default() -> Self {
        // The classic Yotsuba palette.
        Self {
            quote: Color(0xDD0000),
            inline_quote: Color(0x789922),
            link: Color(0x000080),
        }
    }
}
