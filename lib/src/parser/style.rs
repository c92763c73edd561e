use std::collections::HashMap;

/// A single style-producing step in a rule chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleAction {
    /// Discard the inner text entirely.
    Discard,
    /// Emit a trailing newline, unless the element is the last child.
    BlockLineBreak,
    /// Replace the text with a single newline.
    Newline,
    /// Replace the text with the element's `src` attribute.
    Src,
    /// Trim trailing whitespace.
    Chomp,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Monospace,
    Code,
    Spoiler,
    /// Foreground color for `>greentext`.
    InlineQuoteColor,
    /// Apply the element's `color` attribute (`<font>`).
    FontColor,
    /// Apply the element's `size` attribute (`<font>`).
    FontSize,
    /// Apply inline `style="..."` CSS. Runs once per element regardless of
    /// whether a rule names it.
    InlineCss,
    /// Delegate to the anchor link classifier.
    Anchor,
    /// Dead `>>123` link handling.
    DeadLink,
    /// Flatten tabular markup to a "key: value" text block.
    Table,
}

/// Dispatch table mapping an HTML tag (optionally qualified by CSS class) to a
/// chain of style actions.
///
/// Chains are composable: registering a tag again appends to the existing
/// chain, and applying chain `[A, B]` then `C` equals applying `[A, B, C]`.
/// Per-site customizations are expressed as another table merged over the
/// shared defaults with [`RuleTable::merge_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleTable {
    wildcard: HashMap<String, Vec<StyleAction>>,
    specific: HashMap<String, HashMap<String, Vec<StyleAction>>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_tag(&mut self, tag: &str, actions: &[StyleAction]) {
        self.wildcard.entry(tag.to_owned()).or_default().extend_from_slice(actions);
    }

    pub fn map_tag_class(&mut self, tag: &str, css_class: &str, actions: &[StyleAction]) {
        self.specific
            .entry(tag.to_owned())
            .or_default()
            .entry(css_class.to_owned())
            .or_default()
            .extend_from_slice(actions);
    }

    pub fn merge_with(&mut self, other: &RuleTable) {
        for (tag, actions) in &other.wildcard {
            self.map_tag(tag, actions);
        }

        for (tag, class_map) in &other.specific {
            for (css_class, actions) in class_map {
                self.map_tag_class(tag, css_class, actions);
            }
        }
    }

    /// Resolve the chain for an element.
    ///
    /// An exact (tag, class) rule matching one of the element's classes wins
    /// over a wildcard (tag) rule; no match at all means the inner text
    /// passes through unchanged.
    pub fn resolve(&self, tag: &str, classes: &[String]) -> Option<&[StyleAction]> {
        if let Some(class_map) = self.specific.get(tag) {
            for css_class in classes {
                if let Some(chain) = class_map.get(css_class) {
                    return Some(chain);
                }
            }
        }

        self.wildcard.get(tag).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn specific_rule_wins_over_wildcard() {
        let mut table = RuleTable::new();
        table.map_tag("span", &[StyleAction::InlineCss]);
        table.map_tag_class("span", "quote", &[StyleAction::InlineQuoteColor]);

        assert_eq!(
            table.resolve("span", &classes(&["quote"])),
            Some(&[StyleAction::InlineQuoteColor][..])
        );
        assert_eq!(
            table.resolve("span", &classes(&["fortune"])),
            Some(&[StyleAction::InlineCss][..])
        );
        assert_eq!(table.resolve("blink", &[]), None);
    }

    #[test]
    fn reregistering_appends_to_the_chain() {
        let mut table = RuleTable::new();
        table.map_tag("b", &[StyleAction::Bold]);
        table.map_tag("b", &[StyleAction::Underline]);

        assert_eq!(
            table.resolve("b", &[]),
            Some(&[StyleAction::Bold, StyleAction::Underline][..])
        );
    }

    #[test]
    fn merge_is_associative() {
        let mut a = RuleTable::new();
        a.map_tag("b", &[StyleAction::Bold]);

        let mut b = RuleTable::new();
        b.map_tag("b", &[StyleAction::Underline]);

        let mut c = RuleTable::new();
        c.map_tag("b", &[StyleAction::Italic]);

        // (a + b) + c
        let mut left = a.clone();
        left.merge_with(&b);
        left.merge_with(&c);

        // a + (b + c)
        let mut bc = b;
        bc.merge_with(&c);
        let mut right = a;
        right.merge_with(&bc);

        assert_eq!(left, right);
        assert_eq!(
            left.resolve("b", &[]),
            Some(&[StyleAction::Bold, StyleAction::Underline, StyleAction::Italic][..])
        );
    }
}
