mod element;
mod find_elements;

pub use self::element::*;
pub use self::find_elements::*;

use kuchikiki::traits::TendrilSink;
use kuchikiki::NodeRef;

use crate::error::ChanError;

/// Parse an HTML comment fragment and return its body node.
///
/// Comments arrive as body fragments; the parser wraps them in a full
/// document, so the children of the returned node are the fragment's
/// top-level nodes.
pub fn parse_fragment(html: &str) -> Result<NodeRef, ChanError> {
    let document = kuchikiki::parse_html().one(html);

    let body = document
        .select_first("body")
        .map_err(|_| ChanError::HtmlParse("parsed fragment has no body".into()))?;

    Ok(body.as_node().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_children_are_top_level_nodes() {
        let body = parse_fragment("one<br>two").unwrap();

        assert_eq!(body.children().count(), 3);
        assert_eq!(body.text_contents(), "onetwo");
    }
}
