use std::collections::VecDeque;

use html5ever::LocalName;
use kuchikiki::{ElementData, NodeData, NodeRef};

pub struct FindElements<P> {
    queue: VecDeque<NodeRef>,
    predicate: P,
}

impl<P> Iterator for FindElements<P>
where
    P: Fn(&ElementData) -> bool,
{
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        // Grab next node from the queue
        while let Some(node) = self.queue.pop_front() {
            let mut is_match = false;

            if let NodeData::Element(data) = node.data() {
                let predicate = &self.predicate;

                is_match = predicate(data);
            }

            // Add child nodes to queue
            self.queue.extend(node.children());

            // If the node matched, return it.
            if is_match {
                return Some(node);
            }
        }

        None
    }
}

/// Breadth-first search for elements matching a predicate, starting at (and
/// including) the given node.
pub fn find_elements<P>(node: NodeRef, predicate: P) -> FindElements<P>
where
    P: Fn(&ElementData) -> bool,
{
    FindElements {
        queue: Some(node).into_iter().collect(),
        predicate,
    }
}

pub fn find_elements_by_tag(node: NodeRef, find_name: impl Into<LocalName>) -> impl Iterator<Item = NodeRef> {
    let find_name = find_name.into();

    find_elements(node, move |data: &ElementData| data.name.local == find_name)
}

#[cfg(test)]
mod tests {
    use html5ever::local_name;

    use super::*;
    use crate::html::parse_fragment;

    const HTML: &str = r#"<table><tr><td><b>Model</b></td><td>ABC-1</td></tr><tr><td>ISO</td></tr></table>"#;

    #[test]
    fn finds_elements_in_document_order() {
        let body = parse_fragment(HTML).unwrap();

        let cells: Vec<String> = find_elements_by_tag(body.clone(), local_name!("td"))
            .map(|node| node.text_contents())
            .collect();

        assert_eq!(cells, vec!["Model".to_owned(), "ABC-1".to_owned(), "ISO".to_owned()]);

        let bolds = find_elements_by_tag(body, local_name!("b")).count();
        assert_eq!(bolds, 1);
    }
}
