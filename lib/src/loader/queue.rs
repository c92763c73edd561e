use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::model::{Loadable, OpMeta, Post, PostBuilder};

/// Accumulates the outcome of sieving a response against the cached snapshot:
/// cached posts reused as-is, and wire builders that still need parsing.
///
/// The reader fills one queue per load; the loader drains it through the
/// parser pool and reconciles the result.
pub struct ProcessingQueue {
    loadable: Loadable,
    cached_by_no: HashMap<u64, Arc<Post>>,
    to_reuse: Vec<Arc<Post>>,
    to_parse: Vec<PostBuilder>,
    response_nos: BTreeSet<u64>,
    op: Option<OpMeta>,
}

impl ProcessingQueue {
    pub fn new(loadable: Loadable, cached: &[Arc<Post>]) -> Self {
        Self {
            loadable,
            cached_by_no: cached.iter().map(|post| (post.no, Arc::clone(post))).collect(),
            to_reuse: Vec::new(),
            to_parse: Vec::new(),
            response_nos: BTreeSet::new(),
            op: None,
        }
    }

    pub fn loadable(&self) -> &Loadable {
        &self.loadable
    }

    /// The cached post with this number, if any.
    pub fn cached_post(&self, no: u64) -> Option<&Arc<Post>> {
        self.cached_by_no.get(&no)
    }

    pub fn add_for_reuse(&mut self, post: Arc<Post>) {
        self.response_nos.insert(post.no);
        self.to_reuse.push(post);
    }

    pub fn add_for_parse(&mut self, builder: PostBuilder) {
        self.response_nos.insert(builder.no);
        self.to_parse.push(builder);
    }

    /// Root-object OP fields of the latest response; authoritative over
    /// whatever the cached root post carries.
    pub fn set_op(&mut self, op: OpMeta) {
        self.op = Some(op);
    }

    pub fn is_empty(&self) -> bool {
        self.to_reuse.is_empty() && self.to_parse.is_empty()
    }

    pub fn into_parts(self) -> QueueParts {
        // Numbers from the cache count as resolvable too: a quote of a post
        // that was pruned server-side but survives locally still links.
        let mut internal_nos = self.response_nos;
        internal_nos.extend(self.cached_by_no.keys().copied());

        QueueParts {
            loadable: self.loadable,
            reused: self.to_reuse,
            to_parse: self.to_parse,
            internal_nos,
            op: self.op,
        }
    }
}

/// A drained [`ProcessingQueue`].
pub struct QueueParts {
    pub loadable: Loadable,
    pub reused: Vec<Arc<Post>>,
    pub to_parse: Vec<PostBuilder>,
    /// All post numbers resolvable within this load, for quote classification.
    pub internal_nos: BTreeSet<u64>,
    pub op: Option<OpMeta>,
}
