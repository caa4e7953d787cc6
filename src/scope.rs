//! Lexical scopes used to resolve sequence lengths and variant tags.
//!
//! The registry is an arena of named nodes mirroring the decoded field
//! hierarchy. Each node knows its parent by id and its children by name, and
//! is bound to its [`Definition`] once that definition is completely decoded.
//! The seven dynamic scopes of a CTF trace are the roots of the arena.

use crate::definition::Definition;
use crate::error::Error;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handle to a node of a [`ScopeTree`].
///
/// Only meaningful for the tree that produced it, and only until that tree is
/// rewound past the node.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ScopeId(usize);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum DynamicScope {
    Env,
    TracePacketHeader,
    StreamPacketContext,
    StreamEventHeader,
    StreamEventContext,
    EventContext,
    EventFields,
}

/// Leading path tokens that always start an absolute lookup.
pub const RESERVED_KEYWORDS: [&str; 4] = ["env", "trace", "stream", "event"];

impl DynamicScope {
    pub const ALL: [DynamicScope; 7] = [
        DynamicScope::Env,
        DynamicScope::TracePacketHeader,
        DynamicScope::StreamPacketContext,
        DynamicScope::StreamEventHeader,
        DynamicScope::StreamEventContext,
        DynamicScope::EventContext,
        DynamicScope::EventFields,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            DynamicScope::Env => "env",
            DynamicScope::TracePacketHeader => "trace.packet.header",
            DynamicScope::StreamPacketContext => "stream.packet.context",
            DynamicScope::StreamEventHeader => "stream.event.header",
            DynamicScope::StreamEventContext => "stream.event.context",
            DynamicScope::EventContext => "event.context",
            DynamicScope::EventFields => "event.fields",
        }
    }

    fn id(self) -> ScopeId {
        ScopeId(self as usize)
    }

    /// Split `tokens` into the dynamic scope it starts with and the remaining tokens.
    fn match_prefix<'a, 'b>(tokens: &'a [&'b str]) -> Option<(DynamicScope, &'a [&'b str])> {
        DynamicScope::ALL.iter().find_map(|scope| {
            let prefix: Vec<&str> = scope.path().split('.').collect();
            if tokens.len() >= prefix.len() && tokens[..prefix.len()] == prefix[..] {
                Some((*scope, &tokens[prefix.len()..]))
            } else {
                None
            }
        })
    }
}

impl fmt::Display for DynamicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Debug)]
struct ScopeNode {
    name: String,
    parent: Option<ScopeId>,
    children: HashMap<String, ScopeId>,
    definition: Option<Arc<Definition>>,
    bound_at: u64,
}

impl ScopeNode {
    fn new(name: String, parent: Option<ScopeId>) -> Self {
        Self {
            name,
            parent,
            children: HashMap::new(),
            definition: None,
            bound_at: 0,
        }
    }
}

/// Everything registered after a checkpoint is discarded by [`ScopeTree::rewind`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ScopeCheckpoint {
    len: usize,
    clock: u64,
}

#[derive(Clone, Debug)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
    clock: u64,
}

impl ScopeTree {
    pub fn new() -> Self {
        let nodes = DynamicScope::ALL
            .iter()
            .map(|s| ScopeNode::new(s.path().to_owned(), None))
            .collect();
        Self { nodes, clock: 0 }
    }

    pub fn root(&self, scope: DynamicScope) -> ScopeId {
        scope.id()
    }

    /// Register a new node `name` under `parent`, shadowing any previous
    /// child with the same name.
    pub fn add_child(&mut self, parent: ScopeId, name: &str) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode::new(name.to_owned(), Some(parent)));
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.insert(name.to_owned(), id);
        }
        id
    }

    /// Remove every child of `id`, used before a dynamic scope root is decoded again.
    pub(crate) fn clear_children(&mut self, id: ScopeId) {
        if let Some(n) = self.nodes.get_mut(id.0) {
            n.children.clear();
            n.definition = None;
        }
    }

    pub fn bind(&mut self, id: ScopeId, definition: Arc<Definition>) {
        self.clock += 1;
        let clock = self.clock;
        if let Some(n) = self.nodes.get_mut(id.0) {
            n.definition = Some(definition);
            n.bound_at = clock;
        }
    }

    pub fn definition(&self, id: ScopeId) -> Option<&Arc<Definition>> {
        self.nodes.get(id.0).and_then(|n| n.definition.as_ref())
    }

    pub fn name(&self, id: ScopeId) -> Option<&str> {
        self.nodes.get(id.0).map(|n| n.name.as_str())
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn child(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.children.get(name).copied())
    }

    /// Dotted path from the dynamic scope root down to `id`.
    pub fn path(&self, id: ScopeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            match self.nodes.get(c.0) {
                Some(n) => {
                    names.push(n.name.as_str());
                    current = n.parent;
                }
                None => break,
            }
        }
        names.reverse();
        names.join(".")
    }

    pub fn checkpoint(&self) -> ScopeCheckpoint {
        ScopeCheckpoint {
            len: self.nodes.len(),
            clock: self.clock,
        }
    }

    pub fn rewind(&mut self, checkpoint: ScopeCheckpoint) {
        self.nodes.truncate(checkpoint.len);
        let len = checkpoint.len;
        for n in self.nodes.iter_mut() {
            n.children.retain(|_, id| id.0 < len);
            if n.definition.is_some() && n.bound_at > checkpoint.clock {
                n.definition = None;
            }
        }
    }

    /// Look up a dotted field path as seen from `start`, see [`resolve`].
    pub fn lookup(&self, start: ScopeId, path: &str) -> Option<Arc<Definition>> {
        let tokens: Vec<&str> = path.split('.').collect();
        self.lookup_tokens(start, &tokens)
    }

    pub fn lookup_tokens(&self, start: ScopeId, tokens: &[&str]) -> Option<Arc<Definition>> {
        let first = tokens.first()?;
        if RESERVED_KEYWORDS.contains(first) {
            let (root, rest) = DynamicScope::match_prefix(tokens)?;
            return self.descend(root.id(), rest);
        }

        let mut current = Some(start);
        while let Some(id) = current {
            if let Some(def) = self.descend(id, tokens) {
                return Some(def);
            }
            current = self.parent(id);
        }
        None
    }

    fn descend(&self, from: ScopeId, tokens: &[&str]) -> Option<Arc<Definition>> {
        let mut id = from;
        for t in tokens {
            id = self.child(id, t)?;
        }
        self.definition(id).cloned()
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a field path to an already decoded definition.
///
/// A path starting with a reserved keyword is absolute: it must begin with one
/// of the dynamic scope paths (`env`, `trace.packet.header`,
/// `stream.packet.context`, `stream.event.header`, `stream.event.context`,
/// `event.context`, `event.fields`) and the remaining tokens are descended from
/// that root. Any other path is relative: it is descended from `start`, then
/// from each ancestor of `start` in turn, and the first complete match wins.
///
/// Nodes whose definition is still being decoded never match, so a reference
/// to a later sibling fails instead of waiting for it.
pub fn resolve(tree: &ScopeTree, start: ScopeId, path: &str) -> Result<Arc<Definition>, Error> {
    tree.lookup(start, path).ok_or_else(|| Error::ScopeResolution {
        path: path.to_owned(),
        expected: "field",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::IntegerDeclaration;
    use crate::definition::IntegerDefinition;
    use crate::types::ByteOrder;
    use pretty_assertions::assert_eq;

    fn int(value: u64) -> Arc<Definition> {
        let decl = Arc::new(IntegerDeclaration::new(32, false, ByteOrder::LittleEndian).unwrap());
        Arc::new(Definition::Integer(IntegerDefinition::new(decl, 0, value)))
    }

    // event.fields
    //   len = 1
    //   outer
    //     len = 2
    //     inner
    //       x = 3
    fn tree() -> (ScopeTree, ScopeId) {
        let mut t = ScopeTree::new();
        let root = t.root(DynamicScope::EventFields);
        let len = t.add_child(root, "len");
        t.bind(len, int(1));
        let outer = t.add_child(root, "outer");
        let outer_len = t.add_child(outer, "len");
        t.bind(outer_len, int(2));
        let inner = t.add_child(outer, "inner");
        let x = t.add_child(inner, "x");
        t.bind(x, int(3));
        (t, inner)
    }

    #[test]
    fn relative_lookup_prefers_closest_ancestor() {
        let (t, inner) = tree();
        assert_eq!(resolve(&t, inner, "len").unwrap().unsigned_value(), Some(2));
        assert_eq!(resolve(&t, inner, "x").unwrap().unsigned_value(), Some(3));
        assert_eq!(
            resolve(&t, inner, "inner.x").unwrap().unsigned_value(),
            Some(3)
        );
        assert!(resolve(&t, inner, "y").is_err());
    }

    #[test]
    fn absolute_lookup() {
        let (t, inner) = tree();
        assert_eq!(
            resolve(&t, inner, "event.fields.len")
                .unwrap()
                .unsigned_value(),
            Some(1)
        );
        assert_eq!(
            resolve(&t, inner, "event.fields.outer.inner.x")
                .unwrap()
                .unsigned_value(),
            Some(3)
        );
        // Reserved keywords never fall back to a relative lookup
        assert!(t.lookup(inner, "event.len").is_none());
        assert!(t.lookup(inner, "stream.event.context.len").is_none());
    }

    #[test]
    fn unbound_nodes_do_not_match() {
        let (mut t, inner) = tree();
        let pending = t.add_child(inner, "pending");
        assert!(t.lookup(inner, "pending").is_none());
        t.bind(pending, int(9));
        assert_eq!(t.lookup(inner, "pending").unwrap().unsigned_value(), Some(9));
    }

    #[test]
    fn rewind_discards_later_registrations() {
        let mut t = ScopeTree::new();
        let ctx = t.root(DynamicScope::StreamPacketContext);
        let size = t.add_child(ctx, "packet_size");
        t.bind(size, int(64));
        t.bind(ctx, int(0));
        let cp = t.checkpoint();

        let fields = t.root(DynamicScope::EventFields);
        let a = t.add_child(fields, "a");
        t.bind(a, int(1));
        t.bind(fields, int(0));
        assert!(t.lookup(fields, "a").is_some());

        t.rewind(cp);
        assert!(t.lookup(fields, "a").is_none());
        assert!(t.definition(fields).is_none());
        assert!(t.definition(ctx).is_some());
        assert_eq!(
            t.lookup(fields, "stream.packet.context.packet_size")
                .unwrap()
                .unsigned_value(),
            Some(64)
        );
    }

    #[test]
    fn paths() {
        let (t, inner) = tree();
        assert_eq!(t.path(inner), "event.fields.outer.inner");
        assert_eq!(t.name(inner), Some("inner"));
        assert_eq!(DynamicScope::StreamEventHeader.to_string(), "stream.event.header");
    }
}
