//! E-graph: union-find over hash-consed e-nodes.
//!
//! A classic array-of-parents union-find with path compression for class
//! ids, plus a hash-cons table mapping canonical e-node shapes to
//! canonical class ids, plus a parent index so `rebuild` can
//! re-canonicalize exactly the e-nodes that might have changed shape.
//! Single-threaded, owned exclusively by one compilation.

pub mod pattern;
pub mod rewrite;

use std::collections::HashMap;

use crate::term::{BinaryOp, Expr, UnaryOp};

/// An e-class identifier. Not stable across `rebuild` calls except via
/// [`EGraph::find`] — always canonicalize before comparing two ids taken
/// at different times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(pub usize);

/// A structural constructor over e-class ids, shaped identically to
/// [`Expr`] but with children replaced by class ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ENode {
    Number(NotNanBits),
    Variable(String),
    Binary(BinaryOp, Id, Id),
    Unary(UnaryOp, Id),
    Call(String, Vec<Id>),
    Component(Id, String),
}

/// Bit-pattern wrapper so `f64` constants can live in a `HashMap` key.
/// `-0.0` is normalized to `0.0` before wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotNanBits(u64);

impl NotNanBits {
    pub fn new(v: f64) -> Self {
        let v = if v == 0.0 { 0.0 } else { v };
        Self(v.to_bits())
    }
    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl ENode {
    /// Maps every child id through `f`, returning a new e-node with the
    /// same shape. Used for canonicalization during `rebuild`.
    fn map_children(&self, mut f: impl FnMut(Id) -> Id) -> ENode {
        match self {
            ENode::Number(v) => ENode::Number(*v),
            ENode::Variable(n) => ENode::Variable(n.clone()),
            ENode::Binary(op, l, r) => ENode::Binary(*op, f(*l), f(*r)),
            ENode::Unary(op, x) => ENode::Unary(*op, f(*x)),
            ENode::Call(name, args) => ENode::Call(name.clone(), args.iter().map(|a| f(*a)).collect()),
            ENode::Component(obj, field) => ENode::Component(f(*obj), field.clone()),
        }
    }

    pub(crate) fn children(&self) -> Vec<Id> {
        match self {
            ENode::Number(_) | ENode::Variable(_) => vec![],
            ENode::Binary(_, l, r) => vec![*l, *r],
            ENode::Unary(_, x) => vec![*x],
            ENode::Call(_, args) => args.clone(),
            ENode::Component(obj, _) => vec![*obj],
        }
    }
}

#[derive(Debug, Clone)]
pub struct EClass {
    pub nodes: Vec<ENode>,
    pub parents: Vec<(ENode, Id)>,
}

/// The e-graph itself: union-find + hash-cons + parent index.
pub struct EGraph {
    parents: Vec<Id>,
    classes: HashMap<usize, EClass>,
    hashcons: HashMap<ENode, Id>,
    worklist: Vec<Id>,
}

impl Default for EGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl EGraph {
    pub fn new() -> Self {
        Self {
            parents: Vec::new(),
            classes: HashMap::new(),
            hashcons: HashMap::new(),
            worklist: Vec::new(),
        }
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn enode_count(&self) -> usize {
        self.classes.values().map(|c| c.nodes.len()).sum()
    }

    /// Union-find `find` with path compression.
    pub fn find(&mut self, id: Id) -> Id {
        let mut cur = id;
        while self.parents[cur.0] != cur {
            let grandparent = self.parents[self.parents[cur.0].0];
            self.parents[cur.0] = grandparent;
            cur = grandparent;
        }
        cur
    }

    fn find_const(&self, id: Id) -> Id {
        let mut cur = id;
        while self.parents[cur.0] != cur {
            cur = self.parents[cur.0];
        }
        cur
    }

    fn canonicalize(&self, node: &ENode) -> ENode {
        node.map_children(|id| self.find_const(id))
    }

    /// Hash-conses `node`; returns the existing class if its canonical
    /// shape is already present, otherwise allocates a fresh singleton
    /// class and registers `node` as a parent of each child.
    pub fn add(&mut self, node: ENode) -> Id {
        let canon = self.canonicalize(&node);
        if let Some(&id) = self.hashcons.get(&canon) {
            return self.find(id);
        }
        let id = Id(self.parents.len());
        self.parents.push(id);
        for child in canon.children() {
            let child = self.find(child);
            self.classes
                .entry(child.0)
                .or_insert_with(|| EClass {
                    nodes: vec![],
                    parents: vec![],
                })
                .parents
                .push((canon.clone(), id));
        }
        self.classes.insert(
            id.0,
            EClass {
                nodes: vec![canon.clone()],
                parents: vec![],
            },
        );
        self.hashcons.insert(canon, id);
        id
    }

    /// Unions the classes of `a` and `b`; enqueues the resulting class
    /// for `rebuild`. Does not immediately restore congruence.
    pub fn merge(&mut self, a: Id, b: Id) -> Id {
        let a = self.find(a);
        let b = self.find(b);
        if a == b {
            return a;
        }
        let (keep, drop) = if self.classes[&a.0].nodes.len() >= self.classes[&b.0].nodes.len() {
            (a, b)
        } else {
            (b, a)
        };
        self.parents[drop.0] = keep;
        let dropped = self.classes.remove(&drop.0).expect("class exists");
        let kept = self.classes.get_mut(&keep.0).expect("class exists");
        kept.nodes.extend(dropped.nodes);
        kept.parents.extend(dropped.parents);
        self.worklist.push(keep);
        keep
    }

    /// Drains the rebuild worklist, re-canonicalizing the hash-cons
    /// entries of every touched class's parents until the worklist is
    /// empty and the congruence invariant holds.
    pub fn rebuild(&mut self) {
        while let Some(class) = self.worklist.pop() {
            let class = self.find(class);
            let Some(eclass) = self.classes.get(&class.0).cloned() else {
                continue;
            };
            let mut new_parents: Vec<(ENode, Id)> = Vec::with_capacity(eclass.parents.len());
            for (node, pid) in &eclass.parents {
                let canon = self.canonicalize(node);
                let pid = self.find(*pid);
                if let Some(&existing) = self.hashcons.get(&canon) {
                    let existing = self.find(existing);
                    if existing != pid {
                        self.merge(existing, pid);
                    }
                } else {
                    self.hashcons.insert(canon.clone(), pid);
                }
                new_parents.push((canon, pid));
            }
            new_parents.dedup();
            if let Some(eclass) = self.classes.get_mut(&self.find(class).0) {
                eclass.parents = new_parents;
            }
        }

        // A class's `nodes` can mention children that have since been
        // merged into a different class; re-canonicalize every class's
        // node list so matching never sees a stale child id.
        let ids: Vec<usize> = self.classes.keys().copied().collect();
        for key in ids {
            let mut seen = std::collections::HashSet::new();
            let canon: Vec<ENode> = self.classes[&key]
                .nodes
                .iter()
                .map(|n| self.canonicalize(n))
                .filter(|n| seen.insert(n.clone()))
                .collect();
            if let Some(eclass) = self.classes.get_mut(&key) {
                eclass.nodes = canon;
            }
        }
    }

    /// Canonicalizes `node` and queries the hash-cons table without
    /// allocating a new class.
    pub fn lookup(&self, node: &ENode) -> Option<Id> {
        let canon = self.canonicalize(node);
        self.hashcons.get(&canon).map(|&id| self.find_const(id))
    }

    pub fn class(&self, id: Id) -> &EClass {
        &self.classes[&self.find_const(id).0]
    }

    pub fn class_ids(&self) -> Vec<Id> {
        self.classes.keys().map(|&k| Id(k)).collect()
    }

    /// Adds an entire [`Expr`] tree, hash-consing every sub-tree. Returns
    /// the root class id.
    pub fn add_expr(&mut self, expr: &Expr) -> Id {
        match expr {
            Expr::Number(v) => self.add(ENode::Number(NotNanBits::new(*v))),
            Expr::Variable(n) => self.add(ENode::Variable(n.clone())),
            Expr::Binary(op, l, r) => {
                let l = self.add_expr(l);
                let r = self.add_expr(r);
                self.add(ENode::Binary(*op, l, r))
            }
            Expr::Unary(op, x) => {
                let x = self.add_expr(x);
                self.add(ENode::Unary(*op, x))
            }
            Expr::Call(name, args) => {
                let ids = args.iter().map(|a| self.add_expr(a)).collect();
                self.add(ENode::Call(name.clone(), ids))
            }
            Expr::Component(obj, field) => {
                let obj = self.add_expr(obj);
                self.add(ENode::Component(obj, field.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::BinaryOp::*;

    #[test]
    fn congruence_holds_after_rebuild() {
        let mut g = EGraph::new();
        let a = g.add(ENode::Variable("a".into()));
        let b = g.add(ENode::Variable("b".into()));
        let ab1 = g.add(ENode::Binary(Add, a, b));

        let c = g.add(ENode::Variable("c".into()));
        g.merge(b, c);
        g.rebuild();

        let ab2 = g.add(ENode::Binary(Add, a, c));
        assert_eq!(g.find(ab1), g.find(ab2));
    }

    #[test]
    fn add_is_hash_consed() {
        let mut g = EGraph::new();
        let a1 = g.add(ENode::Variable("a".into()));
        let a2 = g.add(ENode::Variable("a".into()));
        assert_eq!(a1, a2);
        assert_eq!(g.class_count(), 1);
    }

    #[test]
    fn lookup_does_not_allocate() {
        let mut g = EGraph::new();
        let a = g.add(ENode::Variable("a".into()));
        let b = g.add(ENode::Variable("b".into()));
        let before = g.class_count();
        assert!(g.lookup(&ENode::Binary(Add, a, b)).is_none());
        assert_eq!(g.class_count(), before);
    }
}
