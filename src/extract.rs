//! Cost-minimizing extraction with cross-root common sub-expression
//! elimination.
//!
//! Given an e-graph that has been loaded with one or more gradient terms
//! and saturated, this picks the cheapest representative node in every
//! reachable class, then looks for classes visited more than once while
//! walking from the roots — those become named temporaries, emitted in
//! dependency order ahead of the roots that use them. A class visited
//! exactly once is inlined at its use site; nothing is ever declared and
//! then thrown away, so there is no separate dead-temp pass to run.

use std::collections::HashMap;

use crate::egraph::{EGraph, ENode, Id};
use crate::term::{BinaryOp, Expr};

/// One extracted temporary assignment, in the order it must be emitted.
pub type Temp = (String, Expr);

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extraction {
    pub temps: Vec<Temp>,
    pub roots: Vec<Expr>,
}

/// Division and exponentiation cost more than their child count alone
/// would suggest, biasing extraction toward factoring them out into
/// shared temporaries (or away from them entirely) rather than toward
/// the cheapest-looking-but-most-fragile expansion.
fn node_cost(node: &ENode, child_cost: impl Fn(Id) -> f64) -> f64 {
    match node {
        ENode::Number(_) | ENode::Variable(_) => 1.0,
        ENode::Unary(_, x) => 1.0 + child_cost(*x),
        ENode::Binary(op, l, r) => {
            let base = match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => 1.0,
                BinaryOp::Pow => 3.0,
                BinaryOp::Div => 5.0,
            };
            base + child_cost(*l) + child_cost(*r)
        }
        ENode::Call(_, args) => 3.0 + args.iter().map(|&a| child_cost(a)).sum::<f64>(),
        ENode::Component(obj, _) => 1.0 + child_cost(*obj),
    }
}

/// Bottom-up fixed-point extraction of the cheapest node per class,
/// following the classic e-graph extraction algorithm: costs start at
/// infinity and relax downward over repeated sweeps until nothing
/// improves (bounded by the number of classes, since cost only ever
/// decreases).
fn best_nodes(egraph: &mut EGraph) -> HashMap<usize, (ENode, f64)> {
    let ids = egraph.class_ids();
    let canon_ids: Vec<Id> = ids.iter().map(|&id| egraph.find(id)).collect();
    let mut best: HashMap<usize, (ENode, f64)> = HashMap::new();

    for _ in 0..=canon_ids.len() {
        let mut improved = false;
        for &id in &canon_ids {
            for node in egraph.class(id).nodes.clone() {
                let cost = node_cost(&node, |child| {
                    let child = egraph.find(child);
                    best.get(&child.0).map(|(_, c)| *c).unwrap_or(f64::INFINITY)
                });
                if cost.is_finite() {
                    let entry = best.entry(id.0).or_insert((node.clone(), f64::INFINITY));
                    if cost < entry.1 {
                        *entry = (node, cost);
                        improved = true;
                    }
                }
            }
        }
        if !improved {
            break;
        }
    }
    best
}

/// Counts how many times each class is reached while walking the
/// best-node DAG from `roots`, visiting every class's children once per
/// visit to the class itself (so a class under two different parents is
/// counted twice even though it is only expanded once per visit here).
fn count_refs(best: &HashMap<usize, (ENode, f64)>, egraph: &mut EGraph, roots: &[Id]) -> HashMap<usize, usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut stack: Vec<Id> = roots.to_vec();
    while let Some(id) = stack.pop() {
        let id = egraph.find(id);
        *counts.entry(id.0).or_insert(0) += 1;
        if let Some((node, _)) = best.get(&id.0) {
            for child in node.children() {
                stack.push(child);
            }
        }
    }
    counts
}

/// Topologically orders every class reachable from `roots` (children
/// before parents) via post-order traversal.
fn topo_order(best: &HashMap<usize, (ENode, f64)>, egraph: &mut EGraph, roots: &[Id]) -> Vec<Id> {
    let mut order = Vec::new();
    let mut visited = std::collections::HashSet::new();
    fn visit(
        id: Id,
        best: &HashMap<usize, (ENode, f64)>,
        egraph: &mut EGraph,
        visited: &mut std::collections::HashSet<usize>,
        order: &mut Vec<Id>,
    ) {
        let id = egraph.find(id);
        if !visited.insert(id.0) {
            return;
        }
        if let Some((node, _)) = best.get(&id.0) {
            for child in node.children() {
                visit(child, best, egraph, visited, order);
            }
        }
        order.push(id);
    }
    for &root in roots {
        visit(root, best, egraph, &mut visited, &mut order);
    }
    order
}

/// Extracts `roots` from `egraph`, factoring out any class visited more
/// than once as a named temporary (`t0`, `t1`, ...).
pub fn extract(egraph: &mut EGraph, roots: &[Id]) -> Extraction {
    let best = best_nodes(egraph);
    let refs = count_refs(&best, egraph, roots);
    let order = topo_order(&best, egraph, roots);

    let mut temp_names: HashMap<usize, String> = HashMap::new();
    let mut next_temp = 0usize;
    for &id in &order {
        if refs.get(&id.0).copied().unwrap_or(0) >= 2 {
            temp_names.insert(id.0, format!("t{next_temp}"));
            next_temp += 1;
        }
    }

    fn build(
        id: Id,
        best: &HashMap<usize, (ENode, f64)>,
        egraph: &mut EGraph,
        temp_names: &HashMap<usize, String>,
        as_definition: bool,
    ) -> Expr {
        let id = egraph.find(id);
        if !as_definition {
            if let Some(name) = temp_names.get(&id.0) {
                return Expr::var(name.clone());
            }
        }
        let (node, _) = best.get(&id.0).expect("every reachable class has a chosen node");
        match node.clone() {
            ENode::Number(v) => Expr::num(v.value()),
            ENode::Variable(name) => Expr::var(name),
            ENode::Binary(op, l, r) => Expr::bin(
                op,
                build(l, best, egraph, temp_names, false),
                build(r, best, egraph, temp_names, false),
            ),
            ENode::Unary(op, x) => Expr::un(op, build(x, best, egraph, temp_names, false)),
            ENode::Call(name, args) => Expr::call(
                name,
                args.into_iter()
                    .map(|a| build(a, best, egraph, temp_names, false))
                    .collect(),
            ),
            ENode::Component(obj, field) => {
                Expr::comp(build(obj, best, egraph, temp_names, false), field)
            }
        }
    }

    let mut temps = Vec::with_capacity(temp_names.len());
    for &id in &order {
        if let Some(name) = temp_names.get(&id.0) {
            let body = build(id, &best, egraph, &temp_names, true);
            temps.push((name.clone(), body));
        }
    }

    let roots = roots
        .iter()
        .map(|&id| build(id, &best, egraph, &temp_names, false))
        .collect();

    canonicalize(Extraction { temps, roots })
}

/// Post-extraction cleanup: folds `a·(−1)`/`(−1)·a` into unary negation,
/// and rewrites `a/x` into `a×inv(x)` wherever `inv(x) = 1/x` is itself
/// one of the extracted temporaries, so the division is paid for once
/// instead of at every use site.
fn canonicalize(extraction: Extraction) -> Extraction {
    let negated = Extraction {
        temps: extraction
            .temps
            .into_iter()
            .map(|(name, body)| (name, fold_negation(&body)))
            .collect(),
        roots: extraction.roots.iter().map(fold_negation).collect(),
    };

    let reciprocals = find_reciprocal_temps(&negated.temps);
    if reciprocals.is_empty() {
        return negated;
    }

    Extraction {
        temps: negated
            .temps
            .iter()
            .map(|(name, body)| (name.clone(), use_reciprocal_temps(body, &reciprocals, name)))
            .collect(),
        roots: negated
            .roots
            .iter()
            .map(|e| use_reciprocal_temps(e, &reciprocals, ""))
            .collect(),
    }
}

/// Recursively replaces `?*(-1)` and `(-1)*?` with unary negation.
fn fold_negation(expr: &Expr) -> Expr {
    match expr {
        Expr::Binary(crate::term::BinaryOp::Mul, l, r) => {
            let l = fold_negation(l);
            let r = fold_negation(r);
            if l.as_number() == Some(-1.0) {
                Expr::neg(r)
            } else if r.as_number() == Some(-1.0) {
                Expr::neg(l)
            } else {
                Expr::mul(l, r)
            }
        }
        Expr::Binary(op, l, r) => Expr::bin(*op, fold_negation(l), fold_negation(r)),
        Expr::Unary(op, x) => Expr::un(*op, fold_negation(x)),
        Expr::Call(name, args) => Expr::call(name.clone(), args.iter().map(fold_negation).collect()),
        Expr::Component(obj, field) => Expr::comp(fold_negation(obj), field.clone()),
        Expr::Number(_) | Expr::Variable(_) => expr.clone(),
    }
}

/// Maps the canonical form of `x` to the name of any temporary whose
/// body is exactly `1/x`.
fn find_reciprocal_temps(temps: &[Temp]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, body) in temps {
        if let Expr::Binary(BinaryOp::Div, numer, denom) = body {
            if numer.is_one() {
                map.insert(denom.canonical(), name.clone());
            }
        }
    }
    map
}

/// Rewrites `a/x` into `a*inv` wherever `x`'s canonical form names a
/// reciprocal temporary, skipping `exclude` (a temporary's own body
/// never rewrites through its own reciprocal — that would reference
/// itself).
fn use_reciprocal_temps(expr: &Expr, reciprocals: &HashMap<String, String>, exclude: &str) -> Expr {
    match expr {
        Expr::Binary(BinaryOp::Div, l, r) => {
            let l = use_reciprocal_temps(l, reciprocals, exclude);
            let r = use_reciprocal_temps(r, reciprocals, exclude);
            match reciprocals.get(&r.canonical()) {
                Some(name) if name != exclude => Expr::mul(l, Expr::var(name.clone())),
                _ => Expr::div(l, r),
            }
        }
        Expr::Binary(op, l, r) => Expr::bin(
            *op,
            use_reciprocal_temps(l, reciprocals, exclude),
            use_reciprocal_temps(r, reciprocals, exclude),
        ),
        Expr::Unary(op, x) => Expr::un(*op, use_reciprocal_temps(x, reciprocals, exclude)),
        Expr::Call(name, args) => Expr::call(
            name.clone(),
            args.iter().map(|a| use_reciprocal_temps(a, reciprocals, exclude)).collect(),
        ),
        Expr::Component(obj, field) => {
            Expr::comp(use_reciprocal_temps(obj, reciprocals, exclude), field.clone())
        }
        Expr::Number(_) | Expr::Variable(_) => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egraph::rewrite::saturate;
    use crate::term::BinaryOp;

    #[test]
    fn shared_subexpression_becomes_one_temp() {
        let mut g = EGraph::new();
        let x = g.add(ENode::Variable("x".into()));
        let y = g.add(ENode::Variable("y".into()));
        let xy = g.add(ENode::Binary(BinaryOp::Mul, x, y));
        let root1 = g.add(ENode::Binary(BinaryOp::Add, xy, x));
        let root2 = g.add(ENode::Binary(BinaryOp::Sub, xy, y));

        let ext = extract(&mut g, &[root1, root2]);
        assert_eq!(ext.temps.len(), 1);
        assert_eq!(ext.roots.len(), 2);
        assert!(matches!(ext.roots[0], Expr::Binary(BinaryOp::Add, _, _)));
    }

    #[test]
    fn single_use_subexpression_is_inlined() {
        let mut g = EGraph::new();
        let x = g.add(ENode::Variable("x".into()));
        let y = g.add(ENode::Variable("y".into()));
        let root = g.add(ENode::Binary(BinaryOp::Add, x, y));

        let ext = extract(&mut g, &[root]);
        assert!(ext.temps.is_empty());
        assert_eq!(ext.roots[0], Expr::add(Expr::var("x"), Expr::var("y")));
    }

    #[test]
    fn mul_by_negative_one_becomes_unary_neg() {
        let mut g = EGraph::new();
        let x = g.add(ENode::Variable("x".into()));
        let neg_one = g.add(ENode::Number(crate::egraph::NotNanBits::new(-1.0)));
        let root = g.add(ENode::Binary(BinaryOp::Mul, neg_one, x));

        let ext = extract(&mut g, &[root]);
        assert_eq!(ext.roots[0], Expr::neg(Expr::var("x")));
    }

    #[test]
    fn division_reuses_a_shared_reciprocal_temp() {
        let mut g = EGraph::new();
        let one = g.add(ENode::Number(crate::egraph::NotNanBits::new(1.0)));
        let x = g.add(ENode::Variable("x".into()));
        let inv_x = g.add(ENode::Binary(BinaryOp::Div, one, x));
        let a = g.add(ENode::Variable("a".into()));
        let c = g.add(ENode::Variable("c".into()));
        let a_inv_x = g.add(ENode::Binary(BinaryOp::Mul, a, inv_x));
        let c_inv_x = g.add(ENode::Binary(BinaryOp::Mul, c, inv_x));
        let b = g.add(ENode::Variable("b".into()));
        let b_over_x = g.add(ENode::Binary(BinaryOp::Div, b, x));

        let ext = extract(&mut g, &[a_inv_x, c_inv_x, b_over_x]);
        let inv_temp = ext
            .temps
            .iter()
            .find(|(_, body)| matches!(body, Expr::Binary(BinaryOp::Div, n, _) if n.is_one()))
            .expect("1/x should have been extracted as its own temp");

        assert_eq!(ext.roots[2], Expr::mul(Expr::var("b"), Expr::var(inv_temp.0.clone())));
    }

    #[test]
    fn extraction_after_saturation_still_has_acyclic_temps() {
        let mut g = EGraph::new();
        let x = g.add(ENode::Variable("x".into()));
        let neg_x = g.add(ENode::Unary(crate::term::UnaryOp::Neg, x));
        let nn = g.add(ENode::Unary(crate::term::UnaryOp::Neg, neg_x));
        saturate(&mut g, false, 10);
        let ext = extract(&mut g, &[nn]);
        assert_eq!(ext.roots[0], Expr::var("x"));
    }
}
