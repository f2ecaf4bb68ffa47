//! S-expression rewrite patterns and e-class matching.
//!
//! A pattern is a small prefix-notation language: `?name` is a
//! wildcard bound to whatever e-class it matches, a bare number is a
//! numeric literal, and `(head child...)` matches a node whose shape
//! is determined by `head` — an operator symbol (`+ - * / ^`), `neg`/
//! `pos` for the two unary operators, `.` for component access (whose
//! second argument is a literal field name, not a sub-pattern), or any
//! other identifier for a call/variable node. This mirrors the
//! rewrite-rule notation used by e-graph rewrite-rule test suites
//! (`(+ ?a ?b)`, `(* ?a (+ ?b ?c))`) rather than inventing new syntax.

use std::collections::HashMap;

use crate::egraph::{EGraph, ENode, Id, NotNanBits};
use crate::term::{BinaryOp, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard(String),
    Number(f64),
    /// `head` is an operator symbol, `neg`/`pos`, `.`, a call name, or a
    /// bare variable name (when `children` is empty and `head` is not a
    /// known operator symbol).
    Node(String, Vec<Pattern>),
}

/// A binding of pattern wildcards to e-classes, produced by matching.
pub type Subst = HashMap<String, Id>;

/// Parses a single pattern from prefix-notation source, e.g. `"(+ ?a ?b)"`.
pub fn parse_pattern(src: &str) -> Pattern {
    let tokens = tokenize(src);
    let mut pos = 0;
    let pat = parse_one(&tokens, &mut pos);
    assert_eq!(pos, tokens.len(), "trailing tokens in pattern '{src}'");
    pat
}

fn tokenize(src: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' | ')' => {
                out.push(c.to_string());
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut tok = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    tok.push(c);
                    chars.next();
                }
                out.push(tok);
            }
        }
    }
    out
}

fn parse_one(tokens: &[String], pos: &mut usize) -> Pattern {
    let tok = &tokens[*pos];
    if tok == "(" {
        *pos += 1;
        let head = tokens[*pos].clone();
        *pos += 1;
        let mut children = Vec::new();
        while tokens[*pos] != ")" {
            children.push(parse_one(tokens, pos));
        }
        *pos += 1;
        Pattern::Node(head, children)
    } else {
        *pos += 1;
        if let Some(name) = tok.strip_prefix('?') {
            Pattern::Wildcard(name.to_string())
        } else if let Ok(n) = tok.parse::<f64>() {
            Pattern::Number(n)
        } else {
            Pattern::Node(tok.clone(), Vec::new())
        }
    }
}

fn binary_op(head: &str) -> Option<BinaryOp> {
    Some(match head {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "^" => BinaryOp::Pow,
        _ => return None,
    })
}

fn unary_op(head: &str) -> Option<UnaryOp> {
    Some(match head {
        "neg" => UnaryOp::Neg,
        "pos" => UnaryOp::Plus,
        _ => return None,
    })
}

/// Finds every e-class reachable from `root`'s descendants (inclusive)
/// that `pattern` matches, together with the wildcard bindings that
/// made the match succeed. Searches every class in the graph, not just
/// those under `root`, matching `egg`'s whole-graph search semantics.
pub fn search(egraph: &EGraph, pattern: &Pattern) -> Vec<(Id, Subst)> {
    let mut out = Vec::new();
    for id in egraph.class_ids() {
        for node in egraph.class(id).nodes.clone() {
            let mut subst = Subst::new();
            if match_node(egraph, pattern, &node, &mut subst) {
                out.push((id, subst));
            }
        }
    }
    out
}

fn match_node(egraph: &EGraph, pattern: &Pattern, node: &ENode, subst: &mut Subst) -> bool {
    match pattern {
        Pattern::Wildcard(_) => true,
        Pattern::Number(n) => matches!(node, ENode::Number(v) if v.value() == *n),
        Pattern::Node(head, children) => match_shape(egraph, head, children, node, subst),
    }
}

fn match_shape(
    egraph: &EGraph,
    head: &str,
    children: &[Pattern],
    node: &ENode,
    subst: &mut Subst,
) -> bool {
    if let Some(op) = binary_op(head) {
        let ENode::Binary(nop, l, r) = node else {
            return false;
        };
        return *nop == op
            && children.len() == 2
            && match_class(egraph, &children[0], *l, subst)
            && match_class(egraph, &children[1], *r, subst);
    }
    if let Some(op) = unary_op(head) {
        let ENode::Unary(nop, x) = node else {
            return false;
        };
        return *nop == op && children.len() == 1 && match_class(egraph, &children[0], *x, subst);
    }
    if head == "." {
        let ENode::Component(obj, field) = node else {
            return false;
        };
        let Pattern::Node(lit_field, lit_children) = &children[1] else {
            return false;
        };
        return children.len() == 2
            && lit_children.is_empty()
            && lit_field == field
            && match_class(egraph, &children[0], *obj, subst);
    }
    if children.is_empty() {
        return matches!(node, ENode::Variable(v) if v == head);
    }
    let ENode::Call(name, args) = node else {
        return false;
    };
    name == head
        && args.len() == children.len()
        && children
            .iter()
            .zip(args.iter())
            .all(|(p, &a)| match_class(egraph, p, a, subst))
}

/// Matches `pattern` against the e-class `id`: any e-node inside it
/// satisfying the pattern shape is enough (existential match across the
/// class), which is how equality saturation reasons "up to equivalence".
fn match_class(egraph: &EGraph, pattern: &Pattern, id: Id, subst: &mut Subst) -> bool {
    if let Pattern::Wildcard(name) = pattern {
        if let Some(&bound) = subst.get(name) {
            return bound == id;
        }
        subst.insert(name.clone(), id);
        return true;
    }
    for node in &egraph.class(id).nodes {
        let mut probe = subst.clone();
        if match_node(egraph, pattern, node, &mut probe) {
            *subst = probe;
            return true;
        }
    }
    false
}

/// Builds a fresh e-node tree for `pattern` under `subst`, adding any
/// new structure to `egraph`, and returns its class id.
pub fn instantiate(egraph: &mut EGraph, pattern: &Pattern, subst: &Subst) -> Id {
    match pattern {
        Pattern::Wildcard(name) => *subst
            .get(name)
            .unwrap_or_else(|| panic!("unbound pattern variable '?{name}' in rewrite rhs")),
        Pattern::Number(n) => egraph.add(ENode::Number(NotNanBits::new(*n))),
        Pattern::Node(head, children) => {
            if let Some(op) = binary_op(head) {
                let l = instantiate(egraph, &children[0], subst);
                let r = instantiate(egraph, &children[1], subst);
                return egraph.add(ENode::Binary(op, l, r));
            }
            if let Some(op) = unary_op(head) {
                let x = instantiate(egraph, &children[0], subst);
                return egraph.add(ENode::Unary(op, x));
            }
            if head == "." {
                let obj = instantiate(egraph, &children[0], subst);
                let Pattern::Node(field, _) = &children[1] else {
                    panic!("'.' rhs pattern must name a literal field");
                };
                return egraph.add(ENode::Component(obj, field.clone()));
            }
            if children.is_empty() {
                return egraph.add(ENode::Variable(head.clone()));
            }
            let args = children.iter().map(|c| instantiate(egraph, c, subst)).collect();
            egraph.add(ENode::Call(head.clone(), args))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::BinaryOp::*;

    #[test]
    fn parses_nested_pattern() {
        let p = parse_pattern("(+ ?a (* ?b ?c))");
        assert_eq!(
            p,
            Pattern::Node(
                "+".into(),
                vec![
                    Pattern::Wildcard("a".into()),
                    Pattern::Node("*".into(), vec![Pattern::Wildcard("b".into()), Pattern::Wildcard("c".into())]),
                ]
            )
        );
    }

    #[test]
    fn matches_commuted_addition_in_same_class() {
        let mut g = EGraph::new();
        let a = g.add(ENode::Variable("a".into()));
        let b = g.add(ENode::Variable("b".into()));
        let ab = g.add(ENode::Binary(Add, a, b));
        let ba = g.add(ENode::Binary(Add, b, a));
        g.merge(ab, ba);
        g.rebuild();

        let pat = parse_pattern("(+ ?x ?y)");
        let matches = search(&g, &pat);
        assert!(!matches.is_empty());
    }

    #[test]
    fn instantiate_builds_requested_shape() {
        let mut g = EGraph::new();
        let a = g.add(ENode::Variable("a".into()));
        let mut subst = Subst::new();
        subst.insert("x".into(), a);
        let pat = parse_pattern("(* ?x 2)");
        let id = instantiate(&mut g, &pat, &subst);
        assert!(g
            .class(id)
            .nodes
            .iter()
            .any(|n| matches!(n, ENode::Binary(crate::term::BinaryOp::Mul, _, _))));
    }
}
