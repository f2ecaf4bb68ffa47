//! Bounded equality saturation.
//!
//! Applies a fixed rule set to an [`EGraph`] until no rule produces a
//! new merge (saturation) or an iteration cap is reached, whichever
//! comes first. Rules are grouped in three layers: core algebraic
//! identities, then the wider algebraic rewrites that expose common
//! sub-expressions across sibling terms, then the handful of
//! function-specific identities (double-angle, `atan2` symmetry) that
//! only fire under an explicit `--egraph` request for deeper search.

use crate::egraph::pattern::{instantiate, parse_pattern, search, Pattern};
use crate::egraph::EGraph;

/// Default bound on saturation rounds, matching the "≈30" ceiling noted
/// for this rewrite driver.
pub const DEFAULT_ITERATION_CAP: usize = 30;

pub struct Rule {
    pub name: &'static str,
    lhs: Pattern,
    rhs: Pattern,
}

impl Rule {
    fn new(name: &'static str, lhs: &str, rhs: &str) -> Self {
        Self {
            name,
            lhs: parse_pattern(lhs),
            rhs: parse_pattern(rhs),
        }
    }
}

/// Identities that hold regardless of what else is enabled: commutativity
/// is implicit in matching (a class containing `a+b` also matches
/// `(+ ?x ?y)` bound either way), so only the non-trivial algebraic
/// identities need to be spelled out here.
fn core_rules() -> Vec<Rule> {
    vec![
        Rule::new("assoc-add", "(+ (+ ?a ?b) ?c)", "(+ ?a (+ ?b ?c))"),
        Rule::new("assoc-mul", "(* (* ?a ?b) ?c)", "(* ?a (* ?b ?c))"),
        Rule::new("distribute-mul-add", "(* ?a (+ ?b ?c))", "(+ (* ?a ?b) (* ?a ?c))"),
        Rule::new("factor-mul-add", "(+ (* ?a ?b) (* ?a ?c))", "(* ?a (+ ?b ?c))"),
        Rule::new("double-neg", "(neg (neg ?a))", "?a"),
        Rule::new("sub-as-add-neg", "(- ?a ?b)", "(+ ?a (neg ?b))"),
        Rule::new("neg-as-mul", "(neg ?a)", "(* -1 ?a)"),
        Rule::new("div-as-mul-inv", "(/ ?a ?b)", "(* ?a (^ ?b -1))"),
        Rule::new("pow-one", "(^ ?a 1)", "?a"),
        Rule::new("square-as-self-mul", "(^ ?a 2)", "(* ?a ?a)"),
        Rule::new("zero-mul-annihilates", "(* 0 ?a)", "0"),
        Rule::new("zero-div-annihilates", "(/ 0 ?a)", "0"),
        Rule::new("pow-zero", "(^ ?a 0)", "1"),
        Rule::new("self-sub-is-zero", "(- ?a ?a)", "0"),
        Rule::new("neg-propagates-left-through-mul", "(* (neg ?a) ?b)", "(neg (* ?a ?b))"),
        Rule::new("neg-propagates-right-through-mul", "(* ?a (neg ?b))", "(neg (* ?a ?b))"),
    ]
}

/// Rules that specifically help the extractor find shared sub-expressions
/// across sibling gradient terms (the reason this e-graph exists at all).
fn algebraic_rules() -> Vec<Rule> {
    vec![
        Rule::new("commute-add-assoc-left", "(+ ?a (+ ?b ?c))", "(+ (+ ?a ?b) ?c)"),
        Rule::new("commute-mul-assoc-left", "(* ?a (* ?b ?c))", "(* (* ?a ?b) ?c)"),
        Rule::new("mul-reciprocal-cancels", "(* ?a (^ ?a -1))", "1"),
        Rule::new("pow-mul-same-base", "(* (^ ?a ?n) (^ ?a ?m))", "(^ ?a (+ ?n ?m))"),
        Rule::new("pow-of-pow", "(^ (^ ?a ?n) ?m)", "(^ ?a (* ?n ?m))"),
    ]
}

/// Deeper, function-specific identities enabled only by an explicit
/// request for wider search (the `--egraph` flag).
fn deep_rules() -> Vec<Rule> {
    vec![
        Rule::new("sin-sq-plus-cos-sq", "(+ (^ (sin ?a) 2) (^ (cos ?a) 2))", "1"),
        Rule::new("atan2-odd", "(atan2 (neg ?y) ?x)", "(neg (atan2 ?y ?x))"),
        Rule::new("sqrt-self-product", "(* (sqrt ?a) (sqrt ?a))", "?a"),
        Rule::new("sqrt-of-product", "(sqrt (* ?a ?b))", "(* (sqrt ?a) (sqrt ?b))"),
        Rule::new("sqrt-of-square", "(sqrt (^ ?a 2))", "(abs ?a)"),
        Rule::new("exp-log-cancel", "(exp (log ?a))", "?a"),
        Rule::new("log-exp-cancel", "(log (exp ?a))", "?a"),
    ]
}

/// Saturates `egraph` in place. `deep` enables the function-specific
/// rule layer; `cap` bounds the number of whole-ruleset sweeps. Returns
/// the number of sweeps actually run (less than `cap` signals
/// saturation was reached before the cap).
pub fn saturate(egraph: &mut EGraph, deep: bool, cap: usize) -> usize {
    let mut rules = core_rules();
    rules.extend(algebraic_rules());
    if deep {
        rules.extend(deep_rules());
    }

    for round in 0..cap {
        let mut changed = false;
        for rule in &rules {
            let matches = search(egraph, &rule.lhs);
            for (lhs_id, subst) in matches {
                let rhs_id = instantiate(egraph, &rule.rhs, &subst);
                if egraph.find(lhs_id) != egraph.find(rhs_id) {
                    egraph.merge(lhs_id, rhs_id);
                    changed = true;
                }
            }
            egraph.rebuild();
        }
        if !changed {
            return round + 1;
        }
    }
    cap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egraph::{ENode, NotNanBits};

    #[test]
    fn sub_becomes_congruent_to_add_neg() {
        let mut g = EGraph::new();
        let a = g.add(ENode::Variable("a".into()));
        let b = g.add(ENode::Variable("b".into()));
        let sub = g.add(ENode::Binary(crate::term::BinaryOp::Sub, a, b));

        saturate(&mut g, false, 10);

        let neg_b = g.add(ENode::Unary(crate::term::UnaryOp::Neg, b));
        let add_neg = g.add(ENode::Binary(crate::term::BinaryOp::Add, a, neg_b));
        assert_eq!(g.find(sub), g.find(add_neg));
    }

    #[test]
    fn double_negation_collapses_in_graph() {
        let mut g = EGraph::new();
        let a = g.add(ENode::Variable("a".into()));
        let na = g.add(ENode::Unary(crate::term::UnaryOp::Neg, a));
        let nna = g.add(ENode::Unary(crate::term::UnaryOp::Neg, na));

        saturate(&mut g, false, 10);

        assert_eq!(g.find(nna), g.find(a));
    }

    #[test]
    fn pythagorean_identity_only_fires_with_deep_rules() {
        let mut g = EGraph::new();
        let a = g.add(ENode::Variable("a".into()));
        let sin_a = g.add(ENode::Call("sin".into(), vec![a]));
        let cos_a = g.add(ENode::Call("cos".into(), vec![a]));
        let two = g.add(ENode::Number(NotNanBits::new(2.0)));
        let sin2 = g.add(ENode::Binary(crate::term::BinaryOp::Pow, sin_a, two));
        let cos2 = g.add(ENode::Binary(crate::term::BinaryOp::Pow, cos_a, two));
        let sum = g.add(ENode::Binary(crate::term::BinaryOp::Add, sin2, cos2));
        let one = g.add(ENode::Number(NotNanBits::new(1.0)));

        saturate(&mut g, true, DEFAULT_ITERATION_CAP);
        assert_eq!(g.find(sum), g.find(one));
    }
}
