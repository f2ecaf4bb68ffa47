//! Algebraic simplifier.
//!
//! Applies a fixed point of local rewrites: constant folding, identity
//! laws, double-negation removal, and component-distribution over a
//! binary object. A separate *post-CSE* pass enables two additional
//! rules (`a+a → 2·a` and the symmetric-product collapses) that are held
//! back before CSE because they would hide the shared sub-expression the
//! e-graph is meant to discover.

use crate::diff::type_of;
use crate::term::{BinaryOp, Expr, Parameter, Type, UnaryOp};

/// Runs the pre-CSE rule set to a fixed point.
pub fn simplify(expr: &Expr, params: &[Parameter]) -> Expr {
    fixed_point(expr, params, false)
}

/// Runs the pre-CSE rule set plus the post-CSE-only rules, to a fixed point.
pub fn simplify_post_cse(expr: &Expr, params: &[Parameter]) -> Expr {
    fixed_point(expr, params, true)
}

fn fixed_point(expr: &Expr, params: &[Parameter], post_cse: bool) -> Expr {
    let mut current = expr.clone();
    loop {
        let next = step(&current, params, post_cse);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn step(expr: &Expr, params: &[Parameter], post_cse: bool) -> Expr {
    // Simplify children first (bottom-up), then apply rules at this node.
    let rebuilt = match expr {
        Expr::Number(_) | Expr::Variable(_) => expr.clone(),
        Expr::Unary(op, x) => Expr::un(*op, step(x, params, post_cse)),
        Expr::Binary(op, l, r) => Expr::bin(*op, step(l, params, post_cse), step(r, params, post_cse)),
        Expr::Call(name, args) => Expr::call(
            name.clone(),
            args.iter().map(|a| step(a, params, post_cse)).collect(),
        ),
        Expr::Component(obj, field) => Expr::comp(step(obj, params, post_cse), field.clone()),
    };
    apply_rules(&rebuilt, params, post_cse)
}

fn apply_rules(expr: &Expr, params: &[Parameter], post_cse: bool) -> Expr {
    if let Some(folded) = fold_constants(expr) {
        return folded;
    }

    match expr {
        Expr::Unary(UnaryOp::Plus, x) => (**x).clone(),
        Expr::Unary(UnaryOp::Neg, x) => match x.as_ref() {
            Expr::Unary(UnaryOp::Neg, inner) => (**inner).clone(),
            _ => expr.clone(),
        },

        Expr::Binary(op, l, r) => apply_binary_rules(*op, l, r, params, post_cse),

        Expr::Component(obj, field) => apply_component_distribution(obj, field, params),

        _ => expr.clone(),
    }
}

fn apply_binary_rules(op: BinaryOp, l: &Expr, r: &Expr, _params: &[Parameter], post_cse: bool) -> Expr {
    use BinaryOp::*;
    let this = Expr::bin(op, l.clone(), r.clone());
    match op {
        Add => {
            if l.is_zero() {
                return r.clone();
            }
            if r.is_zero() {
                return l.clone();
            }
            if post_cse && l.canonical() == r.canonical() {
                return Expr::mul(Expr::num(2.0), l.clone());
            }
            this
        }
        Sub => {
            if r.is_zero() {
                return l.clone();
            }
            if l.is_zero() {
                return Expr::neg(r.clone());
            }
            if l.structural() == r.structural() {
                return Expr::zero();
            }
            this
        }
        Mul => {
            if l.is_zero() || r.is_zero() {
                return Expr::zero();
            }
            if l.is_one() {
                return r.clone();
            }
            if r.is_one() {
                return l.clone();
            }
            if post_cse {
                if let Some(collapsed) = collapse_symmetric_product(l, r) {
                    return collapsed;
                }
            }
            this
        }
        Div => {
            if l.is_zero() {
                return Expr::zero();
            }
            if r.is_one() {
                return l.clone();
            }
            if l.structural() == r.structural() {
                return Expr::one();
            }
            this
        }
        Pow => {
            if r.is_zero() {
                return Expr::one();
            }
            if r.is_one() {
                return l.clone();
            }
            if l.is_zero() {
                return Expr::zero();
            }
            if l.is_one() {
                return Expr::one();
            }
            this
        }
    }
}

/// Recognizes the shape left behind once `a·b + b·a` has already
/// collapsed to `2·(a·b)` by the duplicate-addend rule above, and folds
/// an enclosing constant factor into it: `½·(2·x) → x`, `c·(2·x) →
/// 2·(c·x)` for any other `c`. Tried in both operand orders since `Mul`
/// is unordered here.
fn collapse_symmetric_product(l: &Expr, r: &Expr) -> Option<Expr> {
    fold_doubled_factor(l, r).or_else(|| fold_doubled_factor(r, l))
}

fn fold_doubled_factor(outer: &Expr, inner: &Expr) -> Option<Expr> {
    let Expr::Binary(BinaryOp::Mul, two, x) = inner else {
        return None;
    };
    if two.as_number() != Some(2.0) {
        return None;
    }
    match outer.as_number() {
        Some(c) => {
            let folded = c * 2.0;
            if folded == 1.0 {
                Some((**x).clone())
            } else {
                Some(Expr::mul(Expr::num(folded), (**x).clone()))
            }
        }
        None => Some(Expr::mul(Expr::num(2.0), Expr::mul(outer.clone(), (**x).clone()))),
    }
}

fn apply_component_distribution(obj: &Expr, field: &str, params: &[Parameter]) -> Expr {
    match obj {
        Expr::Binary(op, l, r) => {
            let lt = type_of(l, params);
            let rt = type_of(r, params);
            let project = |side: &Expr, ty: &Type| match ty {
                Type::Struct(_) => Expr::comp(side.clone(), field.to_string()),
                Type::Scalar => side.clone(),
            };
            Expr::bin(*op, project(l, &lt), project(r, &rt))
        }
        _ => Expr::comp(obj.clone(), field.to_string()),
    }
}

fn fold_constants(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::Binary(op, l, r) => {
            let (Expr::Number(a), Expr::Number(b)) = (l.as_ref(), r.as_ref()) else {
                return None;
            };
            let a = *a;
            let b = *b;
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return None;
                    }
                    a / b
                }
                BinaryOp::Pow => a.powf(b),
            };
            Some(Expr::num(v))
        }
        Expr::Unary(UnaryOp::Neg, x) => x.as_number().map(|v| Expr::num(-v)),
        Expr::Unary(UnaryOp::Plus, x) => x.as_number().map(Expr::num),
        Expr::Call(name, args) => match (name.as_str(), args.as_slice()) {
            ("sqrt", [Expr::Number(v)]) if *v >= 0.0 => Some(Expr::num(v.sqrt())),
            ("abs", [Expr::Number(v)]) => Some(Expr::num(v.abs())),
            ("sin", [Expr::Number(v)]) => Some(Expr::num(v.sin())),
            ("cos", [Expr::Number(v)]) => Some(Expr::num(v.cos())),
            ("exp", [Expr::Number(v)]) => Some(Expr::num(v.exp())),
            ("log", [Expr::Number(v)]) if *v > 0.0 => Some(Expr::num(v.ln())),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    fn params() -> Vec<Parameter> {
        vec![Parameter::scalar("x", true)]
    }

    #[test]
    fn folds_constants() {
        let e = Expr::add(Expr::num(2.0), Expr::num(3.0));
        assert_eq!(simplify(&e, &params()), Expr::num(5.0));
    }

    #[test]
    fn removes_add_zero() {
        let e = Expr::add(Expr::var("x"), Expr::zero());
        assert_eq!(simplify(&e, &params()), Expr::var("x"));
    }

    #[test]
    fn collapses_self_subtraction() {
        let e = Expr::sub(Expr::var("x"), Expr::var("x"));
        assert_eq!(simplify(&e, &params()), Expr::zero());
    }

    #[test]
    fn double_negation_cancels() {
        let e = Expr::neg(Expr::neg(Expr::var("x")));
        assert_eq!(simplify(&e, &params()), Expr::var("x"));
    }

    #[test]
    fn post_cse_collapses_duplicate_addend() {
        let e = Expr::add(Expr::var("x"), Expr::var("x"));
        assert_eq!(
            simplify_post_cse(&e, &params()),
            Expr::mul(Expr::num(2.0), Expr::var("x"))
        );
    }

    #[test]
    fn pre_cse_does_not_collapse_duplicate_addend() {
        let e = Expr::add(Expr::var("x"), Expr::var("x"));
        assert_eq!(simplify(&e, &params()), e);
    }

    #[test]
    fn post_cse_collapses_half_of_symmetric_product() {
        let ab = Expr::mul(Expr::var("a"), Expr::var("b"));
        let ba = Expr::mul(Expr::var("b"), Expr::var("a"));
        let e = Expr::mul(Expr::num(0.5), Expr::add(ab.clone(), ba));
        assert_eq!(simplify_post_cse(&e, &params()), ab);
    }

    #[test]
    fn post_cse_folds_constant_times_symmetric_product() {
        let ab = Expr::mul(Expr::var("a"), Expr::var("b"));
        let ba = Expr::mul(Expr::var("b"), Expr::var("a"));
        let e = Expr::mul(Expr::var("c"), Expr::add(ab.clone(), ba));
        assert_eq!(
            simplify_post_cse(&e, &params()),
            Expr::mul(Expr::num(2.0), Expr::mul(Expr::var("c"), ab))
        );
    }

    #[test]
    fn simplification_preserves_value_at_a_point() {
        let fns = parse_file("function f(x) { return (x + 0) * 1 - (x - x) }").unwrap();
        let simplified = simplify(&fns[0].ret, &fns[0].params);
        assert_eq!(simplified, Expr::var("x"));
    }
}
