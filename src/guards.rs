//! Division/domain guard analysis, enabled by `--guards`.
//!
//! Walks a gradient expression looking for divisions, square roots, and
//! logarithms whose argument is not *trivially* safe — a sum of squares
//! or a literal nonzero constant is trivially safe, anything else is
//! flagged. This is a syntactic heuristic, not a proof: it exists to
//! surface likely numerical landmines in generated code, not to
//! guarantee their absence.

use crate::term::{BinaryOp, Expr};

/// Default epsilon added to a guarded division's denominator, used when
/// `--guards` is passed without an explicit `--guard-epsilon`.
pub const DEFAULT_GUARD_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardKind {
    DivisionByPossibleZero,
    SqrtOfPossiblyNegative,
    LogOfPossiblyNonPositive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardWarning {
    pub kind: GuardKind,
    pub expression: String,
}

/// Is `denom` provably never zero from its syntax alone? A sum of two
/// squares is safe unless both addends can independently be zero, which
/// this heuristic does not attempt to rule out — it only recognizes the
/// shape, matching the common `magnitude`/`distance` denominators this
/// language actually generates.
pub(crate) fn trivially_nonzero(expr: &Expr) -> bool {
    match expr {
        Expr::Number(v) => *v != 0.0,
        Expr::Call(name, _) if name == "sqrt" => false,
        Expr::Binary(BinaryOp::Add, l, r) => is_square(l) && is_square(r),
        Expr::Binary(BinaryOp::Pow, base, exp) => {
            matches!(exp.as_number(), Some(e) if e as i64 % 2 == 0) && !matches!(base.as_number(), Some(0.0))
        }
        _ => false,
    }
}

fn is_square(expr: &Expr) -> bool {
    matches!(expr, Expr::Binary(BinaryOp::Pow, _, e) if e.as_number() == Some(2.0))
        || matches!(expr, Expr::Binary(BinaryOp::Mul, l, r) if l == r)
}

fn trivially_nonnegative(expr: &Expr) -> bool {
    match expr {
        Expr::Number(v) => *v >= 0.0,
        Expr::Binary(BinaryOp::Pow, _, e) => matches!(e.as_number(), Some(v) if v as i64 % 2 == 0),
        Expr::Binary(BinaryOp::Add, l, r) => trivially_nonnegative(l) && trivially_nonnegative(r),
        Expr::Call(name, _) if matches!(name.as_str(), "sqrt" | "exp" | "abs") => true,
        _ => false,
    }
}

fn trivially_positive(expr: &Expr) -> bool {
    match expr {
        Expr::Number(v) => *v > 0.0,
        Expr::Call(name, _) if name == "exp" => true,
        _ => false,
    }
}

/// Collects every non-trivially-safe division or domain-sensitive call
/// reachable from `expr`.
pub fn analyze(expr: &Expr) -> Vec<GuardWarning> {
    let mut out = Vec::new();
    walk(expr, &mut out);
    out
}

fn walk(expr: &Expr, out: &mut Vec<GuardWarning>) {
    match expr {
        Expr::Binary(BinaryOp::Div, l, r) => {
            if !trivially_nonzero(r) {
                out.push(GuardWarning {
                    kind: GuardKind::DivisionByPossibleZero,
                    expression: expr.structural(),
                });
            }
            walk(l, out);
            walk(r, out);
        }
        Expr::Binary(_, l, r) => {
            walk(l, out);
            walk(r, out);
        }
        Expr::Unary(_, x) => walk(x, out),
        Expr::Call(name, args) => {
            if name == "sqrt" {
                if let Some(arg) = args.first() {
                    if !trivially_nonnegative(arg) {
                        out.push(GuardWarning {
                            kind: GuardKind::SqrtOfPossiblyNegative,
                            expression: expr.structural(),
                        });
                    }
                }
            }
            if name == "log" {
                if let Some(arg) = args.first() {
                    if !trivially_positive(arg) {
                        out.push(GuardWarning {
                            kind: GuardKind::LogOfPossiblyNonPositive,
                            expression: expr.structural(),
                        });
                    }
                }
            }
            for a in args {
                walk(a, out);
            }
        }
        Expr::Component(obj, _) => walk(obj, out),
        Expr::Number(_) | Expr::Variable(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_division_by_bare_variable() {
        let e = Expr::div(Expr::var("a"), Expr::var("b"));
        let warnings = analyze(&e);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, GuardKind::DivisionByPossibleZero);
    }

    #[test]
    fn sum_of_squares_denominator_is_not_flagged() {
        let denom = Expr::add(
            Expr::pow(Expr::var("x"), Expr::num(2.0)),
            Expr::pow(Expr::var("y"), Expr::num(2.0)),
        );
        let e = Expr::div(Expr::one(), denom);
        assert!(analyze(&e).is_empty());
    }

    #[test]
    fn sqrt_of_sum_of_squares_is_not_flagged() {
        let arg = Expr::add(
            Expr::pow(Expr::var("x"), Expr::num(2.0)),
            Expr::pow(Expr::var("y"), Expr::num(2.0)),
        );
        let e = Expr::call("sqrt", vec![arg]);
        assert!(analyze(&e).is_empty());
    }

    #[test]
    fn sqrt_of_bare_variable_is_flagged() {
        let e = Expr::call("sqrt", vec![Expr::var("x")]);
        let warnings = analyze(&e);
        assert_eq!(warnings[0].kind, GuardKind::SqrtOfPossiblyNegative);
    }
}
