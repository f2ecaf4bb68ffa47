//! Local-assignment inliner.
//!
//! Builds a substitution map from every local assignment's left-hand
//! side to its right-hand side, then returns the return expression with
//! all local names fully substituted. Sharing across assignments is not
//! preserved here — the e-graph rediscovers it later.

use crate::term::{Expr, Function};

/// Inlines every local assignment into the return expression, in
/// declaration order (a later assignment may reference an earlier one,
/// never the reverse.
pub fn inline(f: &Function) -> Expr {
    let mut bindings: Vec<(&str, Expr)> = Vec::with_capacity(f.locals.len());
    for local in &f.locals {
        let mut rhs = local.expr.clone();
        for (name, value) in &bindings {
            rhs = rhs.subst(name, value);
        }
        bindings.push((local.name.as_str(), rhs));
    }
    let mut ret = f.ret.clone();
    for (name, value) in &bindings {
        ret = ret.subst(name, value);
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    #[test]
    fn inlines_chained_locals() {
        let fns = parse_file(
            "function f(x) { a = x + 1\nb = a * 2\nreturn b }",
        )
        .unwrap();
        let inlined = inline(&fns[0]);
        let expected = Expr::mul(Expr::add(Expr::var("x"), Expr::num(1.0)), Expr::num(2.0));
        assert_eq!(inlined, expected);
    }

    #[test]
    fn function_with_no_locals_is_just_the_return() {
        let fns = parse_file("function f(x) { return x * x }").unwrap();
        assert_eq!(inline(&fns[0]), fns[0].ret);
    }
}
