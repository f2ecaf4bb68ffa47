//! Built-in vector expander.
//!
//! Rewrites the expandable vector primitives into scalar component
//! arithmetic. Expansion runs lazily from inside the differentiator on
//! every call site encountered — nothing pre-walks the tree up
//! front, since a call that is never reached during differentiation
//! never needs expanding.

use crate::error::DiffError;
use crate::term::Expr;

/// Expands one expandable built-in call into scalar arithmetic.
/// `normalize2d/3d` and `cross3d` are parse-recognized but fail here:
/// their results are not scalars, or (for `cross3d`) the two in-plane
/// components require division-by-zero handling outside this core.
pub fn expand_call(name: &str, args: &[Expr]) -> Result<Expr, DiffError> {
    let x = |e: &Expr, c: &str| Expr::comp(e.clone(), c);
    match (name, args) {
        ("dot2d", [u, v]) => Ok(Expr::add(
            Expr::mul(x(u, "x"), x(v, "x")),
            Expr::mul(x(u, "y"), x(v, "y")),
        )),
        ("cross2d", [u, v]) => Ok(Expr::sub(
            Expr::mul(x(u, "x"), x(v, "y")),
            Expr::mul(x(u, "y"), x(v, "x")),
        )),
        ("magnitude2d", [v]) => Ok(Expr::call(
            "sqrt",
            vec![Expr::add(
                Expr::pow(x(v, "x"), Expr::num(2.0)),
                Expr::pow(x(v, "y"), Expr::num(2.0)),
            )],
        )),
        ("distance2d", [p, q]) => Ok(Expr::call(
            "sqrt",
            vec![Expr::add(
                Expr::pow(Expr::sub(x(q, "x"), x(p, "x")), Expr::num(2.0)),
                Expr::pow(Expr::sub(x(q, "y"), x(p, "y")), Expr::num(2.0)),
            )],
        )),
        ("dot3d", [u, v]) => Ok(Expr::add(
            Expr::add(
                Expr::mul(x(u, "x"), x(v, "x")),
                Expr::mul(x(u, "y"), x(v, "y")),
            ),
            Expr::mul(x(u, "z"), x(v, "z")),
        )),
        ("magnitude3d", [v]) => Ok(Expr::call(
            "sqrt",
            vec![Expr::add(
                Expr::add(
                    Expr::pow(x(v, "x"), Expr::num(2.0)),
                    Expr::pow(x(v, "y"), Expr::num(2.0)),
                ),
                Expr::pow(x(v, "z"), Expr::num(2.0)),
            )],
        )),
        ("normalize2d", _) | ("normalize3d", _) => Err(DiffError::not_supported(
            name,
            "result is a vector, not a scalar",
        )),
        ("cross3d", _) => Err(DiffError::not_supported(
            name,
            "result is a vector; scalar-component extraction is outside this core",
        )),
        _ => unreachable!("expand_call called on a non-expandable primitive '{name}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot2d_expands_to_scalar_sum() {
        let u = Expr::var("u");
        let v = Expr::var("v");
        let got = expand_call("dot2d", &[u, v]).unwrap();
        let expected = Expr::add(
            Expr::mul(Expr::comp(Expr::var("u"), "x"), Expr::comp(Expr::var("v"), "x")),
            Expr::mul(Expr::comp(Expr::var("u"), "y"), Expr::comp(Expr::var("v"), "y")),
        );
        assert_eq!(got, expected);
    }

    #[test]
    fn normalize2d_is_unsupported() {
        assert!(expand_call("normalize2d", &[Expr::var("v")]).is_err());
    }
}
