//! Symbolic differentiator.
//!
//! Differentiates an inlined term with respect to a *full path*: either a
//! bare parameter name (scalar parameter) or `name.component` (one
//! component of a structured parameter). Produces one [`Expr`] per path,
//! assembled by [`differentiate`] into a [`Gradient`] for the whole
//! parameter.

use crate::error::{DiffError, DiffErrorKind};
use crate::expand::expand_call;
use crate::term::{
    BinaryOp, Expr, Function, Gradient, Parameter, Type, UnaryOp, EXPANDABLE, NONSMOOTH_SUBGRADIENT,
    NOT_DIFFERENTIABLE, UNSUPPORTED_VECTOR,
};

/// Infers the type of a fully-inlined expression (no local names remain,
/// only parameters, numbers, and built-in calls) given the function's
/// declared parameters. Assumes the expression already passed
/// type-checking; never errors, defaulting to `Scalar` for anything it
/// cannot otherwise resolve.
pub fn type_of(expr: &Expr, params: &[Parameter]) -> Type {
    match expr {
        Expr::Number(_) => Type::Scalar,
        Expr::Variable(name) => params
            .iter()
            .find(|p| &p.name == name)
            .map(|p| p.ty())
            .unwrap_or(Type::Scalar),
        Expr::Unary(_, x) => type_of(x, params),
        Expr::Binary(_, l, r) => {
            let lt = type_of(l, params);
            let rt = type_of(r, params);
            match (lt, rt) {
                (Type::Struct(c), _) | (_, Type::Struct(c)) => Type::Struct(c),
                (Type::Scalar, Type::Scalar) => Type::Scalar,
            }
        }
        Expr::Component(_, _) | Expr::Call(_, _) => Type::Scalar,
    }
}

/// Does `expr` contain a free occurrence of the differentiation variable
/// named by `path` (either a bare parameter name or `name.component`)?
fn depends_on(expr: &Expr, path: &str) -> bool {
    match expr {
        Expr::Number(_) => false,
        Expr::Variable(v) => v == path,
        Expr::Unary(_, x) => depends_on(x, path),
        Expr::Binary(_, l, r) => depends_on(l, path) || depends_on(r, path),
        Expr::Call(_, args) => args.iter().any(|a| depends_on(a, path)),
        Expr::Component(obj, field) => match obj.as_ref() {
            Expr::Variable(v) => format!("{v}.{field}") == path,
            other => depends_on(other, path),
        },
    }
}

/// Differentiates a single parameter (all its components, if structured)
/// of an inlined expression.
pub fn differentiate(
    inlined: &Expr,
    param: &Parameter,
    params: &[Parameter],
) -> Result<Gradient, DiffError> {
    match &param.components {
        None => {
            let d = diff_wrt(inlined, &param.name, params)?;
            Ok(Gradient::Scalar(d))
        }
        Some(components) => {
            let mut out = Vec::with_capacity(components.len());
            for c in components {
                let path = format!("{}.{}", param.name, c);
                let d = diff_wrt(inlined, &path, params)?;
                out.push((c.clone(), d));
            }
            Ok(Gradient::Struct(out))
        }
    }
}

/// Differentiates `expr` with respect to the full path `x`.
pub fn diff_wrt(expr: &Expr, x: &str, params: &[Parameter]) -> Result<Expr, DiffError> {
    match expr {
        Expr::Number(_) => Ok(Expr::zero()),

        Expr::Variable(v) => Ok(if v == x { Expr::one() } else { Expr::zero() }),

        Expr::Component(obj, field) => diff_component(obj, field, x, params),

        Expr::Unary(UnaryOp::Plus, inner) => diff_wrt(inner, x, params),
        Expr::Unary(UnaryOp::Neg, inner) => Ok(Expr::neg(diff_wrt(inner, x, params)?)),

        Expr::Binary(BinaryOp::Add, l, r) => {
            Ok(Expr::add(diff_wrt(l, x, params)?, diff_wrt(r, x, params)?))
        }
        Expr::Binary(BinaryOp::Sub, l, r) => {
            Ok(Expr::sub(diff_wrt(l, x, params)?, diff_wrt(r, x, params)?))
        }
        Expr::Binary(BinaryOp::Mul, l, r) => {
            let ld = diff_wrt(l, x, params)?;
            let rd = diff_wrt(r, x, params)?;
            Ok(Expr::add(
                Expr::mul(ld, (**r).clone()),
                Expr::mul((**l).clone(), rd),
            ))
        }
        Expr::Binary(BinaryOp::Div, l, r) => {
            let ld = diff_wrt(l, x, params)?;
            let rd = diff_wrt(r, x, params)?;
            let numer = Expr::sub(
                Expr::mul(ld, (**r).clone()),
                Expr::mul((**l).clone(), rd),
            );
            Ok(Expr::div(numer, Expr::pow((**r).clone(), Expr::num(2.0))))
        }
        Expr::Binary(BinaryOp::Pow, l, r) => {
            if depends_on(r, x) {
                return Err(DiffError {
                    primitive: "^".to_string(),
                    reason: "exponent depends on the differentiation variable".to_string(),
                    kind: DiffErrorKind::NotSupported,
                });
            }
            let ld = diff_wrt(l, x, params)?;
            let new_exp = Expr::sub((**r).clone(), Expr::one());
            Ok(Expr::mul(
                Expr::mul((**r).clone(), Expr::pow((**l).clone(), new_exp)),
                ld,
            ))
        }

        Expr::Call(name, args) => diff_call(name, args, x, params),
    }
}

fn diff_component(
    obj: &Expr,
    field: &str,
    x: &str,
    params: &[Parameter],
) -> Result<Expr, DiffError> {
    match obj {
        Expr::Variable(v) => {
            let full = format!("{v}.{field}");
            Ok(if full == x { Expr::one() } else { Expr::zero() })
        }
        Expr::Binary(op, l, r) => {
            let lt = type_of(l, params);
            let rt = type_of(r, params);
            let project = |side: &Expr, ty: &Type| -> Expr {
                match ty {
                    Type::Struct(_) => Expr::comp(side.clone(), field.to_string()),
                    Type::Scalar => side.clone(),
                }
            };
            let l2 = project(l, &lt);
            let r2 = project(r, &rt);
            diff_wrt(&Expr::bin(*op, l2, r2), x, params)
        }
        Expr::Unary(op, inner) => {
            let distributed = Expr::un(*op, Expr::comp(inner.clone(), field.to_string()));
            diff_wrt(&distributed, x, params)
        }
        _ => Err(DiffError::not_supported(
            format!(".{field}"),
            "component access of a non-decomposable expression",
        )),
    }
}

fn diff_call(name: &str, args: &[Expr], x: &str, params: &[Parameter]) -> Result<Expr, DiffError> {
    if EXPANDABLE.contains(&name) || UNSUPPORTED_VECTOR.contains(&name) {
        let expanded = expand_call(name, args)?;
        return diff_wrt(&expanded, x, params);
    }

    if NOT_DIFFERENTIABLE.contains(&name) {
        return Err(DiffError::not_implemented(
            name,
            "parse-recognized but not differentiable in this core",
        ));
    }

    if NONSMOOTH_SUBGRADIENT.contains(&name) {
        // Sub-gradient by the first-argument convention: the
        // derivative is always that of the first (or clamped) argument,
        // which is mathematically incorrect at ties but is the declared
        // behavior this core preserves.
        return diff_wrt(&args[0], x, params);
    }

    match (name, args) {
        ("sin", [u]) => Ok(Expr::mul(Expr::call("cos", vec![u.clone()]), diff_wrt(u, x, params)?)),
        ("cos", [u]) => Ok(Expr::neg(Expr::mul(
            Expr::call("sin", vec![u.clone()]),
            diff_wrt(u, x, params)?,
        ))),
        ("tan", [u]) => {
            let ud = diff_wrt(u, x, params)?;
            let cos2 = Expr::pow(Expr::call("cos", vec![u.clone()]), Expr::num(2.0));
            Ok(Expr::div(ud, cos2))
        }
        ("exp", [u]) => Ok(Expr::mul(Expr::call("exp", vec![u.clone()]), diff_wrt(u, x, params)?)),
        ("log", [u]) => Ok(Expr::div(diff_wrt(u, x, params)?, u.clone())),
        ("sqrt", [u]) => {
            let ud = diff_wrt(u, x, params)?;
            let denom = Expr::mul(Expr::num(2.0), Expr::call("sqrt", vec![u.clone()]));
            Ok(Expr::div(ud, denom))
        }
        ("abs", [u]) => {
            let ud = diff_wrt(u, x, params)?;
            Ok(Expr::mul(
                ud,
                Expr::div(u.clone(), Expr::call("abs", vec![u.clone()])),
            ))
        }
        ("atan", [u]) => {
            let ud = diff_wrt(u, x, params)?;
            let denom = Expr::add(Expr::one(), Expr::pow(u.clone(), Expr::num(2.0)));
            Ok(Expr::div(ud, denom))
        }
        ("atan2", [y, xx]) => {
            let yd = diff_wrt(y, x, params)?;
            let xd = diff_wrt(xx, x, params)?;
            let numer = Expr::sub(Expr::mul(xx.clone(), yd), Expr::mul(y.clone(), xd));
            let denom = Expr::add(
                Expr::pow(xx.clone(), Expr::num(2.0)),
                Expr::pow(y.clone(), Expr::num(2.0)),
            );
            Ok(Expr::div(numer, denom))
        }
        _ => Err(DiffError::not_supported(
            name,
            "unrecognized or wrong-arity call reaching the differentiator",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline::inline;
    use crate::parser::parse_file;

    #[test]
    fn square_derivative_is_2x() {
        let fns = parse_file("function square(x∇) { return x * x }").unwrap();
        let inlined = inline(&fns[0]);
        let g = differentiate(&inlined, &fns[0].params[0], &fns[0].params).unwrap();
        match g {
            Gradient::Scalar(e) => {
                // 1*x + x*1, simplifies to 2x but we only check structure here.
                assert_eq!(
                    e,
                    Expr::add(Expr::mul(Expr::one(), Expr::var("x")), Expr::mul(Expr::var("x"), Expr::one()))
                );
            }
            _ => panic!("expected scalar gradient"),
        }
    }

    #[test]
    fn pow_with_variable_exponent_is_not_supported() {
        let fns = parse_file("function f(x∇, y) { return x ^ y }").unwrap();
        let inlined = inline(&fns[0]);
        let err = differentiate(&inlined, &fns[0].params[0], &fns[0].params).unwrap_err();
        assert_eq!(err.kind, DiffErrorKind::NotSupported);
    }

    #[test]
    fn pow_builtin_is_not_implemented() {
        let fns = parse_file("function f(x∇) { return pow(x, 3) }").unwrap();
        let inlined = inline(&fns[0]);
        let err = differentiate(&inlined, &fns[0].params[0], &fns[0].params).unwrap_err();
        assert_eq!(err.kind, DiffErrorKind::NotImplemented);
    }

    #[test]
    fn min_uses_first_argument_subgradient() {
        let fns = parse_file("function f(x∇, y∇) { return min(x, y) }").unwrap();
        let inlined = inline(&fns[0]);
        let gx = differentiate(&inlined, &fns[0].params[0], &fns[0].params).unwrap();
        let gy = differentiate(&inlined, &fns[0].params[1], &fns[0].params).unwrap();
        assert_eq!(gx, Gradient::Scalar(Expr::one()));
        assert_eq!(gy, Gradient::Scalar(Expr::zero()));
    }

    #[test]
    fn struct_component_derivative_of_dot_product() {
        let fns = parse_file("function dot(u∇:{x,y}, v∇:{x,y}) { return u.x*v.x + u.y*v.y }").unwrap();
        let inlined = inline(&fns[0]);
        let g = differentiate(&inlined, &fns[0].params[0], &fns[0].params).unwrap();
        match g {
            Gradient::Struct(cs) => {
                assert_eq!(cs.len(), 2);
                assert_eq!(cs[0].0, "x");
            }
            _ => panic!("expected struct gradient"),
        }
    }
}
