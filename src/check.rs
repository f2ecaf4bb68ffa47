//! Numerical gradient verification.
//!
//! Evaluates both the original function and each analytically-derived
//! gradient expression at a handful of sample points, compares the
//! analytical gradient against a central finite-difference estimate, and
//! reports a [`ToleranceFailure`] for the first mismatch found. This is a
//! correctness net on the differentiator and simplifier, not a general
//! arithmetic evaluator — the interpreter below only needs to handle the
//! built-ins this language recognizes.

use std::collections::HashMap;

use crate::error::{CheckError, ToleranceFailure};
use crate::term::{BinaryOp, Expr, Gradient, Parameter, UnaryOp};

/// Finite-difference step scales tried at each sample point, matching
/// the three orders of magnitude the checker is expected to cover.
pub const CHECK_SCALES: &[f64] = &[0.1, 1.0, 10.0];

const ABS_TOLERANCE: f64 = 1e-4;
const REL_TOLERANCE: f64 = 1e-4;

/// Default central-difference step, overridable via `--epsilon`.
pub const DEFAULT_FD_EPSILON: f64 = 1e-5;

/// An assignment of every scalar path (`name` or `name.component`) to a
/// sample value.
pub type Env = HashMap<String, f64>;

/// Evaluates `expr` under `env`. Panics only on primitives the type
/// checker should already have rejected; returns `f64::NAN` for
/// mathematically undefined results (division by zero, `sqrt` of a
/// negative number) so the caller can treat them as check failures
/// rather than aborting the whole run.
pub fn eval(expr: &Expr, env: &Env) -> f64 {
    match expr {
        Expr::Number(v) => *v,
        Expr::Variable(name) => *env.get(name).unwrap_or(&f64::NAN),
        Expr::Component(obj, field) => {
            if let Expr::Variable(base) = obj.as_ref() {
                *env.get(&format!("{base}.{field}")).unwrap_or(&f64::NAN)
            } else {
                f64::NAN
            }
        }
        Expr::Unary(UnaryOp::Plus, x) => eval(x, env),
        Expr::Unary(UnaryOp::Neg, x) => -eval(x, env),
        Expr::Binary(op, l, r) => {
            let a = eval(l, env);
            let b = eval(r, env);
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Pow => a.powf(b),
            }
        }
        Expr::Call(name, args) => eval_call(name, args, env),
    }
}

fn eval_call(name: &str, args: &[Expr], env: &Env) -> f64 {
    if crate::term::EXPANDABLE.contains(&name) {
        return match crate::expand::expand_call(name, args) {
            Ok(expanded) => eval(&expanded, env),
            Err(_) => f64::NAN,
        };
    }
    let a = |i: usize| eval(&args[i], env);
    match name {
        "sin" => a(0).sin(),
        "cos" => a(0).cos(),
        "tan" => a(0).tan(),
        "exp" => a(0).exp(),
        "log" => a(0).ln(),
        "sqrt" => a(0).sqrt(),
        "abs" => a(0).abs(),
        "asin" => a(0).asin(),
        "acos" => a(0).acos(),
        "atan" => a(0).atan(),
        "atan2" => a(0).atan2(a(1)),
        "pow" => a(0).powf(a(1)),
        "min" => a(0).min(a(1)),
        "max" => a(0).max(a(1)),
        "clamp" => a(0).clamp(a(1).min(a(2)), a(1).max(a(2))),
        _ => f64::NAN,
    }
}

/// Builds a sample environment scaled by `scale`: every scalar
/// parameter is set to `scale`, every structured-parameter component to
/// `scale` times its 1-based position, so distinct components never
/// accidentally coincide.
fn sample_env(params: &[Parameter], scale: f64) -> Env {
    let mut env = Env::new();
    for p in params {
        match &p.components {
            None => {
                env.insert(p.name.clone(), scale);
            }
            Some(components) => {
                for (i, c) in components.iter().enumerate() {
                    env.insert(format!("{}.{}", p.name, c), scale * (i as f64 + 1.0));
                }
            }
        }
    }
    env
}

fn within_tolerance(analytical: f64, numerical: f64) -> bool {
    let diff = (analytical - numerical).abs();
    diff <= ABS_TOLERANCE || diff / (numerical.abs() + 1e-10) <= REL_TOLERANCE
}

/// Central finite-difference estimate of `d(body)/d(path)` at `env`.
fn finite_difference(body: &Expr, path: &str, env: &Env, epsilon: f64) -> f64 {
    let base = *env.get(path).unwrap_or(&0.0);
    let mut plus = env.clone();
    let mut minus = env.clone();
    plus.insert(path.to_string(), base + epsilon);
    minus.insert(path.to_string(), base - epsilon);
    (eval(body, &plus) - eval(body, &minus)) / (2.0 * epsilon)
}

/// Verifies one parameter's gradient against `body` (the fully-inlined,
/// not-yet-differentiated function expression) at every scale in
/// [`CHECK_SCALES`]. Returns the first tolerance failure found, if any.
pub fn check_gradient(
    body: &Expr,
    param: &Parameter,
    gradient: &Gradient,
    params: &[Parameter],
    epsilon: f64,
) -> Result<(), CheckError> {
    let paths: Vec<(String, &Expr)> = match gradient {
        Gradient::Scalar(e) => vec![(param.name.clone(), e)],
        Gradient::Struct(cs) => cs
            .iter()
            .map(|(c, e)| (format!("{}.{}", param.name, c), e))
            .collect(),
    };

    for scale in CHECK_SCALES {
        let env = sample_env(params, *scale);
        for (path, expr) in &paths {
            let analytical = eval(expr, &env);
            let numerical = finite_difference(body, path, &env, epsilon);
            if analytical.is_nan() || numerical.is_nan() {
                continue;
            }
            if !within_tolerance(analytical, numerical) {
                return Err(CheckError::ToleranceExceeded(ToleranceFailure {
                    path: path.clone(),
                    point_scale: *scale,
                    analytical,
                    numerical,
                    abs_tolerance: ABS_TOLERANCE,
                    rel_tolerance: REL_TOLERANCE,
                }));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::differentiate;
    use crate::inline::inline;
    use crate::parser::parse_file;

    #[test]
    fn square_gradient_passes_check() {
        let fns = parse_file("function square(x∇) { return x * x }").unwrap();
        let body = inline(&fns[0]);
        let g = differentiate(&body, &fns[0].params[0], &fns[0].params).unwrap();
        check_gradient(&body, &fns[0].params[0], &g, &fns[0].params, DEFAULT_FD_EPSILON).unwrap();
    }

    #[test]
    fn wrong_gradient_fails_check() {
        let fns = parse_file("function square(x∇) { return x * x }").unwrap();
        let body = inline(&fns[0]);
        let bad = Gradient::Scalar(Expr::var("x"));
        let err = check_gradient(&body, &fns[0].params[0], &bad, &fns[0].params, DEFAULT_FD_EPSILON).unwrap_err();
        matches!(err, CheckError::ToleranceExceeded(_));
    }

    #[test]
    fn struct_component_gradient_passes_check() {
        let fns = parse_file("function dot(u∇:{x,y}, v∇:{x,y}) { return u.x*v.x + u.y*v.y }").unwrap();
        let body = inline(&fns[0]);
        let g = differentiate(&body, &fns[0].params[0], &fns[0].params).unwrap();
        check_gradient(&body, &fns[0].params[0], &g, &fns[0].params, DEFAULT_FD_EPSILON).unwrap();
    }
}
