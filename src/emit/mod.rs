//! Multi-dialect code emission.
//!
//! Each target language implements the small [`Dialect`] trait; the
//! shared [`render`] walker in this module owns operator precedence and
//! parenthesization so every dialect agrees on when parens are needed,
//! and each dialect only has to say how its own syntax spells a number,
//! a call, a declaration, and a function wrapper.

pub mod csharp;
pub mod javascript;
pub mod python;
pub mod typescript;

use crate::compiler::GradientRoot;
use crate::error::EmitError;
use crate::extract::Extraction;
use crate::guards::trivially_nonzero;
use crate::term::{BinaryOp, Expr, Parameter, UnaryOp};

/// Binding power used purely for parenthesization decisions while
/// printing — unrelated to the parser's Pratt table, though the
/// relative ordering of the operators is the same.
fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add | BinaryOp::Sub => 1,
        BinaryOp::Mul | BinaryOp::Div => 2,
        BinaryOp::Pow => 3,
    }
}

pub trait Dialect {
    /// Line comment prefix (`//` or `#`), or `None` under `--no-comments`.
    fn comment_prefix(&self) -> Option<&'static str>;

    fn render_number(&self, v: f64) -> String;

    fn render_variable(&self, name: &str) -> String {
        name.to_string()
    }

    fn render_component(&self, obj: &str, field: &str) -> String {
        format!("{obj}.{field}")
    }

    fn binary_symbol(&self, op: BinaryOp) -> &'static str {
        op.symbol()
    }

    fn unary_symbol(&self, op: UnaryOp) -> &'static str {
        op.symbol()
    }

    /// Renders a call to a recognized primitive. Dialects map primitive
    /// names onto their own math library (`Math.pow`, `**`, `Math.Pow`, ...).
    fn render_call(&self, name: &str, args: &[String]) -> Result<String, EmitError>;

    /// Does this dialect render `^` as a call (`Math.Pow(a, b)`) rather
    /// than an infix operator? Only C# needs this — it has no power
    /// operator.
    fn pow_as_call(&self) -> bool {
        false
    }

    /// `let`/`const`/`var` declaration of a CSE temporary.
    fn render_temp(&self, name: &str, value: &str) -> String;

    fn function_open(&self, name: &str, params: &[Parameter]) -> String;

    /// Opens a function whose return value is a record rather than a
    /// bare number — the forward function when the source function
    /// itself returns a struct, and always the combined gradient
    /// function. Defaults to [`Dialect::function_open`]; only C# needs a
    /// different return-type keyword, since its scalar return type is a
    /// concrete `double`/`float` rather than inferred.
    fn function_open_record(&self, name: &str, params: &[Parameter]) -> String {
        self.function_open(name, params)
    }

    fn function_close(&self) -> &'static str;

    /// Wraps a single rendered expression in this dialect's return
    /// statement syntax.
    fn render_return_stmt(&self, value: &str) -> String;

    /// Renders a record literal from its already-rendered fields — an
    /// object literal for TS/JS, a dict for Python, an anonymous type for
    /// C#. Used for a structured forward return and for the combined
    /// `{ value, d<name>... }` gradient return, including nested
    /// records for a structured parameter's own gradient.
    fn render_record_literal(&self, fields: &[(String, String)]) -> String;

    /// Renders `l / (r + sign(r)*epsilon)`, the guarded form of a
    /// division flagged by `--guards`. `sign(r)` is taken as `+1` at
    /// `r == 0`. The default works for every dialect with a C-style
    /// ternary; only Python overrides it.
    fn render_guarded_div(&self, l: &str, r: &str, epsilon: f64) -> String {
        let eps = self.render_number(epsilon);
        format!("{l} / ({r} + ({r} >= 0 ? 1 : -1) * {eps})")
    }
}

/// A value returned by an emitted function: either a single rendered
/// expression, or a named record of further values (used for a
/// structured forward return and for the combined gradient return).
pub enum ReturnValue {
    Scalar(String),
    Record(Vec<(String, ReturnValue)>),
}

fn render_value_tree(value: &ReturnValue, d: &dyn Dialect) -> String {
    match value {
        ReturnValue::Scalar(s) => s.clone(),
        ReturnValue::Record(fields) => {
            let rendered: Vec<(String, String)> =
                fields.iter().map(|(n, v)| (n.clone(), render_value_tree(v, d))).collect();
            d.render_record_literal(&rendered)
        }
    }
}

/// Renders a full `return ...` statement for `value`.
pub fn render_return(value: &ReturnValue, d: &dyn Dialect) -> String {
    d.render_return_stmt(&render_value_tree(value, d))
}

/// `Some(epsilon)` guards every division whose denominator is not
/// provably nonzero from its syntax, rewriting it to `l / (r +
/// sign(r)*epsilon)`; `None` renders divisions as plain infix.
type GuardEpsilon = Option<f64>;

fn render(expr: &Expr, d: &dyn Dialect, guard: GuardEpsilon) -> Result<String, EmitError> {
    match expr {
        Expr::Number(v) => Ok(d.render_number(*v)),
        Expr::Variable(name) => Ok(d.render_variable(name)),
        Expr::Component(obj, field) => {
            let obj_s = render_child(obj, d, u8::MAX, guard)?;
            Ok(d.render_component(&obj_s, field))
        }
        Expr::Unary(op, x) => {
            let xs = render_child(x, d, 10, guard)?;
            Ok(format!("{}{}", d.unary_symbol(*op), xs))
        }
        Expr::Binary(BinaryOp::Pow, l, r) if d.pow_as_call() => {
            let ls = render(l, d, guard)?;
            let rs = render(r, d, guard)?;
            d.render_call("pow", &[ls, rs])
        }
        Expr::Binary(BinaryOp::Div, l, r) if guard.is_some_and(|_| !trivially_nonzero(r)) => {
            let ls = render_child(l, d, precedence(BinaryOp::Div), guard)?;
            let rs = render(r, d, guard)?;
            Ok(d.render_guarded_div(&ls, &rs, guard.expect("checked above")))
        }
        Expr::Binary(op, l, r) => {
            let prec = precedence(*op);
            let ls = render_child(l, d, prec, guard)?;
            // Right operand of a left-associative op (or either side of
            // `^`, which this language treats as right-associative) needs
            // parens at equal precedence to preserve the original grouping.
            let r_min = if matches!(op, BinaryOp::Pow) { prec } else { prec + 1 };
            let rs = render_child(r, d, r_min, guard)?;
            Ok(format!("{} {} {}", ls, d.binary_symbol(*op), rs))
        }
        Expr::Call(name, args) => {
            let rendered: Result<Vec<String>, EmitError> =
                args.iter().map(|a| render(a, d, guard)).collect();
            d.render_call(name, &rendered?)
        }
    }
}

fn render_child(expr: &Expr, d: &dyn Dialect, min_prec: u8, guard: GuardEpsilon) -> Result<String, EmitError> {
    let s = render(expr, d, guard)?;
    let needs_parens = match expr {
        Expr::Binary(BinaryOp::Div, _, r) if guard.is_some_and(|_| !trivially_nonzero(r)) => {
            precedence(BinaryOp::Div) < min_prec
        }
        Expr::Binary(op, _, _) => precedence(*op) < min_prec,
        Expr::Unary(UnaryOp::Neg, _) => min_prec > 10,
        _ => false,
    };
    Ok(if needs_parens { format!("({s})") } else { s })
}

fn emit_temps(temps: &[(String, Expr)], d: &dyn Dialect, guard: GuardEpsilon, out: &mut String) -> Result<(), EmitError> {
    for (name, expr) in temps {
        let rendered = render(expr, d, guard)?;
        out.push_str(&d.render_temp(name, &rendered));
        out.push('\n');
    }
    Ok(())
}

/// Builds a [`ReturnValue`] out of extracted roots, collapsing to a bare
/// scalar when there is exactly one unnamed root (a scalar return),
/// otherwise a record keyed by `names`.
fn roots_to_return_value(
    roots: &[Expr],
    names: &[String],
    d: &dyn Dialect,
    guard: GuardEpsilon,
) -> Result<ReturnValue, EmitError> {
    if roots.len() == 1 && names[0].is_empty() {
        return Ok(ReturnValue::Scalar(render(&roots[0], d, guard)?));
    }
    let fields = names
        .iter()
        .zip(roots.iter())
        .map(|(n, e)| Ok((n.clone(), ReturnValue::Scalar(render(e, d, guard)?))))
        .collect::<Result<Vec<_>, EmitError>>()?;
    Ok(ReturnValue::Record(fields))
}

/// Renders the forward function: the source function's own (possibly
/// CSE-extracted) computation, returning its declared value — a record
/// only when the function itself returns a struct.
pub fn emit_forward(
    fn_name: &str,
    params: &[Parameter],
    extraction: &Extraction,
    return_names: &[String],
    guard_epsilon: GuardEpsilon,
    d: &dyn Dialect,
) -> Result<String, EmitError> {
    let value = roots_to_return_value(&extraction.roots, return_names, d, guard_epsilon)?;

    let mut out = String::new();
    out.push_str(&match value {
        ReturnValue::Record(_) => d.function_open_record(fn_name, params),
        ReturnValue::Scalar(_) => d.function_open(fn_name, params),
    });
    emit_temps(&extraction.temps, d, guard_epsilon, &mut out)?;
    out.push_str(&render_return(&value, d));
    out.push('\n');
    out.push_str(d.function_close());
    Ok(out)
}

/// Renders the combined gradient function: the shared extraction's
/// temporaries, then a single record return of `{ value, d<param>... }`
/// — one field per `requires_grad` parameter, itself a record for a
/// structured parameter's per-component gradient.
pub fn emit_gradient(
    fn_name: &str,
    params: &[Parameter],
    extraction: &Extraction,
    value_len: usize,
    value_names: &[String],
    gradient_roots: &[GradientRoot],
    guard_epsilon: GuardEpsilon,
    d: &dyn Dialect,
) -> Result<String, EmitError> {
    let rendered_roots: Vec<String> = extraction
        .roots
        .iter()
        .map(|e| render(e, d, guard_epsilon))
        .collect::<Result<Vec<_>, EmitError>>()?;

    let value_field = if value_len == 1 && value_names[0].is_empty() {
        ReturnValue::Scalar(rendered_roots[0].clone())
    } else {
        ReturnValue::Record(
            value_names
                .iter()
                .zip(rendered_roots[..value_len].iter())
                .map(|(n, v)| (n.clone(), ReturnValue::Scalar(v.clone())))
                .collect(),
        )
    };

    let mut by_param: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for (i, root) in gradient_roots.iter().enumerate() {
        let rendered = rendered_roots[value_len + i].clone();
        let component = root.component.clone().unwrap_or_default();
        match by_param.iter_mut().find(|(name, _)| *name == root.param_name) {
            Some((_, components)) => components.push((component, rendered)),
            None => by_param.push((root.param_name.clone(), vec![(component, rendered)])),
        }
    }

    let mut fields = vec![("value".to_string(), value_field)];
    for (param_name, components) in &by_param {
        let field = if components.len() == 1 && components[0].0.is_empty() {
            ReturnValue::Scalar(components[0].1.clone())
        } else {
            ReturnValue::Record(
                components
                    .iter()
                    .map(|(c, v)| (c.clone(), ReturnValue::Scalar(v.clone())))
                    .collect(),
            )
        };
        fields.push((format!("d{param_name}"), field));
    }

    let mut out = String::new();
    out.push_str(&d.function_open_record(fn_name, params));
    emit_temps(&extraction.temps, d, guard_epsilon, &mut out)?;
    out.push_str(&render_return(&ReturnValue::Record(fields), d));
    out.push('\n');
    out.push_str(d.function_close());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::typescript::TypeScript;

    #[test]
    fn multiplication_over_addition_gets_parens() {
        let e = Expr::mul(Expr::add(Expr::var("a"), Expr::var("b")), Expr::var("c"));
        let d = TypeScript::default();
        assert_eq!(render(&e, &d, None).unwrap(), "(a + b) * c");
    }

    #[test]
    fn right_associative_pow_does_not_parenthesize_right_pow() {
        let e = Expr::pow(Expr::var("a"), Expr::pow(Expr::var("b"), Expr::var("c")));
        let d = TypeScript::default();
        assert_eq!(render(&e, &d, None).unwrap(), "a ** b ** c");
    }

    #[test]
    fn left_associative_sub_parenthesizes_right_same_precedence() {
        let e = Expr::sub(Expr::var("a"), Expr::sub(Expr::var("b"), Expr::var("c")));
        let d = TypeScript::default();
        assert_eq!(render(&e, &d, None).unwrap(), "a - (b - c)");
    }

    #[test]
    fn guarded_division_rewrites_unsafe_denominator() {
        let e = Expr::div(Expr::var("a"), Expr::var("b"));
        let d = TypeScript::default();
        assert_eq!(
            render(&e, &d, Some(1e-10)).unwrap(),
            "a / (b + (b >= 0 ? 1 : -1) * 0.0000000001)"
        );
    }

    #[test]
    fn guarded_division_leaves_safe_denominator_alone() {
        let denom = Expr::add(
            Expr::pow(Expr::var("x"), Expr::num(2.0)),
            Expr::pow(Expr::var("y"), Expr::num(2.0)),
        );
        let e = Expr::div(Expr::one(), denom);
        let d = TypeScript::default();
        assert_eq!(render(&e, &d, Some(1e-10)).unwrap(), "1 / (x ** 2 + y ** 2)");
    }
}
