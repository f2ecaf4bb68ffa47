//! End-to-end scenarios covering the small seed programs this language
//! is expected to compile out of the box: a plain scalar function, a
//! struct (vector) parameter, an expandable vector built-in, the
//! non-smooth subgradient convention, a primitive that is deliberately
//! not differentiable, and a multi-function file where one function's
//! failure does not block another's.

use gradientscript::compiler::{compile_source, Options};
use gradientscript::error::GsError;

fn compile_one(src: &str) -> gradientscript::compiler::CompiledFunction {
    let results = compile_source(src, &Options::default()).expect("parses");
    assert_eq!(results.len(), 1, "expected exactly one function in {src:?}");
    results.into_iter().next().unwrap().1.expect("compiles")
}

#[test]
fn scalar_square_differentiates_and_checks() {
    let compiled = compile_one("function square(x∇) { return x * x }");
    assert_eq!(compiled.gradient_roots.len(), 1);
    match &compiled.gradient.roots[compiled.gradient_value_len] {
        gradientscript::term::Expr::Binary(gradientscript::term::BinaryOp::Mul, _, _) => {}
        other => panic!("expected 2*x shaped gradient, got {other:?}"),
    }
}

#[test]
fn struct_dot_product_gradient_has_one_component_per_field() {
    let compiled = compile_one(
        "function dot(u∇:{x,y}, v:{x,y}) { return u.x*v.x + u.y*v.y }",
    );
    assert_eq!(compiled.gradient_roots.len(), 2);
}

#[test]
fn expandable_vector_builtin_compiles_via_scalar_expansion() {
    let compiled = compile_one(
        "function mag(v∇:{x,y}) { return magnitude2d(v) }",
    );
    assert_eq!(compiled.gradient_roots.len(), 2);
}

#[test]
fn min_uses_first_argument_subgradient_end_to_end() {
    let compiled = compile_one("function m(x∇, y∇) { return min(x, y) }");
    assert_eq!(compiled.gradient_roots.len(), 2);
    let base = compiled.gradient_value_len;
    assert!(matches!(
        compiled.gradient.roots[base],
        gradientscript::term::Expr::Number(n) if n == 1.0
    ));
    assert!(matches!(
        compiled.gradient.roots[base + 1],
        gradientscript::term::Expr::Number(n) if n == 0.0
    ));
}

#[test]
fn pow_builtin_is_reported_as_not_implemented_but_other_functions_still_compile() {
    let src = "function bad(x∇) { return pow(x, 3) }\nfunction good(x∇) { return x + 1 }";
    let results = compile_source(src, &Options::default()).unwrap();
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0].1, Err(GsError::Diff(_))));
    assert!(results[1].1.is_ok());
}

#[test]
fn local_assignments_inline_before_differentiation() {
    let compiled = compile_one(
        "function f(x∇) { a = x + 1\nb = a * a\nreturn b }",
    );
    assert_eq!(compiled.gradient_roots.len(), 1);
    let body = &compiled.gradient.roots[compiled.gradient_value_len];
    assert!(!matches!(body, gradientscript::term::Expr::Variable(n) if n == "a" || n == "b"));
}

#[test]
fn two_gradients_from_one_function_compile_without_cross_contamination() {
    let compiled = compile_one("function f(x∇, y∇) { return (x*y + x) - (x*y - y) }");
    assert_eq!(compiled.gradient_roots.len(), 2);
    assert_eq!(compiled.gradient_roots[0].param_name, "x");
    assert_eq!(compiled.gradient_roots[1].param_name, "y");
}

#[test]
fn struct_gradient_matches_scalar_type() {
    let compiled = compile_one("function f(v∇:{x,y}) { return v.x + v.y }");
    match compiled
        .function
        .param("v")
        .map(|p| p.ty())
        .unwrap()
    {
        gradientscript::term::Type::Struct(cs) => assert_eq!(cs, vec!["x".to_string(), "y".to_string()]),
        _ => panic!("expected struct type"),
    }
}
