//! Cross-dialect emission checks: every target must render the same
//! extracted gradient into syntax idiomatic for that language, agreeing
//! on precedence and differing only where a language's primitive
//! surface actually differs (C#'s lack of a power operator, Python's
//! dict-shaped struct return, ...).

use gradientscript::emit::csharp::{CSharp, FloatType};
use gradientscript::emit::javascript::JavaScript;
use gradientscript::emit::python::Python;
use gradientscript::emit::typescript::TypeScript;
use gradientscript::compiler::GradientRoot;
use gradientscript::emit::{emit_forward, emit_gradient, Dialect};
use gradientscript::extract::Extraction;
use gradientscript::term::{Expr, Parameter};

fn scalar_param(name: &str) -> Parameter {
    Parameter {
        name: name.to_string(),
        requires_grad: true,
        components: None,
    }
}

fn struct_param(name: &str, components: &[&str]) -> Parameter {
    Parameter {
        name: name.to_string(),
        requires_grad: true,
        components: Some(components.iter().map(|s| s.to_string()).collect()),
    }
}

#[test]
fn typescript_and_javascript_agree_on_a_simple_square() {
    let extraction = Extraction {
        temps: Vec::new(),
        roots: vec![Expr::mul(Expr::num(2.0), Expr::var("x"))],
    };
    let params = [scalar_param("x")];
    let ts = TypeScript::default();
    let js = JavaScript::default();
    let ts_out = emit_forward("d_f_dx", &params, &extraction, &[String::new()], None, &ts as &dyn Dialect).unwrap();
    let js_out = emit_forward("d_f_dx", &params, &extraction, &[String::new()], None, &js as &dyn Dialect).unwrap();
    assert!(ts_out.contains("2 * x"));
    assert!(js_out.contains("2 * x"));
    assert!(ts_out.contains("function"));
    assert!(js_out.contains("function"));
}

#[test]
fn python_emits_snake_friendly_math_calls_and_dict_return_for_struct() {
    let extraction = Extraction {
        temps: Vec::new(),
        roots: vec![Expr::call("sqrt", vec![Expr::var("x")]), Expr::var("y")],
    };
    let params = [struct_param("v", &["x", "y"])];
    let py = Python::default();
    let out = emit_forward("d_f_dv", &params, &extraction, &["x".into(), "y".into()], None, &py as &dyn Dialect).unwrap();
    assert!(out.contains("math.sqrt(x)"));
    assert!(out.contains("return {"));
    assert!(out.contains("\"x\""));
    assert!(out.contains("\"y\""));
}

#[test]
fn csharp_routes_pow_through_math_pow_instead_of_an_operator() {
    let extraction = Extraction {
        temps: Vec::new(),
        roots: vec![Expr::pow(Expr::var("x"), Expr::num(3.0))],
    };
    let params = [scalar_param("x")];
    let cs = CSharp {
        no_comments: false,
        float_type: FloatType::Double,
    };
    let out = emit_forward("d_f_dx", &params, &extraction, &[String::new()], None, &cs as &dyn Dialect).unwrap();
    assert!(out.contains("Math.Pow(x, 3)"));
    assert!(!out.contains(" ^ "));
}

#[test]
fn csharp_struct_parameter_builds_a_tuple_with_the_right_field_count() {
    let params = [struct_param("v", &["x", "y", "z"])];
    let cs = CSharp {
        no_comments: true,
        float_type: FloatType::Float,
    };
    let open = cs.function_open("f", &params);
    assert!(open.contains("float x"));
    assert!(open.contains("float y"));
    assert!(open.contains("float z"));
}

#[test]
fn all_dialects_share_a_cse_temporary_defined_before_its_use() {
    let shared = Expr::add(Expr::var("x"), Expr::num(1.0));
    let extraction = Extraction {
        temps: vec![("t0".to_string(), shared)],
        roots: vec![Expr::mul(Expr::var("t0"), Expr::var("t0"))],
    };
    let params = [scalar_param("x")];
    for (out, needle) in [
        (
            emit_forward("f", &params, &extraction, &[String::new()], None, &TypeScript::default() as &dyn Dialect).unwrap(),
            "const t0",
        ),
        (
            emit_forward("f", &params, &extraction, &[String::new()], None, &JavaScript::default() as &dyn Dialect).unwrap(),
            "const t0",
        ),
        (
            emit_forward("f", &params, &extraction, &[String::new()], None, &Python::default() as &dyn Dialect).unwrap(),
            "t0 =",
        ),
    ] {
        let temp_pos = out.find(needle).expect("temp declaration present");
        let use_pos = out.rfind("t0 * t0").expect("temp use present");
        assert!(temp_pos < use_pos, "temp must be declared before use in: {out}");
    }
}

#[test]
fn no_comments_flag_suppresses_the_generated_header_everywhere() {
    let extraction = Extraction {
        temps: Vec::new(),
        roots: vec![Expr::var("x")],
    };
    let params = [scalar_param("x")];
    let ts = TypeScript { no_comments: true };
    assert!(ts.comment_prefix().is_none());
    let out = emit_forward("f", &params, &extraction, &[String::new()], None, &ts as &dyn Dialect).unwrap();
    assert!(!out.contains("//"));
}

#[test]
fn combined_gradient_returns_value_and_one_field_per_parameter() {
    let extraction = Extraction {
        temps: Vec::new(),
        roots: vec![
            Expr::mul(Expr::var("x"), Expr::var("x")),
            Expr::mul(Expr::num(2.0), Expr::var("x")),
        ],
    };
    let params = [scalar_param("x")];
    let gradient_roots = [GradientRoot {
        param_name: "x".to_string(),
        component: None,
    }];
    let ts = TypeScript::default();
    let out = emit_gradient(
        "grad_square",
        &params,
        &extraction,
        1,
        &[String::new()],
        &gradient_roots,
        None,
        &ts as &dyn Dialect,
    )
    .unwrap();
    assert!(out.contains("value: x * x"));
    assert!(out.contains("dx: 2 * x"));
}

#[test]
fn combined_gradient_nests_a_struct_parameters_components() {
    let extraction = Extraction {
        temps: Vec::new(),
        roots: vec![Expr::num(1.0), Expr::var("x"), Expr::var("y")],
    };
    let params = [struct_param("v", &["x", "y"])];
    let gradient_roots = [
        GradientRoot {
            param_name: "v".to_string(),
            component: Some("x".to_string()),
        },
        GradientRoot {
            param_name: "v".to_string(),
            component: Some("y".to_string()),
        },
    ];
    let py = Python::default();
    let out = emit_gradient(
        "grad_f",
        &params,
        &extraction,
        1,
        &[String::new()],
        &gradient_roots,
        None,
        &py as &dyn Dialect,
    )
    .unwrap();
    assert!(out.contains("\"dv\""));
    assert!(out.contains("\"x\": x"));
    assert!(out.contains("\"y\": y"));
}

#[test]
fn guarded_division_is_rewritten_only_when_guards_are_enabled() {
    let extraction = Extraction {
        temps: Vec::new(),
        roots: vec![Expr::div(Expr::var("a"), Expr::var("b"))],
    };
    let params = [scalar_param("a"), scalar_param("b")];
    let ts = TypeScript::default();
    let unguarded = emit_forward("f", &params, &extraction, &[String::new()], None, &ts as &dyn Dialect).unwrap();
    assert!(unguarded.contains("a / b"));
    let guarded = emit_forward("f", &params, &extraction, &[String::new()], Some(1e-10), &ts as &dyn Dialect).unwrap();
    assert!(guarded.contains("a / (b + (b >= 0 ? 1 : -1) * 0.0000000001)"));
}
