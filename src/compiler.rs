//! Pipeline orchestrator: ties every stage together from source
//! text to a [`CompiledFunction`] ready for emission, with per-function
//! error recovery — one function failing to differentiate or failing
//! its gradient check does not stop the rest of the file from compiling.

use crate::check::{check_gradient, DEFAULT_FD_EPSILON};
use crate::diff::{differentiate, type_of};
use crate::egraph::rewrite::{saturate, DEFAULT_ITERATION_CAP};
use crate::egraph::EGraph;
use crate::error::GsError;
use crate::extract::{extract, Extraction};
use crate::guards::{analyze, GuardWarning};
use crate::inline::inline;
use crate::parser::parse_file;
use crate::simplify::{simplify, simplify_post_cse};
use crate::term::{Expr, Function, Gradient, Parameter, Type};
use crate::typeinfer::check_function;

/// Compiler-wide knobs a caller (the CLI, or an embedder) can set.
#[derive(Debug, Clone)]
pub struct Options {
    pub simplify: bool,
    pub cse: bool,
    pub deep_egraph: bool,
    pub guards: bool,
    pub check: bool,
    pub epsilon: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            simplify: true,
            cse: true,
            deep_egraph: false,
            guards: false,
            check: true,
            epsilon: DEFAULT_FD_EPSILON,
        }
    }
}

/// Which parameter (and, for a structured parameter, which component)
/// one root past the forward value in [`CompiledFunction::gradient`]
/// belongs to. Parallel to `gradient.roots[gradient_value_len..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientRoot {
    pub param_name: String,
    pub component: Option<String>,
}

/// The compiled result for one source function: a standalone forward
/// computation, plus a single combined gradient computation — spanning
/// every `requires_grad` parameter and sharing one e-graph with the
/// forward value — so the gradient function can return `{ value,
/// d<name>... }` out of one extraction pass.
pub struct CompiledFunction {
    pub function: Function,
    pub forward: Extraction,
    pub forward_return_names: Vec<String>,
    pub gradient: Extraction,
    pub gradient_value_len: usize,
    pub gradient_roots: Vec<GradientRoot>,
    pub guard_warnings: Vec<GuardWarning>,
}

/// Parses `source`, then compiles every function it defines. A function
/// that fails at any stage is reported as its own error rather than
/// aborting the rest of the file; the caller sees one
/// `Result` per function, in source order.
pub fn compile_source(source: &str, opts: &Options) -> Result<Vec<(String, Result<CompiledFunction, GsError>)>, GsError> {
    let functions = parse_file(source)?;
    Ok(functions
        .into_iter()
        .map(|f| {
            let name = f.name.clone();
            (name, compile_function(f, opts))
        })
        .collect())
}

/// Compiles a single already-parsed function.
pub fn compile_function(function: Function, opts: &Options) -> Result<CompiledFunction, GsError> {
    check_function(&function)?;

    let inlined = inline(&function);
    let (forward_exprs, forward_return_names) = forward_roots(&inlined, &function.params, opts);
    let grad_params: Vec<&Parameter> = function.params.iter().filter(|p| p.requires_grad).collect();

    let mut combined_exprs = forward_exprs.clone();
    let mut gradient_roots = Vec::with_capacity(grad_params.len());
    let mut guard_warnings = Vec::new();

    for param in grad_params {
        let gradient = differentiate(&inlined, param, &function.params)?;
        let simplified = simplify_gradient(&gradient, &function.params, opts.simplify);

        if opts.check {
            check_gradient(&inlined, param, &simplified, &function.params, opts.epsilon)?;
        }

        if opts.guards {
            guard_warnings.extend(gather_guard_warnings(&simplified));
        }

        match simplified {
            Gradient::Scalar(e) => {
                combined_exprs.push(e);
                gradient_roots.push(GradientRoot {
                    param_name: param.name.clone(),
                    component: None,
                });
            }
            Gradient::Struct(cs) => {
                for (component, e) in cs {
                    combined_exprs.push(e);
                    gradient_roots.push(GradientRoot {
                        param_name: param.name.clone(),
                        component: Some(component),
                    });
                }
            }
        }
    }

    let gradient_value_len = forward_exprs.len();
    let forward = extract_roots(forward_exprs, &function.params, opts);
    let gradient = extract_roots(combined_exprs, &function.params, opts);

    Ok(CompiledFunction {
        function,
        forward,
        forward_return_names,
        gradient,
        gradient_value_len,
        gradient_roots,
        guard_warnings,
    })
}

/// The forward return expression(s) of `inlined`, one per declared
/// component for a struct-typed return, a single unnamed root for a
/// scalar return. Each is pre-simplified the same way a gradient term
/// would be, since this is the expression the forward function (and the
/// value half of the combined gradient function) actually emits.
fn forward_roots(inlined: &Expr, params: &[Parameter], opts: &Options) -> (Vec<Expr>, Vec<String>) {
    match type_of(inlined, params) {
        Type::Scalar => {
            let e = if opts.simplify { simplify(inlined, params) } else { inlined.clone() };
            (vec![e], vec![String::new()])
        }
        Type::Struct(components) => {
            let roots = components
                .iter()
                .map(|c| {
                    let projected = Expr::comp(inlined.clone(), c.clone());
                    if opts.simplify {
                        simplify(&projected, params)
                    } else {
                        projected
                    }
                })
                .collect();
            (roots, components)
        }
    }
}

fn simplify_gradient(gradient: &Gradient, params: &[Parameter], enabled: bool) -> Gradient {
    if !enabled {
        return gradient.clone();
    }
    match gradient {
        Gradient::Scalar(e) => Gradient::Scalar(simplify(e, params)),
        Gradient::Struct(cs) => {
            Gradient::Struct(cs.iter().map(|(c, e)| (c.clone(), simplify(e, params))).collect())
        }
    }
}

fn gather_guard_warnings(gradient: &Gradient) -> Vec<GuardWarning> {
    match gradient {
        Gradient::Scalar(e) => analyze(e),
        Gradient::Struct(cs) => cs.iter().flat_map(|(_, e)| analyze(e)).collect(),
    }
}

/// Loads every expression in `exprs` into a fresh e-graph as its own
/// root, optionally saturates it, and extracts the result with
/// cross-root CSE — shared sub-expressions among the roots become
/// temporaries regardless of which root(s) reference them. Used both for
/// a function's standalone forward value and for its combined gradient
/// (forward value plus every `requires_grad` parameter's terms sharing
/// one e-graph), which is what lets e.g. two different parameters'
/// gradients share a denominator.
fn extract_roots(exprs: Vec<Expr>, params: &[Parameter], opts: &Options) -> Extraction {
    if !opts.cse {
        return Extraction { temps: Vec::new(), roots: exprs };
    }

    let mut egraph = EGraph::new();
    let roots: Vec<_> = exprs.iter().map(|e| egraph.add_expr(e)).collect();

    if opts.simplify {
        saturate(&mut egraph, opts.deep_egraph, DEFAULT_ITERATION_CAP);
    }

    let extraction = extract(&mut egraph, &roots);

    if opts.simplify {
        Extraction {
            temps: extraction
                .temps
                .into_iter()
                .map(|(n, e)| (n, simplify_post_cse(&e, params)))
                .collect(),
            roots: extraction
                .roots
                .into_iter()
                .map(|e| simplify_post_cse(&e, params))
                .collect(),
        }
    } else {
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_square_with_default_options() {
        let results = compile_source("function square(x∇) { return x * x }", &Options::default()).unwrap();
        assert_eq!(results.len(), 1);
        let (name, compiled) = &results[0];
        assert_eq!(name, "square");
        let compiled = compiled.as_ref().unwrap();
        assert_eq!(compiled.forward.roots.len(), 1);
        assert_eq!(compiled.gradient_value_len, 1);
        assert_eq!(compiled.gradient_roots.len(), 1);
        assert_eq!(compiled.gradient_roots[0].param_name, "x");
        assert_eq!(compiled.gradient.roots.len(), 2);
    }

    #[test]
    fn one_bad_function_does_not_block_others() {
        let src = "function bad(x∇) { return pow(x, 3) }\nfunction good(x∇) { return x * x }";
        let results = compile_source(src, &Options::default()).unwrap();
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
    }

    #[test]
    fn struct_gradient_shares_cse_temp_across_components() {
        let src = "function f(u∇:{x,y}, v:{x,y}) { return u.x*v.x + u.y*v.y + u.x*v.x }";
        let results = compile_source(src, &Options::default()).unwrap();
        let compiled = results[0].1.as_ref().unwrap();
        assert_eq!(compiled.gradient_roots.len(), 2);
        assert_eq!(compiled.gradient.roots.len(), 3);
    }

    #[test]
    fn cross_parameter_gradients_share_a_temp() {
        let src = "function f(x∇, y∇) { return (x + y) * (x + y) }";
        let results = compile_source(src, &Options::default()).unwrap();
        let compiled = results[0].1.as_ref().unwrap();
        assert_eq!(compiled.gradient_roots.len(), 2);
        assert!(
            !compiled.gradient.temps.is_empty(),
            "both parameters differentiate to the same term and should share one temp"
        );
    }
}
