//! # GradientScript
//!
//! GradientScript is a small source-to-source compiler: it reads a
//! handful of real-valued math functions, symbolically differentiates
//! each one with respect to its gradient-required parameters, runs the
//! result through equality saturation to find and factor shared
//! sub-expressions, numerically verifies the analytical gradient
//! against a finite-difference estimate, and emits the result as
//! TypeScript, JavaScript, Python, or C#.
//!
//! ```text
//! source → lex → parse → type-check → inline → differentiate
//!        → simplify → e-graph saturate → extract (+ CSE)
//!        → simplify → gradient-check → emit
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use gradientscript::compiler::{compile_source, Options};
//!
//! let source = "function square(x∇) { return x * x }";
//! let results = compile_source(source, &Options::default()).unwrap();
//! assert_eq!(results.len(), 1);
//! let (name, compiled) = &results[0];
//! assert_eq!(name, "square");
//! assert!(compiled.is_ok());
//! ```
//!
//! ## Modules
//!
//! - [`term`]: the shared expression tree and function model
//! - [`lexer`] / [`parser`]: surface syntax to [`term::Function`]
//! - [`typeinfer`]: scalar-vs-struct type checking
//! - [`expand`] / [`inline`] / [`diff`]: vector expansion, local
//!   inlining, and symbolic differentiation
//! - [`simplify`]: the algebraic fixed-point simplifier
//! - [`egraph`]: the hash-consed e-graph, pattern matcher, and
//!   equality-saturation rewrite driver
//! - [`extract`]: cost-based extraction with cross-term CSE
//! - [`check`]: numerical gradient verification
//! - [`guards`]: optional division/domain guard analysis
//! - [`emit`]: TypeScript/JavaScript/Python/C# code generation
//! - [`compiler`]: the pipeline orchestrator tying every stage together
//! - [`error`]: the error types each stage produces

#![warn(missing_docs)]
#![allow(clippy::needless_return)]

pub mod check;
pub mod compiler;
pub mod diff;
pub mod egraph;
pub mod emit;
pub mod error;
pub mod expand;
pub mod extract;
pub mod guards;
pub mod inline;
pub mod lexer;
pub mod parser;
pub mod simplify;
pub mod term;
pub mod typeinfer;

pub use compiler::{compile_function, compile_source, CompiledFunction, GradientRoot, Options};
pub use error::GsError;
pub use parser::parse_file;
pub use term::{Expr, Function, Gradient, Parameter, Type};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_seed_function_end_to_end() {
        let results = compile_source(
            "function square(x∇) { return x * x }",
            &Options::default(),
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
    }
}
