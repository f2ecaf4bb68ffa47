//! `gsc`: the GradientScript command-line compiler.
//!
//! Reads a `.gs` source file, compiles every function it defines, and
//! prints the generated code for each to stdout. A function that fails
//! to type-check, differentiate, or pass its gradient check is reported
//! as a diagnostic on stderr and skipped — the rest of the file still
//! compiles.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, ValueEnum};
use colored::Colorize;

use gradientscript::check::DEFAULT_FD_EPSILON;
use gradientscript::compiler::{compile_source, CompiledFunction, Options};
use gradientscript::emit::csharp::{CSharp, FloatType};
use gradientscript::emit::javascript::JavaScript;
use gradientscript::emit::python::Python;
use gradientscript::emit::typescript::TypeScript;
use gradientscript::emit::{emit_forward, emit_gradient, Dialect};
use gradientscript::error::GsError;
use gradientscript::guards::DEFAULT_GUARD_EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Typescript,
    Javascript,
    Python,
    Csharp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CSharpFloat {
    Double,
    Float,
}

/// Compile GradientScript source into derivative code.
#[derive(Debug, ClapParser)]
#[command(name = "gsc", version, about)]
struct Cli {
    /// Path to a `.gs` source file.
    input: PathBuf,

    /// Target language for emitted code.
    #[arg(long, value_enum, default_value_t = Format::Typescript)]
    format: Format,

    /// Skip the algebraic simplifier (both pre- and post-CSE passes).
    #[arg(long)]
    no_simplify: bool,

    /// Skip e-graph-based common sub-expression elimination.
    #[arg(long)]
    no_cse: bool,

    /// Enable the deeper, function-specific rewrite rule layer during
    /// equality saturation (trig identities, `atan2` symmetry).
    #[arg(long)]
    egraph: bool,

    /// Omit the `// generated by gsc` header comment from output.
    #[arg(long)]
    no_comments: bool,

    /// Report non-trivially-safe divisions and domain-sensitive calls,
    /// and rewrite them in the emitted code to guard against a zero
    /// denominator.
    #[arg(long)]
    guards: bool,

    /// Epsilon added to a guarded division's denominator. Only takes
    /// effect with `--guards`.
    #[arg(long, default_value_t = DEFAULT_GUARD_EPSILON)]
    guard_epsilon: f64,

    /// Skip numerical gradient verification.
    #[arg(long)]
    no_check: bool,

    /// Central finite-difference step used by gradient verification.
    #[arg(long, default_value_t = DEFAULT_FD_EPSILON)]
    epsilon: f64,

    /// Floating-point type used for the C# target.
    #[arg(long, value_enum, default_value_t = CSharpFloat::Double)]
    csharp_float_type: CSharpFloat,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` if every function in the file compiled cleanly.
fn run(cli: &Cli) -> Result<bool, GsError> {
    let ext_ok = cli
        .input
        .extension()
        .map(|e| e == "gs")
        .unwrap_or(false);
    if !ext_ok {
        return Err(GsError::MissingOrBadFile(cli.input.display().to_string()));
    }

    let source = std::fs::read_to_string(&cli.input)?;

    let opts = Options {
        simplify: !cli.no_simplify,
        cse: !cli.no_cse,
        deep_egraph: cli.egraph,
        guards: cli.guards,
        check: !cli.no_check,
        epsilon: cli.epsilon,
    };

    let results = compile_source(&source, &opts)?;
    let comment_prefix = dialect_comment_prefix(cli);

    let mut all_ok = true;
    for (name, result) in results {
        match result {
            Ok(compiled) => print_compiled(&compiled, cli, comment_prefix.as_deref()),
            Err(err) => {
                all_ok = false;
                eprintln!(
                    "{} {}: {err}",
                    "skipped".yellow().bold(),
                    name.bold()
                );
            }
        }
    }
    Ok(all_ok)
}

fn dialect_comment_prefix(cli: &Cli) -> Option<String> {
    if cli.no_comments {
        return None;
    }
    let symbol = match cli.format {
        Format::Python => "#",
        _ => "//",
    };
    Some(symbol.to_string())
}

fn print_compiled(compiled: &CompiledFunction, cli: &Cli, comment_prefix: Option<&str>) {
    if let Some(prefix) = comment_prefix {
        println!("{prefix} generated by gsc from function '{}'", compiled.function.name);
    }

    for warning in &compiled.guard_warnings {
        eprintln!(
            "{} {}: {:?} in `{}`",
            "guard:".cyan().bold(),
            compiled.function.name,
            warning.kind,
            warning.expression
        );
    }

    let guard_epsilon = cli.guards.then_some(cli.guard_epsilon);
    let forward_name = compiled.function.name.clone();
    let gradient_name = format!("grad_{}", compiled.function.name);

    match render_forward(cli, &forward_name, compiled, guard_epsilon) {
        Ok(code) => println!("{code}"),
        Err(err) => eprintln!("{} {err}", "emit error:".red().bold()),
    }
    match render_gradient(cli, &gradient_name, compiled, guard_epsilon) {
        Ok(code) => println!("{code}"),
        Err(err) => eprintln!("{} {err}", "emit error:".red().bold()),
    }
}

fn render_forward(
    cli: &Cli,
    fn_name: &str,
    compiled: &CompiledFunction,
    guard_epsilon: Option<f64>,
) -> Result<String, gradientscript::error::EmitError> {
    let params = &compiled.function.params;
    with_dialect(cli, |d| {
        emit_forward(fn_name, params, &compiled.forward, &compiled.forward_return_names, guard_epsilon, d)
    })
}

fn render_gradient(
    cli: &Cli,
    fn_name: &str,
    compiled: &CompiledFunction,
    guard_epsilon: Option<f64>,
) -> Result<String, gradientscript::error::EmitError> {
    let params = &compiled.function.params;
    with_dialect(cli, |d| {
        emit_gradient(
            fn_name,
            params,
            &compiled.gradient,
            compiled.gradient_value_len,
            &compiled.forward_return_names,
            &compiled.gradient_roots,
            guard_epsilon,
            d,
        )
    })
}

fn with_dialect<F>(cli: &Cli, f: F) -> Result<String, gradientscript::error::EmitError>
where
    F: FnOnce(&dyn Dialect) -> Result<String, gradientscript::error::EmitError>,
{
    match cli.format {
        Format::Typescript => f(&TypeScript { no_comments: cli.no_comments } as &dyn Dialect),
        Format::Javascript => f(&JavaScript { no_comments: cli.no_comments } as &dyn Dialect),
        Format::Python => f(&Python { no_comments: cli.no_comments } as &dyn Dialect),
        Format::Csharp => {
            let float_type = match cli.csharp_float_type {
                CSharpFloat::Double => FloatType::Double,
                CSharpFloat::Float => FloatType::Float,
            };
            f(&CSharp { no_comments: cli.no_comments, float_type } as &dyn Dialect)
        }
    }
}
