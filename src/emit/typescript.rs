//! TypeScript emission.

use crate::emit::Dialect;
use crate::error::EmitError;
use crate::term::{format_number, BinaryOp, Parameter, UnaryOp};

#[derive(Default)]
pub struct TypeScript {
    pub no_comments: bool,
}

impl Dialect for TypeScript {
    fn comment_prefix(&self) -> Option<&'static str> {
        if self.no_comments {
            None
        } else {
            Some("//")
        }
    }

    fn render_number(&self, v: f64) -> String {
        format_number(v)
    }

    fn binary_symbol(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Pow => "**",
            other => other.symbol(),
        }
    }

    fn unary_symbol(&self, op: UnaryOp) -> &'static str {
        match op {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
        }
    }

    fn render_call(&self, name: &str, args: &[String]) -> Result<String, EmitError> {
        render_math_call(name, args)
    }

    fn render_temp(&self, name: &str, value: &str) -> String {
        format!("  const {name} = {value};")
    }

    fn function_open(&self, name: &str, params: &[Parameter]) -> String {
        let plist = params
            .iter()
            .map(|p| match &p.components {
                None => format!("{}: number", p.name),
                Some(cs) => format!(
                    "{}: {{ {} }}",
                    p.name,
                    cs.iter().map(|c| format!("{c}: number")).collect::<Vec<_>>().join("; ")
                ),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("export function {name}({plist}) {{\n")
    }

    fn function_close(&self) -> &'static str {
        "}\n"
    }

    fn render_return_stmt(&self, value: &str) -> String {
        format!("  return {value};")
    }

    fn render_record_literal(&self, fields: &[(String, String)]) -> String {
        let fields = fields
            .iter()
            .map(|(n, v)| format!("{n}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{ {fields} }}")
    }
}

/// Shared between TypeScript and JavaScript, which use identical `Math.*`
/// call syntax.
pub(crate) fn render_math_call(name: &str, args: &[String]) -> Result<String, EmitError> {
    let one = |fname: &str| Ok(format!("Math.{fname}({})", args[0]));
    match name {
        "sin" | "cos" | "tan" | "exp" | "sqrt" | "abs" | "asin" | "acos" | "atan" => one(name),
        "log" => one("log"),
        "atan2" => Ok(format!("Math.atan2({}, {})", args[0], args[1])),
        "pow" => Ok(format!("Math.pow({}, {})", args[0], args[1])),
        "min" | "max" => Ok(format!("Math.{name}({}, {})", args[0], args[1])),
        "clamp" => {
            if args.len() != 3 {
                return Err(EmitError::InvalidArity {
                    name: name.to_string(),
                    expected: 3,
                    found: args.len(),
                });
            }
            Ok(format!(
                "Math.min(Math.max({}, {}), {})",
                args[0], args[1], args[2]
            ))
        }
        _ => Err(EmitError::UnsupportedPrimitive { name: name.to_string() }),
    }
}
