//! C# emission. `^` has no infix form in C#, so `pow_as_call` routes
//! every exponentiation through `Math.Pow`, including the ones the
//! simplifier folded into plain multiplication already having happened
//! upstream of this module — emission never re-derives algebra.

use crate::emit::Dialect;
use crate::error::EmitError;
use crate::term::{format_number, BinaryOp, Parameter, UnaryOp};

/// The floating-point type emitted for every parameter and return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatType {
    Double,
    Float,
}

impl FloatType {
    pub fn keyword(self) -> &'static str {
        match self {
            FloatType::Double => "double",
            FloatType::Float => "float",
        }
    }
}

impl Default for FloatType {
    fn default() -> Self {
        FloatType::Double
    }
}

pub struct CSharp {
    pub no_comments: bool,
    pub float_type: FloatType,
}

impl Default for CSharp {
    fn default() -> Self {
        Self {
            no_comments: false,
            float_type: FloatType::Double,
        }
    }
}

impl Dialect for CSharp {
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
        op.symbol()
    }

    fn unary_symbol(&self, op: UnaryOp) -> &'static str {
        op.symbol()
    }

    fn pow_as_call(&self) -> bool {
        true
    }

    fn render_call(&self, name: &str, args: &[String]) -> Result<String, EmitError> {
        let one = |fname: &str| Ok(format!("Math.{fname}({})", args[0]));
        match name {
            "sin" | "cos" | "tan" | "exp" | "sqrt" | "abs" | "asin" | "acos" | "atan" => one(name),
            "log" => one("Log"),
            "atan2" => Ok(format!("Math.Atan2({}, {})", args[0], args[1])),
            "pow" => Ok(format!("Math.Pow({}, {})", args[0], args[1])),
            "min" | "max" => {
                let method = if name == "min" { "Min" } else { "Max" };
                Ok(format!("Math.{method}({}, {})", args[0], args[1]))
            }
            "clamp" => {
                if args.len() != 3 {
                    return Err(EmitError::InvalidArity {
                        name: name.to_string(),
                        expected: 3,
                        found: args.len(),
                    });
                }
                Ok(format!(
                    "Math.Min(Math.Max({}, {}), {})",
                    args[0], args[1], args[2]
                ))
            }
            _ => Err(EmitError::UnsupportedPrimitive { name: name.to_string() }),
        }
    }

    fn render_temp(&self, name: &str, value: &str) -> String {
        format!("    {} {name} = {value};", self.float_type.keyword())
    }

    fn function_open(&self, name: &str, params: &[Parameter]) -> String {
        format!("public static {} {name}({})\n{{\n", self.float_type.keyword(), self.plist(params))
    }

    /// An anonymous type's shape can't be named in a C# method signature,
    /// so a record-returning function is declared `dynamic` instead.
    fn function_open_record(&self, name: &str, params: &[Parameter]) -> String {
        format!("public static dynamic {name}({})\n{{\n", self.plist(params))
    }

    fn function_close(&self) -> &'static str {
        "}\n"
    }

    fn render_return_stmt(&self, value: &str) -> String {
        format!("    return {value};")
    }

    fn render_record_literal(&self, fields: &[(String, String)]) -> String {
        let fields = fields
            .iter()
            .map(|(n, v)| format!("{n} = {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("new {{ {fields} }}")
    }
}

impl CSharp {
    fn plist(&self, params: &[Parameter]) -> String {
        let ft = self.float_type.keyword();
        params
            .iter()
            .map(|p| match &p.components {
                None => format!("{ft} {}", p.name),
                Some(cs) => {
                    let fields = cs.iter().map(|c| format!("{ft} {c}")).collect::<Vec<_>>().join(", ");
                    format!("({fields}) {}", p.name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
