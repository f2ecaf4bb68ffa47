//! Python 3 emission. Assumes `math` is imported by the caller — this
//! module only emits the function body, matching what the other three
//! dialects do (no import/using boilerplate).

use crate::emit::Dialect;
use crate::error::EmitError;
use crate::term::{format_number, BinaryOp, Parameter, UnaryOp};

#[derive(Default)]
pub struct Python {
    pub no_comments: bool,
}

impl Dialect for Python {
    fn comment_prefix(&self) -> Option<&'static str> {
        if self.no_comments {
            None
        } else {
            Some("#")
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
        op.symbol()
    }

    fn render_call(&self, name: &str, args: &[String]) -> Result<String, EmitError> {
        let one = |fname: &str| Ok(format!("math.{fname}({})", args[0]));
        match name {
            "sin" | "cos" | "tan" | "exp" | "sqrt" | "asin" | "acos" | "atan" => one(name),
            "log" => one("log"),
            "abs" => Ok(format!("abs({})", args[0])),
            "atan2" => Ok(format!("math.atan2({}, {})", args[0], args[1])),
            "pow" => Ok(format!("math.pow({}, {})", args[0], args[1])),
            "min" | "max" => Ok(format!("{name}({}, {})", args[0], args[1])),
            "clamp" => {
                if args.len() != 3 {
                    return Err(EmitError::InvalidArity {
                        name: name.to_string(),
                        expected: 3,
                        found: args.len(),
                    });
                }
                Ok(format!("min(max({}, {}), {})", args[0], args[1], args[2]))
            }
            _ => Err(EmitError::UnsupportedPrimitive { name: name.to_string() }),
        }
    }

    fn render_temp(&self, name: &str, value: &str) -> String {
        format!("    {name} = {value}")
    }

    fn function_open(&self, name: &str, params: &[Parameter]) -> String {
        let plist = params.iter().map(|p| p.name.clone()).collect::<Vec<_>>().join(", ");
        format!("def {name}({plist}):\n")
    }

    fn function_close(&self) -> &'static str {
        ""
    }

    fn render_return_stmt(&self, value: &str) -> String {
        format!("    return {value}")
    }

    fn render_record_literal(&self, fields: &[(String, String)]) -> String {
        let fields = fields
            .iter()
            .map(|(n, v)| format!("\"{n}\": {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{fields}}}")
    }

    fn render_guarded_div(&self, l: &str, r: &str, epsilon: f64) -> String {
        let eps = self.render_number(epsilon);
        format!("{l} / ({r} + (1 if {r} >= 0 else -1) * {eps})")
    }
}
