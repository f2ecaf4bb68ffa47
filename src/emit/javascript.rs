//! JavaScript emission — identical to [`crate::emit::typescript`] except
//! parameters and the function signature carry no type annotations.

use crate::emit::typescript::render_math_call;
use crate::emit::Dialect;
use crate::error::EmitError;
use crate::term::{format_number, BinaryOp, Parameter, UnaryOp};

#[derive(Default)]
pub struct JavaScript {
    pub no_comments: bool,
}

impl Dialect for JavaScript {
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
        op.symbol()
    }

    fn render_call(&self, name: &str, args: &[String]) -> Result<String, EmitError> {
        render_math_call(name, args)
    }

    fn render_temp(&self, name: &str, value: &str) -> String {
        format!("  const {name} = {value};")
    }

    fn function_open(&self, name: &str, params: &[Parameter]) -> String {
        let plist = params.iter().map(|p| p.name.clone()).collect::<Vec<_>>().join(", ");
        format!("function {name}({plist}) {{\n")
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
