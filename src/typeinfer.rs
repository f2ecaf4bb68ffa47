//! Type inference and checking.
//!
//! No polymorphism here, just `Scalar` vs `Struct(components)`
//! propagated from parameter declarations through locals to the return
//! expression, with scalars allowed to broadcast against struct fields.

use std::collections::HashMap;

use crate::error::TypeError;
use crate::term::{known_arity, Expr, Function, Type, EXPANDABLE, UNSUPPORTED_VECTOR};

/// Maps every local/parameter name in scope to its inferred type.
pub struct TypeEnv {
    types: HashMap<String, Type>,
}

impl TypeEnv {
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }
}

/// Infers and checks the types of a function's locals and return
/// expression, given its declared parameter types. Returns the
/// environment mapping every name in scope to its `Type`.
pub fn check_function(f: &Function) -> Result<TypeEnv, TypeError> {
    let mut env = HashMap::new();
    for p in &f.params {
        env.insert(p.name.clone(), p.ty());
    }
    for local in &f.locals {
        let ty = infer(&local.expr, &env)?;
        env.insert(local.name.clone(), ty);
    }
    infer(&f.ret, &env)?;
    Ok(TypeEnv { types: env })
}

fn infer(expr: &Expr, env: &HashMap<String, Type>) -> Result<Type, TypeError> {
    match expr {
        Expr::Number(_) => Ok(Type::Scalar),
        Expr::Variable(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::UnknownIdentifier { name: name.clone() }),
        Expr::Unary(_, x) => infer(x, env),
        Expr::Binary(_, l, r) => {
            let lt = infer(l, env)?;
            let rt = infer(r, env)?;
            broadcast(lt, rt)
        }
        Expr::Component(obj, field) => match infer(obj, env)? {
            Type::Struct(components) => {
                if components.iter().any(|c| c == field) {
                    Ok(Type::Scalar)
                } else {
                    Err(TypeError::UnknownComponent {
                        param: describe(obj),
                        component: field.clone(),
                    })
                }
            }
            Type::Scalar => Err(TypeError::ComponentOfScalar {
                field: field.clone(),
            }),
        },
        Expr::Call(name, args) => check_call(name, args, env),
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Variable(v) => v.clone(),
        _ => "<expr>".to_string(),
    }
}

fn broadcast(lhs: Type, rhs: Type) -> Result<Type, TypeError> {
    match (lhs, rhs) {
        (Type::Scalar, Type::Scalar) => Ok(Type::Scalar),
        (Type::Scalar, Type::Struct(c)) | (Type::Struct(c), Type::Scalar) => Ok(Type::Struct(c)),
        (Type::Struct(a), Type::Struct(b)) => {
            if a == b {
                Ok(Type::Struct(a))
            } else {
                Err(TypeError::MismatchedStructs { lhs: a, rhs: b })
            }
        }
    }
}

fn check_call(name: &str, args: &[Expr], env: &HashMap<String, Type>) -> Result<Type, TypeError> {
    for a in args {
        infer(a, env)?;
    }
    if EXPANDABLE.contains(&name) || UNSUPPORTED_VECTOR.contains(&name) {
        if let Some(expected) = known_arity(name) {
            if args.len() != expected {
                return Err(TypeError::WrongArity {
                    name: name.to_string(),
                    expected,
                    found: args.len(),
                });
            }
        }
        // Vector-returning/expandable built-ins always yield a scalar at
        // this layer (the expander turns them into scalar arithmetic
        // before differentiation; the type system never sees a vector type).
        return Ok(Type::Scalar);
    }
    match known_arity(name) {
        Some(expected) if expected == args.len() => Ok(Type::Scalar),
        Some(expected) => Err(TypeError::WrongArity {
            name: name.to_string(),
            expected,
            found: args.len(),
        }),
        None => Err(TypeError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    #[test]
    fn infers_struct_component_access() {
        let fns = parse_file("function f(v∇:{x,y}) { return v.x + v.y }").unwrap();
        assert!(check_function(&fns[0]).is_ok());
    }

    #[test]
    fn rejects_unknown_component() {
        let fns = parse_file("function f(v∇:{x,y}) { return v.z }").unwrap();
        assert!(matches!(
            check_function(&fns[0]),
            Err(TypeError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn rejects_struct_struct_mismatch() {
        let fns =
            parse_file("function f(u∇:{x,y}, v∇:{x,y,z}) { return u + v }").unwrap();
        assert!(matches!(
            check_function(&fns[0]),
            Err(TypeError::MismatchedStructs { .. })
        ));
    }

    #[test]
    fn rejects_wrong_arity_builtin() {
        let fns = parse_file("function f(x, y, z) { return clamp(x, y) }").unwrap();
        assert!(matches!(
            check_function(&fns[0]),
            Err(TypeError::WrongArity { .. })
        ));
    }

    #[test]
    fn scalar_broadcasts_against_struct() {
        let fns = parse_file("function f(v∇:{x,y}) { return v * 2 }").unwrap();
        assert!(check_function(&fns[0]).is_ok());
    }
}
