//! Recursive-descent + Pratt expression parser for GradientScript.
//!
//! Produces a [`Function`] directly in terms of the [`Expr`] model
//! — there is no separate surface AST to lower later.

use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::term::{Assignment, BinaryOp, Expr, Function, Parameter, UnaryOp};

/// Binding powers for infix operators, lowest to highest. Power is right
/// associative; `+ -` and `* /` are left associative.
fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
    Some(match kind {
        TokenKind::Plus | TokenKind::Minus => (10, 11),
        TokenKind::Star | TokenKind::Slash => (20, 21),
        TokenKind::Caret | TokenKind::StarStar => (31, 30),
        _ => return None,
    })
}

const POSTFIX_BP: u8 = 40;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(src: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::tokenize(src)?;
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("{:?} '{}'", self.peek().kind, self.peek().lexeme),
                span: self.peek().span,
            })
        }
    }

    /// Parses every `function ... { ... }` block in the file.
    pub fn parse_file(&mut self) -> Result<Vec<Function>, ParseError> {
        let mut funcs = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            funcs.push(self.parse_function()?);
        }
        Ok(funcs)
    }

    pub fn parse_function(&mut self) -> Result<Function, ParseError> {
        self.expect(TokenKind::Function, "'function'")?;
        let name = self.expect(TokenKind::Identifier, "function name")?.lexeme;
        self.expect(TokenKind::LeftParen, "'('")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RightParen, "')'")?;
        self.expect(TokenKind::LeftBrace, "'{'")?;

        let mut locals = Vec::new();
        loop {
            if self.peek().kind == TokenKind::Return {
                break;
            }
            locals.push(self.parse_assignment()?);
        }
        self.expect(TokenKind::Return, "'return'")?;
        let ret = self.parse_expr(0)?;
        self.expect(TokenKind::RightBrace, "'}'")?;

        for a in &locals {
            if locals.iter().filter(|b| b.name == a.name).count() > 1 {
                return Err(ParseError::DuplicateAssignment {
                    name: a.name.clone(),
                    span: self.peek().span,
                });
            }
        }

        Ok(Function {
            name,
            params,
            locals,
            ret,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Parameter>, ParseError> {
        let mut params = Vec::new();
        if self.peek().kind == TokenKind::RightParen {
            return Ok(params);
        }
        loop {
            let tok = self.expect(TokenKind::Identifier, "parameter name")?;
            let name = tok.lexeme;
            if params.iter().any(|p: &Parameter| p.name == name) {
                return Err(ParseError::DuplicateParameter {
                    name,
                    span: tok.span,
                });
            }
            let requires_grad = if self.peek().kind == TokenKind::Nabla {
                self.advance();
                true
            } else {
                false
            };
            let components = if self.peek().kind == TokenKind::Colon {
                self.advance();
                self.expect(TokenKind::LeftBrace, "'{'")?;
                let mut cs = Vec::new();
                loop {
                    let c = self.expect(TokenKind::Identifier, "component name")?.lexeme;
                    cs.push(c);
                    if self.peek().kind == TokenKind::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RightBrace, "'}'")?;
                if cs.is_empty() {
                    return Err(ParseError::InvalidComponentList {
                        name: name.clone(),
                        span: tok.span,
                    });
                }
                Some(cs)
            } else {
                None
            };
            params.push(Parameter {
                name,
                requires_grad,
                components,
            });
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let name = self.expect(TokenKind::Identifier, "local name")?.lexeme;
        self.expect(TokenKind::Equals, "'='")?;
        let expr = self.parse_expr(0)?;
        Ok(Assignment { name, expr })
    }

    /// Pratt expression parser: `min_bp` is the minimum binding power an
    /// infix operator must have to be consumed at this recursion level.
    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            if self.peek().kind == TokenKind::Dot {
                if POSTFIX_BP < min_bp {
                    break;
                }
                self.advance();
                let field = self.expect(TokenKind::Identifier, "component name")?.lexeme;
                lhs = Expr::comp(lhs, field);
                continue;
            }

            let Some((l_bp, r_bp)) = infix_binding_power(self.peek().kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            let op_tok = self.advance();
            let op = match op_tok.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Caret | TokenKind::StarStar => BinaryOp::Pow,
                _ => unreachable!(),
            };
            let rhs = self.parse_expr(r_bp)?;
            lhs = Expr::bin(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_expr(25)?;
                Ok(Expr::un(UnaryOp::Neg, operand))
            }
            TokenKind::Plus => {
                self.advance();
                let operand = self.parse_expr(25)?;
                Ok(Expr::un(UnaryOp::Plus, operand))
            }
            TokenKind::Number => {
                let tok = self.advance();
                Ok(Expr::num(tok.lexeme.parse().expect("lexer validated number")))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr(0)?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                if self.peek().kind == TokenKind::LeftParen {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek().kind != TokenKind::RightParen {
                        loop {
                            args.push(self.parse_expr(0)?);
                            if self.peek().kind == TokenKind::Comma {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RightParen, "')'")?;
                    Ok(Expr::call(tok.lexeme, args))
                } else {
                    Ok(Expr::var(tok.lexeme))
                }
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "an expression".to_string(),
                found: format!("{:?} '{}'", self.peek().kind, self.peek().lexeme),
                span: self.peek().span,
            }),
        }
    }
}

/// Parses every function in a GradientScript source file.
pub fn parse_file(src: &str) -> Result<Vec<Function>, ParseError> {
    Parser::new(src)?.parse_file()
}
