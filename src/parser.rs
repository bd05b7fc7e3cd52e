use crate::ast::{Constant, Expr, Script};
use crate::lexer::{Keyword, LexError, Lexer, Token};
use std::fmt;

#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: syntax error: {}", self.line, self.message)
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            message: e.message,
            line: e.line,
        }
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    current_line: u32,
    in_function: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        let current_line = lexer.token_line();
        Ok(Self {
            lexer,
            current,
            current_line,
            in_function: 0,
        })
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        let old = std::mem::replace(&mut self.current, next);
        self.current_line = self.lexer.token_line();
        Ok(old)
    }

    fn eat(&mut self, expected: &Token) -> Result<(), ParseError> {
        if &self.current == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, got {:?}", self.current)))
        }
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            message: msg.into(),
            line: self.current_line,
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            other => Err(self.error(format!("expected an identifier, got {other:?}"))),
        }
    }

    pub fn parse_script(&mut self) -> Result<Script, ParseError> {
        let mut instrs = Vec::new();
        while self.current != Token::Eof {
            instrs.push(self.parse_instr()?);
        }
        Ok(Script {
            body: Expr::Block { instrs, line: 1 },
        })
    }

    fn parse_instr(&mut self) -> Result<Expr, ParseError> {
        match &self.current {
            Token::Keyword(Keyword::Var) => {
                let line = self.current_line;
                self.advance()?;
                let name = self.expect_identifier()?;
                self.eat(&Token::Assign)?;
                let expr = Box::new(self.parse_expression()?);
                self.eat(&Token::Semicolon)?;
                Ok(Expr::LocalVarAssignment {
                    name,
                    expr,
                    declaration: true,
                    line,
                })
            }
            Token::Keyword(Keyword::If) => self.parse_if(),
            Token::Keyword(Keyword::Return) => {
                let line = self.current_line;
                if self.in_function == 0 {
                    return Err(self.error("return outside a function"));
                }
                self.advance()?;
                let expr = if self.current == Token::Semicolon {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                self.eat(&Token::Semicolon)?;
                Ok(Expr::Return { expr, line })
            }
            Token::Keyword(Keyword::Function) => self.parse_function(true),
            _ => {
                let expr = self.parse_expression()?;
                let instr = if self.current == Token::Assign {
                    let line = self.current_line;
                    self.advance()?;
                    let rhs = Box::new(self.parse_expression()?);
                    match expr {
                        Expr::LocalVarAccess { name, .. } => Expr::LocalVarAssignment {
                            name,
                            expr: rhs,
                            declaration: false,
                            line,
                        },
                        Expr::FieldAccess { receiver, name, .. } => Expr::FieldAssignment {
                            receiver,
                            name,
                            expr: rhs,
                            line,
                        },
                        _ => return Err(self.error("invalid assignment target")),
                    }
                } else {
                    expr
                };
                self.eat(&Token::Semicolon)?;
                Ok(instr)
            }
        }
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        let line = self.current_line;
        self.advance()?;
        self.eat(&Token::LeftParen)?;
        let condition = Box::new(self.parse_expression()?);
        self.eat(&Token::RightParen)?;
        let true_block = Box::new(self.parse_block()?);
        let false_block = if self.current == Token::Keyword(Keyword::Else) {
            self.advance()?;
            Box::new(self.parse_block()?)
        } else {
            Box::new(Expr::Block {
                instrs: Vec::new(),
                line,
            })
        };
        Ok(Expr::If {
            condition,
            true_block,
            false_block,
            line,
        })
    }

    fn parse_block(&mut self) -> Result<Expr, ParseError> {
        let line = self.current_line;
        self.eat(&Token::LeftBrace)?;
        let mut instrs = Vec::new();
        while self.current != Token::RightBrace {
            if self.current == Token::Eof {
                return Err(self.error("unterminated block"));
            }
            instrs.push(self.parse_instr()?);
        }
        self.advance()?;
        Ok(Expr::Block { instrs, line })
    }

    /// Parses `function name?(params) { ... }`. Declarations require the
    /// name; expression position allows an anonymous function.
    fn parse_function(&mut self, named: bool) -> Result<Expr, ParseError> {
        let line = self.current_line;
        self.eat(&Token::Keyword(Keyword::Function))?;
        let name = if let Token::Identifier(_) = &self.current {
            Some(self.expect_identifier()?)
        } else if named {
            return Err(self.error("expected a function name"));
        } else {
            None
        };
        self.eat(&Token::LeftParen)?;
        let mut params = Vec::new();
        if self.current != Token::RightParen {
            loop {
                params.push(self.expect_identifier()?);
                if self.current != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.eat(&Token::RightParen)?;
        self.in_function += 1;
        let body = self.parse_block();
        self.in_function -= 1;
        Ok(Expr::Fun {
            name,
            params,
            body: Box::new(body?),
            line,
        })
    }

    // Infix operators desugar to calls of the operator globals, so the
    // precedence ladder bottoms out in ordinary FunCall nodes.
    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_relational()?;
        while matches!(self.current, Token::Equal | Token::NotEqual) {
            let rhs = |p: &mut Self| p.parse_relational();
            expr = self.desugar_binary(expr, rhs)?;
        }
        Ok(expr)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_additive()?;
        while matches!(
            self.current,
            Token::LessThan | Token::LessThanEqual | Token::GreaterThan | Token::GreaterThanEqual
        ) {
            let rhs = |p: &mut Self| p.parse_additive();
            expr = self.desugar_binary(expr, rhs)?;
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_multiplicative()?;
        while matches!(self.current, Token::Plus | Token::Minus) {
            let rhs = |p: &mut Self| p.parse_multiplicative();
            expr = self.desugar_binary(expr, rhs)?;
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_postfix()?;
        while matches!(self.current, Token::Star | Token::Slash | Token::Percent) {
            let rhs = |p: &mut Self| p.parse_postfix();
            expr = self.desugar_binary(expr, rhs)?;
        }
        Ok(expr)
    }

    fn desugar_binary(
        &mut self,
        lhs: Expr,
        rhs: impl FnOnce(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let line = self.current_line;
        let name = self
            .current
            .operator_name()
            .expect("caller checked an operator token")
            .to_string();
        self.advance()?;
        let right = rhs(self)?;
        Ok(Expr::FunCall {
            callee: Box::new(Expr::LocalVarAccess { name, line }),
            args: vec![lhs, right],
            line,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current {
                Token::LeftParen => {
                    let line = self.current_line;
                    let args = self.parse_args()?;
                    expr = Expr::FunCall {
                        callee: Box::new(expr),
                        args,
                        line,
                    };
                }
                Token::Dot => {
                    let line = self.current_line;
                    self.advance()?;
                    let name = self.expect_identifier()?;
                    if self.current == Token::LeftParen {
                        let args = self.parse_args()?;
                        expr = Expr::MethodCall {
                            receiver: Box::new(expr),
                            name,
                            args,
                            line,
                        };
                    } else {
                        expr = Expr::FieldAccess {
                            receiver: Box::new(expr),
                            name,
                            line,
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.eat(&Token::LeftParen)?;
        let mut args = Vec::new();
        if self.current != Token::RightParen {
            loop {
                args.push(self.parse_expression()?);
                if self.current != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.eat(&Token::RightParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.current_line;
        match &self.current {
            Token::IntLiteral(n) => {
                let n = *n;
                self.advance()?;
                Ok(Expr::Literal {
                    value: Constant::Int(n),
                    line,
                })
            }
            Token::StringLiteral(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(Expr::Literal {
                    value: Constant::Str(s),
                    line,
                })
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(Expr::LocalVarAccess { name, line })
            }
            Token::Keyword(Keyword::Function) => self.parse_function(false),
            Token::LeftBrace => self.parse_object_literal(),
            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.eat(&Token::RightParen)?;
                Ok(expr)
            }
            // An operator in callee position names the operator global,
            // as in `+(x, y)`.
            tok => match tok.operator_name() {
                Some(name) => {
                    let name = name.to_string();
                    self.advance()?;
                    Ok(Expr::LocalVarAccess { name, line })
                }
                None => Err(self.error(format!("unexpected token {:?}", self.current))),
            },
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let line = self.current_line;
        self.eat(&Token::LeftBrace)?;
        let mut inits = Vec::new();
        if self.current != Token::RightBrace {
            loop {
                let name = self.expect_identifier()?;
                self.eat(&Token::Colon)?;
                inits.push((name, self.parse_expression()?));
                if self.current != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.eat(&Token::RightBrace)?;
        Ok(Expr::ObjectLiteral { inits, line })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Script {
        Parser::new(src).unwrap().parse_script().unwrap()
    }

    fn instrs(script: &Script) -> &[Expr] {
        match &script.body {
            Expr::Block { instrs, .. } => instrs,
            other => panic!("script body is not a block: {other:?}"),
        }
    }

    #[test]
    fn parse_empty() {
        let script = parse("");
        assert!(instrs(&script).is_empty());
    }

    #[test]
    fn parse_var_declaration() {
        let script = parse("var x = 42;");
        assert!(matches!(
            &instrs(&script)[0],
            Expr::LocalVarAssignment {
                declaration: true,
                ..
            }
        ));
    }

    #[test]
    fn parse_plain_assignment() {
        let script = parse("x = 42;");
        assert!(matches!(
            &instrs(&script)[0],
            Expr::LocalVarAssignment {
                declaration: false,
                ..
            }
        ));
    }

    #[test]
    fn parse_if_statement() {
        let script = parse("if (x) { y; } else { z; }");
        assert!(matches!(&instrs(&script)[0], Expr::If { .. }));
    }

    #[test]
    fn else_branch_defaults_to_empty_block() {
        let script = parse("if (x) { y; }");
        let Expr::If { false_block, .. } = &instrs(&script)[0] else {
            panic!("expected an if");
        };
        let Expr::Block { instrs, .. } = false_block.as_ref() else {
            panic!("expected a block");
        };
        assert!(instrs.is_empty());
    }

    #[test]
    fn parse_function_declaration() {
        let script = parse("function add(a, b) { return a; }");
        let Expr::Fun { name, params, .. } = &instrs(&script)[0] else {
            panic!("expected a function");
        };
        assert_eq!(name.as_deref(), Some("add"));
        assert_eq!(params, &["a", "b"]);
    }

    #[test]
    fn parse_anonymous_function_expression() {
        let script = parse("var f = function(a) { return a; };");
        let Expr::LocalVarAssignment { expr, .. } = &instrs(&script)[0] else {
            panic!("expected an assignment");
        };
        assert!(matches!(expr.as_ref(), Expr::Fun { name: None, .. }));
    }

    #[test]
    fn infix_operator_desugars_to_funcall() {
        let script = parse("a + b;");
        let Expr::FunCall { callee, args, .. } = &instrs(&script)[0] else {
            panic!("expected a call");
        };
        assert!(matches!(callee.as_ref(), Expr::LocalVarAccess { name, .. } if name == "+"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn operator_precedence() {
        // a + b * c parses as +(a, *(b, c))
        let script = parse("a + b * c;");
        let Expr::FunCall { callee, args, .. } = &instrs(&script)[0] else {
            panic!("expected a call");
        };
        assert!(matches!(callee.as_ref(), Expr::LocalVarAccess { name, .. } if name == "+"));
        assert!(matches!(&args[1], Expr::FunCall { callee, .. }
            if matches!(callee.as_ref(), Expr::LocalVarAccess { name, .. } if name == "*")));
    }

    #[test]
    fn prefix_operator_call() {
        let script = parse("+(x, y);");
        let Expr::FunCall { callee, args, .. } = &instrs(&script)[0] else {
            panic!("expected a call");
        };
        assert!(matches!(callee.as_ref(), Expr::LocalVarAccess { name, .. } if name == "+"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn parse_object_literal_and_fields() {
        let script = parse("var o = { a: 1, b: 2 }; o.a; o.a = 3; o.m(1);");
        let body = instrs(&script);
        let Expr::LocalVarAssignment { expr, .. } = &body[0] else {
            panic!("expected a declaration");
        };
        let Expr::ObjectLiteral { inits, .. } = expr.as_ref() else {
            panic!("expected an object literal");
        };
        assert_eq!(inits.len(), 2);
        assert!(matches!(&body[1], Expr::FieldAccess { name, .. } if name == "a"));
        assert!(matches!(&body[2], Expr::FieldAssignment { name, .. } if name == "a"));
        assert!(matches!(&body[3], Expr::MethodCall { name, args, .. }
            if name == "m" && args.len() == 1));
    }

    #[test]
    fn top_level_return_is_rejected() {
        let err = Parser::new("return 1;")
            .unwrap()
            .parse_script()
            .unwrap_err();
        assert!(err.message.contains("return outside a function"));
    }

    #[test]
    fn return_inside_function_parses() {
        let script = parse("function f() { return; }");
        let Expr::Fun { body, .. } = &instrs(&script)[0] else {
            panic!("expected a function");
        };
        let Expr::Block { instrs, .. } = body.as_ref() else {
            panic!("expected a block");
        };
        assert!(matches!(&instrs[0], Expr::Return { expr: None, .. }));
    }

    #[test]
    fn invalid_assignment_target() {
        let err = Parser::new("1 = 2;").unwrap().parse_script().unwrap_err();
        assert!(err.message.contains("invalid assignment target"));
    }

    #[test]
    fn node_lines() {
        let script = parse("var a = 1;\nvar b = 2;\n\nif (a) { b; }");
        let body = instrs(&script);
        assert_eq!(body[0].line(), 1);
        assert_eq!(body[1].line(), 2);
        assert_eq!(body[2].line(), 4);
    }
}
