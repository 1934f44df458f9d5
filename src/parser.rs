use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Literal, Stmt};
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

/// Hard cap on parameters and call arguments.
const MAX_ARITY: usize = 255;

/// Recursive-descent parser over the scanner's token stream.
///
/// `parse` produces every statement it can recover, alongside every syntax
/// error encountered: on a parse error the parser reports it and discards
/// tokens up to the next statement boundary (panic-mode synchronization), then
/// resumes at the following declaration.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: ExprId,
    errors: Vec<LoxError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_start_id(tokens, 0)
    }

    /// Continue an id sequence started by an earlier parse.  A REPL session
    /// must thread ids across lines so a later line can never reuse the id of
    /// a node captured by a still-live closure.
    pub fn with_start_id(tokens: Vec<Token>, start_id: ExprId) -> Self {
        Parser {
            tokens,
            current: 0,
            next_id: start_id,
            errors: Vec::new(),
        }
    }

    /// First id not yet handed out; feed back into `with_start_id`.
    pub fn next_id(&self) -> ExprId {
        self.next_id
    }

    /// program → declaration* EOF
    pub fn parse(&mut self) -> (Vec<Stmt>, Vec<LoxError>) {
        info!("Beginning parse of {} token(s)", self.tokens.len());

        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        (statements, mem::take(&mut self.errors))
    }

    /// When in panic mode, consume tokens until reaching a statement boundary
    /// so parsing can begin again.
    fn synchronize(&mut self) {
        debug!("Synchronizing after parse error");

        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {
                    self.advance();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Declarations and statements
    // ─────────────────────────────────────────────────────────────────────────

    /// declaration → classDecl | funDecl | varDecl | statement
    fn declaration(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::CLASS]) {
            return self.class_declaration();
        }

        if self.match_tokens(&[TokenType::FUN]) {
            return Ok(Stmt::Function(self.function("function")?));
        }

        if self.match_tokens(&[TokenType::VAR]) {
            return self.var_declaration();
        }

        self.statement()
    }

    /// classDecl → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}"
    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass = if self.match_tokens(&[TokenType::LESS]) {
            let super_name = self.consume(TokenType::IDENTIFIER, "Expect superclass name.")?;

            Some(Expr::Variable {
                id: self.node_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    /// function → IDENTIFIER "(" parameters? ")" block
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        let name = self.consume(TokenType::IDENTIFIER, format!("Expect {} name.", kind))?;

        self.consume(
            TokenType::LEFT_PAREN,
            format!("Expect '(' after {} name.", kind),
        )?;

        let mut params = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    // Reported without unwinding; parsing continues.
                    let token = self.peek().clone();
                    self.errors.push(LoxError::parse(
                        &token,
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LEFT_BRACE,
            format!("Expect '{{' before {} body.", kind),
        )?;

        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    /// varDecl → "var" IDENTIFIER ( "=" expression )? ";"
    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    /// statement → forStmt | ifStmt | printStmt | returnStmt | whileStmt
    ///           | block | exprStmt
    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block()?));
        }

        self.expression_statement()
    }

    /// `for (init; cond; step) body` desugars here into
    /// `{ init; while (cond) { body; step; } }`; the evaluator never sees a
    /// `for` construct.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or(Expr::Literal(Literal::Bool(true)));

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(expr))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        let value = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    /// block → declaration* "}"  (the opening brace is already consumed)
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions, lowest precedence first
    // ─────────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    /// assignment → ( call "." )? IDENTIFIER "=" assignment | logic_or
    ///
    /// The left-hand side is parsed as an ordinary expression and rewritten:
    /// `Variable` becomes `Assign`, `Get` becomes `Set`.  Anything else is an
    /// invalid target, reported without unwinding so parsing continues.
    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { id, name } => Ok(Expr::Assign {
                    id,
                    name,
                    value: Box::new(value),
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                other => {
                    self.errors
                        .push(LoxError::parse(&equals, "Invalid assignment target."));

                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator = self.previous().clone();
            let right = self.and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator = self.previous().clone();
            let right = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator = self.previous().clone();
            let right = self.factor()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator = self.previous().clone();
            let right = self.unary()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator = self.previous().clone();
            let right = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    /// call → primary ( "(" arguments? ")" | "." IDENTIFIER )*
    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name =
                    self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    // Reported without unwinding; parsing continues.
                    let token = self.peek().clone();
                    self.errors.push(LoxError::parse(
                        &token,
                        "Can't have more than 255 arguments.",
                    ));
                }

                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::FALSE]) {
            return Ok(Expr::Literal(Literal::Bool(false)));
        }

        if self.match_tokens(&[TokenType::TRUE]) {
            return Ok(Expr::Literal(Literal::Bool(true)));
        }

        if self.match_tokens(&[TokenType::NIL]) {
            return Ok(Expr::Literal(Literal::Nil));
        }

        if self.match_tokens(&[TokenType::NUMBER(0.0), TokenType::STRING(String::new())]) {
            return Ok(match &self.previous().token_type {
                TokenType::NUMBER(n) => Expr::Literal(Literal::Number(*n)),
                TokenType::STRING(s) => Expr::Literal(Literal::Str(s.clone())),
                _ => unreachable!("matched a literal token"),
            });
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword = self.previous().clone();

            self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;

            let method = self.consume(TokenType::IDENTIFIER, "Expect superclass method name.")?;

            return Ok(Expr::Super {
                id: self.node_id(),
                keyword,
                method,
            });
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                id: self.node_id(),
                keyword: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: self.node_id(),
                name: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(LoxError::parse(self.peek(), "Expect expression."))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token-stream helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn node_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn consume<S: Into<String>>(&mut self, token_type: TokenType, msg: S) -> Result<Token> {
        if self.check(&token_type) {
            return Ok(self.advance().clone());
        }

        Err(LoxError::parse(self.peek(), msg))
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}
