//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of `HashMap<String,bool>`
//!    tracking declared (false) and fully defined (true) names in each nested
//!    block, function, or class body.
//! 2. **Enforce static rules**: reports errors such as redeclaration in the
//!    same scope, reading a variable in its own initializer, invalid `return`
//!    outside functions or with a value inside an initializer, and illegal
//!    use of `this`/`super`.
//! 3. **Record binding distances**: for every variable-referencing node
//!    (`Variable`, `Assign`, `This`, `Super`), calls back into the
//!    interpreter to note its depth when it is a local.  Names found in no
//!    scope are globals and stay out of the table; the runtime late-binds
//!    them at use time, which is what lets mutually recursive top-level
//!    functions work without forward declarations.
//!
//! Every static error is accumulated and reported; none aborts the walk, so a
//! single pass surfaces all of them.  The caller must not evaluate the
//! program when any were returned.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::token::Token;

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<LoxError>,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements, returning every static error found.
    pub fn resolve(mut self, statements: &[Stmt]) -> Vec<LoxError> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.errors
    }

    fn error<S: Into<String>>(&mut self, token: &Token, msg: S) {
        self.errors.push(LoxError::resolve(token, msg));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name);
                self.define(name);

                // Superclass resolves in the surrounding scope, before any of
                // the class's own scopes exist.
                if let Some(superclass_expr) = superclass {
                    if let Expr::Variable {
                        name: super_name, ..
                    } = superclass_expr
                    {
                        if super_name.lexeme == name.lexeme {
                            self.error(super_name, "A class can't inherit from itself.");
                        }
                    }

                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass_expr);

                    // Open a scope binding `super` around the method scopes.
                    self.begin_scope();
                    self.scope_insert("super");
                }

                // The implicit `this` scope for methods.
                self.begin_scope();
                self.scope_insert("this");

                for method in methods {
                    let kind = if method.name.lexeme == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };

                    self.resolve_function(kind, method);
                }

                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }

            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // Declared first, defined only after the initializer ran, so
                // the initializer cannot read the name it is initializing.
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function(declaration) => {
                // Declare and define in one step: a function may recurse into
                // itself by name.
                self.declare(&declaration.name);
                self.define(&declaration.name);

                self.resolve_function(FunctionType::Function, declaration);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Cannot return from top-level code.");
                }

                if let Some(expr) = value {
                    // Initializers may only `return;` bare.
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.error(name, "Cannot read local variable in its own initializer.");
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // Right-hand side first, then bind the assignment target.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Cannot use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Cannot use 'super' outside of a class.");
                        return;
                    }

                    ClassType::Class => {
                        self.error(keyword, "Cannot use 'super' in a class with no superclass.");
                        return;
                    }

                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` distinguishes plain functions, methods and initializers so that
    /// `return` validation sees the right context.
    fn resolve_function(&mut self, kind: FunctionType, declaration: &FunctionDecl) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();

        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }

        for stmt in &declaration.body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Mark a synthetic name (`this`, `super`) as defined in the innermost
    /// scope.
    fn scope_insert(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn declare(&mut self, name: &Token) {
        // The global scope is implicit and tolerant of redeclaration; only
        // local scopes reject duplicates.
        if self.scopes.is_empty() {
            return;
        }

        let duplicate = self
            .scopes
            .last()
            .map_or(false, |scope| scope.contains_key(&name.lexeme));

        if duplicate {
            self.error(name, "Variable already declared in this scope.");
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at the depth of the innermost scope
    /// containing the name, or leave it out of the table (a global) when no
    /// scope does.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                self.interpreter.resolve(id, depth);

                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
