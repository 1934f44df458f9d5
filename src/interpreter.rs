use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::function::LoxFunction;
use crate::token::{Token, TokenType};
use crate::value::{NativeFunction, Value};

/// Non-local control flow used as the evaluator's early-exit channel.
///
/// `Return` is not an error: it is the signal a `return` statement raises and
/// `LoxFunction::call` consumes at the call boundary.  The two variants share
/// a channel but never convert into each other.
pub enum Unwind {
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(error: LoxError) -> Self {
        Unwind::Error(error)
    }
}

impl Unwind {
    fn into_error(self) -> LoxError {
        match self {
            Unwind::Error(error) => error,

            // The resolver rejects top-level `return`, so an unconsumed
            // `Return` cannot escape once resolution has run.
            Unwind::Return(_) => LoxError::Runtime {
                message: "Cannot return from top-level code.".to_string(),
                line: 0,
            },
        }
    }
}

/// Tree-walking evaluator.
///
/// Holds the global frame, the currently active frame, and the binding-depth
/// table the resolver filled in: an expression id present in the table reads
/// or writes exactly that many frames up the chain; an absent id is a global
/// reference, checked only at use time.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Build an interpreter whose `print` statements write to `output`
    /// instead of stdout.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            }),
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Record a local binding depth for an expression node.  Called by the
    /// resolver; absent ids fall back to the global frame.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// The binding-depth table (expression id → enclosing steps).
    pub fn locals(&self) -> &HashMap<ExprId, usize> {
        &self.locals
    }

    /// Execute a statement list to completion, or stop at the first runtime
    /// error and surface it.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            if let Err(unwind) = self.execute(stmt) {
                return Err(unwind.into_error());
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value).map_err(LoxError::from)?;
                self.output.flush().map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let enclosing = self.environment.clone();

                self.execute_block(
                    statements,
                    Rc::new(RefCell::new(Environment::with_enclosing(enclosing))),
                )
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(declaration) => {
                let function =
                    LoxFunction::new(declaration.clone(), self.environment.clone(), false);

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { keyword: _, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), Unwind> {
        let superclass_value = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };

                    return Err(LoxError::runtime(token, "Superclass must be a class.").into());
                }
            },

            None => None,
        };

        // Define the name first so methods can refer to the class itself.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // Methods close over an extra frame binding `super` when inheriting.
        let method_closure = match &superclass_value {
            Some(superclass) => {
                let mut environment = Environment::with_enclosing(self.environment.clone());

                environment.define("super", Value::Class(superclass.clone()));

                Rc::new(RefCell::new(environment))
            }

            None => self.environment.clone(),
        };

        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for declaration in methods {
            let is_initializer = declaration.name.lexeme == "init";

            method_map.insert(
                declaration.name.lexeme.clone(),
                Rc::new(LoxFunction::new(
                    declaration.clone(),
                    method_closure.clone(),
                    is_initializer,
                )),
            );
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass_value, method_map);

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Class(Rc::new(class)));

        Ok(())
    }

    /// Run a statement list in the given frame, restoring the previous frame
    /// on every exit path (including unwinds).
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Unwind> {
        let previous = self.environment.clone();

        self.environment = environment;

        let mut result = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, Unwind> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                // Short circuit: the deciding operand is the result.
                if operator.token_type == TokenType::OR {
                    if left_val.is_truthy() {
                        return Ok(left_val);
                    }
                } else if !left_val.is_truthy() {
                    return Ok(left_val);
                }

                self.evaluate(right)
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                let assigned = match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                    ),

                    None => self
                        .globals
                        .borrow_mut()
                        .assign(&name.lexeme, value.clone()),
                };

                if !assigned {
                    return Err(undefined_variable(name));
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut argument_values = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                self.call_value(callee_val, argument_values, paren)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    LoxInstance::get(&instance, name).map_err(Unwind::Error)
                }

                _ => Err(LoxError::runtime(name, "Only instances have properties.").into()),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;

                    instance.borrow_mut().set(&name.lexeme, value.clone());

                    Ok(value)
                }

                _ => Err(LoxError::runtime(name, "Only instances have fields.").into()),
            },

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, Unwind> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => Err(LoxError::runtime(operator, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, Unwind> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, left_val, right_val)?;

                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, left_val, right_val)?;

                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                // IEEE-754 semantics throughout; x/0 is an infinity, not an error.
                let (a, b) = number_operands(operator, left_val, right_val)?;

                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, left_val, right_val)?;

                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, left_val, right_val)?;

                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, left_val, right_val)?;

                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, left_val, right_val)?;

                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            _ => Err(LoxError::runtime(operator, "Invalid binary operator.").into()),
        }
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
    ) -> Result<Value, Unwind> {
        let distance = match self.locals.get(&id) {
            Some(&distance) => distance,
            None => return Err(undefined_variable(keyword)),
        };

        let superclass = match Environment::get_at(&self.environment, distance, "super") {
            Some(Value::Class(class)) => class,
            _ => return Err(undefined_variable(keyword)),
        };

        // `this` lives in the frame one step nearer than `super`.
        let receiver = match Environment::get_at(&self.environment, distance - 1, "this") {
            Some(Value::Instance(instance)) => instance,
            _ => return Err(undefined_variable(keyword)),
        };

        let method_fn = superclass.find_method(&method.lexeme).ok_or_else(|| {
            Unwind::Error(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            ))
        })?;

        Ok(Value::Function(Rc::new(method_fn.bind(receiver))))
    }

    /// Dispatch a call on any callable value, checking arity first.
    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, Unwind> {
        match callee {
            Value::NativeFunction(native) => {
                check_arity(native.arity, arguments.len(), paren)?;

                (native.func)(&arguments).map_err(Unwind::Error)
            }

            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;

                function.call(self, arguments)
            }

            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;

                debug!("Instantiating class {}", class.name());

                let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));

                if let Some(initializer) = class.find_method("init") {
                    initializer.bind(instance.clone()).call(self, arguments)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::runtime(paren, "Can only call functions and classes.").into()),
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value, Unwind> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme)
                .ok_or_else(|| undefined_variable(name)),

            None => self
                .globals
                .borrow()
                .get(&name.lexeme)
                .ok_or_else(|| undefined_variable(name)),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn undefined_variable(name: &Token) -> Unwind {
    Unwind::Error(LoxError::runtime(
        name,
        format!("Undefined variable '{}'.", name.lexeme),
    ))
}

fn check_arity(arity: usize, got: usize, paren: &Token) -> Result<(), Unwind> {
    if got != arity {
        return Err(LoxError::runtime(
            paren,
            format!("Expected {} arguments but got {}.", arity, got),
        )
        .into());
    }

    Ok(())
}

fn number_operands(operator: &Token, left: Value, right: Value) -> Result<(f64, f64), Unwind> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),

        _ => Err(LoxError::runtime(operator, "Operands must be numbers.").into()),
    }
}

fn clock_native(_args: &[Value]) -> Result<Value, LoxError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LoxError::Runtime {
            message: format!("Clock error: {}", e),
            line: 0,
        })?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
