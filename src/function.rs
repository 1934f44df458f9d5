use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::error::LoxError;
use crate::interpreter::{Interpreter, Unwind};
use crate::value::Value;

/// A user-defined function: a declaration paired with the environment it was
/// defined in.  Methods are the same thing with `this` pre-bound by `bind`.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// A copy of this function whose closure has `this` bound to the given
    /// receiver; this is what property access returns for methods.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(self.closure.clone());

        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }

    /// Invoke the function: fresh frame over the closure, parameters bound
    /// positionally, body executed until completion or a `return` unwind.
    ///
    /// Falling off the end yields `nil`, except for initializers which always
    /// yield the bound `this` (also on a bare `return;`).
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        debug!("Calling <fn {}> with {} arg(s)", self.name(), arguments.len());

        let mut environment = Environment::with_enclosing(self.closure.clone());

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let frame = Rc::new(RefCell::new(environment));

        match interpreter.execute_block(&self.declaration.body, frame) {
            Ok(()) => {}

            Err(Unwind::Return(value)) => {
                if self.is_initializer {
                    return self.bound_this();
                }

                return Ok(value);
            }

            Err(unwind) => return Err(unwind),
        }

        if self.is_initializer {
            self.bound_this()
        } else {
            Ok(Value::Nil)
        }
    }

    /// The receiver an initializer returns; always defined at depth 0 of an
    /// initializer's closure because initializers only run bound.
    fn bound_this(&self) -> Result<Value, Unwind> {
        Environment::get_at(&self.closure, 0, "this").ok_or_else(|| {
            Unwind::Error(LoxError::Runtime {
                message: "Undefined variable 'this'.".to_string(),
                line: self.declaration.name.line,
            })
        })
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}
