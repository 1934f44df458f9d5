use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::LoxError;
use crate::function::LoxFunction;
use crate::token::Token;
use crate::value::Value;

/// A class value: name, optional superclass, and its method table.  Calling a
/// class allocates an instance and runs `init` if present.
pub struct LoxClass {
    name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Walk the inheritance chain for a method, nearest class first.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// As a callable, a class has the arity of its initializer (0 without one).
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map_or(0, |initializer| initializer.arity())
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxClass")
            .field("name", &self.name)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// An instance: its class plus a field map populated on first assignment.
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Property read: fields shadow methods; methods come back bound to the
    /// receiver.  Takes the `Rc` handle because binding needs it.
    pub fn get(instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value, LoxError> {
        if let Some(field) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(field.clone());
        }

        if let Some(method) = instance.borrow().class.find_method(&name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(instance.clone()))));
        }

        Err(LoxError::runtime(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    /// Property write: inserts or overwrites, no declaration required.
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

impl fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxInstance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}
