use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// One frame of the lexical scope chain: a mutable name→value map plus an
/// optional enclosing frame.  Frames are shared (`Rc<RefCell<_>>`) between
/// closures and activation records, so a frame lives as long as anything
/// still referencing it.
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite a binding in this frame.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Read a binding, walking the enclosing chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            None
        }
    }

    /// Overwrite an existing binding, walking the enclosing chain.  Returns
    /// false when the name is bound nowhere on the chain.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            true
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            false
        }
    }

    /// The frame exactly `distance` enclosing steps away, or `None` when the
    /// chain is shorter than that (the resolver guarantees it never is).
    fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current = Rc::clone(env);

        for _ in 0..distance {
            let enclosing = current.borrow().enclosing.clone();

            match enclosing {
                Some(parent) => current = parent,
                None => return None,
            }
        }

        Some(current)
    }

    /// Read a binding in the frame `distance` steps away, without searching.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Option<Value> {
        Self::ancestor(env, distance).and_then(|frame| frame.borrow().values.get(name).cloned())
    }

    /// Write a binding in the frame `distance` steps away, without searching.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
    ) -> bool {
        match Self::ancestor(env, distance) {
            Some(frame) => {
                frame.borrow_mut().define(name, value);
                true
            }

            None => false,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
