use crate::error::{Result, SchemeError};
use crate::value::Value;
use crate::Config;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type EnvRef = Rc<RefCell<Frame>>;

/// An environment frame binding symbols to values.
///
/// Frames form a tree rooted at the global frame. The global frame owns the
/// evaluation trace stack and the interpreter configuration; every child
/// shares both through `Rc` handles.
pub struct Frame {
    bindings: HashMap<Rc<str>, Value>,
    parent: Option<EnvRef>,
    stack: Rc<RefCell<Vec<Value>>>,
    config: Rc<Config>,
}

impl Frame {
    /// Create an empty global frame.
    pub fn global(config: Rc<Config>) -> EnvRef {
        Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: None,
            stack: Rc::new(RefCell::new(Vec::new())),
            config,
        }))
    }

    fn child_of(parent: &EnvRef) -> Frame {
        let p = parent.borrow();
        Frame {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
            stack: p.stack.clone(),
            config: p.config.clone(),
        }
    }

    /// Bind `name` in this frame, replacing any existing binding here.
    pub fn define(&mut self, name: Rc<str>, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Return the value bound to `name`, searching up the parent chain.
    pub fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().lookup(name)
        } else {
            Err(SchemeError::UnknownIdentifier(name.to_string()))
        }
    }

    /// Overwrite `name` in the first frame up the chain that binds it.
    /// Never creates a new binding.
    pub fn rebind(&mut self, name: &str, value: Value) -> Result<()> {
        if self.bindings.contains_key(name) {
            self.bindings.insert(Rc::from(name), value);
            Ok(())
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().rebind(name, value)
        } else {
            Err(SchemeError::UnknownIdentifier(name.to_string()))
        }
    }

    /// Handle to the evaluation trace shared along the frame chain.
    pub fn stack(&self) -> Rc<RefCell<Vec<Value>>> {
        self.stack.clone()
    }

    pub fn config(&self) -> Rc<Config> {
        self.config.clone()
    }

    /// Create a child of `parent` with `formals` bound pairwise to `args`.
    ///
    /// A variadic marker must be the last formal and is bound to the list of
    /// remaining arguments; a bare-symbol tail (dotted formals, readable
    /// under `dots_are_cons`) binds the same way.
    pub fn make_child(parent: &EnvRef, formals: &Value, args: &[Value]) -> Result<EnvRef> {
        let mut child = Frame::child_of(parent);
        let mut formals = formals.clone();
        let mut rest = args;
        loop {
            match formals {
                Value::Nil => {
                    if !rest.is_empty() {
                        return Err(SchemeError::TooManyArguments);
                    }
                    break;
                }
                Value::Pair(p) => {
                    if p.first.is_variadic_marker() {
                        debug_assert!(
                            matches!(p.rest, Value::Nil),
                            "variadic marker not in last position"
                        );
                        let name = p
                            .first
                            .variadic_name()
                            .ok_or_else(|| SchemeError::BadForm(p.first.to_string()))?;
                        child.define(name, Value::list(rest.iter().cloned()));
                        break;
                    }
                    let name = match &p.first {
                        Value::Symbol(s) => s.clone(),
                        other => return Err(SchemeError::NonSymbol(other.to_string())),
                    };
                    match rest.split_first() {
                        Some((value, remaining)) => {
                            child.define(name, value.clone());
                            rest = remaining;
                            formals = p.rest.clone();
                        }
                        None => return Err(SchemeError::TooFewArguments),
                    }
                }
                // Dotted formals tail: bind the remaining arguments as a list.
                Value::Symbol(s) => {
                    child.define(s.clone(), Value::list(rest.iter().cloned()));
                    break;
                }
                other => return Err(SchemeError::NonSymbol(other.to_string())),
            }
        }
        Ok(Rc::new(RefCell::new(child)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> EnvRef {
        Frame::global(Rc::new(Config::default()))
    }

    fn symbols(names: &[&str]) -> Value {
        Value::list(names.iter().map(|n| Value::symbol(n)))
    }

    #[test]
    fn define_and_lookup_chain() {
        let outer = global();
        outer.borrow_mut().define(Rc::from("x"), Value::Integer(1));

        let inner = Frame::make_child(&outer, &Value::Nil, &[]).unwrap();
        assert_eq!(inner.borrow().lookup("x").unwrap(), Value::Integer(1));

        inner.borrow_mut().define(Rc::from("x"), Value::Integer(2));
        assert_eq!(inner.borrow().lookup("x").unwrap(), Value::Integer(2));
        assert_eq!(outer.borrow().lookup("x").unwrap(), Value::Integer(1));
    }

    #[test]
    fn lookup_unknown_fails() {
        let env = global();
        assert_eq!(
            env.borrow().lookup("ghost"),
            Err(SchemeError::UnknownIdentifier("ghost".to_string()))
        );
    }

    #[test]
    fn rebind_mutates_defining_frame() {
        let outer = global();
        outer.borrow_mut().define(Rc::from("x"), Value::Integer(1));
        let inner = Frame::make_child(&outer, &Value::Nil, &[]).unwrap();

        inner.borrow_mut().rebind("x", Value::Integer(5)).unwrap();
        assert_eq!(outer.borrow().lookup("x").unwrap(), Value::Integer(5));

        assert_eq!(
            inner.borrow_mut().rebind("y", Value::Integer(0)),
            Err(SchemeError::UnknownIdentifier("y".to_string()))
        );
    }

    #[test]
    fn child_frame_binds_pairwise() {
        let env = global();
        let child = Frame::make_child(
            &env,
            &symbols(&["a", "b"]),
            &[Value::Integer(1), Value::Integer(2)],
        )
        .unwrap();
        assert_eq!(child.borrow().lookup("a").unwrap(), Value::Integer(1));
        assert_eq!(child.borrow().lookup("b").unwrap(), Value::Integer(2));
    }

    #[test]
    fn child_frame_arity_mismatch() {
        let env = global();
        assert!(matches!(
            Frame::make_child(&env, &symbols(&["a", "b"]), &[Value::Integer(1)]),
            Err(SchemeError::TooFewArguments)
        ));
        assert!(matches!(
            Frame::make_child(&env, &symbols(&["a"]), &[Value::Integer(1), Value::Integer(2)]),
            Err(SchemeError::TooManyArguments)
        ));
    }

    #[test]
    fn variadic_marker_binds_remaining() {
        let env = global();
        let marker = Value::list([Value::symbol("variadic"), Value::symbol("rest")]);
        let formals = Value::list([Value::symbol("a"), marker]);

        let child = Frame::make_child(
            &env,
            &formals,
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        )
        .unwrap();
        assert_eq!(child.borrow().lookup("a").unwrap(), Value::Integer(1));
        assert_eq!(
            child.borrow().lookup("rest").unwrap(),
            Value::list([Value::Integer(2), Value::Integer(3)])
        );

        // With no arguments left over, the marker binds the empty list.
        let child = Frame::make_child(&env, &formals, &[Value::Integer(1)]).unwrap();
        assert_eq!(child.borrow().lookup("rest").unwrap(), Value::Nil);
    }

    #[test]
    fn dotted_formals_tail_binds_remaining() {
        let env = global();
        let formals = Value::list_with_tail([Value::symbol("a")], Value::symbol("rest"));
        let child = Frame::make_child(&env, &formals, &[Value::Integer(1), Value::Integer(2)])
            .unwrap();
        assert_eq!(
            child.borrow().lookup("rest").unwrap(),
            Value::list([Value::Integer(2)])
        );
    }

    #[test]
    fn trace_stack_is_shared_with_children() {
        let env = global();
        let child = Frame::make_child(&env, &Value::Nil, &[]).unwrap();
        child.borrow().stack().borrow_mut().push(Value::Integer(1));
        assert_eq!(env.borrow().stack().borrow().len(), 1);
    }
}
