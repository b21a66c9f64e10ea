use crate::env::EnvRef;
use crate::error::Result;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// Type alias for built-in procedures. The current frame is always passed;
// builtins that do not consult it bind it as `_env`.
pub type BuiltinFn = fn(&[Value], &EnvRef) -> Result<Value>;

/// A Scheme value: an atom, a cons pair, a procedure, or a promise.
#[derive(Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<String>),
    Symbol(Rc<str>),
    /// The empty list.
    Nil,
    Pair(Rc<Pair>),
    Builtin(Rc<Builtin>),
    Lambda(Rc<Closure>),
    /// Structurally a lambda, but applied to unevaluated operands.
    Macro(Rc<Closure>),
    Mu(Rc<MuProcedure>),
    Promise(Rc<RefCell<Promise>>),
}

/// An immutable two-cell record. A proper list is `Nil` or a chain of pairs
/// whose final `rest` is `Nil`.
pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

// Unwind list spines iteratively; a long chain would otherwise recurse
// once per cell when the head is dropped.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut rest = std::mem::replace(&mut self.rest, Value::Nil);
        while let Value::Pair(rc) = rest {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => rest = std::mem::replace(&mut pair.rest, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// A procedure implemented by the host.
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// A procedure defined by a lambda expression, a define form, or
/// define-macro. Captures its definition environment.
pub struct Closure {
    /// Attached by `define`/`define-macro` for trace messages.
    pub name: RefCell<Option<Rc<str>>>,
    pub formals: Value,
    pub body: Value,
    pub env: EnvRef,
}

/// A procedure defined by a mu expression, which has dynamic scope: its
/// activation frame is a child of the caller's frame, not a captured one.
pub struct MuProcedure {
    pub formals: Value,
    pub body: Value,
}

/// A memoized deferred expression, used by `delay` and `cons-stream`.
pub struct Promise {
    /// `Some` until the first force; `None` afterwards.
    pub expression: Option<Value>,
    pub env: EnvRef,
    pub value: Option<Value>,
}

impl Promise {
    pub fn new(expression: Value, env: EnvRef) -> Self {
        Promise {
            expression: Some(expression),
            env,
            value: None,
        }
    }
}

/// Iterator over the pair spine of a list. Stops at the first non-pair
/// tail; callers that require a proper list check `is_list` first.
pub struct ListIter {
    cur: Value,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self.cur.clone() {
            Value::Pair(p) => {
                self.cur = p.rest.clone();
                Some(p.first.clone())
            }
            _ => None,
        }
    }
}

impl Value {
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn cons(first: Value, rest: Value) -> Value {
        Value::Pair(Rc::new(Pair { first, rest }))
    }

    /// Build a proper list from the given values.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        Self::list_with_tail(items, Value::Nil)
    }

    /// Build a (possibly improper) list ending in `tail`.
    pub fn list_with_tail<I>(items: I, tail: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, first| Value::cons(first, rest))
    }

    pub fn iter(&self) -> ListIter {
        ListIter { cur: self.clone() }
    }

    /// True for `Nil` and for pair chains ending in `Nil`.
    pub fn is_list(&self) -> bool {
        let mut cur = self.clone();
        loop {
            match cur {
                Value::Nil => return true,
                Value::Pair(p) => cur = p.rest.clone(),
                _ => return false,
            }
        }
    }

    /// Length of a proper list; `None` if the spine ends in a non-nil tail.
    pub fn list_len(&self) -> Option<usize> {
        let mut len = 0;
        let mut cur = self.clone();
        loop {
            match cur {
                Value::Nil => return Some(len),
                Value::Pair(p) => {
                    len += 1;
                    cur = p.rest.clone();
                }
                _ => return None,
            }
        }
    }

    /// Collect a proper list into a vector; `None` for improper lists.
    pub fn try_to_vec(&self) -> Option<Vec<Value>> {
        if !self.is_list() {
            return None;
        }
        Some(self.iter().collect())
    }

    pub fn as_pair(&self) -> Option<&Rc<Pair>> {
        match self {
            Value::Pair(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Rc<str>> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_symbol_named(&self, name: &str) -> bool {
        matches!(self, Value::Symbol(s) if &**s == name)
    }

    /// Expressions that evaluate to themselves: everything except symbols
    /// and combinations.
    pub fn self_evaluating(&self) -> bool {
        !matches!(self, Value::Symbol(_) | Value::Pair(_))
    }

    /// Only `#f` is false; every other value (including `()` and `0`) is true.
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    /// A variadic parameter marker as produced by the reader: the
    /// two-element list `(variadic name)`.
    pub fn is_variadic_marker(&self) -> bool {
        match self.as_pair() {
            Some(p) => p.first.is_symbol_named("variadic") && self.list_len() == Some(2),
            None => false,
        }
    }

    /// The symbol a variadic marker binds the remaining arguments to.
    pub fn variadic_name(&self) -> Option<Rc<str>> {
        if !self.is_variadic_marker() {
            return None;
        }
        let second = self.iter().nth(1)?;
        second.as_symbol().cloned()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Nil => "nil",
            Value::Pair(_) => "pair",
            Value::Builtin(_) | Value::Lambda(_) | Value::Mu(_) => "procedure",
            Value::Macro(_) => "macro",
            Value::Promise(_) => "promise",
        }
    }

    /// The form `display` prints: string contents without quotes, the repr
    /// form for everything else.
    pub fn display_string(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

// Structural equality with Scheme's `equal?` semantics: numbers compare
// across integer/float, pairs compare recursively, procedures and promises
// compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a), Value::Pair(b)) => {
                Rc::ptr_eq(a, b) || (a.first == b.first && a.rest == b.rest)
            }
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            (Value::Mu(a), Value::Mu(b)) => Rc::ptr_eq(a, b),
            (Value::Promise(a), Value::Promise(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Nil => write!(f, "()"),
            Value::Pair(_) => write_pairs(f, self),
            Value::Builtin(b) => write!(f, "#[{}]", b.name),
            Value::Lambda(c) | Value::Macro(c) => write_signature(f, "lambda", &c.formals, &c.body),
            Value::Mu(m) => write_signature(f, "mu", &m.formals, &m.body),
            Value::Promise(p) => {
                let forced = p.borrow().expression.is_none();
                write!(f, "#[promise ({}forced)]", if forced { "" } else { "not " })
            }
        }
    }
}

fn write_pairs(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    write!(f, "(")?;
    let mut cur = value.clone();
    let mut first = true;
    loop {
        match cur {
            Value::Pair(p) => {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}", p.first)?;
                first = false;
                cur = p.rest.clone();
            }
            Value::Nil => break,
            tail => {
                write!(f, " . {}", tail)?;
                break;
            }
        }
    }
    write!(f, ")")
}

// Lambdas and mus print as the expression that would recreate them.
fn write_signature(
    f: &mut fmt::Formatter<'_>,
    keyword: &str,
    formals: &Value,
    body: &Value,
) -> fmt::Result {
    let repr = Value::cons(Value::symbol(keyword), Value::cons(formals.clone(), body.clone()));
    write!(f, "{}", repr)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_list(items: &[i64]) -> Value {
        Value::list(items.iter().map(|&n| Value::Integer(n)))
    }

    #[test]
    fn list_construction_and_length() {
        let list = int_list(&[1, 2, 3]);
        assert!(list.is_list());
        assert_eq!(list.list_len(), Some(3));
        assert_eq!(list.to_string(), "(1 2 3)");

        let dotted = Value::list_with_tail([Value::Integer(1)], Value::Integer(2));
        assert!(!dotted.is_list());
        assert_eq!(dotted.list_len(), None);
        assert_eq!(dotted.to_string(), "(1 . 2)");
    }

    #[test]
    fn iteration_stops_at_improper_tail() {
        let dotted =
            Value::list_with_tail([Value::Integer(1), Value::Integer(2)], Value::Integer(3));
        let spine: Vec<Value> = dotted.iter().collect();
        assert_eq!(spine, vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(dotted.try_to_vec(), None);
    }

    #[test]
    fn truthiness() {
        assert!(Value::Nil.is_true());
        assert!(Value::Integer(0).is_true());
        assert!(Value::string("").is_true());
        assert!(Value::Bool(false).is_false());
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_ne!(Value::Integer(2), Value::Float(2.5));
    }

    #[test]
    fn variadic_marker() {
        let marker = Value::list([Value::symbol("variadic"), Value::symbol("rest")]);
        assert!(marker.is_variadic_marker());
        assert_eq!(marker.variadic_name().as_deref(), Some("rest"));

        let not_marker = Value::list([Value::symbol("variadic")]);
        assert!(!not_marker.is_variadic_marker());
        assert!(!Value::symbol("variadic").is_variadic_marker());
    }

    #[test]
    fn nested_list_repr() {
        let inner = int_list(&[2, 3]);
        let outer = Value::list([Value::Integer(1), inner, Value::symbol("x")]);
        assert_eq!(outer.to_string(), "(1 (2 3) x)");
    }
}
