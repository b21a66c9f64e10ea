use crate::env::{EnvRef, Frame};
use crate::error::{Result, SchemeError};
use crate::eval::{complete_apply, eval, force};
use crate::value::{Builtin, BuiltinFn, Value};
use crate::Config;
use log::debug;
use std::rc::Rc;

// Arity checks; the message names the builtin that was misapplied.
macro_rules! check_arity {
    ($args:expr, $n:expr, $name:expr) => {
        if $args.len() != $n {
            return Err(SchemeError::IncorrectArity($name.to_string()));
        }
    };
    ($args:expr, >= $n:expr, $name:expr) => {
        if $args.len() < $n {
            return Err(SchemeError::IncorrectArity($name.to_string()));
        }
    };
}

// --- Numbers ---

// Arithmetic works in i64 until a float shows up or an operation
// overflows, then spills into f64.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(name: &str, value: &Value) -> Result<Num> {
        match value {
            Value::Integer(n) => Ok(Num::Int(*n)),
            Value::Float(x) => Ok(Num::Float(*x)),
            other => Err(SchemeError::WrongType(
                name.to_string(),
                other.type_name().to_string(),
            )),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Integer(n),
            Num::Float(x) => Value::Float(x),
        }
    }
}

fn num_binop(a: Num, b: Num, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => match int_op(x, y) {
            Some(n) => Num::Int(n),
            None => Num::Float(float_op(x as f64, y as f64)),
        },
        _ => Num::Float(float_op(a.as_f64(), b.as_f64())),
    }
}

fn add(args: &[Value], _env: &EnvRef) -> Result<Value> {
    let mut acc = Num::Int(0);
    for value in args {
        acc = num_binop(acc, Num::from_value("+", value)?, i64::checked_add, |a, b| a + b);
    }
    Ok(acc.to_value())
}

fn subtract(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, >= 1, "-");
    let first = Num::from_value("-", &args[0])?;
    if args.len() == 1 {
        return Ok(num_binop(Num::Int(0), first, i64::checked_sub, |a, b| a - b).to_value());
    }
    let mut acc = first;
    for value in &args[1..] {
        acc = num_binop(acc, Num::from_value("-", value)?, i64::checked_sub, |a, b| a - b);
    }
    Ok(acc.to_value())
}

fn multiply(args: &[Value], _env: &EnvRef) -> Result<Value> {
    let mut acc = Num::Int(1);
    for value in args {
        acc = num_binop(acc, Num::from_value("*", value)?, i64::checked_mul, |a, b| a * b);
    }
    Ok(acc.to_value())
}

fn div2(a: Num, b: Num) -> Result<Num> {
    if b.as_f64() == 0.0 {
        return Err(SchemeError::DivisionByZero);
    }
    // Exact division stays integral; anything else spills into f64.
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        if x.checked_rem(y) == Some(0) {
            if let Some(quotient) = x.checked_div(y) {
                return Ok(Num::Int(quotient));
            }
        }
    }
    Ok(Num::Float(a.as_f64() / b.as_f64()))
}

fn divide(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, >= 1, "/");
    let first = Num::from_value("/", &args[0])?;
    if args.len() == 1 {
        return Ok(div2(Num::Int(1), first)?.to_value());
    }
    let mut acc = first;
    for value in &args[1..] {
        acc = div2(acc, Num::from_value("/", value)?)?;
    }
    Ok(acc.to_value())
}

fn pairwise_compare(name: &'static str, args: &[Value], holds: fn(Num, Num) -> bool) -> Result<Value> {
    check_arity!(args, >= 2, name);
    let mut prev = Num::from_value(name, &args[0])?;
    for value in &args[1..] {
        let cur = Num::from_value(name, value)?;
        if !holds(prev, cur) {
            return Ok(Value::Bool(false));
        }
        prev = cur;
    }
    Ok(Value::Bool(true))
}

fn num_eq(a: Num, b: Num) -> bool {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x == y,
        _ => a.as_f64() == b.as_f64(),
    }
}

fn num_lt(a: Num, b: Num) -> bool {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x < y,
        _ => a.as_f64() < b.as_f64(),
    }
}

fn equals(args: &[Value], _env: &EnvRef) -> Result<Value> {
    pairwise_compare("=", args, num_eq)
}

fn less_than(args: &[Value], _env: &EnvRef) -> Result<Value> {
    pairwise_compare("<", args, num_lt)
}

fn greater_than(args: &[Value], _env: &EnvRef) -> Result<Value> {
    pairwise_compare(">", args, |a, b| num_lt(b, a))
}

fn less_equal(args: &[Value], _env: &EnvRef) -> Result<Value> {
    pairwise_compare("<=", args, |a, b| !num_lt(b, a))
}

fn greater_equal(args: &[Value], _env: &EnvRef) -> Result<Value> {
    pairwise_compare(">=", args, |a, b| !num_lt(a, b))
}

// --- Pairs and lists ---

fn cons(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 2, "cons");
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn car(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "car");
    match args[0].as_pair() {
        Some(p) => Ok(p.first.clone()),
        None => Err(SchemeError::WrongType(
            "car".to_string(),
            args[0].type_name().to_string(),
        )),
    }
}

fn cdr(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "cdr");
    match args[0].as_pair() {
        Some(p) => Ok(p.rest.clone()),
        None => Err(SchemeError::WrongType(
            "cdr".to_string(),
            args[0].type_name().to_string(),
        )),
    }
}

fn list(args: &[Value], _env: &EnvRef) -> Result<Value> {
    Ok(Value::list(args.iter().cloned()))
}

fn append(args: &[Value], _env: &EnvRef) -> Result<Value> {
    let (last, init) = match args.split_last() {
        Some(split) => split,
        None => return Ok(Value::Nil),
    };
    let mut items = Vec::new();
    for arg in init {
        let elems = arg.try_to_vec().ok_or_else(|| {
            SchemeError::WrongType("append".to_string(), arg.type_name().to_string())
        })?;
        items.extend(elems);
    }
    Ok(Value::list_with_tail(items, last.clone()))
}

fn length(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "length");
    match args[0].list_len() {
        Some(len) => Ok(Value::Integer(len as i64)),
        None => Err(SchemeError::WrongType(
            "length".to_string(),
            args[0].type_name().to_string(),
        )),
    }
}

// --- Predicates ---

macro_rules! predicate {
    ($fn_name:ident, $name:expr, $test:expr) => {
        fn $fn_name(args: &[Value], _env: &EnvRef) -> Result<Value> {
            check_arity!(args, 1, $name);
            let test: fn(&Value) -> bool = $test;
            Ok(Value::Bool(test(&args[0])))
        }
    };
}

predicate!(is_null, "null?", |v| matches!(v, Value::Nil));
predicate!(is_pair, "pair?", |v| matches!(v, Value::Pair(_)));
predicate!(is_list, "list?", |v| v.is_list());
predicate!(is_symbol, "symbol?", |v| matches!(v, Value::Symbol(_)));
predicate!(is_number, "number?", |v| matches!(v, Value::Integer(_) | Value::Float(_)));
predicate!(is_integer, "integer?", |v| matches!(v, Value::Integer(_)));
predicate!(is_boolean, "boolean?", |v| matches!(v, Value::Bool(_)));
predicate!(is_string, "string?", |v| matches!(v, Value::Str(_)));
predicate!(is_procedure, "procedure?", |v| matches!(
    v,
    Value::Builtin(_) | Value::Lambda(_) | Value::Mu(_) | Value::Macro(_)
));
predicate!(is_promise, "promise?", |v| matches!(v, Value::Promise(_)));

fn int_predicate(name: &'static str, args: &[Value], test: fn(i64) -> bool) -> Result<Value> {
    check_arity!(args, 1, name);
    match &args[0] {
        Value::Integer(n) => Ok(Value::Bool(test(*n))),
        other => Err(SchemeError::WrongType(
            name.to_string(),
            other.type_name().to_string(),
        )),
    }
}

fn is_even(args: &[Value], _env: &EnvRef) -> Result<Value> {
    int_predicate("even?", args, |n| n % 2 == 0)
}

fn is_odd(args: &[Value], _env: &EnvRef) -> Result<Value> {
    int_predicate("odd?", args, |n| n % 2 != 0)
}

fn is_zero(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "zero?");
    let num = Num::from_value("zero?", &args[0])?;
    Ok(Value::Bool(num.as_f64() == 0.0))
}

fn not(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "not");
    Ok(Value::Bool(args[0].is_false()))
}

// --- Equivalence ---

fn builtin_eq(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 2, "eq?");
    let same = match (&args[0], &args[1]) {
        // Pairs compare by identity here; `equal?` compares structure.
        (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
        (a, b) => a == b,
    };
    Ok(Value::Bool(same))
}

fn builtin_equal(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 2, "equal?");
    Ok(Value::Bool(args[0] == args[1]))
}

// --- Streams ---

fn builtin_force(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "force");
    match &args[0] {
        Value::Promise(p) => force(p),
        other => Err(SchemeError::WrongType(
            "force".to_string(),
            other.type_name().to_string(),
        )),
    }
}

fn cdr_stream(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "cdr-stream");
    if let Some(p) = args[0].as_pair() {
        if let Value::Promise(tail) = &p.rest {
            return force(tail);
        }
    }
    Err(SchemeError::WrongType(
        "cdr-stream".to_string(),
        args[0].type_name().to_string(),
    ))
}

// --- I/O ---

fn display(args: &[Value], _env: &EnvRef) -> Result<Value> {
    for arg in args {
        print!("{}", arg.display_string());
    }
    Ok(Value::Nil)
}

fn print(args: &[Value], _env: &EnvRef) -> Result<Value> {
    let rendered: Vec<String> = args.iter().map(|arg| arg.display_string()).collect();
    println!("{}", rendered.join(" "));
    Ok(Value::Nil)
}

fn newline(args: &[Value], _env: &EnvRef) -> Result<Value> {
    check_arity!(args, 0, "newline");
    println!();
    Ok(Value::Nil)
}

// --- Control ---

fn builtin_apply(args: &[Value], env: &EnvRef) -> Result<Value> {
    check_arity!(args, 2, "apply");
    let call_args = args[1].try_to_vec().ok_or_else(|| {
        SchemeError::WrongType("apply".to_string(), args[1].type_name().to_string())
    })?;
    complete_apply(&args[0], &call_args, env)
}

fn builtin_eval(args: &[Value], env: &EnvRef) -> Result<Value> {
    check_arity!(args, 1, "eval");
    eval(&args[0], env)
}

fn raise_error(args: &[Value], _env: &EnvRef) -> Result<Value> {
    let rendered: Vec<String> = args.iter().map(|arg| arg.display_string()).collect();
    Err(SchemeError::Custom(rendered.join(" ")))
}

/// Construct a global frame pre-populated with the builtin procedures.
pub fn create_global_frame(config: Config) -> EnvRef {
    let env = Frame::global(Rc::new(config));
    populate_frame(&env);
    env
}

/// Install the builtin bindings into `env`.
pub fn populate_frame(env: &EnvRef) {
    let builtins: &[(&'static str, BuiltinFn)] = &[
        // Arithmetic
        ("+", add),
        ("-", subtract),
        ("*", multiply),
        ("/", divide),
        // Comparison
        ("=", equals),
        ("<", less_than),
        (">", greater_than),
        ("<=", less_equal),
        (">=", greater_equal),
        // Pairs and lists
        ("cons", cons),
        ("car", car),
        ("cdr", cdr),
        ("list", list),
        ("append", append),
        ("length", length),
        // Predicates
        ("null?", is_null),
        ("pair?", is_pair),
        ("list?", is_list),
        ("symbol?", is_symbol),
        ("number?", is_number),
        ("integer?", is_integer),
        ("boolean?", is_boolean),
        ("string?", is_string),
        ("procedure?", is_procedure),
        ("promise?", is_promise),
        ("even?", is_even),
        ("odd?", is_odd),
        ("zero?", is_zero),
        ("not", not),
        // Equivalence
        ("eq?", builtin_eq),
        ("equal?", builtin_equal),
        // Streams
        ("force", builtin_force),
        ("cdr-stream", cdr_stream),
        // I/O
        ("display", display),
        ("print", print),
        ("newline", newline),
        // Control
        ("apply", builtin_apply),
        ("eval", builtin_eval),
        ("error", raise_error),
    ];

    let mut frame = env.borrow_mut();
    for (name, func) in builtins {
        frame.define(
            Rc::from(*name),
            Value::Builtin(Rc::new(Builtin {
                name: *name,
                func: *func,
            })),
        );
    }
    debug!("global frame populated with {} builtins", builtins.len());
}
