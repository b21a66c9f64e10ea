use crate::env::{EnvRef, Frame};
use crate::error::{Result, SchemeError};
use crate::eval::{eval, eval_all, eval_tail, format_trace, Step};
use crate::value::{Closure, MuProcedure, Promise, Value};
use lazy_static::lazy_static;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A special-form handler. Receives the operand list (the expression with
/// the head symbol removed) and the frame the form appears in.
pub type SpecialForm = fn(&Value, &EnvRef) -> Result<Step>;

lazy_static! {
    static ref SPECIAL_FORMS: HashMap<&'static str, SpecialForm> = {
        let entries: &[(&'static str, SpecialForm)] = &[
            ("and", eval_and),
            ("begin", eval_begin),
            ("cond", eval_cond),
            ("cons-stream", eval_cons_stream),
            ("define", eval_define),
            ("define-macro", eval_define_macro),
            ("delay", eval_delay),
            ("expect", eval_expect),
            ("if", eval_if),
            ("lambda", eval_lambda),
            ("let", eval_let),
            ("mu", eval_mu),
            ("or", eval_or),
            ("quasiquote", eval_quasiquote),
            ("quote", eval_quote),
            ("set!", eval_set),
            ("unquote", eval_unquote),
            ("unquote-splicing", eval_unquote),
            ("variadic", eval_variadic),
        ];
        entries.iter().copied().collect()
    };
}

pub fn special_form(name: &str) -> Option<SpecialForm> {
    SPECIAL_FORMS.get(name).copied()
}

// Operand accessors for forms that have already passed `validate_form`.
fn operand(form: &Value, index: usize) -> Value {
    form.iter().nth(index).unwrap_or(Value::Nil)
}

fn rest(form: &Value) -> Value {
    match form.as_pair() {
        Some(p) => p.rest.clone(),
        None => Value::Nil,
    }
}

/// Check that `form` is a proper list with between `min` and `max` elements.
fn validate_form(form: &Value, min: usize, max: usize) -> Result<()> {
    match form.list_len() {
        Some(len) if (min..=max).contains(&len) => Ok(()),
        _ => Err(SchemeError::BadForm(form.to_string())),
    }
}

/// Check a formals list: symbols only, pairwise distinct, a variadic marker
/// only in last position. A bare-symbol tail (dotted formals) binds the
/// remaining arguments and is likewise checked for distinctness.
fn validate_formals(formals: &Value) -> Result<()> {
    let mut seen: HashSet<Rc<str>> = HashSet::new();
    let mut add = |name: Rc<str>| -> Result<()> {
        if seen.insert(name.clone()) {
            Ok(())
        } else {
            Err(SchemeError::DuplicateSymbol(name.to_string()))
        }
    };
    let mut cur = formals.clone();
    loop {
        match cur {
            Value::Nil => return Ok(()),
            Value::Pair(p) => {
                if p.first.is_variadic_marker() {
                    if !matches!(p.rest, Value::Nil) {
                        return Err(SchemeError::BadForm(formals.to_string()));
                    }
                    let name = p
                        .first
                        .variadic_name()
                        .ok_or_else(|| SchemeError::BadForm(formals.to_string()))?;
                    return add(name);
                }
                match &p.first {
                    Value::Symbol(s) => add(s.clone())?,
                    other => return Err(SchemeError::NonSymbol(other.to_string())),
                }
                cur = p.rest.clone();
            }
            Value::Symbol(s) => return add(s),
            other => return Err(SchemeError::NonSymbol(other.to_string())),
        }
    }
}

fn make_closure(formals: &Value, body: &Value, env: &EnvRef) -> Result<Rc<Closure>> {
    validate_formals(formals)?;
    Ok(Rc::new(Closure {
        name: RefCell::new(None),
        formals: formals.clone(),
        body: body.clone(),
        env: env.clone(),
    }))
}

/// `(define symbol expr)` evaluates `expr` and binds it in the current
/// frame; `(define (name . formals) body…)` is sugar for a named lambda.
/// Both return the defined symbol.
fn eval_define(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, usize::MAX)?;
    let target = operand(operands, 0);
    match &target {
        Value::Symbol(name) => {
            validate_form(operands, 2, 2)?;
            let value = eval(&operand(operands, 1), env)?;
            env.borrow_mut().define(name.clone(), value);
            Ok(Step::Done(Value::Symbol(name.clone())))
        }
        Value::Pair(signature) => match &signature.first {
            Value::Symbol(name) => {
                let closure = make_closure(&signature.rest, &rest(operands), env)?;
                *closure.name.borrow_mut() = Some(name.clone());
                env.borrow_mut().define(name.clone(), Value::Lambda(closure));
                Ok(Step::Done(Value::Symbol(name.clone())))
            }
            other => Err(SchemeError::NonSymbol(other.to_string())),
        },
        other => Err(SchemeError::NonSymbol(other.to_string())),
    }
}

fn eval_quote(operands: &Value, _env: &EnvRef) -> Result<Step> {
    validate_form(operands, 1, 1)?;
    Ok(Step::Done(operand(operands, 0)))
}

fn eval_begin(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 1, usize::MAX)?;
    eval_all(operands, env)
}

fn eval_lambda(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, usize::MAX)?;
    let closure = make_closure(&operand(operands, 0), &rest(operands), env)?;
    Ok(Step::Done(Value::Lambda(closure)))
}

/// `(mu formals body…)` is a lambda without a captured environment: at
/// apply time its frame extends the caller's.
fn eval_mu(operands: &Value, _env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, usize::MAX)?;
    let formals = operand(operands, 0);
    validate_formals(&formals)?;
    Ok(Step::Done(Value::Mu(Rc::new(MuProcedure {
        formals,
        body: rest(operands),
    }))))
}

fn eval_if(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, 3)?;
    if eval(&operand(operands, 0), env)?.is_true() {
        eval_tail(&operand(operands, 1), env)
    } else if operands.list_len() == Some(3) {
        eval_tail(&operand(operands, 2), env)
    } else {
        Ok(Step::Done(Value::Nil))
    }
}

fn eval_and(operands: &Value, env: &EnvRef) -> Result<Step> {
    let mut exprs = operands.clone();
    loop {
        match exprs {
            Value::Nil => return Ok(Step::Done(Value::Bool(true))),
            Value::Pair(p) => {
                if matches!(p.rest, Value::Nil) {
                    return eval_tail(&p.first, env);
                }
                let value = eval(&p.first, env)?;
                if value.is_false() {
                    return Ok(Step::Done(value));
                }
                exprs = p.rest.clone();
            }
            other => return Err(SchemeError::MalformedList(other.to_string())),
        }
    }
}

fn eval_or(operands: &Value, env: &EnvRef) -> Result<Step> {
    let mut exprs = operands.clone();
    loop {
        match exprs {
            Value::Nil => return Ok(Step::Done(Value::Bool(false))),
            Value::Pair(p) => {
                if matches!(p.rest, Value::Nil) {
                    return eval_tail(&p.first, env);
                }
                let value = eval(&p.first, env)?;
                if value.is_true() {
                    return Ok(Step::Done(value));
                }
                exprs = p.rest.clone();
            }
            other => return Err(SchemeError::MalformedList(other.to_string())),
        }
    }
}

/// `(cond (test body…) … (else body…))`. The first clause whose test is
/// true selects its body; a clause with no body returns the test value.
fn eval_cond(operands: &Value, env: &EnvRef) -> Result<Step> {
    let mut clauses = operands.clone();
    loop {
        let p = match clauses {
            Value::Nil => return Ok(Step::Done(Value::Nil)),
            Value::Pair(p) => p,
            other => return Err(SchemeError::MalformedList(other.to_string())),
        };
        let clause = p.first.clone();
        validate_form(&clause, 1, usize::MAX)?;
        let test_expr = operand(&clause, 0);
        let test = if test_expr.is_symbol_named("else") {
            if !matches!(p.rest, Value::Nil) {
                return Err(SchemeError::ElseNotLast);
            }
            Value::Bool(true)
        } else {
            eval(&test_expr, env)?
        };
        if test.is_true() {
            let body = rest(&clause);
            if matches!(body, Value::Nil) {
                return Ok(Step::Done(test));
            }
            return eval_all(&body, env);
        }
        clauses = p.rest.clone();
    }
}

/// `(let ((name expr) …) body…)`. Binding expressions are evaluated in the
/// outer frame; the body runs in a fresh child frame.
fn eval_let(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, usize::MAX)?;
    let bindings = operand(operands, 0);
    if !bindings.is_list() {
        return Err(SchemeError::BadBindings);
    }
    let mut names = Vec::new();
    let mut values = Vec::new();
    for binding in bindings.iter() {
        validate_form(&binding, 2, 2)?;
        names.push(operand(&binding, 0));
        values.push(eval(&operand(&binding, 1), env)?);
    }
    let names = Value::list(names);
    validate_formals(&names)?;
    let frame = Frame::make_child(env, &names, &values)?;
    eval_all(&rest(operands), &frame)
}

fn eval_define_macro(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, usize::MAX)?;
    let signature = operand(operands, 0);
    let sig = match signature.as_pair() {
        Some(sig) => sig.clone(),
        None => return Err(SchemeError::ImproperDefineMacro),
    };
    match &sig.first {
        Value::Symbol(name) => {
            let closure = make_closure(&sig.rest, &rest(operands), env)?;
            *closure.name.borrow_mut() = Some(name.clone());
            env.borrow_mut().define(name.clone(), Value::Macro(closure));
            Ok(Step::Done(Value::Symbol(name.clone())))
        }
        _ => Err(SchemeError::ImproperDefineMacro),
    }
}

/// Quasiquote template expansion. `unquote`/`unquote-splicing` decrement
/// the nesting level and evaluate at level zero; nested `quasiquote`
/// increments it. Splicing concatenates a list value into the surrounding
/// template list.
fn eval_quasiquote(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 1, 1)?;
    let template = operand(operands, 0);
    if let Some(p) = template.as_pair() {
        if p.first.is_symbol_named("unquote-splicing") {
            return Err(SchemeError::SplicingNotInList(template.to_string()));
        }
    }
    let expanded = quasiquote_item(&template, env, 1)?;
    Ok(Step::Done(expanded.iter().next().unwrap_or(Value::Nil)))
}

// Expand one template element. Returns the list of values to splice into
// the surrounding template list: a singleton except for unquote-splicing.
fn quasiquote_item(template: &Value, env: &EnvRef, level: usize) -> Result<Value> {
    let head = match template.as_pair() {
        Some(p) => p.first.clone(),
        None => return Ok(Value::list([template.clone()])),
    };
    let mut level = level;
    if head.is_symbol_named("unquote") || head.is_symbol_named("unquote-splicing") {
        level -= 1;
        if level == 0 {
            let operands = rest(template);
            validate_form(&operands, 1, 1)?;
            let evaluated = eval(&operand(&operands, 0), env)?;
            if head.is_symbol_named("unquote-splicing") {
                if !evaluated.is_list() {
                    return Err(SchemeError::SplicingOnNonList(evaluated.to_string()));
                }
                return Ok(evaluated);
            }
            return Ok(Value::list([evaluated]));
        }
    } else if head.is_symbol_named("quasiquote") {
        level += 1;
    }
    let items = template
        .try_to_vec()
        .ok_or_else(|| SchemeError::MalformedList(template.to_string()))?;
    let mut spliced = Vec::new();
    for item in items {
        spliced.extend(quasiquote_item(&item, env, level)?.iter());
    }
    Ok(Value::list([Value::list(spliced)]))
}

fn eval_unquote(_operands: &Value, _env: &EnvRef) -> Result<Step> {
    Err(SchemeError::UnquoteOutsideQuasiquote)
}

fn eval_variadic(_operands: &Value, _env: &EnvRef) -> Result<Step> {
    Err(SchemeError::VariadicSymbol)
}

/// `(set! symbol expr)` rebinds in the lexically enclosing frame that
/// binds the symbol; defining is `define`'s job.
fn eval_set(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, 2)?;
    let target = operand(operands, 0);
    match target.as_symbol() {
        Some(name) => {
            let name = name.clone();
            let value = eval(&operand(operands, 1), env)?;
            env.borrow_mut().rebind(&name, value)?;
            Ok(Step::Done(Value::Nil))
        }
        None => Err(SchemeError::NonSymbol(target.to_string())),
    }
}

fn eval_delay(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 1, 1)?;
    let promise = Promise::new(operand(operands, 0), env.clone());
    Ok(Step::Done(Value::Promise(Rc::new(RefCell::new(promise)))))
}

/// `(cons-stream car-expr cdr-expr)` evaluates the head eagerly and wraps
/// the tail in an unforced promise.
fn eval_cons_stream(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, 2)?;
    let first = eval(&operand(operands, 0), env)?;
    let tail = Promise::new(operand(operands, 1), env.clone());
    Ok(Step::Done(Value::cons(
        first,
        Value::Promise(Rc::new(RefCell::new(tail))),
    )))
}

/// `(expect expr expected)` evaluates `expr` with the trace stack scoped
/// to the test, compares against the unevaluated `expected` datum, and
/// reports. Failures are reported, not propagated.
fn eval_expect(operands: &Value, env: &EnvRef) -> Result<Step> {
    validate_form(operands, 2, 2)?;
    let expr = operand(operands, 0);
    let expected = operand(operands, 1);
    let stack = env.borrow().stack();
    let saved: Vec<Value> = std::mem::take(&mut *stack.borrow_mut());
    let outcome = eval(&expr, env);
    let trace: Vec<Value> = std::mem::replace(&mut *stack.borrow_mut(), saved);
    match outcome {
        Ok(received) if received == expected => {
            println!("scm> {}; received {}, success", expr, expected);
        }
        Ok(received) => {
            eprintln!("Test failed:");
            eprintln!("    scm> {}", expr);
            eprintln!("Expected:");
            eprintln!("    {}", expected);
            eprintln!("Received:");
            eprintln!("    {}", received);
        }
        Err(error) => {
            eprintln!("Test failed:");
            eprintln!("    scm> {}", expr);
            eprintln!("Expected:");
            eprintln!("    {}", expected);
            eprintln!("Received:");
            if !trace.is_empty() {
                eprintln!("{}", format_trace(&trace));
            }
            eprintln!("Error: {}", error);
        }
    }
    Ok(Step::Done(Value::Nil))
}
