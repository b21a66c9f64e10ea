use crate::env::{EnvRef, Frame};
use crate::error::{Result, SchemeError};
use crate::forms;
use crate::value::{Promise, Value};
use log::debug;
use std::cell::RefCell;
use std::rc::Rc;

/// The result of one evaluation step. `Tail` defers an expression to the
/// nearest enclosing trampoline instead of recursing, which is what keeps
/// self- and mutual tail recursion at constant host-stack depth.
///
/// A `Tail` must never reach user code: anything handed to a builtin or a
/// macro expansion goes through [`complete_apply`] or [`eval`] first.
pub enum Step {
    Done(Value),
    Tail(Value, EnvRef),
}

/// Evaluate `expr` in `env`, driving the trampoline to completion.
pub fn eval(expr: &Value, env: &EnvRef) -> Result<Value> {
    let mut step = Step::Tail(expr.clone(), env.clone());
    loop {
        match step {
            Step::Done(value) => return Ok(value),
            Step::Tail(expr, env) => step = eval_step(&expr, &env)?,
        }
    }
}

/// Evaluate `expr` in tail position. Symbols and self-evaluating
/// expressions resolve immediately; everything else is deferred to the
/// enclosing trampoline.
pub(crate) fn eval_tail(expr: &Value, env: &EnvRef) -> Result<Step> {
    if expr.as_symbol().is_some() || expr.self_evaluating() {
        eval_step(expr, env)
    } else {
        Ok(Step::Tail(expr.clone(), env.clone()))
    }
}

/// One dispatch step: classify `expr`, run a special form or apply a
/// procedure. Pushes `expr` onto the shared trace stack on entry and pops
/// it on every successful return; an error leaves the entry in place so the
/// host can render the evaluation context.
fn eval_step(expr: &Value, env: &EnvRef) -> Result<Step> {
    let stack = env.borrow().stack();
    stack.borrow_mut().push(expr.clone());

    if let Value::Symbol(name) = expr {
        let value = env.borrow().lookup(name)?;
        stack.borrow_mut().pop();
        return Ok(Step::Done(value));
    }
    if expr.self_evaluating() {
        stack.borrow_mut().pop();
        return Ok(Step::Done(expr.clone()));
    }

    // All non-atomic expressions are combinations.
    let pair = match expr.as_pair() {
        Some(p) if expr.is_list() => p.clone(),
        _ => return Err(SchemeError::MalformedList(expr.to_string())),
    };
    let (first, rest) = (&pair.first, &pair.rest);

    if let Value::Symbol(name) = first {
        if let Some(handler) = forms::special_form(name) {
            let result = handler(rest, env)?;
            stack.borrow_mut().pop();
            return Ok(result);
        }
    }

    let procedure = eval(first, env)?;
    if let Value::Macro(closure) = &procedure {
        // Apply to the unevaluated operands, then evaluate the expansion in
        // the caller's environment. The expansion may itself be a macro
        // call; the trampoline takes care of the re-entry.
        let operands = rest
            .try_to_vec()
            .ok_or_else(|| SchemeError::MalformedList(rest.to_string()))?;
        let name = closure.name.borrow().clone();
        let expansion = complete_apply(&procedure, &operands, env)?;
        if let Some(name) = name {
            debug!("macro {} expanded to {}", name, expansion);
        }
        stack.borrow_mut().pop();
        return eval_tail(&expansion, env);
    }

    let mut args = Vec::new();
    for operand in rest.iter() {
        args.push(eval(&operand, env)?);
    }
    let result = apply(&procedure, &args, env)?;
    stack.borrow_mut().pop();
    Ok(result)
}

/// Apply `procedure` to already-evaluated `args` in `env` (the caller's
/// frame, consulted by builtins and by mu procedures).
pub fn apply(procedure: &Value, args: &[Value], env: &EnvRef) -> Result<Step> {
    match procedure {
        Value::Builtin(builtin) => (builtin.func)(args, env).map(Step::Done),
        Value::Lambda(closure) | Value::Macro(closure) => {
            let frame = Frame::make_child(&closure.env, &closure.formals, args)?;
            eval_all(&closure.body, &frame)
        }
        Value::Mu(mu) => {
            let frame = Frame::make_child(env, &mu.formals, args)?;
            eval_all(&mu.body, &frame)
        }
        other => Err(SchemeError::NotProcedure(other.to_string())),
    }
}

/// Apply and force the result, so no `Tail` escapes to contexts that need a
/// fully-evaluated value (macro expansion, the `apply` builtin).
pub fn complete_apply(procedure: &Value, args: &[Value], env: &EnvRef) -> Result<Value> {
    match apply(procedure, args, env)? {
        Step::Done(value) => Ok(value),
        Step::Tail(expr, env) => eval(&expr, &env),
    }
}

/// Evaluate each expression in the list `exprs`, returning the value of the
/// last. The final expression is evaluated in tail position.
pub(crate) fn eval_all(exprs: &Value, env: &EnvRef) -> Result<Step> {
    let mut exprs = exprs.clone();
    loop {
        match exprs {
            Value::Nil => return Ok(Step::Done(Value::Nil)),
            Value::Pair(p) => {
                if matches!(p.rest, Value::Nil) {
                    return eval_tail(&p.first, env);
                }
                eval(&p.first, env)?;
                exprs = p.rest.clone();
            }
            other => return Err(SchemeError::MalformedList(other.to_string())),
        }
    }
}

/// Force a promise: evaluate its expression in its captured environment on
/// the first call, then return the memoized value.
///
/// Unless `dots_are_cons` is set, a forced value must be a pair or nil;
/// stream tails are the only intended producers of promises.
pub fn force(promise: &Rc<RefCell<Promise>>) -> Result<Value> {
    let (expr, env) = {
        let p = promise.borrow();
        match &p.expression {
            Some(expr) => (expr.clone(), p.env.clone()),
            None => {
                return Ok(p.value.clone().unwrap_or(Value::Nil));
            }
        }
    };
    let value = eval(&expr, &env)?;
    let dots_are_cons = env.borrow().config().dots_are_cons;
    if !dots_are_cons && !matches!(value, Value::Nil | Value::Pair(_)) {
        return Err(SchemeError::ForcedPromiseNotPair(value.to_string()));
    }
    let mut p = promise.borrow_mut();
    p.value = Some(value.clone());
    p.expression = None;
    Ok(value)
}

/// Render the evaluation trace for error reports, outermost entry first.
pub fn format_trace(entries: &[Value]) -> String {
    entries
        .iter()
        .map(|expr| format!("  {}", expr))
        .collect::<Vec<_>>()
        .join("\n")
}
