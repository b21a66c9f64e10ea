#![allow(dead_code)]

use schemer::{create_global_frame, eval, parse_all, Config, EnvRef, Result, Value};

pub fn global() -> EnvRef {
    create_global_frame(Config::default())
}

/// Evaluate every expression in `source` against `env`, returning the
/// value of the last one.
pub fn run_in(env: &EnvRef, source: &str) -> Result<Value> {
    run_with_config(env, source, &Config::default())
}

/// One-shot evaluation against a fresh global frame.
pub fn run(source: &str) -> Result<Value> {
    run_in(&global(), source)
}

/// Like `run`, but with a caller-supplied reader/interpreter config.
pub fn run_configured(config: Config, source: &str) -> Result<Value> {
    let env = create_global_frame(config.clone());
    run_with_config(&env, source, &config)
}

fn run_with_config(env: &EnvRef, source: &str, config: &Config) -> Result<Value> {
    let mut last = Value::Nil;
    for expr in parse_all(source, config)? {
        last = eval(&expr, env)?;
    }
    Ok(last)
}

pub fn sym(name: &str) -> Value {
    Value::symbol(name)
}

pub fn int_list(items: &[i64]) -> Value {
    Value::list(items.iter().map(|&n| Value::Integer(n)))
}
