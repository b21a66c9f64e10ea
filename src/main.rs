use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use schemer::{create_global_frame, eval, format_trace, parse_all, Config, EnvRef};

/// Evaluate every expression in `source` against `env`, printing results
/// and reporting errors with the evaluation trace.
fn run(source: &str, env: &EnvRef, config: &Config) {
    let exprs = match parse_all(source, config) {
        Ok(exprs) => exprs,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    for expr in exprs {
        match eval(&expr, env) {
            Ok(result) => println!("{}", result),
            Err(e) => {
                eprintln!("Error: {}", e);
                report_trace(env);
                break;
            }
        }
    }
}

// Render and clear the evaluation trace left behind by a failed eval.
fn report_trace(env: &EnvRef) {
    let stack = env.borrow().stack();
    let mut entries = stack.borrow_mut();
    if !entries.is_empty() {
        eprintln!("Evaluation trace (innermost last):");
        eprintln!("{}", format_trace(&entries));
        entries.clear();
    }
}

fn main() -> rustyline::Result<()> {
    let config = Config::default();
    let env = create_global_frame(config.clone());

    // A file argument is evaluated before the prompt appears.
    if let Some(path) = std::env::args().nth(1) {
        match std::fs::read_to_string(&path) {
            Ok(source) => run(&source, &env, &config),
            Err(e) => {
                eprintln!("cannot load {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    println!("Scheme interpreter; Ctrl-C or Ctrl-D to exit");
    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("scm> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                run(&line, &env, &config);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}
