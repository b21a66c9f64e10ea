//! The error strings are part of the user-facing surface; these tests pin
//! the exact messages.

mod common;

use common::{run, run_configured};
use pretty_assertions::assert_eq;
use schemer::Config;

fn error_of(source: &str) -> String {
    run(source).unwrap_err().to_string()
}

#[test]
fn unknown_identifier() {
    assert_eq!(error_of("ghost"), "unknown identifier: ghost");
    assert_eq!(error_of("(set! y 3)"), "unknown identifier: y");
}

#[test]
fn malformed_list() {
    let config = Config {
        dots_are_cons: true,
    };
    assert_eq!(
        run_configured(config, "(1 . 2)").unwrap_err().to_string(),
        "malformed list: (1 . 2)"
    );
}

#[test]
fn lambda_arity_mismatches() {
    assert_eq!(
        error_of("((lambda (x y) x) 1)"),
        "too few arguments to function call"
    );
    assert_eq!(
        error_of("((lambda (x) x) 1 2)"),
        "too many arguments to function call"
    );
}

#[test]
fn builtin_arity_mismatch_names_the_procedure() {
    assert_eq!(error_of("(cons 1)"), "incorrect number of arguments: #[cons]");
    assert_eq!(error_of("(car)"), "incorrect number of arguments: #[car]");
}

#[test]
fn define_rejects_non_symbols() {
    assert_eq!(error_of("(define 2 3)"), "non-symbol: 2");
    assert_eq!(error_of("(define (2 x) 3)"), "non-symbol: 2");
}

#[test]
fn lambda_rejects_bad_formals() {
    assert_eq!(error_of("(lambda (x 2) x)"), "non-symbol: 2");
    assert_eq!(error_of("(lambda (x x) x)"), "duplicate symbol: x");
}

#[test]
fn else_must_be_last() {
    assert_eq!(error_of("(cond (else 1) (#t 2))"), "else must be last");
}

#[test]
fn let_requires_a_bindings_list() {
    assert_eq!(error_of("(let x 3)"), "bad bindings list in let form");
}

#[test]
fn malformed_special_forms() {
    assert_eq!(error_of("(quote)"), "malformed special form: ()");
    assert_eq!(error_of("(quote 1 2)"), "malformed special form: (1 2)");
    assert_eq!(error_of("(if #t)"), "malformed special form: (#t)");
}

#[test]
fn variadic_markers_do_not_evaluate() {
    assert_eq!(error_of("(variadic x)"), "Cannot evaluate variadic symbol");
}

#[test]
fn variadic_marker_must_be_last() {
    assert!(run("(lambda (. args extra) args)").is_err());
}

#[test]
fn calling_a_non_procedure() {
    assert_eq!(error_of("(1 2)"), "not a procedure: 1");
}

#[test]
fn user_errors_carry_their_message() {
    assert_eq!(error_of("(error \"the fire alarm\")"), "the fire alarm");
}
