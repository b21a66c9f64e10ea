mod common;

use common::{global, int_list, run, run_in, sym};
use pretty_assertions::assert_eq;
use schemer::Value;

#[test]
fn quote_returns_the_datum() {
    assert_eq!(
        run("(quote (a b c))").unwrap(),
        Value::list([sym("a"), sym("b"), sym("c")])
    );
    assert_eq!(run("'x").unwrap(), sym("x"));
    assert_eq!(run("''x").unwrap(), Value::list([sym("quote"), sym("x")]));
}

#[test]
fn quasiquote_unquote() {
    assert_eq!(
        run("(quasiquote (1 (unquote (+ 1 1)) 3))").unwrap(),
        int_list(&[1, 2, 3])
    );
    assert_eq!(run("`(1 ,(+ 1 1) 3)").unwrap(), int_list(&[1, 2, 3]));
    // Without an unquote, the template is plain data.
    assert_eq!(
        run("`(+ 1 2)").unwrap(),
        Value::list([sym("+"), Value::Integer(1), Value::Integer(2)])
    );
}

#[test]
fn quasiquote_splicing() {
    assert_eq!(
        run("(quasiquote (1 (unquote-splicing (list 2 3)) 4))").unwrap(),
        int_list(&[1, 2, 3, 4])
    );
    assert_eq!(run("`(,@(list 1 2) ,@(list) 3)").unwrap(), int_list(&[1, 2, 3]));
}

#[test]
fn nested_quasiquote_tracks_levels() {
    // The inner quasiquote raises the level, so the unquote stays data.
    assert_eq!(
        run("`(x `(y ,(+ 1 2)))").unwrap(),
        run("'(x (quasiquote (y (unquote (+ 1 2)))))").unwrap()
    );
    // Two unquotes pierce both levels... but only inside two quasiquotes.
    assert_eq!(
        run("(quasiquote (quasiquote (unquote (+ 1 2))))").unwrap(),
        run("'(quasiquote (unquote (+ 1 2)))").unwrap()
    );
}

#[test]
fn quasiquote_errors() {
    assert_eq!(
        run("`,@(list 1 2)").unwrap_err().to_string(),
        "unquote-splicing not in list template: (unquote-splicing (list 1 2))"
    );
    assert_eq!(
        run("`(1 ,@2)").unwrap_err().to_string(),
        "unquote-splicing used on non-list: 2"
    );
}

#[test]
fn unquote_outside_quasiquote_fails() {
    assert_eq!(
        run("(unquote 1)").unwrap_err().to_string(),
        "unquote outside of quasiquote"
    );
    assert_eq!(
        run("(unquote-splicing 1)").unwrap_err().to_string(),
        "unquote outside of quasiquote"
    );
}

#[test]
fn macro_expands_then_evaluates() {
    let source = "
        (define-macro (when c . body) (list 'if c (cons 'begin body) #f))
        (when #t 1 2 3)";
    assert_eq!(run(source).unwrap(), Value::Integer(3));

    let source = "
        (define-macro (when c . body) (list 'if c (cons 'begin body) #f))
        (when #f 1 2 3)";
    assert_eq!(run(source).unwrap(), Value::Bool(false));
}

#[test]
fn macro_operands_are_not_evaluated() {
    // The operand is an unbound symbol; a procedure call would fail.
    let source = "
        (define-macro (name-of x) (list 'quote x))
        (name-of completely-unbound)";
    assert_eq!(run(source).unwrap(), sym("completely-unbound"));
}

#[test]
fn macro_expansion_is_recursive() {
    let env = global();
    let source = "
        (define-macro (twice e) (list 'begin e e))
        (define-macro (four e) (list 'twice (list 'twice e)))
        (define n 0)
        (four (set! n (+ n 1)))";
    run_in(&env, source).unwrap();
    assert_eq!(run_in(&env, "n").unwrap(), Value::Integer(4));
}

#[test]
fn macro_expansion_runs_in_caller_env() {
    // Textual substitution: the expansion sees the caller's bindings.
    let source = "
        (define-macro (get-x) 'x)
        ((lambda (x) (get-x)) 42)";
    assert_eq!(run(source).unwrap(), Value::Integer(42));
}

#[test]
fn define_macro_requires_a_signature() {
    assert_eq!(
        run("(define-macro f 2)").unwrap_err().to_string(),
        "improper form for define-macro"
    );
}
