use thiserror::Error;

/// Everything that can go wrong while reading or evaluating Scheme code.
///
/// The interpreter reports a single error family; the variant determines the
/// message users see at the REPL.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemeError {
    #[error("Parse Error: {0}")]
    Parse(String),
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),
    #[error("malformed list: {0}")]
    MalformedList(String),
    #[error("malformed special form: {0}")]
    BadForm(String),
    #[error("non-symbol: {0}")]
    NonSymbol(String),
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
    #[error("bad bindings list in let form")]
    BadBindings,
    #[error("improper form for define-macro")]
    ImproperDefineMacro,
    #[error("else must be last")]
    ElseNotLast,
    // Arity failures for user-defined procedures come in two flavours so the
    // caller can tell which side of the parameter list ran dry.
    #[error("too few arguments to function call")]
    TooFewArguments,
    #[error("too many arguments to function call")]
    TooManyArguments,
    // Builtins check their own arity; the message names the procedure.
    #[error("incorrect number of arguments: #[{0}]")]
    IncorrectArity(String),
    #[error("argument of {0} has wrong type ({1})")]
    WrongType(String, String),
    #[error("not a procedure: {0}")]
    NotProcedure(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("unquote outside of quasiquote")]
    UnquoteOutsideQuasiquote,
    #[error("unquote-splicing not in list template: {0}")]
    SplicingNotInList(String),
    #[error("unquote-splicing used on non-list: {0}")]
    SplicingOnNonList(String),
    #[error("Cannot evaluate variadic symbol")]
    VariadicSymbol,
    #[error("result of forcing a promise should be a pair or nil, but was {0}")]
    ForcedPromiseNotPair(String),
    /// Raised by the `error` builtin with a user-supplied message.
    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, SchemeError>;
