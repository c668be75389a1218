//! A tiny interactive shell: lexer, resumable parser, bytecode code
//! generator and interpreter, plus a `test`-style expression evaluator.
//!
//! The pipeline: [`lexer`] turns a line of input into [`token`]s, [`parser`]
//! folds those into [`syntax`] trees (resumably, so an unfinished `if` block
//! can wait for more input), [`codegen`] lowers a tree to [`instr`]uctions,
//! and [`interpreter`] executes them against a [`context::Context`].

pub mod builtin;
pub mod codegen;
pub mod context;
pub mod external;
pub mod instr;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod syntax;
pub mod test_eval;
pub mod token;
