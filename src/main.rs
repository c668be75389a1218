//! Command-line front-end: drives lexing, parsing, code generation and
//! execution over either a `-c` one-liner or an interactive `rustyline`
//! REPL.

use anyhow::{bail, Context as _, Result};
use argh::FromArgs;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use shellvm::codegen;
use shellvm::context::Context;
use shellvm::interpreter;
use shellvm::lexer::lex_all;
use shellvm::parser::Parser;

#[derive(FromArgs)]
/// A tiny interactive shell.
struct Args {
    /// one of `execute`, `codegen`, `parse`, `lex` (default `execute`)
    #[argh(option, default = "\"execute\".to_string()")]
    mode: String,

    /// run a single command instead of starting the interactive prompt
    #[argh(option, short = 'c')]
    command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Execute,
    Codegen,
    Parse,
    Lex,
}

impl Mode {
    fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "execute" => Mode::Execute,
            "codegen" => Mode::Codegen,
            "parse" => Mode::Parse,
            "lex" => Mode::Lex,
            other => bail!("unknown mode: {other}"),
        })
    }
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let mode = Mode::parse(&args.mode)?;

    let mut ctx = Context::new();
    let mut parser = Parser::new();

    if let Some(command) = &args.command {
        run_line(&mut ctx, &mut parser, mode, command);
        if !parser.is_done() {
            eprintln!("shellvm: unexpected end of input");
        }
        return Ok(());
    }

    repl(&mut ctx, &mut parser, mode)
}

fn repl(ctx: &mut Context, parser: &mut Parser, mode: Mode) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    loop {
        let prompt = if parser.is_done() { "pysh$ " } else { "> " };
        match editor.readline(prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                run_line(ctx, parser, mode, &line);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                if !parser.is_done() {
                    eprintln!("shellvm: unexpected end of input");
                }
                break;
            }
            Err(e) => bail!(e),
        }
    }
    Ok(())
}

/// Lexes, parses (possibly finishing a construct started on an earlier
/// line), and then lowers/executes per `mode`. A line that only continues an
/// in-progress parse (e.g. mid-`if`) produces no statements and is not an
/// error.
///
/// `ParseError`s print bare (message plus newline, no shell-name tag) and
/// reset the parser; `ExecutionError`s print tagged with the shell name and
/// halt only the bytecode compiled from this line. Either way the session
/// (and `ctx`) survives for the next line.
fn run_line(ctx: &mut Context, parser: &mut Parser, mode: Mode, line: &str) {
    let mut source = line.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }
    let tokens = lex_all(&source);

    if mode == Mode::Lex {
        for token in &tokens {
            println!("{:?} {:?}", token.kind, token.value);
        }
        return;
    }

    let exprs = match parser.parse(tokens) {
        Ok(exprs) => exprs,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    for expr in &exprs {
        match mode {
            Mode::Lex => unreachable!("handled above"),
            Mode::Parse => println!("{expr:?}"),
            Mode::Codegen => {
                let mut code = Vec::new();
                codegen::generate(expr, &mut code);
                print!("{}", shellvm::instr::render_il(&code));
            }
            Mode::Execute => {
                let mut code = Vec::new();
                codegen::generate(expr, &mut code);
                ctx.program.extend(code);
                if let Err(e) = interpreter::run(ctx) {
                    eprintln!("shellvm: {e}");
                }
            }
        }
    }
}
