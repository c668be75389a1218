//! Executes bytecode against a [`Context`]: builtin dispatch, external
//! process spawning, and an `Unimplemented` error for the one opcode no
//! code generator path ever emits.

use crate::context::{Context, InvokeInfo};
use crate::external;
use crate::instr::Instruction;
use std::ffi::OsStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("value stack underflow")]
    StackUnderflow,
    #[error("not an integer: {0}")]
    NotAnInteger(String),
    #[error("empty command")]
    EmptyCommand,
    #[error("opcode not implemented: {0:?}")]
    Unimplemented(Instruction),
}

/// Runs every instruction appended to `ctx.program` since `ctx.pc`, i.e. one
/// freshly-compiled line. On error the remainder of the line is skipped (by
/// advancing `pc` to the end) but `ctx` is otherwise left intact so the next
/// line can still use its variables.
pub fn run(ctx: &mut Context) -> Result<(), ExecutionError> {
    while ctx.pc < ctx.program.len() {
        let instr = ctx.program[ctx.pc].clone();
        ctx.pc += 1;
        if let Err(e) = step(ctx, &instr) {
            ctx.pc = ctx.program.len();
            return Err(e);
        }
    }
    Ok(())
}

fn step(ctx: &mut Context, instr: &Instruction) -> Result<(), ExecutionError> {
    match instr {
        Instruction::Concat(v) => ctx.b.push_str(v),
        Instruction::Substitute(name) => substitute(ctx, name),
        Instruction::SubstituteSingle(name) => ctx.b.push_str(&ctx.var(name)),
        Instruction::LoadBuffer(v) => ctx.b = v.clone(),
        Instruction::PushBuffer => ctx.stack.push(std::mem::take(&mut ctx.b)),
        Instruction::ResetA => ctx.a = 0,
        Instruction::IncrementA => ctx.a += 1,
        Instruction::PushA => ctx.stack.push(ctx.a.to_string()),
        Instruction::PopA => {
            let top = pop(ctx)?;
            ctx.a = top
                .parse()
                .map_err(|_| ExecutionError::NotAnInteger(top))?;
        }
        Instruction::AddRVToA => ctx.a += ctx.rv as i64,
        Instruction::Call => call(ctx)?,
        Instruction::SetVar => {
            let name = pop(ctx)?;
            ctx.set_var(name, ctx.b.clone());
        }
        Instruction::BranchBufferEmpty(offset) => {
            if ctx.b.is_empty() {
                branch(ctx, *offset);
            }
        }
        Instruction::BranchIfANotZero(offset) => {
            if ctx.a != 0 {
                branch(ctx, *offset);
            }
        }
        Instruction::JumpRelative(offset) => branch(ctx, *offset),
        Instruction::BranchReturnValue(_) => {
            return Err(ExecutionError::Unimplemented(instr.clone()));
        }
    }
    Ok(())
}

fn branch(ctx: &mut Context, offset: i32) {
    ctx.pc = (ctx.pc as i64 + offset as i64) as usize;
}

fn pop(ctx: &mut Context) -> Result<String, ExecutionError> {
    ctx.stack.pop().ok_or(ExecutionError::StackUnderflow)
}

/// Word-splitting expansion: the variable's value is split on ASCII spaces
/// and empty pieces are dropped. This is the one opcode that can turn a
/// single `Substitute` into several argv entries: every word but the last is
/// concatenated onto the current buffer, pushed onto the stack as its own
/// entry (bumping `A`), and the buffer resets to empty before the next word;
/// the last word is left in `B` for whatever follows (more `Concat`s, or the
/// argument's closing `PushBuffer`/`IncrementA`). A value that splits into
/// nothing leaves `B` untouched, which is what lets `BranchBufferEmpty`
/// downstream suppress a wholly-empty trailing argument.
fn substitute(ctx: &mut Context, name: &str) {
    let value = ctx.var(name);
    let mut words = value.split(' ').filter(|w| !w.is_empty());
    let Some(mut word) = words.next() else {
        return;
    };
    loop {
        let Some(next) = words.next() else {
            ctx.b.push_str(word);
            return;
        };
        ctx.b.push_str(word);
        ctx.stack.push(std::mem::take(&mut ctx.b));
        ctx.a += 1;
        word = next;
    }
}

/// `Call`: pops `A` argv entries off the stack (they were pushed in argument
/// order, so popping yields them in reverse), resolves `argv[0]` as a
/// builtin or else an external executable on `PATH`, and stores the exit
/// status in `RV`.
fn call(ctx: &mut Context) -> Result<(), ExecutionError> {
    let count = ctx.a;
    if count < 0 {
        return Err(ExecutionError::EmptyCommand);
    }
    let mut argv = Vec::with_capacity(count as usize);
    for _ in 0..count {
        argv.push(pop(ctx)?);
    }
    argv.reverse();

    if argv.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }

    let name = argv[0].clone();
    ctx.rv = if let Some(builtin) = ctx.builtins.get(&name).copied() {
        let info = InvokeInfo {
            argv: argv.clone(),
            env: ctx.exported_env(),
            stdin: String::new(),
            pwd: ctx.pwd.clone(),
        };
        builtin(&info)
    } else {
        let path = ctx.var("PATH");
        match external::find_command_path(OsStr::new(&path), std::path::Path::new(&name)) {
            None => {
                eprintln!("shellvm: {name}: command not found");
                127
            }
            Some(resolved) => {
                match external::run_external(
                    resolved.as_os_str(),
                    &argv[1..],
                    &ctx.pwd,
                    &ctx.exported_env(),
                ) {
                    Ok(code) => code,
                    Err(e) => {
                        eprintln!("shellvm: {name}: {e}");
                        127
                    }
                }
            }
        }
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instruction::*;

    fn run_program(ctx: &mut Context, program: Vec<Instruction>) -> Result<(), ExecutionError> {
        ctx.program.extend(program);
        run(ctx)
    }

    #[test]
    fn concat_and_pushbuffer_build_a_word() {
        let mut ctx = Context::new();
        run_program(
            &mut ctx,
            vec![
                LoadBuffer(String::new()),
                Concat("hello".into()),
                PushBuffer,
            ],
        )
        .unwrap();
        assert_eq!(ctx.stack, vec!["hello".to_string()]);
    }

    #[test]
    fn substitute_splits_into_separate_stack_entries() {
        let mut ctx = Context::new();
        ctx.set_var("X", "  a  b c  ");
        run_program(&mut ctx, vec![LoadBuffer(String::new()), Substitute("X".into())]).unwrap();
        // "a" and "b" become their own pushed words; "c" is left in B for
        // whatever the argument lowering does next (more Concats, or the
        // closing PushBuffer/IncrementA).
        assert_eq!(ctx.stack, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ctx.a, 2);
        assert_eq!(ctx.b, "c");
    }

    #[test]
    fn substitute_concatenates_first_word_onto_existing_buffer() {
        let mut ctx = Context::new();
        ctx.set_var("X", "a b");
        run_program(
            &mut ctx,
            vec![LoadBuffer("pre-".into()), Substitute("X".into())],
        )
        .unwrap();
        assert_eq!(ctx.stack, vec!["pre-a".to_string()]);
        assert_eq!(ctx.a, 1);
        assert_eq!(ctx.b, "b");
    }

    #[test]
    fn substitute_of_blank_value_leaves_buffer_untouched() {
        let mut ctx = Context::new();
        ctx.set_var("X", "   ");
        run_program(
            &mut ctx,
            vec![LoadBuffer("kept".into()), Substitute("X".into())],
        )
        .unwrap();
        assert_eq!(ctx.stack, Vec::<String>::new());
        assert_eq!(ctx.a, 0);
        assert_eq!(ctx.b, "kept");
    }

    #[test]
    fn substitute_single_does_not_split() {
        let mut ctx = Context::new();
        ctx.set_var("X", "a  b");
        run_program(
            &mut ctx,
            vec![LoadBuffer(String::new()), SubstituteSingle("X".into())],
        )
        .unwrap();
        assert_eq!(ctx.b, "a  b");
    }

    #[test]
    fn setvar_pops_name_and_reads_buffer() {
        let mut ctx = Context::new();
        run_program(
            &mut ctx,
            vec![
                LoadBuffer("x".into()),
                PushBuffer,
                LoadBuffer("1".into()),
                SetVar,
            ],
        )
        .unwrap();
        assert_eq!(ctx.var("x"), "1");
    }

    #[test]
    fn call_dispatches_to_builtin_and_sets_rv() {
        let mut ctx = Context::new();
        run_program(
            &mut ctx,
            vec![
                ResetA,
                LoadBuffer("true".into()),
                PushBuffer,
                IncrementA,
                Call,
            ],
        )
        .unwrap();
        assert_eq!(ctx.rv, 0);
    }

    #[test]
    fn call_with_unknown_command_sets_rv_127() {
        let mut ctx = Context::new();
        run_program(
            &mut ctx,
            vec![
                ResetA,
                LoadBuffer("definitely-not-a-real-command".into()),
                PushBuffer,
                IncrementA,
                Call,
            ],
        )
        .unwrap();
        assert_eq!(ctx.rv, 127);
    }

    #[test]
    fn word_splitting_end_to_end_produces_multiple_argv_entries() {
        let mut ctx = Context::new();
        ctx.set_var("X", "a b c");
        let mut parser = crate::parser::Parser::new();
        let exprs = parser.parse(crate::lexer::lex_all("echo $X\n")).unwrap();
        let mut code = Vec::new();
        for expr in &exprs {
            crate::codegen::generate(expr, &mut code);
        }
        // Stop one instruction short of Call so the argv it would consume is
        // still observable on the stack.
        assert_eq!(code.last(), Some(&Call));
        code.pop();
        ctx.program.extend(code);
        run(&mut ctx).unwrap();
        assert_eq!(
            ctx.stack,
            vec!["echo", "a", "b", "c"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
        assert_eq!(ctx.a, 4);
    }

    #[test]
    fn command_leading_env_assignment_persists_and_does_not_leak_a_sentinel() {
        // x=1 2; echo $x -- spec.md's acceptance scenario for leading
        // per-command assignments: `x=1` must still be visible to the later
        // `echo $x`, and nothing but `x` itself should end up exported.
        let mut ctx = Context::new();
        let mut parser = crate::parser::Parser::new();
        let exprs = parser
            .parse(crate::lexer::lex_all("x=1 2\n"))
            .unwrap();
        let mut code = Vec::new();
        for expr in &exprs {
            crate::codegen::generate(expr, &mut code);
        }
        ctx.program.extend(code);
        run(&mut ctx).unwrap();

        assert_eq!(ctx.var("x"), "1");
        assert_eq!(
            ctx.exported.iter().cloned().collect::<Vec<_>>(),
            vec!["x".to_string()]
        );
        for (name, _) in ctx.exported_env() {
            assert!(!name.contains(' '), "leaked a sentinel variable: {name:?}");
        }
    }

    #[test]
    fn branch_return_value_is_unimplemented() {
        let mut ctx = Context::new();
        let result = run_program(&mut ctx, vec![BranchReturnValue(0)]);
        assert_eq!(
            result,
            Err(ExecutionError::Unimplemented(BranchReturnValue(0)))
        );
    }

    #[test]
    fn stack_underflow_on_popa_with_empty_stack() {
        let mut ctx = Context::new();
        let result = run_program(&mut ctx, vec![PopA]);
        assert_eq!(result, Err(ExecutionError::StackUnderflow));
    }

    #[test]
    fn popa_with_nonnumeric_top_is_an_error() {
        let mut ctx = Context::new();
        let result = run_program(
            &mut ctx,
            vec![LoadBuffer("not-a-number".into()), PushBuffer, PopA],
        );
        assert_eq!(
            result,
            Err(ExecutionError::NotAnInteger("not-a-number".to_string()))
        );
    }
}
