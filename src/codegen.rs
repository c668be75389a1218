//! Lowers a parsed [`Expr`] to [`Instruction`]s, including the conditional
//! back-patching scheme for the "sum of exit codes" `if` lowering and the
//! persistent handling of a command's leading `FOO=bar` env assignments.

use crate::instr::Instruction::{
    self, AddRVToA, BranchBufferEmpty, BranchIfANotZero, Call, Concat, IncrementA, JumpRelative,
    LoadBuffer, PopA, PushA, PushBuffer, ResetA, SetVar, Substitute, SubstituteSingle,
};
use crate::syntax::{ArgumentNode, ArgumentPart, AssignmentNode, CommandNode, ConditionalNode, Expr};

/// Lowers one parsed statement to bytecode, appending to `code`.
pub fn generate(expr: &Expr, code: &mut Vec<Instruction>) {
    match expr {
        Expr::Command(node) => generate_command(node, code),
        Expr::Assignments(node) => {
            for assignment in &node.assignments {
                generate_assignment(assignment, code);
            }
        }
        Expr::Conditional(node) => generate_conditional(node, code),
    }
}

/// Lowers one argument's parts into the buffer, then pushes it and bumps `A`.
/// The empty-buffer guard after a bare replacement lets an expanded variable
/// that word-splits into zero words contribute no argv entry at all.
fn lower_argument(arg: &ArgumentNode, code: &mut Vec<Instruction>) {
    code.push(LoadBuffer(String::new()));
    let mut last_was_bare_replacement = false;
    for part in &arg.parts {
        last_was_bare_replacement = matches!(part, ArgumentPart::Replacement(_));
        match part {
            ArgumentPart::Constant(s) => code.push(Concat(s.clone())),
            ArgumentPart::Replacement(name) => code.push(Substitute(name.clone())),
            ArgumentPart::ReplacementSingle(name) => code.push(SubstituteSingle(name.clone())),
        }
    }
    if last_was_bare_replacement {
        code.push(BranchBufferEmpty(2));
    }
    code.push(PushBuffer);
    code.push(IncrementA);
}

/// Lowers an assignment RHS without word-splitting (every part becomes
/// `SubstituteSingle`, even a bare `$var`), then `SetVar`s it.
fn lower_assignment_value(expr: &ArgumentNode, code: &mut Vec<Instruction>) {
    code.push(LoadBuffer(String::new()));
    for part in &expr.parts {
        match part {
            ArgumentPart::Constant(s) => code.push(Concat(s.clone())),
            ArgumentPart::Replacement(name) | ArgumentPart::ReplacementSingle(name) => {
                code.push(SubstituteSingle(name.clone()))
            }
        }
    }
}

/// Assigns `target_name := ` the value produced by lowering `value`. `SetVar`
/// pops the variable name off `S` and reads the value out of `B`, so the
/// name must be pushed onto the stack *before* `B` is overwritten with the
/// value.
fn generate_set(target_name: &str, value: &ArgumentNode, code: &mut Vec<Instruction>) {
    code.push(LoadBuffer(target_name.to_string()));
    code.push(PushBuffer);
    lower_assignment_value(value, code);
    code.push(SetVar);
}

fn generate_assignment(assignment: &AssignmentNode, code: &mut Vec<Instruction>) {
    generate_set(&assignment.var_name, &assignment.expr, code);
}

/// Lowers a command's leading `FOO=bar` env assignments the same way a
/// standalone assignment lowers (see `generate_assignment`), then the
/// command itself.
///
/// spec.md §3 describes `env_assignments` as applying "only to its
/// invocation environment", which would call for a save/override/restore
/// around `Call`. But that reading is irreconcilable with spec.md §8's own
/// scenario 2 (`x=1 2; echo $x` must print `1`): per the Expression grammar
/// in §4.2, `x=1 2` lowers to a `CommandNode` invoking `2` with
/// `env_assignments: [x=1]`, not to a standalone assignment, so the only way
/// the following `echo $x` can see `x=1` is if this assignment persists past
/// `Call` — restoring it afterward reproduces the bug this codegen used to
/// have (see DESIGN.md). This crate resolves the tension in favor of the
/// stated end-to-end scenario: a command's env assignments are applied as
/// ordinary, persistent assignments before the call, with no save/restore.
fn generate_command(node: &CommandNode, code: &mut Vec<Instruction>) {
    for assignment in &node.env_assignments {
        generate_assignment(assignment, code);
    }

    code.push(ResetA);
    for arg in &node.args {
        lower_argument(arg, code);
    }
    code.push(Call);
}

/// Lowers `if eval...; then cond...[; else alt...]; fi`.
///
/// `A` doubles as the running sum of evaluation exit codes, but each nested
/// `generate` call clobbers it with its own argc bookkeeping (`ResetA`,
/// `IncrementA`...), so the sum is threaded through the stack instead:
/// `PushA` before each eval expr, `PopA` after to restore it, `AddRVToA` to
/// fold in that expr's exit code.
fn generate_conditional(node: &ConditionalNode, code: &mut Vec<Instruction>) {
    code.push(ResetA);
    for expr in &node.evaluation_exprs {
        code.push(PushA);
        generate(expr, code);
        code.push(PopA);
        code.push(AddRVToA);
    }

    let branch_idx = code.len();
    code.push(BranchIfANotZero(0)); // placeholder, back-patched below

    for expr in &node.conditional_exprs {
        generate(expr, code);
    }

    if node.else_exprs.is_empty() {
        let after_then = code.len();
        patch_offset(code, branch_idx, after_then);
    } else {
        let jump_idx = code.len();
        code.push(JumpRelative(0)); // placeholder

        let else_start = code.len();
        patch_offset(code, branch_idx, else_start);

        for expr in &node.else_exprs {
            generate(expr, code);
        }

        let after_else = code.len();
        patch_offset(code, jump_idx, after_else);
    }
}

/// Patches the branch/jump at `instr_idx` so its relative offset lands on
/// `target_idx` (offsets are relative to the instruction following the
/// branch, matching the interpreter's PC-then-branch execution order).
fn patch_offset(code: &mut [Instruction], instr_idx: usize, target_idx: usize) {
    let offset = (target_idx as i64 - instr_idx as i64 - 1) as i32;
    match &mut code[instr_idx] {
        BranchIfANotZero(o) | JumpRelative(o) | BranchBufferEmpty(o) => *o = offset,
        other => panic!("patch_offset called on non-branch instruction {other:?}"),
    }
}
