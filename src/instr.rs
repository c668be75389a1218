//! The bytecode instruction set executed by [`crate::interpreter`].
//!
//! A stack machine with an accumulator register `A` (argument counter), a
//! scratch string buffer `B` (the word under construction), a return-value
//! register `RV`, and a string value stack `S`. [`crate::codegen`] is the only
//! producer of [`Instruction`]s; [`crate::interpreter`] is the only consumer.

/// One bytecode instruction. Branch offsets are relative to the instruction
/// immediately following the branch (the interpreter increments `PC` after
/// every instruction, branch or not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `B := B ++ v`
    Concat(String),
    /// Word-splitting expansion of a variable (see `Interpreter::substitute`).
    Substitute(String),
    /// `B := B ++ variables[name]` (missing variable is the empty string).
    SubstituteSingle(String),
    /// `B := v`
    LoadBuffer(String),
    /// `S.push(B)`
    PushBuffer,
    /// `A := 0`
    ResetA,
    /// `A += 1`
    IncrementA,
    /// `S.push(str(A))`
    PushA,
    /// `A := int(S.pop())`; error if the popped value isn't an integer.
    PopA,
    /// `A += RV`
    AddRVToA,
    /// Pop the top `A` stack entries as argv (first is the command name),
    /// invoke it as a builtin or external process, and store its exit
    /// status in `RV`.
    Call,
    /// Pop a variable name from `S`; `variables[name] := B`. The assigned
    /// name also becomes exported (see `Context::set_var`).
    SetVar,
    /// `if len(B) == 0: PC += offset`
    BranchBufferEmpty(i32),
    /// `if A != 0: PC += offset`
    BranchIfANotZero(i32),
    /// `PC += offset` unconditionally.
    JumpRelative(i32),
    /// Part of the IL text grammar but never emitted by this codegen; the
    /// interpreter reports it as an unimplemented opcode if ever executed.
    BranchReturnValue(i32),
}

/// Renders `code` in the shell's textual IL format (`--mode=codegen`), one
/// instruction per line. This is an observable artifact: the strings below
/// must match byte-for-byte.
pub fn render_il(code: &[Instruction]) -> String {
    let mut out = String::new();
    for instr in code {
        match instr {
            Instruction::Concat(v) => out.push_str(&format!("concat \"{v}\"\n")),
            Instruction::Substitute(n) => out.push_str(&format!("sub \"{n}\"\n")),
            Instruction::SubstituteSingle(n) => out.push_str(&format!("subs \"{n}\"\n")),
            Instruction::LoadBuffer(v) => out.push_str(&format!("ldbuf \"{v}\"\n")),
            Instruction::PushBuffer => out.push_str("pushbuf\n"),
            Instruction::ResetA => out.push_str("reseta\n"),
            Instruction::IncrementA => out.push_str("inca\n"),
            Instruction::PushA => out.push_str("pusha\n"),
            Instruction::PopA => out.push_str("popa\n"),
            Instruction::Call => out.push_str("call\n"),
            Instruction::SetVar => out.push_str("setvar\n"),
            Instruction::BranchReturnValue(off) => out.push_str(&format!("brv {off}\n")),
            Instruction::BranchBufferEmpty(off) => out.push_str(&format!("bbe {off}\n")),
            Instruction::BranchIfANotZero(off) => out.push_str(&format!("bra nz, {off}\n")),
            Instruction::JumpRelative(off) => out.push_str(&format!("jr {off}\n")),
            Instruction::AddRVToA => out.push_str("add rv\n"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_il_text_format() {
        let code = vec![
            Instruction::LoadBuffer(String::new()),
            Instruction::Concat("hi".into()),
            Instruction::PushBuffer,
            Instruction::IncrementA,
            Instruction::Call,
        ];
        assert_eq!(
            render_il(&code),
            "ldbuf \"\"\nconcat \"hi\"\npushbuf\ninca\ncall\n"
        );
    }
}
