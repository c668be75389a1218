//! The syntax tree produced by the parser and consumed by the code generator.
//!
//! Tagged-union enums replace a visitor-dispatch class hierarchy here: every
//! node is a variant and every consumer (codegen) is a `match`.

/// One piece of an unexpanded shell word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentPart {
    /// Literal bytes, contributed as-is.
    Constant(String),
    /// `$name` / `${name}` outside quotes: expands with word-splitting.
    Replacement(String),
    /// `$name` / `${name}` inside quotes (or an assignment RHS): expands
    /// without word-splitting.
    ReplacementSingle(String),
}

/// One shell word before expansion: an ordered sequence of parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentNode {
    pub parts: Vec<ArgumentPart>,
}

/// `name=expr`, where `expr` never word-splits at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNode {
    pub var_name: String,
    pub expr: ArgumentNode,
}

/// A command invocation: its argv and the env assignments that precede it
/// on the same line (`FOO=bar cmd arg`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandNode {
    pub args: Vec<ArgumentNode>,
    pub env_assignments: Vec<AssignmentNode>,
}

/// A standalone run of assignments with no following command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentsNode {
    pub assignments: Vec<AssignmentNode>,
}

/// `if eval...; then cond...; else alt...; fi`.
///
/// Semantics: run each of `evaluation_exprs` in turn, summing their exit
/// codes; if the sum is zero, run `conditional_exprs`, otherwise run
/// `else_exprs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalNode {
    pub evaluation_exprs: Vec<Expr>,
    pub conditional_exprs: Vec<Expr>,
    pub else_exprs: Vec<Expr>,
}

/// A top-level syntax node: one parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Command(CommandNode),
    Assignments(AssignmentsNode),
    Conditional(ConditionalNode),
}
