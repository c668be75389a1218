//! The interpreter's runtime state: variables, exports, working directory,
//! the builtin registry, and the register machine (`A`/`B`/`RV`/`S`/`P`/`PC`).

use crate::instr::Instruction;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Arguments handed to a builtin, matching the shell's builtin contract:
/// argv (with `argv[0]` the command name), the environment forwarded to
/// this invocation, captured stdin, and the working directory.
///
/// `stdin` is always empty in this shell: redirections and pipes are a
/// non-goal, so no builtin ever has piped input to read.
pub struct InvokeInfo {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: String,
    pub pwd: PathBuf,
}

/// A builtin command: an in-process function resolved by name before any
/// external lookup. Registered once at startup; the registry is read-only
/// thereafter.
pub type BuiltinFn = fn(&InvokeInfo) -> i32;

/// Process-local interpreter state. Outlives any single parsed line; bytecode
/// is appended to `program` per input line and `pc` walks forward without
/// ever re-executing earlier code.
pub struct Context {
    pub variables: HashMap<String, String>,
    pub exported: HashSet<String>,
    pub pwd: PathBuf,
    pub builtins: HashMap<String, BuiltinFn>,

    /// Accumulator: counts argv entries pending on `stack` for the next `Call`.
    pub a: i64,
    /// Scratch buffer: the word currently under construction.
    pub b: String,
    /// Exit status of the most recently completed command (`$?`).
    pub rv: i32,
    /// Value stack.
    pub stack: Vec<String>,

    pub program: Vec<Instruction>,
    pub pc: usize,
}

impl Context {
    /// Builds a fresh context: empty variables (shell startup does not
    /// import the process environment), `pwd` from the real working
    /// directory, and the default builtin registry.
    pub fn new() -> Self {
        let pwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            variables: HashMap::new(),
            exported: HashSet::new(),
            pwd,
            builtins: crate::builtin::default_builtins(),
            a: 0,
            b: String::new(),
            rv: 0,
            stack: Vec::new(),
            program: Vec::new(),
            pc: 0,
        }
    }

    /// Reads a variable by name, special-casing `$?` (the last exit status)
    /// which is not stored in `variables`. Missing variables are the empty
    /// string.
    pub fn var(&self, name: &str) -> String {
        if name == "?" {
            return self.rv.to_string();
        }
        self.variables.get(name).cloned().unwrap_or_default()
    }

    /// Assigns `name := value` and marks it exported. This shell has no
    /// `export` builtin (see DESIGN.md), so every assignment is forwarded to
    /// children by default.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.variables.insert(name.clone(), value.into());
        self.exported.insert(name);
    }

    /// The `(name, value)` pairs forwarded to a spawned command: every
    /// exported name, with missing values forwarded as the empty string
    /// rather than omitted.
    pub fn exported_env(&self) -> Vec<(String, String)> {
        let mut names: Vec<&String> = self.exported.iter().collect();
        names.sort();
        names
            .into_iter()
            .map(|n| (n.clone(), self.variables.get(n).cloned().unwrap_or_default()))
            .collect()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
