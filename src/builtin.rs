//! Builtin commands: resolved by name before any external lookup (see
//! `Context::builtins`).

use crate::context::{BuiltinFn, InvokeInfo};
use crate::test_eval;
use argh::FromArgs;
use std::collections::HashMap;

/// `ls`: lists the entries of the working directory, one per line, in
/// whatever order `read_dir` yields (no sorting).
fn ls(info: &InvokeInfo) -> i32 {
    let entries = match std::fs::read_dir(&info.pwd) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("ls: {e}");
            return 1;
        }
    };
    let mut names = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Err(e) => {
                eprintln!("ls: {e}");
                return 1;
            }
        }
    }
    println!("{}", names.join("\n"));
    0
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    args: Vec<String>,
}

/// `echo`: joins its arguments with a single space, followed by a newline
/// unless `-n` was given.
fn echo(info: &InvokeInfo) -> i32 {
    let rest: Vec<&str> = info.argv[1..].iter().map(String::as_str).collect();
    let cmd: Echo = match Echo::from_args(&[info.argv[0].as_str()], &rest) {
        Ok(cmd) => cmd,
        Err(early_exit) => {
            print!("{}", early_exit.output);
            return if early_exit.status.is_err() { 1 } else { 0 };
        }
    };
    let line = cmd.args.join(" ");
    if cmd.no_newline {
        print!("{line}");
    } else {
        println!("{line}");
    }
    0
}

fn true_(_info: &InvokeInfo) -> i32 {
    0
}

fn false_(_info: &InvokeInfo) -> i32 {
    1
}

/// `exit`: parses `argv[1]` as the process exit code, defaulting to 0 if
/// missing or unparseable, and terminates the process immediately.
fn exit(info: &InvokeInfo) -> i32 {
    std::process::exit(exit_code(&info.argv));
}

fn exit_code(argv: &[String]) -> i32 {
    argv.get(1)
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0)
}

fn test(info: &InvokeInfo) -> i32 {
    test_eval::test(&info.argv)
}

/// The builtin registry installed into every fresh `Context`.
pub fn default_builtins() -> HashMap<String, BuiltinFn> {
    let mut map: HashMap<String, BuiltinFn> = HashMap::new();
    map.insert("ls".to_string(), ls);
    map.insert("echo".to_string(), echo);
    map.insert("true".to_string(), true_);
    map.insert("false".to_string(), false_);
    map.insert("exit".to_string(), exit);
    map.insert("test".to_string(), test);
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn info(argv: &[&str]) -> InvokeInfo {
        InvokeInfo {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            env: Vec::new(),
            stdin: String::new(),
            pwd: PathBuf::from("."),
        }
    }

    #[test]
    fn true_and_false_ignore_args() {
        assert_eq!(true_(&info(&["true", "ignored"])), 0);
        assert_eq!(false_(&info(&["false", "ignored"])), 1);
    }

    #[test]
    fn exit_code_defaults_to_zero() {
        assert_eq!(exit_code(&["exit".to_string()]), 0);
        assert_eq!(exit_code(&["exit".to_string(), "7".to_string()]), 7);
        assert_eq!(
            exit_code(&["exit".to_string(), "not-a-number".to_string()]),
            0
        );
    }

    #[test]
    fn default_builtins_has_every_builtin() {
        let builtins = default_builtins();
        for name in ["ls", "echo", "true", "false", "exit", "test"] {
            assert!(builtins.contains_key(name), "missing builtin {name}");
        }
    }

    #[test]
    fn echo_returns_zero_with_or_without_suppressed_newline() {
        assert_eq!(echo(&info(&["echo", "hi", "there"])), 0);
        assert_eq!(echo(&info(&["echo", "-n", "hi"])), 0);
    }

    #[test]
    fn echo_args_parses_the_no_newline_switch_and_positionals() {
        let cmd = Echo::from_args(&["echo"], &["-n", "a", "b"]).unwrap();
        assert!(cmd.no_newline);
        assert_eq!(cmd.args, vec!["a".to_string(), "b".to_string()]);

        let cmd = Echo::from_args(&["echo"], &["a", "b"]).unwrap();
        assert!(!cmd.no_newline);
        assert_eq!(cmd.args, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_builtin_delegates_to_evaluator() {
        assert_eq!(test(&info(&["test", "1", "-eq", "1"])), 0);
        assert_eq!(test(&info(&["test", "1", "-eq", "2"])), 1);
    }
}
