// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL (Read-Eval-Print Loop) for the Ember engine.

use ember_engine::{Engine, EngineConfig, Error, Value};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::debug;

/// REPL configuration constants
const HISTORY_FILE: &str = ".ember_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// Reserved words of the language.
const KEYWORDS: &[&str] = &[
    "delete", "do", "else", "for", "function", "if", "new", "return", "typeof", "var", "void",
    "while",
];

/// Literal-like words.
const LITERALS: &[&str] = &["true", "false", "null", "undefined", "NaN", "Infinity", "this"];

/// Globals installed by the engine.
const BUILTINS: &[&str] = &[
    "Array", "Boolean", "console", "Math", "Number", "Object", "String",
];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Bytecode,
    Load,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "bytecode" | "bc" => Some((ReplCommand::Bytecode, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".bytecode [code]", "Disassemble code, or toggle listing before each run"),
            (".load <file>", "Load and execute a script file"),
        ]
    }
}

/// Completion, hints, highlighting and multi-line validation for rustyline.
struct EmberHelper {
    words: Vec<&'static str>,
}

impl EmberHelper {
    fn new() -> Self {
        let mut words: Vec<&'static str> = KEYWORDS
            .iter()
            .chain(LITERALS)
            .chain(BUILTINS)
            .copied()
            .collect();
        words.extend(["console.log", "Math.max", "Math.min", "Math.floor", "Math.sqrt"]);
        words.extend(
            ReplCommand::all_commands()
                .iter()
                .map(|&(cmd, _)| cmd.split_whitespace().next().unwrap_or(cmd)),
        );
        words.sort_unstable();
        words.dedup();
        Self { words }
    }

    /// Start of the word that ends at `pos`.
    fn word_start(line: &str, pos: usize) -> usize {
        line[..pos]
            .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

impl Completer for EmberHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = Self::word_start(line, pos);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.to_string(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for EmberHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }
        let word = &line[Self::word_start(line, pos)..];
        if word.len() < 2 {
            return None;
        }
        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| (&w[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for EmberHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut current_word = String::new();

        for c in line.chars() {
            if c.is_alphanumeric() || c == '_' {
                current_word.push(c);
                continue;
            }
            if !current_word.is_empty() {
                result.push_str(&highlight_word(&current_word));
                current_word.clear();
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' => c.yellow().to_string(),
                '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '^' | '~' => {
                    c.cyan().to_string()
                }
                '"' | '\'' => c.green().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }

        if !current_word.is_empty() {
            result.push_str(&highlight_word(&current_word));
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if LITERALS.contains(&word) {
        word.blue().to_string()
    } else if BUILTINS.contains(&word) {
        word.cyan().to_string()
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for EmberHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        // A trailing binary operator or separator means the statement continues.
        let trimmed = input.trim_end();
        let update = trimmed.ends_with("++") || trimmed.ends_with("--");
        if !update && trimmed.ends_with(['\\', '+', '-', '*', '/', '=', ',', '&', '|', '?', ':']) {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

/// Check if brackets, braces, and parentheses are balanced
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = None;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string.is_some() {
            escape_next = true;
            continue;
        }

        match in_string {
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_string = Some(c),
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                ')' | ']' | '}' => {
                    // A stray closer is the parser's problem, not ours.
                    if stack.pop() != Some(c) {
                        return true;
                    }
                }
                _ => {}
            },
        }
    }

    stack.is_empty() && in_string.is_none()
}

impl Helper for EmberHelper {}

/// The interactive REPL.
///
/// One [`Engine`] lives for the whole session, so declarations made on one
/// line are visible on the next.
pub struct Repl {
    engine: Engine,
    editor: Editor<EmberHelper, DefaultHistory>,
    history_path: Option<PathBuf>,
    show_bytecode: bool,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(config: EngineConfig, show_bytecode: bool) -> rustyline::Result<Self> {
        let editor_config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(editor_config)?;
        editor.set_helper(Some(EmberHelper::new()));

        let history_path = dirs::home_dir().map(|home| home.join(HISTORY_FILE));
        if let Some(path) = &history_path {
            if editor.load_history(path).is_err() {
                debug!(path = %path.display(), "no history loaded");
            }
        }

        Ok(Self {
            engine: Engine::with_config(config),
            editor,
            history_path,
            show_bytecode,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "ember>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    if trimmed.starts_with('.') {
                        eprintln!(
                            "{}: unknown command '{}' (try {})",
                            "Error".red().bold(),
                            trimmed.cyan(),
                            ".help".cyan()
                        );
                        continue;
                    }

                    self.eval_and_print(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            if let Err(err) = self.editor.save_history(path) {
                debug!(path = %path.display(), %err, "failed to save history");
            }
        }

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        let config = self.engine.config();
        println!();
        println!(
            "  {} {}{}",
            "Ember".bright_red().bold(),
            "v".dimmed(),
            env!("CARGO_PKG_VERSION").bright_yellow()
        );
        println!(
            "  {} {:?}{}",
            "pipeline:".dimmed(),
            config.pipeline,
            if config.passes.any() {
                " (optimized)"
            } else {
                ""
            }
        );
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Bytecode => match arg {
                Some(code) => match self.engine.disassemble(code) {
                    Ok(listing) => print!("{}", listing.dimmed()),
                    Err(e) => print_error(&e),
                },
                None => {
                    self.show_bytecode = !self.show_bytecode;
                    println!(
                        "{} {}",
                        "bytecode listing".dimmed(),
                        if self.show_bytecode { "on" } else { "off" }.yellow()
                    );
                }
            },
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(Path::new(path)),
                None => eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    ".load".cyan(),
                    "requires a file path".dimmed()
                ),
            },
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();
        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:18} {}", cmd.cyan(), desc.dimmed());
        }
        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!();
        println!("  {:18} {}", "Ctrl+C".yellow(), "Cancel current input".dimmed());
        println!("  {:18} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:18} {}", "Tab".yellow(), "Autocomplete".dimmed());
        println!();
    }

    fn load_file(&mut self, path: &Path) {
        match self.engine.eval_file(path) {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&e),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        if self.show_bytecode {
            match self.engine.disassemble(input) {
                Ok(listing) => print!("{}", listing.dimmed()),
                Err(e) => {
                    print_error(&e);
                    return;
                }
            }
        }
        match self.engine.eval(input) {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&e),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Format a value for display with syntax coloring
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".blue().dimmed().to_string(),
        Value::Null => "null".blue().to_string(),
        Value::Boolean(b) => b.yellow().to_string(),
        Value::Number(_) => value.yellow().to_string(),
        Value::String(s) => format!("'{}'", s).green().to_string(),
        Value::Object(_) if value.is_function() => value.magenta().to_string(),
        Value::Object(_) => value.cyan().to_string(),
    }
}

/// Print a formatted error message
pub fn print_error(error: &Error) {
    let error_str = error.to_string();
    match error_str.split_once(':') {
        Some((error_type, message)) => eprintln!("{}:{}", error_type.red().bold(), message),
        None => eprintln!("{}", error_str.red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert_eq!(ReplCommand::parse(".help"), Some((ReplCommand::Help, None)));
        assert_eq!(ReplCommand::parse(".exit"), Some((ReplCommand::Exit, None)));
        assert_eq!(ReplCommand::parse(".bytecode"), Some((ReplCommand::Bytecode, None)));
        assert_eq!(
            ReplCommand::parse(".bytecode 1 + 2"),
            Some((ReplCommand::Bytecode, Some("1 + 2")))
        );
        assert_eq!(
            ReplCommand::parse(".load test.js"),
            Some((ReplCommand::Load, Some("test.js")))
        );
        assert_eq!(ReplCommand::parse(".unknown"), None);
        assert_eq!(ReplCommand::parse("not a command"), None);
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("(1 + 2)"));
        assert!(is_balanced("{ a: 1 }"));
        assert!(is_balanced("function f() { return 1; }"));
        assert!(!is_balanced("(1 + 2"));
        assert!(!is_balanced("{ a: 1"));
        assert!(is_balanced("'string with (unbalanced'"));
        assert!(!is_balanced("'open string"));
    }

    #[test]
    fn test_helper_words_are_unique() {
        let helper = EmberHelper::new();
        let mut deduped = helper.words.clone();
        deduped.dedup();
        assert_eq!(deduped, helper.words);
        assert!(helper.words.contains(&".bytecode"));
    }

    #[test]
    fn test_word_start() {
        assert_eq!(EmberHelper::word_start("var x = Mat", 11), 8);
        assert_eq!(EmberHelper::word_start("console.lo", 10), 0);
    }
}
