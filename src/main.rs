// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Ember - a small bytecode engine for a JavaScript subset
//!
//! This is the main entry point for the ember CLI/REPL.
//!
//! ## Features
//!
//! - Interactive REPL with highlighting, history and a bytecode view
//! - Async file loading with tokio
//! - Switchable code generators and optimization passes

mod repl;

use clap::Parser;
use ember_engine::{Engine, EngineConfig, OptimizationPasses, Pipeline};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ember",
    about = "A small bytecode engine for a JavaScript subset",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Script file to execute
    script: Option<PathBuf>,

    /// Evaluate code from the command line
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Code generator to use (direct or tac)
    #[arg(long)]
    pipeline: Option<Pipeline>,

    /// Disable the TAC optimization passes
    #[arg(long)]
    no_optimize: bool,

    /// Print the bytecode listing instead of running
    #[arg(short = 'd', long)]
    disassemble: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    /// Environment settings first, then command-line overrides.
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(pipeline) = self.pipeline {
            config.pipeline = pipeline;
        }
        if self.no_optimize {
            config.passes = OptimizationPasses::none();
        }
        config
    }
}

/// Main entry point - uses tokio runtime for async file loading.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "ember=debug,ember_engine=debug"
    } else {
        "ember=warn,ember_engine=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.engine_config();
    debug!(?config, "starting");

    let source = if let Some(code) = &cli.eval {
        code.clone()
    } else if let Some(path) = &cli.script {
        match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(e) => {
                eprintln!(
                    "{}: cannot read '{}': {}",
                    "Error".red().bold(),
                    path.display().cyan(),
                    e
                );
                return ExitCode::FAILURE;
            }
        }
    } else {
        return run_repl(config, cli.disassemble);
    };

    if cli.disassemble {
        disassemble(config, &source)
    } else {
        run_source(config, &source, cli.eval.is_some())
    }
}

/// Start the interactive REPL
fn run_repl(config: EngineConfig, show_bytecode: bool) -> ExitCode {
    match repl::Repl::new(config, show_bytecode) {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}: Failed to initialize REPL: {:?}",
                "Error".red().bold(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

/// Run a program. `-e` prints the program result; scripts stay quiet.
fn run_source(config: EngineConfig, source: &str, print_result: bool) -> ExitCode {
    let mut engine = Engine::with_config(config);
    match engine.eval(source) {
        Ok(value) => {
            if print_result && !value.is_undefined() {
                println!("{}", value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            repl::print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn disassemble(config: EngineConfig, source: &str) -> ExitCode {
    match Engine::with_config(config).disassemble(source) {
        Ok(listing) => {
            print!("{}", listing);
            ExitCode::SUCCESS
        }
        Err(e) => {
            repl::print_error(&e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["ember", "--pipeline", "direct", "--no-optimize", "-e", "1"]);
        let config = cli.engine_config();
        assert_eq!(config.pipeline, Pipeline::Direct);
        assert!(!config.passes.any());
        assert_eq!(cli.eval.as_deref(), Some("1"));
    }

    #[test]
    fn test_script_argument() {
        let cli = Cli::parse_from(["ember", "prog.js", "--disassemble"]);
        assert_eq!(cli.script, Some(PathBuf::from("prog.js")));
        assert!(cli.disassemble);
    }
}
