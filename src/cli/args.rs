use crate::constants::{exit_codes, verbosity};
use crate::orchestrator::RenderOptions;
use clap::{error::ErrorKind, CommandFactory, Parser};
use log::LevelFilter;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#;

/// CLI arguments for templer.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Definition files describing what to render.
    #[arg(value_name = "DEFINITION_FILE", required = true)]
    pub definition_files: Vec<PathBuf>,

    /// Render templates again whenever one of their files changes.
    #[arg(short, long = "auto-render")]
    pub auto_render: bool,

    /// Overwrite existing destination files.
    #[arg(short, long)]
    pub force: bool,

    /// Increase logging verbosity (`-v`, `-vv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// How long templer keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Render every definition once and exit
    Once,
    /// Render every definition, then keep rendering on file changes
    AutoRender,
}

impl Args {
    pub fn run_mode(&self) -> RunMode {
        if self.auto_render {
            RunMode::AutoRender
        } else {
            RunMode::Once
        }
    }
}

impl From<&Args> for RenderOptions {
    fn from(args: &Args) -> Self {
        RenderOptions { force_overwrite: args.force }
    }
}

/// Parse command line arguments with custom handling for missing required inputs.
pub fn get_args() -> Args {
    Args::try_parse().unwrap_or_else(|e| {
        if e.kind() == ErrorKind::MissingRequiredArgument {
            let mut command = Args::command().help_template(HELP_TEMPLATE);
            if let Err(print_err) = command.print_help() {
                eprintln!("Failed to display help information: {print_err}");
            } else {
                println!();
            }
            std::process::exit(exit_codes::FAILURE);
        } else {
            e.exit();
        }
    })
}

/// Map `-v` counts to the appropriate log level.
pub fn get_log_level_from_verbose(verbose_count: u8) -> LevelFilter {
    match verbose_count {
        verbosity::INFO => LevelFilter::Info,
        verbosity::DEBUG => LevelFilter::Debug,
        verbosity::TRACE.. => LevelFilter::Trace,
    }
}
