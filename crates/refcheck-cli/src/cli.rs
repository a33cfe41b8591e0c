//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "refcheck",
    version,
    about = "Key and referential-integrity validation for tab-delimited submissions",
    long_about = "Validate primary keys, foreign keys and surjective relations of \
                  submission projects against a dictionary.\n\n\
                  Error records are written as JSON lines next to each project."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Include key values in log output (they identify donors).
    #[arg(long = "log-keys", global = true)]
    pub log_keys: bool,

    /// TOML file with [engine] and [executor] settings.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate one project.
    Validate(ValidateArgs),

    /// Validate many projects through the bounded executor.
    Batch(BatchArgs),

    /// Print the order in which file types are digested.
    Order(DictionaryArg),

    /// Print the shortest relation path from one file type to another.
    Path(PathArgs),
}

#[derive(Args)]
pub struct DictionaryArg {
    /// Dictionary file (.json or .toml).
    #[arg(long = "dictionary", short = 'd', value_name = "FILE")]
    pub dictionary: PathBuf,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub dictionary: DictionaryArg,

    /// Directory holding one sub-directory per project.
    #[arg(long = "input-root", value_name = "DIR")]
    pub input_root: PathBuf,

    /// Where reports are written (default: the input root).
    #[arg(long = "output-root", value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Digest file types one at a time.
    #[arg(long = "sequential")]
    pub sequential: bool,

    /// Project key (the project's directory name).
    #[arg(value_name = "PROJECT")]
    pub project: String,
}

#[derive(Args)]
pub struct BatchArgs {
    #[command(flatten)]
    pub dictionary: DictionaryArg,

    #[arg(long = "input-root", value_name = "DIR")]
    pub input_root: PathBuf,

    #[arg(long = "output-root", value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Concurrent validations (overrides the config file).
    #[arg(long = "capacity", value_name = "N")]
    pub capacity: Option<usize>,

    /// Projects to validate (default: every directory under the input root).
    #[arg(value_name = "PROJECT")]
    pub projects: Vec<String>,
}

#[derive(Args)]
pub struct PathArgs {
    #[command(flatten)]
    pub dictionary: DictionaryArg,

    #[arg(value_name = "FROM")]
    pub from: String,

    #[arg(value_name = "TO")]
    pub to: String,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
