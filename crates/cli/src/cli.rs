use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Tokenize text with TextMate grammars")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Grammar file to load (repeatable)
	#[arg(short, long = "grammar", value_name = "PATH", global = true)]
	pub grammars: Vec<PathBuf>,

	/// TOML configuration file
	#[arg(short, long, value_name = "PATH", global = true)]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Tokenize a file (or stdin) and print its tokens
	Tokenize {
		/// Input file; reads stdin if omitted
		file: Option<PathBuf>,

		/// Scope name of the grammar to use; inferred from the file when omitted
		#[arg(short, long)]
		scope: Option<String>,

		/// Output format
		#[arg(short, long, value_enum, default_value_t = Format::Text)]
		format: Format,

		/// Print packed metadata instead of scope stacks
		#[arg(long)]
		encoded: bool,
	},
	/// Compile every loaded grammar and report diagnostics
	Check,
	/// Test a scope selector against a scope stack
	Select {
		/// Selector expression, e.g. `source.js string - comment`
		selector: String,

		/// Scope stack, outermost first
		scopes: Vec<String>,
	},
}

/// Token output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	/// One token per line: `line:start-end scopes`
	Text,
	/// A JSON array of lines
	Json,
}
