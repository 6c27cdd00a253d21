//! `loom` command-line driver.
//!
//! Loads TextMate grammars from files and a TOML configuration, then
//! tokenizes text, checks grammars, or evaluates scope selectors.

mod cli;
mod config;
mod output;
mod theme;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use loom_selector::Selector;
use loom_textmate::{Grammar, InMemorySource, Registry};
use tracing::{debug, info};

use crate::cli::{Cli, Command, Format};
use crate::config::Config;
use crate::theme::Theme;

fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = match &cli.config {
		Some(path) => Config::load(path)?,
		None => Config::default(),
	};

	match cli.command {
		Command::Tokenize {
			file,
			scope,
			format,
			encoded,
		} => {
			let (registry, scopes) = load_registry(&config, &cli.grammars)?;
			let text = read_input(file.as_deref())?;
			let scope = match scope {
				Some(scope) => scope,
				None => detect_scope(&registry, &scopes, file.as_deref(), &text)?,
			};
			info!(scope = %scope, "Tokenizing");
			tokenize(&registry, &scope, &text, format, encoded.then_some(&config))
		}
		Command::Check => {
			let (registry, scopes) = load_registry(&config, &cli.grammars)?;
			check(&registry, &scopes)
		}
		Command::Select { selector, scopes } => select(&selector, &scopes),
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("LOOM_LOG")
		.or_else(|_| EnvFilter::try_from_default_env())
		.unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("loom=debug,loom_textmate=debug")
			} else {
				EnvFilter::new("warn")
			}
		});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

/// Builds a registry from configured and command-line grammar files.
/// Returns the registry and the scope names it knows.
fn load_registry(config: &Config, extra: &[PathBuf]) -> Result<(Registry, Vec<String>)> {
	let mut source = InMemorySource::new();
	let mut scopes = Vec::new();
	for path in config.grammars.iter().chain(extra) {
		let scope = source
			.add_grammar_file(path)
			.with_context(|| format!("loading grammar {}", path.display()))?;
		debug!(path = %path.display(), scope = %scope, "Added grammar file");
		scopes.push(scope);
	}
	for (target, injectors) in &config.injections {
		for injector in injectors {
			source.add_injection(target.as_str(), injector.as_str());
		}
	}
	if scopes.is_empty() {
		bail!("no grammars loaded; pass --grammar or list them in the config file");
	}
	scopes.sort();
	scopes.dedup();
	Ok((Registry::with_options(source, config.registry.clone()), scopes))
}

fn read_input(file: Option<&Path>) -> Result<String> {
	match file {
		Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display())),
		None => {
			let mut text = String::new();
			std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
			Ok(text)
		}
	}
}

/// Picks a grammar by file extension, then by first-line match.
fn detect_scope(registry: &Registry, scopes: &[String], file: Option<&Path>, text: &str) -> Result<String> {
	let grammars: Vec<Arc<Grammar>> = scopes.iter().filter_map(|scope| registry.grammar(scope)).collect();

	if let Some(ext) = file.and_then(Path::extension).and_then(|ext| ext.to_str())
		&& let Some(grammar) = grammars.iter().find(|g| g.file_types().iter().any(|t| t == ext))
	{
		return Ok(grammar.scope_name().to_string());
	}

	let first_line = text.lines().next().unwrap_or_default();
	if let Some(grammar) = grammars.iter().find(|g| g.matches_first_line(first_line)) {
		return Ok(grammar.scope_name().to_string());
	}

	bail!("could not detect a grammar for the input; pass --scope")
}

fn tokenize(registry: &Registry, scope: &str, text: &str, format: Format, encoded: Option<&Config>) -> Result<()> {
	let tokenizer = registry.tokenizer(scope)?;
	let lines: Vec<&str> = text.lines().collect();
	let stdout = std::io::stdout();
	let mut out = stdout.lock();

	match encoded {
		Some(config) => {
			let theme = Theme::new(&config.theme)?;
			let mut stack = None;
			let mut encoded = Vec::with_capacity(lines.len());
			for line in &lines {
				let result = tokenizer.tokenize_line_encoded(line, stack.as_ref(), &theme);
				encoded.push(result.tokens);
				stack = Some(result.stack);
			}
			output::write_encoded(&mut out, format, &encoded)?;
		}
		None => {
			let document = tokenizer.tokenize_document(text);
			output::write_scoped(&mut out, format, &lines, &document.lines)?;
		}
	}
	out.flush()?;
	Ok(())
}

fn check(registry: &Registry, scopes: &[String]) -> Result<()> {
	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	let mut problems = 0;
	for scope in scopes {
		let grammar = registry.load(scope)?;
		let diagnostics = grammar.diagnostics();
		writeln!(out, "{scope}: {} rules, {} diagnostics", grammar.rule_count(), diagnostics.len())?;
		for diagnostic in diagnostics {
			writeln!(out, "  {diagnostic}")?;
		}
		problems += diagnostics.len();
	}
	if problems > 0 {
		bail!("{problems} grammar diagnostics");
	}
	Ok(())
}

fn select(selector: &str, scopes: &[String]) -> Result<()> {
	let selector = Selector::parse(selector).with_context(|| format!("parsing selector `{selector}`"))?;
	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	match selector.specificity(scopes) {
		Some(found) => writeln!(
			out,
			"match depth={} segments={} steps={}",
			found.depth, found.segments, found.steps
		)?,
		None => writeln!(out, "no match")?,
	}
	Ok(())
}
