//! Token rendering.

use std::io::Write;

use anyhow::Result;
use loom_textmate::{EncodedMetadata, Token};
use serde::Serialize;

use crate::cli::Format;

#[derive(Debug, Serialize)]
struct ScopedRecord<'a> {
	start: usize,
	end: usize,
	text: &'a str,
	scopes: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct EncodedRecord {
	start: u32,
	metadata: u32,
}

/// Writes scoped tokens, one entry per token.
pub fn write_scoped(out: &mut impl Write, format: Format, lines: &[&str], tokens: &[Vec<Token>]) -> Result<()> {
	match format {
		Format::Text => {
			for (idx, (line, tokens)) in lines.iter().zip(tokens).enumerate() {
				for token in tokens {
					let scopes: Vec<&str> = token.scopes.iter().map(|s| &**s).collect();
					writeln!(
						out,
						"{}:{}-{} {:?} {}",
						idx + 1,
						token.start,
						token.end,
						&line[token.range()],
						scopes.join(" ")
					)?;
				}
			}
		}
		Format::Json => {
			let records: Vec<Vec<ScopedRecord<'_>>> = lines
				.iter()
				.zip(tokens)
				.map(|(line, tokens)| {
					tokens
						.iter()
						.map(|token| ScopedRecord {
							start: token.start,
							end: token.end,
							text: &line[token.range()],
							scopes: token.scopes.iter().map(|s| &**s).collect(),
						})
						.collect()
				})
				.collect();
			serde_json::to_writer_pretty(&mut *out, &records)?;
			writeln!(out)?;
		}
	}
	Ok(())
}

/// Writes packed `[start, metadata]` pairs.
pub fn write_encoded(out: &mut impl Write, format: Format, lines: &[Vec<u32>]) -> Result<()> {
	match format {
		Format::Text => {
			for (idx, pairs) in lines.iter().enumerate() {
				for pair in pairs.chunks_exact(2) {
					let meta = EncodedMetadata::from_bits(pair[1]);
					writeln!(
						out,
						"{}:{} {:#010x} lang={} type={:?} font={:?} fg={} bg={}",
						idx + 1,
						pair[0],
						meta.bits(),
						meta.language_id(),
						meta.token_type(),
						meta.font_style(),
						meta.foreground(),
						meta.background()
					)?;
				}
			}
		}
		Format::Json => {
			let records: Vec<Vec<EncodedRecord>> = lines
				.iter()
				.map(|pairs| {
					pairs
						.chunks_exact(2)
						.map(|pair| EncodedRecord {
							start: pair[0],
							metadata: pair[1],
						})
						.collect()
				})
				.collect();
			serde_json::to_writer_pretty(&mut *out, &records)?;
			writeln!(out)?;
		}
	}
	Ok(())
}
