//! Minimal theme for encoded output.
//!
//! Each rule pairs a scope selector with a style. The most specific matching
//! selector wins; among equals, the later rule wins.

use anyhow::{Context, Result};
use loom_selector::{Selector, best_match};
use loom_textmate::{FontStyle, MetadataProvider, Scope, TokenStyle};
use serde::Deserialize;

/// Font style keyword in a theme rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyleName {
	Italic,
	Bold,
	Underline,
	Strikethrough,
}

impl From<FontStyleName> for FontStyle {
	fn from(name: FontStyleName) -> Self {
		match name {
			FontStyleName::Italic => FontStyle::ITALIC,
			FontStyleName::Bold => FontStyle::BOLD,
			FontStyleName::Underline => FontStyle::UNDERLINE,
			FontStyleName::Strikethrough => FontStyle::STRIKETHROUGH,
		}
	}
}

/// A `[[theme]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ThemeRule {
	/// Scope selector.
	pub scope: String,
	#[serde(default)]
	pub foreground: Option<u16>,
	#[serde(default)]
	pub background: Option<u8>,
	#[serde(default)]
	pub font_style: Vec<FontStyleName>,
}

impl ThemeRule {
	fn style(&self) -> TokenStyle {
		TokenStyle {
			font_style: self.font_style.iter().fold(FontStyle::empty(), |acc, &name| acc | name.into()),
			foreground: self.foreground.unwrap_or_default(),
			background: self.background.unwrap_or_default(),
		}
	}
}

/// Compiled theme rules.
#[derive(Debug, Default)]
pub struct Theme {
	selectors: Vec<Selector>,
	styles: Vec<TokenStyle>,
}

impl Theme {
	pub fn new(rules: &[ThemeRule]) -> Result<Self> {
		let mut theme = Self::default();
		for rule in rules {
			let selector =
				Selector::parse(&rule.scope).with_context(|| format!("invalid theme selector `{}`", rule.scope))?;
			theme.selectors.push(selector);
			theme.styles.push(rule.style());
		}
		Ok(theme)
	}
}

impl MetadataProvider for Theme {
	fn style(&self, scopes: &[Scope]) -> TokenStyle {
		best_match(&self.selectors, scopes)
			.map(|idx| self.styles[idx])
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rule(scope: &str, foreground: u16) -> ThemeRule {
		ThemeRule {
			scope: scope.to_string(),
			foreground: Some(foreground),
			background: None,
			font_style: Vec::new(),
		}
	}

	fn scopes(names: &[&str]) -> Vec<Scope> {
		names.iter().map(|&s| Scope::from(s)).collect()
	}

	#[test]
	fn test_most_specific_rule_wins() {
		let theme = Theme::new(&[rule("string", 1), rule("string.quoted", 2), rule("comment", 3)]).unwrap();
		assert_eq!(theme.style(&scopes(&["source.js", "string.quoted.double"])).foreground, 2);
		assert_eq!(theme.style(&scopes(&["source.js", "string.unquoted"])).foreground, 1);
		assert_eq!(theme.style(&scopes(&["source.js", "keyword"])), TokenStyle::default());
	}

	#[test]
	fn test_later_rule_wins_ties() {
		let theme = Theme::new(&[rule("comment", 1), rule("comment", 4)]).unwrap();
		assert_eq!(theme.style(&scopes(&["comment.line"])).foreground, 4);
	}

	#[test]
	fn test_font_styles_combine() {
		let mut italic_bold = rule("keyword", 5);
		italic_bold.font_style = vec![FontStyleName::Italic, FontStyleName::Bold];
		let theme = Theme::new(&[italic_bold]).unwrap();
		assert_eq!(
			theme.style(&scopes(&["keyword.control"])).font_style,
			FontStyle::ITALIC | FontStyle::BOLD
		);
	}

	#[test]
	fn test_invalid_selector_is_an_error() {
		let err = Theme::new(&[rule("(string", 1)]).unwrap_err();
		assert!(err.to_string().contains("(string"));
	}
}
