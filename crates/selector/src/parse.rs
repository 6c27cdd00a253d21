//! Selector lexer and recursive-descent parser.
//!
//! ```text
//! selector    := alternative ((',' | '|') alternative)*
//! alternative := priority? conjunction
//! conjunction := operand+
//! operand     := '-' operand | '(' group ')' | path
//! group       := conjunction ((',' | '|') conjunction)*
//! path        := name ('>'? name)*
//! ```

use smallvec::SmallVec;

use crate::error::{Result, SelectorSyntaxError};
use crate::expr::{Combinator, Expr, PathStep, ScopePath};
use crate::{Alternative, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind<'a> {
	Name(&'a str),
	Priority(Priority),
	Comma,
	Pipe,
	Minus,
	Open,
	Close,
	Gt,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
	kind: TokenKind<'a>,
	offset: usize,
	text: &'a str,
}

fn is_name_start(c: char) -> bool {
	c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '*')
}

fn is_name_continue(c: char) -> bool {
	is_name_start(c) || c == '-' || c == '+'
}

/// `L:` and `R:` mark injection priority; `B:` is accepted as the default.
fn priority_prefix(text: &str) -> Option<Priority> {
	match text.get(..2)? {
		"L:" => Some(Priority::Left),
		"R:" => Some(Priority::Right),
		"B:" => Some(Priority::Normal),
		_ => None,
	}
}

fn lex(source: &str) -> Result<Vec<Token<'_>>> {
	let mut tokens = Vec::new();
	let mut chars = source.char_indices().peekable();

	while let Some((offset, c)) = chars.next() {
		let kind = match c {
			c if c.is_whitespace() => continue,
			',' => TokenKind::Comma,
			'|' => TokenKind::Pipe,
			'-' => TokenKind::Minus,
			'(' => TokenKind::Open,
			')' => TokenKind::Close,
			'>' => TokenKind::Gt,
			c if is_name_start(c) => {
				let mut end = offset + c.len_utf8();
				while let Some(&(i, next)) = chars.peek() {
					if !is_name_continue(next) {
						break;
					}
					end = i + next.len_utf8();
					chars.next();
				}
				let mut text = &source[offset..end];
				let mut offset = offset;
				if let Some(priority) = priority_prefix(text) {
					tokens.push(Token {
						kind: TokenKind::Priority(priority),
						offset,
						text: &text[..2],
					});
					if text.len() == 2 {
						continue;
					}
					text = &text[2..];
					offset += 2;
				}
				tokens.push(Token {
					kind: TokenKind::Name(text),
					offset,
					text,
				});
				continue;
			}
			ch => return Err(SelectorSyntaxError::UnexpectedChar { ch, offset }),
		};
		tokens.push(Token {
			kind,
			offset,
			text: &source[offset..offset + c.len_utf8()],
		});
	}

	Ok(tokens)
}

struct Parser<'a> {
	tokens: Vec<Token<'a>>,
	pos: usize,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<Token<'a>> {
		self.tokens.get(self.pos).copied()
	}

	fn bump(&mut self) -> Option<Token<'a>> {
		let token = self.peek();
		self.pos += 1;
		token
	}

	fn unexpected(token: Token<'_>) -> SelectorSyntaxError {
		SelectorSyntaxError::UnexpectedToken {
			token: token.text.to_string(),
			offset: token.offset,
		}
	}

	fn selector(&mut self) -> Result<Vec<Alternative>> {
		let mut alternatives = Vec::new();
		loop {
			let priority = match self.peek() {
				Some(Token {
					kind: TokenKind::Priority(p),
					..
				}) => {
					self.pos += 1;
					p
				}
				_ => Priority::Normal,
			};
			let expr = self.conjunction()?;
			alternatives.push(Alternative { priority, expr });

			match self.bump() {
				None => return Ok(alternatives),
				Some(Token {
					kind: TokenKind::Comma | TokenKind::Pipe,
					..
				}) => {}
				Some(token) => return Err(Self::unexpected(token)),
			}
		}
	}

	fn conjunction(&mut self) -> Result<Expr> {
		let mut operands = Vec::new();
		while let Some(token) = self.peek() {
			match token.kind {
				TokenKind::Name(_) | TokenKind::Minus | TokenKind::Open => operands.push(self.operand()?),
				_ => break,
			}
		}

		if operands.len() > 1 {
			return Ok(Expr::And(operands));
		}
		operands.pop().ok_or_else(|| match self.peek() {
			Some(token) => Self::unexpected(token),
			None => SelectorSyntaxError::UnexpectedEnd,
		})
	}

	fn operand(&mut self) -> Result<Expr> {
		let token = self.bump().ok_or(SelectorSyntaxError::UnexpectedEnd)?;
		match token.kind {
			TokenKind::Minus => Ok(Expr::Not(Box::new(self.operand()?))),
			TokenKind::Open => self.group(token.offset),
			TokenKind::Name(name) => self.path(name),
			_ => Err(Self::unexpected(token)),
		}
	}

	fn group(&mut self, open_offset: usize) -> Result<Expr> {
		let first = self.conjunction()?;
		let mut rest = Vec::new();
		loop {
			match self.bump() {
				Some(Token {
					kind: TokenKind::Close, ..
				}) => break,
				Some(Token {
					kind: TokenKind::Comma | TokenKind::Pipe,
					..
				}) => rest.push(self.conjunction()?),
				Some(token) => return Err(Self::unexpected(token)),
				None => return Err(SelectorSyntaxError::UnclosedGroup { offset: open_offset }),
			}
		}

		if rest.is_empty() {
			return Ok(first);
		}
		rest.insert(0, first);
		Ok(Expr::Or(rest))
	}

	fn path(&mut self, first: &str) -> Result<Expr> {
		let mut steps: SmallVec<[PathStep; 4]> = SmallVec::new();
		steps.push(PathStep {
			prefix: first.into(),
			combinator: Combinator::Descendant,
		});

		loop {
			let combinator = match self.peek().map(|t| t.kind) {
				Some(TokenKind::Name(_)) => Combinator::Descendant,
				Some(TokenKind::Gt) => {
					self.pos += 1;
					Combinator::Child
				}
				_ => break,
			};
			match self.bump() {
				Some(Token {
					kind: TokenKind::Name(name),
					..
				}) => steps.push(PathStep {
					prefix: name.into(),
					combinator,
				}),
				Some(token) => return Err(Self::unexpected(token)),
				None => return Err(SelectorSyntaxError::UnexpectedEnd),
			}
		}

		Ok(Expr::Path(ScopePath::new(steps)))
	}
}

/// Parses a selector source into its top-level alternatives.
pub(crate) fn parse(source: &str) -> Result<Vec<Alternative>> {
	let tokens = lex(source)?;
	if tokens.is_empty() {
		return Err(SelectorSyntaxError::Empty);
	}
	Parser { tokens, pos: 0 }.selector()
}
