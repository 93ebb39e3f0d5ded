// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt;

use crate::testscript::command::{Argument, Block, Command};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
	pub message: String,
	pub line: u32,
	pub text: String,
}

impl fmt::Display for ParseError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "parse error at line {}: {}\n{}", self.line, self.message, self.text)
	}
}

impl std::error::Error for ParseError {}

fn is_comment(line: &str) -> bool {
	let line = line.trim_start();
	line.starts_with('#') || line.starts_with("//")
}

pub(crate) fn parse(input: &str) -> Result<Vec<Block>, ParseError> {
	let mut blocks = Vec::new();
	let mut lines = input.split_inclusive('\n').zip(1u32..).peekable();

	while lines.peek().is_some() {
		let line_number = lines.peek().map(|(_, n)| *n).unwrap_or_default();
		let mut literal = String::new();
		let mut commands = Vec::new();
		let mut separated = false;

		for (line, number) in lines.by_ref() {
			let content = line.trim_end_matches(['\n', '\r']);
			if content == "---" {
				separated = true;
				break;
			}
			literal.push_str(line);
			if content.trim().is_empty() || is_comment(content) {
				continue;
			}
			commands.push(parse_command(content, number)?);
		}

		if !separated {
			if !commands.is_empty() {
				return Err(ParseError {
					message: "expected --- after commands".to_string(),
					line: line_number,
					text: literal,
				});
			}
			// trailing comments
			blocks.push(Block {
				literal,
				commands,
				line_number,
			});
			break;
		}
		if commands.is_empty() {
			return Err(ParseError {
				message: "block without commands".to_string(),
				line: line_number,
				text: literal,
			});
		}

		// the expected output runs up to the next blank line
		for (line, _) in lines.by_ref() {
			if line.trim_end_matches(['\n', '\r']).is_empty() {
				break;
			}
		}

		blocks.push(Block {
			literal,
			commands,
			line_number,
		});
	}

	Ok(blocks)
}

pub(crate) fn parse_command(line: &str, line_number: u32) -> Result<Command, ParseError> {
	let error = |message: &str| ParseError {
		message: message.to_string(),
		line: line_number,
		text: line.to_string(),
	};

	if line.starts_with(char::is_whitespace) {
		return Err(error("command cannot start with whitespace"));
	}
	let (fail, line) = match line.strip_prefix('!') {
		Some(rest) => (true, rest),
		None => (false, line),
	};

	let mut tokens = tokenize(line).map_err(|message| error(&message))?.into_iter();
	let Some(Token {
		text: name,
		quoted: false,
		..
	}) = tokens.next()
	else {
		return Err(error("expected command name"));
	};

	let args = tokens
		.map(|token| Argument {
			key: token.key,
			value: token.text,
		})
		.collect();

	Ok(Command {
		name,
		args,
		fail,
		line_number,
	})
}

struct Token {
	key: Option<String>,
	text: String,
	quoted: bool,
}

fn tokenize(line: &str) -> Result<Vec<Token>, String> {
	let mut tokens = Vec::new();
	let mut chars = line.chars().peekable();

	loop {
		while chars.next_if(|c| c.is_whitespace()).is_some() {}
		if chars.peek().is_none() {
			break;
		}

		let mut key = None;
		let mut text = String::new();
		let mut quoted = false;
		while let Some(&c) = chars.peek() {
			match c {
				c if c.is_whitespace() => break,
				'=' if key.is_none() && !quoted && !text.is_empty() => {
					chars.next();
					key = Some(std::mem::take(&mut text));
				}
				'"' => {
					chars.next();
					quoted = true;
					loop {
						match chars.next() {
							Some('"') => break,
							Some('\\') => match chars.next() {
								Some('n') => text.push('\n'),
								Some('t') => text.push('\t'),
								Some(c) => text.push(c),
								None => return Err("unterminated escape".to_string()),
							},
							Some(c) => text.push(c),
							None => return Err("unterminated string".to_string()),
						}
					}
				}
				'\'' => {
					chars.next();
					quoted = true;
					loop {
						match chars.next() {
							Some('\'') => break,
							Some(c) => text.push(c),
							None => return Err("unterminated string".to_string()),
						}
					}
				}
				c => {
					chars.next();
					text.push(c);
				}
			}
		}
		tokens.push(Token {
			key,
			text,
			quoted,
		});
	}

	Ok(tokens)
}
