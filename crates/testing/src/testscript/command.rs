// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::VecDeque, error::Error, str::FromStr};

/// A group of commands sharing one expected output.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
	/// The commands as written, comments included.
	pub literal: String,
	pub commands: Vec<Command>,
	pub line_number: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
	pub name: String,
	pub args: Vec<Argument>,
	/// Expected to fail.
	pub fail: bool,
	pub line_number: u32,
}

impl Command {
	pub fn consume_args(&self) -> ArgumentConsumer<'_> {
		ArgumentConsumer {
			args: self.args.iter().collect(),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
	pub key: Option<String>,
	pub value: String,
}

impl Argument {
	pub fn parse<T>(&self) -> Result<T, Box<dyn Error>>
	where
		T: FromStr,
		T::Err: Error + 'static,
	{
		self.value.parse::<T>().map_err(|err| format!("invalid argument '{}': {err}", self.value).into())
	}
}

/// Hands out the arguments of a command one at a time.
pub struct ArgumentConsumer<'a> {
	args: VecDeque<&'a Argument>,
}

impl<'a> ArgumentConsumer<'a> {
	/// Removes and returns the next positional argument.
	pub fn next_pos(&mut self) -> Option<&'a Argument> {
		let at = self.args.iter().position(|arg| arg.key.is_none())?;
		self.args.remove(at)
	}

	/// Removes and returns the next keyed argument.
	pub fn next_key(&mut self) -> Option<&'a Argument> {
		let at = self.args.iter().position(|arg| arg.key.is_some())?;
		self.args.remove(at)
	}

	/// Removes and returns the last argument with the given key.
	pub fn lookup(&mut self, key: &str) -> Option<&'a Argument> {
		let mut found = None;
		self.args.retain(|arg| {
			if arg.key.as_deref() == Some(key) {
				found = Some(*arg);
				false
			} else {
				true
			}
		});
		found
	}

	pub fn lookup_parse<T>(&mut self, key: &str) -> Result<Option<T>, Box<dyn Error>>
	where
		T: FromStr,
		T::Err: Error + 'static,
	{
		self.lookup(key).map(|arg| arg.parse()).transpose()
	}

	/// Remaining positional arguments, in order.
	pub fn rest_pos(&mut self) -> Vec<&'a Argument> {
		let mut rest = Vec::new();
		while let Some(arg) = self.next_pos() {
			rest.push(arg);
		}
		rest
	}

	/// Fails if any argument was not consumed.
	pub fn reject_rest(&self) -> Result<(), Box<dyn Error>> {
		match self.args.front() {
			Some(arg) => match &arg.key {
				Some(key) => Err(format!("unexpected argument '{key}={}'", arg.value).into()),
				None => Err(format!("unexpected argument '{}'", arg.value).into()),
			},
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn arg(key: Option<&str>, value: &str) -> Argument {
		Argument {
			key: key.map(str::to_string),
			value: value.to_string(),
		}
	}

	#[test]
	fn test_consume() {
		let command = Command {
			name: "versions".to_string(),
			args: vec![arg(None, "a"), arg(Some("order"), "pos"), arg(None, "b"), arg(Some("limit"), "3")],
			fail: false,
			line_number: 1,
		};
		let mut args = command.consume_args();
		assert_eq!(args.next_pos().unwrap().value, "a");
		assert_eq!(args.lookup_parse::<u32>("limit").unwrap(), Some(3));
		assert!(args.reject_rest().is_err());
		assert_eq!(args.lookup("order").unwrap().value, "pos");
		assert_eq!(args.rest_pos().len(), 1);
		assert!(args.reject_rest().is_ok());
		assert!(args.next_key().is_none());
	}

	#[test]
	fn test_parse_error() {
		let argument = arg(None, "x");
		assert!(argument.parse::<u32>().unwrap_err().to_string().contains("invalid argument 'x'"));
	}
}
