// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	error::Error,
	fs,
	io::{self, ErrorKind, Write as _},
	path::Path,
};

use goldenfile::Mint;

use crate::{
	tempdir::temp_dir,
	testscript::{command::Command, parser::parse},
};

/// Runs script commands, returning their output.
pub trait Runner {
	/// Runs one command. Errors are printed as the output of commands
	/// prefixed with `!` and fail the script otherwise.
	fn run(&mut self, command: &Command) -> Result<String, Box<dyn Error>>;

	/// Called before the first block.
	fn start_script(&mut self) -> Result<(), Box<dyn Error>> {
		Ok(())
	}

	/// Called after the last block, e.g. for final state assertions.
	fn end_script(&mut self) -> Result<(), Box<dyn Error>> {
		Ok(())
	}

	/// Output prepended to the block's output.
	fn start_block(&mut self) -> Result<String, Box<dyn Error>> {
		Ok(String::new())
	}

	/// Output appended to the block's output.
	fn end_block(&mut self) -> Result<String, Box<dyn Error>> {
		Ok(String::new())
	}
}

/// Runs the script at `path` and panics with a diff when the produced output
/// differs from the file. With `UPDATE_GOLDENFILES=1` the file is rewritten
/// instead. Files ending in `.skip` are ignored.
pub fn run_path<R: Runner, P: AsRef<Path>>(runner: &mut R, path: P) -> io::Result<()> {
	let path = path.as_ref();
	let invalid = || io::Error::new(ErrorKind::InvalidInput, format!("invalid path '{}'", path.display()));
	let dir = path.parent().ok_or_else(invalid)?;
	let filename = path.file_name().ok_or_else(invalid)?;

	if filename.to_string_lossy().ends_with(".skip") {
		return Ok(());
	}

	let input = fs::read_to_string(path)?;
	let output = generate(runner, &input)?;

	Mint::new(dir).new_goldenfile(filename)?.write_all(output.as_bytes())
}

/// Runs an inline script, panicking when its output differs from the input.
pub fn run<R: Runner, S: Into<String>>(runner: R, script: S) {
	if let Err(err) = try_run(runner, script) {
		panic!("script failed: {err}");
	}
}

pub fn try_run<R: Runner, S: Into<String>>(mut runner: R, script: S) -> io::Result<()> {
	let input = script.into();
	temp_dir(|dir| {
		let filename = "script.txt";
		fs::write(dir.join(filename), &input)?;
		let output = generate(&mut runner, &input)?;
		Mint::new(dir).new_goldenfile(filename)?.write_all(output.as_bytes())
	})
}

/// Runs every block of `input`, returning the script with freshly generated
/// outputs.
pub fn generate<R: Runner>(runner: &mut R, input: &str) -> io::Result<String> {
	let mut output = String::with_capacity(input.len());
	let blocks = parse(input).map_err(|err| io::Error::new(ErrorKind::InvalidInput, err.to_string()))?;

	runner.start_script().map_err(|err| io::Error::other(format!("start_script failed: {err}")))?;

	for (i, block) in blocks.iter().enumerate() {
		if block.commands.is_empty() {
			output.push_str(&block.literal);
			continue;
		}

		let mut block_output = ensure_eol(
			runner.start_block()
				.map_err(|err| io::Error::other(format!("start_block failed at line {}: {err}", block.line_number)))?,
		);

		for command in &block.commands {
			let result = match runner.run(command) {
				Ok(result) if command.fail => {
					return Err(io::Error::other(format!(
						"expected command '{}' to fail at line {}, succeeded with: {result}",
						command.name, command.line_number
					)));
				}
				Ok(result) => result,
				Err(err) if command.fail => err.to_string(),
				Err(err) => {
					return Err(io::Error::other(format!(
						"command '{}' failed at line {}: {err}",
						command.name, command.line_number
					)));
				}
			};
			block_output.push_str(&ensure_eol(result));
		}

		block_output.push_str(&ensure_eol(
			runner.end_block()
				.map_err(|err| io::Error::other(format!("end_block failed at line {}: {err}", block.line_number)))?,
		));

		if block_output.is_empty() {
			block_output.push_str("ok\n");
		}
		// blank lines would end the block, prefix every line instead
		if block_output.starts_with('\n') || block_output.contains("\n\n") {
			block_output = format!("> {}", block_output.replace('\n', "\n> "));
			block_output.truncate(block_output.len() - 2);
		}

		output.push_str(&block.literal);
		output.push_str("---\n");
		output.push_str(&block_output);
		if i < blocks.len() - 1 {
			output.push('\n');
		}
	}

	runner.end_script().map_err(|err| io::Error::other(format!("end_script failed: {err}")))?;
	Ok(output)
}

fn ensure_eol(mut s: String) -> String {
	if !s.is_empty() && !s.ends_with('\n') {
		s.push('\n');
	}
	s
}
