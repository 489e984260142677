//! Minimal "prompt, parse, reprompt on failure" stdin plumbing shared by the
//! server and client binaries. Deliberately thin: this is the interactive
//! terminal surface the design treats as an external collaborator, not a
//! place to spend craftsmanship.

use std::fmt::Display;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Prompts with `label`, parses the trimmed line as `T`, and reprompts on a
/// parse failure. Exits the process if stdin is closed (EOF) rather than
/// looping forever.
pub fn prompt<T: FromStr>(label: &str) -> T
where
	T::Err: Display,
{
	loop {
		print!("{label}: ");
		let _ = io::stdout().flush();

		let mut line = String::new();
		if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
			std::process::exit(0);
		}

		match line.trim().parse() {
			Ok(v) => return v,
			Err(e) => eprintln!("invalid input: {e}"),
		}
	}
}

/// Like [`prompt`], but rejects values outside `[lo, hi]`.
pub fn prompt_range<T>(label: &str, lo: T, hi: T) -> T
where
	T: FromStr + PartialOrd + Display,
	T::Err: Display,
{
	loop {
		let value: T = prompt(label);

		if value < lo || value > hi {
			eprintln!("value must be between {lo} and {hi}");
			continue;
		}

		return value;
	}
}

/// Prompts for a filesystem path and reprompts until it exists.
pub fn prompt_existing_path(label: &str) -> PathBuf {
	loop {
		let path: PathBuf = prompt(label);

		if path.exists() {
			return path;
		}

		eprintln!("path does not exist: {}", path.display());
	}
}
