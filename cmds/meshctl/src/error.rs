//! Multi-cause error used to report partial batch failures.

use std::{error::Error as StdError, fmt};

/// Render an error and its source chain as `outer: inner: root`.
pub fn chain(err: &(dyn StdError + 'static)) -> String {
	let mut message = err.to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}
	message
}

/// Every failure of a batch, in the order they happened.
#[derive(Debug)]
pub struct AggregateError {
	causes: Vec<Box<dyn StdError + Send + Sync + 'static>>,
}

impl AggregateError {
	pub fn new(causes: Vec<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
		Self { causes }
	}

	pub fn causes(&self) -> &[Box<dyn StdError + Send + Sync + 'static>] {
		&self.causes
	}

	pub fn len(&self) -> usize {
		self.causes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.causes.is_empty()
	}
}

impl fmt::Display for AggregateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.causes.len() {
			1 => writeln!(f, "1 error occurred:")?,
			n => writeln!(f, "{n} errors occurred:")?,
		}
		for cause in &self.causes {
			writeln!(f, "\t* {}", chain(cause.as_ref()))?;
		}
		Ok(())
	}
}

impl StdError for AggregateError {}
