//! Utilities for command handlers.

use std::io::{self, ErrorKind, Write};

/// Link printed with every deprecation notice.
const KUBECTL_INSTALL_URL: &str = "https://kubernetes.io/docs/tasks/tools/install-kubectl";

/// Print the notice for a deprecated subcommand to stderr.
pub fn warn_deprecated(command: &str, replacement: &str) {
	eprintln!("Command {command:?} is deprecated, {}", deprecation_message(replacement));
}

fn deprecation_message(replacement: &str) -> String {
	format!("use `{replacement}` instead (see {KUBECTL_INSTALL_URL})")
}

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write. This allows commands to exit cleanly when
/// output is piped to a process that closes early (e.g., `meshctl get all | head -1`).
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}
