use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::error::{Error, Result};

use super::Transport;

#[derive(Debug, Default)]
struct Inner {
	replies: VecDeque<Vec<u8>>,
	written: Vec<Vec<u8>>,
}

/// A scripted transport for exercising instrument code without hardware.
///
/// Replies are handed out in the order they were queued, one per `read_raw`. Everything written
/// is recorded. Clones share the same script, so a test can keep one handle while the instrument
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
	inner: Rc<RefCell<Inner>>,
}

impl LoopbackTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue a reply, sent as-is.
	pub fn push_reply(&self, reply:impl AsRef<[u8]>) -> &Self {
		self.inner
			.borrow_mut()
			.replies
			.push_back(reply.as_ref().to_vec());
		self
	}

	/// Queue a text reply terminated by a newline, the way the instrument sends them.
	pub fn push_line(&self, line:&str) -> &Self {
		self.push_reply(format!("{}\n", line))
	}

	/// All messages written so far, lossily decoded and with trailing newlines removed.
	pub fn written(&self) -> Vec<String> {
		self.inner
			.borrow()
			.written
			.iter()
			.map(|m| String::from_utf8_lossy(m).trim_end().to_string())
			.collect()
	}

	pub fn pending_replies(&self) -> usize {
		self.inner.borrow().replies.len()
	}
}

impl Transport for LoopbackTransport {
	fn write_raw(&mut self, data:&[u8]) -> Result<()> {
		self.inner.borrow_mut().written.push(data.to_vec());
		Ok(())
	}

	fn read_raw(&mut self) -> Result<Vec<u8>> {
		self.inner.borrow_mut().replies.pop_front().ok_or_else(|| {
			Error::Io(io::Error::new(
				io::ErrorKind::TimedOut,
				"loopback transport has no reply queued",
			))
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn replies_come_back_in_order() {
		let loopback = LoopbackTransport::new();
		loopback.push_line("first").push_line("second");

		let mut transport = loopback.clone();
		transport.write_raw(b"*IDN?\n").unwrap();
		assert_eq!(transport.read_raw().unwrap(), b"first\n");
		assert_eq!(transport.read_raw().unwrap(), b"second\n");
		assert!(transport.read_raw().is_err());
		assert_eq!(loopback.written(), vec!["*IDN?"]);
	}
}
