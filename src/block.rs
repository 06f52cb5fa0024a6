//! IEEE 488.2 block framing for binary replies such as `:WAV:DATA?`.
//!
//! A definite-length block is `#`, one digit `n`, `n` digits giving the payload length, then the
//! payload. Instruments follow it with a newline. `#0` marks an indefinite block whose payload
//! runs to the final newline.

use log::trace;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
	/// `#` and the length digits
	pub header: &'a [u8],
	pub data: &'a [u8],
}

// A lone `\r` is payload, only `\n` or `\r\n` end the message
fn strip_terminator(buf:&[u8]) -> &[u8] {
	buf.strip_suffix(b"\r\n")
		.or_else(|| buf.strip_suffix(b"\n"))
		.unwrap_or(buf)
}

pub fn parse_block(buf:&[u8]) -> Result<Block<'_>> {
	let start = buf
		.iter()
		.position(|&b| b == b'#')
		.ok_or(Error::Block("no '#' in reply"))?;
	if start > 0 {
		trace!("skipping {} bytes before block header", start);
	}

	let digits = match buf.get(start + 1) {
		Some(d) if d.is_ascii_digit() => (d - b'0') as usize,
		Some(_) => return Err(Error::Block("length digit count is not a digit")),
		None => return Err(Error::Block("reply ends after '#'")),
	};

	if digits == 0 {
		let header = &buf[start..start + 2];
		return Ok(Block{ header, data: strip_terminator(&buf[start + 2..]) });
	}

	let data_start = start + 2 + digits;
	let len_field = buf
		.get(start + 2..data_start)
		.ok_or(Error::Block("reply ends inside the length field"))?;
	if !len_field.iter().all(u8::is_ascii_digit) {
		return Err(Error::Block("length field is not numeric"));
	}
	let len:usize = std::str::from_utf8(len_field)
		.ok()
		.and_then(|s| s.parse().ok())
		.ok_or(Error::Block("length field is not numeric"))?;

	let data = buf
		.get(data_start..data_start + len)
		.ok_or(Error::Block("reply is shorter than the declared length"))?;

	let trailing = buf.len() - data_start - len;
	if trailing > 1 {
		trace!("ignoring {} bytes after block payload", trailing);
	}

	Ok(Block{ header: &buf[start..data_start], data })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nine_digit_header_yields_exact_payload() {
		let mut reply = b"#9000001000".to_vec();
		reply.extend((0..1000).map(|i| (i % 256) as u8));
		reply.push(b'\n');

		let block = parse_block(&reply).unwrap();
		assert_eq!(block.header, b"#9000001000");
		assert_eq!(block.data.len(), 1000);
		assert_eq!(block.data[999], (999 % 256) as u8);
	}

	#[test]
	fn payload_may_contain_newlines() {
		let reply = b"#14\n\n\n\n\n";
		assert_eq!(parse_block(reply).unwrap().data, b"\n\n\n\n");
	}

	#[test]
	fn leading_bytes_are_skipped() {
		let block = parse_block(b"\x00 #203abc").unwrap();
		assert_eq!(block.header, b"#203");
		assert_eq!(block.data, b"abc");
	}

	#[test]
	fn indefinite_block_runs_to_newline() {
		assert_eq!(parse_block(b"#0hello\n").unwrap().data, b"hello");
		assert_eq!(parse_block(b"#0hello\r\n").unwrap().data, b"hello");
	}

	#[test]
	fn indefinite_block_keeps_a_trailing_carriage_return_byte() {
		assert_eq!(parse_block(b"#0\x01\x0d").unwrap().data, b"\x01\x0d");
		assert_eq!(parse_block(b"#0\x01\x0d\x0d\n").unwrap().data, b"\x01\x0d");
	}

	#[test]
	fn malformed_blocks() {
		assert!(parse_block(b"9000001000").is_err());
		assert!(parse_block(b"#").is_err());
		assert!(parse_block(b"#x12").is_err());
		assert!(parse_block(b"#40001").is_err());
		assert!(parse_block(b"#2a0").is_err());
		assert!(parse_block(b"#210abc\n").is_err());
	}
}
