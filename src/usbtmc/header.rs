use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

use super::constants::{msg_id, ATTR_EOM, ATTR_TERM_CHAR_ENABLED, USBTMC_HEADER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkInHeader {
	pub msg_id: u8,
	pub tag: u8,
	pub transfer_size: u32,
	pub eom: bool,
}

fn header(msg_id:u8, tag:u8, transfer_size:u32, attributes:u8, term_char:u8) -> Vec<u8> {
	let mut buf = Vec::with_capacity(USBTMC_HEADER_SIZE);
	buf.extend_from_slice(&[msg_id, tag, !tag, 0]);
	// Writing into a Vec can't fail
	let _ = buf.write_u32::<LittleEndian>(transfer_size);
	buf.extend_from_slice(&[attributes, term_char, 0, 0]);
	buf
}

/// A DEV_DEP_MSG_OUT transfer: header, payload, then zero padding to a four byte boundary.
pub fn dev_dep_msg_out(tag:u8, payload:&[u8], eom:bool) -> Vec<u8> {
	let attributes = if eom { ATTR_EOM } else { 0 };
	let mut buf = header(msg_id::DEV_DEP_MSG_OUT, tag, payload.len() as u32, attributes, 0);
	buf.extend_from_slice(payload);
	while buf.len() % 4 != 0 {
		buf.push(0);
	}
	buf
}

pub fn request_dev_dep_msg_in(tag:u8, max_len:u32, term_char:Option<u8>) -> Vec<u8> {
	match term_char {
		Some(c) => header(msg_id::REQUEST_DEV_DEP_MSG_IN, tag, max_len, ATTR_TERM_CHAR_ENABLED, c),
		None => header(msg_id::REQUEST_DEV_DEP_MSG_IN, tag, max_len, 0, 0),
	}
}

pub fn parse_bulk_in_header(buf:&[u8]) -> Result<BulkInHeader> {
	if buf.len() < USBTMC_HEADER_SIZE {
		return Err(Error::UsbTmc(format!(
			"bulk-in transfer of {} bytes is shorter than a header",
			buf.len()
		)));
	}
	if buf[1] != !buf[2] {
		return Err(Error::UsbTmc("bTag and bTagInverse disagree".to_string()));
	}

	let transfer_size = Cursor::new(&buf[4..8]).read_u32::<LittleEndian>()?;
	Ok(BulkInHeader{
		msg_id: buf[0],
		tag: buf[1],
		transfer_size,
		eom: buf[8] & ATTR_EOM != 0,
	})
}

/// bTag runs 1..=255 and never takes the value zero.
pub fn next_tag(tag:u8) -> u8 {
	match tag.wrapping_add(1) {
		0 => 1,
		t => t,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn msg_out_header_and_padding() {
		let buf = dev_dep_msg_out(1, b"*IDN?\n", true);
		assert_eq!(&buf[..12], &[1, 1, 0xFE, 0, 6, 0, 0, 0, 1, 0, 0, 0]);
		assert_eq!(&buf[12..18], b"*IDN?\n");
		assert_eq!(buf.len(), 20);
		assert!(buf[18..].iter().all(|&b| b == 0));
	}

	#[test]
	fn request_in_header() {
		let buf = request_dev_dep_msg_in(0x10, 0x1000, Some(b'\n'));
		assert_eq!(buf, vec![2, 0x10, 0xEF, 0, 0, 0x10, 0, 0, 0x02, b'\n', 0, 0]);
	}

	#[test]
	fn parses_bulk_in_header() {
		let buf = [2, 7, !7u8, 0, 0xE8, 0x03, 0, 0, 1, 0, 0, 0, b'x'];
		let head = parse_bulk_in_header(&buf).unwrap();
		assert_eq!(
			head,
			BulkInHeader{ msg_id: 2, tag: 7, transfer_size: 1000, eom: true }
		);
	}

	#[test]
	fn rejects_short_or_inconsistent_header() {
		assert!(parse_bulk_in_header(&[2, 7, 0xF8]).is_err());
		assert!(parse_bulk_in_header(&[2, 7, 7, 0, 0, 0, 0, 0, 1, 0, 0, 0]).is_err());
	}

	#[test]
	fn tag_skips_zero() {
		assert_eq!(next_tag(1), 2);
		assert_eq!(next_tag(255), 1);
	}
}
