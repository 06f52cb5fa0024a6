use std::io::{Cursor, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct Packer {
	buff: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Unpacker {
	buff: Vec<u8>,
	pos: usize,
}

fn padding(len:usize) -> usize { (4 - len % 4) % 4 }

impl Packer {

	pub fn new() -> Self { Self::default() }

	pub fn reset(&mut self) { self.buff.clear(); }

	pub fn as_bytes(&self) -> &[u8] { &self.buff }

	// Packing methods that can only add multiples of four bytes, so if we started off with the correct
	// padding, we'll end up with the correct padding
	pub fn pack_u32(&mut self, x:u32) -> Result<()> { Ok(self.buff.write_u32::<BigEndian>(x)?) }
	pub fn pack_i32(&mut self, x:i32) -> Result<()> { Ok(self.buff.write_i32::<BigEndian>(x)?) }
	pub fn pack_enum(&mut self, x:i32) -> Result<()> { self.pack_i32(x) }
	pub fn pack_bool(&mut self, b:bool) -> Result<()> { self.pack_i32(b as i32) }

	pub fn pack_variable_len_opaque(&mut self, data:&[u8]) -> Result<()> {
		let len = u32::try_from(data.len()).map_err(|_| Error::Xdr("opaque data longer than u32::MAX"))?;
		self.pack_u32(len)?;
		self.buff.write_all(data)?;
		self.buff.extend(std::iter::repeat(0).take(padding(data.len())));
		Ok(())
	}

	pub fn pack_string(&mut self, s:&str) -> Result<()> {
		if !s.is_ascii() {
			return Err(Error::Xdr("XDR strings must be ASCII"));
		}
		self.pack_variable_len_opaque(s.as_bytes())
	}

}

impl Unpacker {

	pub fn new() -> Self { Self::default() }

	pub fn reset(&mut self, data:&[u8]) {
		self.buff.clear();
		self.buff.extend_from_slice(data);
		self.pos = 0;
	}

	pub fn remaining(&self) -> &[u8] { &self.buff[self.pos..] }
	pub fn all_data_consumed(&self) -> bool { self.pos >= self.buff.len() }

	fn skip(&mut self, n:usize) -> Result<()> {
		if self.pos + n > self.buff.len() {
			return Err(Error::Xdr("tried to read past the end of the buffer"));
		}
		self.pos += n;
		Ok(())
	}

	pub fn unpack_u32(&mut self) -> Result<u32> {
		let ans = Cursor::new(self.remaining()).read_u32::<BigEndian>()
			.map_err(|_| Error::Xdr("tried to read past the end of the buffer"))?;
		self.skip(4)?;
		Ok(ans)
	}

	pub fn unpack_i32(&mut self) -> Result<i32> {
		let ans = Cursor::new(self.remaining()).read_i32::<BigEndian>()
			.map_err(|_| Error::Xdr("tried to read past the end of the buffer"))?;
		self.skip(4)?;
		Ok(ans)
	}

	// An enum is just an i32 with a restricted set of values.  We can't check that this value is in the restricted set at this
	// level because it depends on the application, so for our purposes here, an enum is the same as an i32
	pub fn unpack_enum(&mut self) -> Result<i32> { self.unpack_i32() }

	pub fn unpack_bool(&mut self) -> Result<bool> {
		match self.unpack_i32()? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(Error::Xdr("expected 0 or 1 for a boolean")),
		}
	}

	pub fn unpack_variable_len_opaque(&mut self) -> Result<Vec<u8>> {
		let n = self.unpack_u32()? as usize;
		if self.remaining().len() < n {
			return Err(Error::Xdr("opaque length runs past the end of the buffer"));
		}
		let ans = self.remaining()[..n].to_vec();
		self.skip(n)?;

		// The sender may omit trailing padding on the last item
		let pad = padding(n).min(self.remaining().len());
		self.skip(pad)?;
		Ok(ans)
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn opaque_is_padded_to_four_bytes() {
		let mut packer = Packer::new();
		packer.pack_variable_len_opaque(b"inst0").unwrap();
		assert_eq!(packer.as_bytes(), &[0, 0, 0, 5, b'i', b'n', b's', b't', b'0', 0, 0, 0]);
	}

	#[test]
	fn unpack_consumes_padding() {
		let mut packer = Packer::new();
		packer.pack_variable_len_opaque(b"abc").unwrap();
		packer.pack_i32(-7).unwrap();

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.as_bytes());
		assert_eq!(unpacker.unpack_variable_len_opaque().unwrap(), b"abc");
		assert_eq!(unpacker.unpack_i32().unwrap(), -7);
		assert!(unpacker.all_data_consumed());
	}

	#[test]
	fn truncated_buffer_is_an_error() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&[0, 0, 0, 8, 1, 2]);
		assert!(unpacker.unpack_variable_len_opaque().is_err());

		unpacker.reset(&[0, 1]);
		assert!(unpacker.unpack_u32().is_err());
	}

	#[test]
	fn bool_rejects_other_values() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&[0, 0, 0, 2]);
		assert!(unpacker.unpack_bool().is_err());
	}
}
