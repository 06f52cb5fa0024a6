use std::cmp::Ordering;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::xdr::{Packer, Unpacker};
use super::{xdr_pack, xdr_unpack, LAST_FRAGMENT};

pub struct TcpClient {
	stream: TcpStream,
	pub prog: u32,
	pub vers: u32,
	pub lastxid: u32,
	pub packer: Packer,
	pub unpacker: Unpacker,
}

/// Reads one record-marked RPC message, joining fragments until the last-fragment bit is seen.
pub fn read_record<R: Read>(rdr:&mut R) -> Result<Vec<u8>> {
	let mut reply:Vec<u8> = vec![];

	let mut last:bool = false;
	while !last {
		let x:u32 = rdr.read_u32::<BigEndian>()?;

		last = (x & LAST_FRAGMENT) != 0;
		let n = (x & !LAST_FRAGMENT) as usize;

		let start = reply.len();
		reply.resize(start + n, 0);
		rdr.read_exact(&mut reply[start..])?;
	}

	Ok(reply)
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr:A, prog:u32, vers:u32, timeout:Duration) -> Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_read_timeout(Some(timeout))?;
		stream.set_write_timeout(Some(timeout))?;
		stream.set_nodelay(true)?;
		debug!("rpc connection to {:?} for program {:#x} v{}", stream.peer_addr()?, prog, vers);

		Ok(Self{ stream, prog, vers, lastxid: 0, packer: Packer::new(), unpacker: Unpacker::new() })
	}

	pub fn set_timeout(&mut self, timeout:Duration) -> Result<()> {
		self.stream.set_read_timeout(Some(timeout))?;
		self.stream.set_write_timeout(Some(timeout))?;
		Ok(())
	}

	/// Starts a new call; procedure arguments are packed into `self.packer` afterwards.
	pub fn start_call(&mut self, prc:u32) -> Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	/// Sends the packed call and loads the matching reply into `self.unpacker`.
	pub fn do_call(&mut self) -> Result<()> {
		let call:&[u8] = self.packer.as_bytes();

		let mut send_bytes:Vec<u8> = Vec::with_capacity(call.len() + 4);
		send_bytes.write_u32::<BigEndian>(call.len() as u32 | LAST_FRAGMENT)?;
		send_bytes.extend_from_slice(call);
		self.stream.write_all(&send_bytes)?;

		loop {
			let reply = read_record(&mut self.stream)?;
			self.unpacker.reset(&reply);

			let (xid, _) = xdr_unpack::unpack_replyheader(&mut self.unpacker)?;
			match xid.cmp(&self.lastxid) {
				Ordering::Equal   => return Ok(()),
				Ordering::Less    => trace!("dropping stale reply xid={} (expected {})", xid, self.lastxid),
				Ordering::Greater => return Err(Error::Rpc("received a reply with an xid that was never sent")),
			}
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn read_record_joins_fragments() {
		let mut wire:Vec<u8> = vec![];
		wire.extend_from_slice(&3u32.to_be_bytes());
		wire.extend_from_slice(b"abc");
		wire.extend_from_slice(&(2u32 | LAST_FRAGMENT).to_be_bytes());
		wire.extend_from_slice(b"de");
		wire.extend_from_slice(b"trailing");

		let mut rdr = Cursor::new(wire);
		assert_eq!(read_record(&mut rdr).unwrap(), b"abcde");
	}

	#[test]
	fn read_record_short_fragment_is_an_error() {
		let mut wire:Vec<u8> = vec![];
		wire.extend_from_slice(&(10u32 | LAST_FRAGMENT).to_be_bytes());
		wire.extend_from_slice(b"abc");

		assert!(read_record(&mut Cursor::new(wire)).is_err());
	}
}
