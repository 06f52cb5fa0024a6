// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DEVICE_CLEAR:u32      = 15;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_LOCK_TIMEOUT:u32 = 10000;

pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// Reason bits in a device_read reply
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

pub const READ_REQUEST_SIZE:u32 = 1 << 20;

use std::time::Duration;

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::rpc::port_mapping::{Mapping, TcpPortMapperClient};
use crate::rpc::tcp_clients::TcpClient;
use crate::transport::Transport;

pub mod xdr_pack;

pub struct CoreClient {
	client: TcpClient,
	opt_link: Option<Link>,
	io_timeout_ms: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Link {
	pub link_id: i32,
	pub abort_port: u16,
	pub max_recv_size: u32,
}

/// Maps the error field of a core channel reply onto the crate error.
pub fn device_error(code:i32) -> Result<()> {
	let message = match code {
		0  => return Ok(()),
		1  => "Syntax error",
		3  => "Device not accessible",
		4  => "Invalid link identifier",
		5  => "Parameter error",
		6  => "Channel not established",
		8  => "Operation not supported",
		9  => "Out of resources",
		11 => "Device locked by another link",
		12 => "No lock held by this link",
		15 => "I/O timeout",
		17 => "I/O error",
		21 => "Invalid address",
		23 => "Abort",
		29 => "Channel already established",
		_  => "Unknown error",
	};
	Err(Error::Vxi11{ code, message })
}

fn millis(d:Duration) -> u32 { u32::try_from(d.as_millis()).unwrap_or(u32::MAX) }

impl CoreClient {

	fn get_link(&self) -> Result<Link> {
		self.opt_link.ok_or(Error::Rpc("no link"))
	}

	pub fn new(host:&str, timeout:Duration) -> Result<Self> {

		// Find the port to use for the core program
		let mut pmap_client = TcpPortMapperClient::new(host, timeout)?;
		let port = pmap_client.get_port(&Mapping::tcp(DEVICE_CORE_PROG, DEVICE_CORE_VERS))?;
		debug!("vxi-11 core channel for {} on port {}", host, port);

		let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, timeout)?;

		Ok(CoreClient{ client, opt_link: None, io_timeout_ms: millis(timeout) })
	}

	pub fn link(&self) -> Option<Link> { self.opt_link }

	pub fn create_link(&mut self, device:&str) -> Result<()> {
		if self.opt_link.is_some() {
			return Err(Error::Rpc("already connected to a link"));
		}

		self.client.start_call(CREATE_LINK)?;
		xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, DEFAULT_LOCK_TIMEOUT, device)?;
		self.client.do_call()?;

		let error:i32         = self.client.unpacker.unpack_i32()?;
		let link_id:i32       = self.client.unpacker.unpack_i32()?;
		let abort_port:u32    = self.client.unpacker.unpack_u32()?;
		let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;
		device_error(error)?;

		let link = Link{ link_id, abort_port: abort_port as u16, max_recv_size };
		debug!("created link {:?} to {}", link, device);
		self.opt_link = Some(link);
		Ok(())
	}

	pub fn write(&mut self, data:&[u8]) -> Result<()> {
		let link = self.get_link()?;

		// Large messages go out in pieces no bigger than the device will accept, END on the last
		let chunk_size = if link.max_recv_size == 0 { data.len().max(1) } else { link.max_recv_size as usize };
		let mut chunks = data.chunks(chunk_size).peekable();
		while let Some(chunk) = chunks.next() {
			let flags = if chunks.peek().is_none() { OPERATION_FLAGS_END_ONLY } else { 0 };

			self.client.start_call(DEVICE_WRITE)?;
			xdr_pack::pack_device_write_parms(&mut self.client.packer, link.link_id, self.io_timeout_ms, DEFAULT_LOCK_TIMEOUT, flags, chunk)?;
			self.client.do_call()?;

			let error:i32 = self.client.unpacker.unpack_i32()?;
			let size:u32  = self.client.unpacker.unpack_u32()?;
			device_error(error)?;

			if size as usize != chunk.len() {
				return Err(Error::Rpc("number of bytes in confirmation doesn't match number of bytes sent"));
			}
		}

		Ok(())
	}

	pub fn read(&mut self) -> Result<Vec<u8>> {
		let link = self.get_link()?;
		let mut ans:Vec<u8> = vec![];

		loop {
			self.client.start_call(DEVICE_READ)?;
			xdr_pack::pack_device_read_parms(&mut self.client.packer, link.link_id, READ_REQUEST_SIZE, self.io_timeout_ms, DEFAULT_LOCK_TIMEOUT, 0, 0)?;
			self.client.do_call()?;

			let error:i32  = self.client.unpacker.unpack_i32()?;
			let reason:i32 = self.client.unpacker.unpack_i32()?;
			let data       = self.client.unpacker.unpack_variable_len_opaque()?;
			device_error(error)?;
			trace!("device_read returned {} bytes, reason {:#b}", data.len(), reason);
			ans.extend_from_slice(&data);

			if reason & REASON_END != 0 {
				return Ok(ans);
			} else if reason & (REASON_REQCNT | REASON_CHR) == 0 {
				return Err(Error::Rpc("device_read reply has no reason bits set"));
			}
		}
	}

	pub fn device_clear(&mut self) -> Result<()> {
		let link = self.get_link()?;

		self.client.start_call(DEVICE_CLEAR)?;
		xdr_pack::pack_device_generic_parms(&mut self.client.packer, link.link_id, 0, DEFAULT_LOCK_TIMEOUT, self.io_timeout_ms)?;
		self.client.do_call()?;

		device_error(self.client.unpacker.unpack_i32()?)
	}

	pub fn destroy_link(&mut self) -> Result<()> {
		let link = self.get_link()?;

		self.client.start_call(DESTROY_LINK)?;
		xdr_pack::pack_device_link(&mut self.client.packer, link.link_id)?;
		self.client.do_call()?;
		self.opt_link = None;

		device_error(self.client.unpacker.unpack_i32()?)
	}

}

impl Transport for CoreClient {
	fn write_raw(&mut self, data:&[u8]) -> Result<()> { self.write(data) }
	fn read_raw(&mut self) -> Result<Vec<u8>> { self.read() }
	fn clear(&mut self) -> Result<()> { self.device_clear() }

	fn set_timeout(&mut self, timeout:Duration) -> Result<()> {
		self.io_timeout_ms = millis(timeout);
		self.client.set_timeout(timeout)
	}
}

impl Drop for CoreClient {

	fn drop(&mut self) {
		if self.opt_link.is_some() {
			if let Err(e) = self.destroy_link() {
				warn!("unable to destroy vxi-11 link: {}", e);
			}
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn device_error_codes() {
		assert!(device_error(0).is_ok());
		assert!(matches!(device_error(15), Err(Error::Vxi11{ code: 15, message: "I/O timeout" })));
		assert!(matches!(device_error(99), Err(Error::Vxi11{ code: 99, message: "Unknown error" })));
	}
}
