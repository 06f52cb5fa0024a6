use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::xdr::{Packer, Unpacker};
use super::{xdr_pack, xdr_unpack};

pub struct BroadcastUdpClient {
	socket: UdpSocket,
	pub prog: u32,
	pub vers: u32,
	pub port: u16,
	pub lastxid: u32,
	pub packer: Packer,
	recv_buff: [u8; 8192],
}

impl BroadcastUdpClient {

	pub fn bind(port:u16, prog:u32, vers:u32, timeout:Duration) -> Result<Self> {
		let socket:UdpSocket = UdpSocket::bind("0.0.0.0:0")?;
		socket.set_read_timeout(Some(timeout))?;
		socket.set_broadcast(true)?;

		Ok(Self{ socket, prog, vers, port, lastxid: 0, packer: Packer::new(), recv_buff: [0; 8192] })
	}

	pub fn start_call(&mut self, prc:u32) -> Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	/// Broadcasts the packed call and collects replies until the read timeout expires.  Each
	/// unpacker is positioned just past the reply header.
	pub fn make_call(&mut self) -> Result<Vec<(SocketAddr, Unpacker)>> {
		let call:&[u8] = self.packer.as_bytes();
		let n = self.socket.send_to(call, ("255.255.255.255", self.port))?;
		if n != call.len() {
			return Err(Error::Rpc("sent the wrong number of bytes"));
		}

		let mut replies:Vec<(SocketAddr, Unpacker)> = vec![];
		while let Ok((n, addr)) = self.socket.recv_from(&mut self.recv_buff) {
			let mut unpacker = Unpacker::new();
			unpacker.reset(&self.recv_buff[..n]);

			match xdr_unpack::unpack_replyheader(&mut unpacker) {
				Ok((xid, _)) if xid == self.lastxid => replies.push((addr, unpacker)),
				Ok((xid, _)) => trace!("ignoring reply from {} with xid {}", addr, xid),
				Err(e) => debug!("ignoring reply from {}: {}", addr, e),
			}
		}

		Ok(replies)
	}

}
