pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_NULL:u32    = 0;     // (void) -> void
pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int

use std::net::IpAddr;
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

use super::{IPPROTO_TCP, IPPROTO_UDP};
use super::xdr_pack;
use super::tcp_clients::TcpClient;
use super::udp_clients::BroadcastUdpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
	TCP,
	UDP,
}

impl Protocol {
	pub fn to_u32(&self) -> u32 { match self {
		Protocol::TCP => IPPROTO_TCP,
		Protocol::UDP => IPPROTO_UDP,
	}}
}

#[derive(Debug, Clone, Copy)]
pub struct Mapping {
	pub program: u32,
	pub version: u32,
	pub protocol: Protocol,
	pub port: u32,
}

impl Mapping {
	pub fn tcp(program:u32, version:u32) -> Self {
		Self{ program, version, protocol: Protocol::TCP, port: 0 }
	}
}

pub struct TcpPortMapperClient {
	tcp_client: TcpClient,
}

impl TcpPortMapperClient {

	pub fn new(host:&str, timeout:Duration) -> Result<Self> {
		let tcp_client = TcpClient::connect((host, PMAP_PORT), PMAP_PROG, PMAP_VERS, timeout)?;
		Ok(Self{ tcp_client })
	}

	/// Looks up the port a program is registered on.  A zero port means the program isn't registered.
	pub fn get_port(&mut self, m:&Mapping) -> Result<u16> {
		self.tcp_client.start_call(PMAPPROC_GETPORT)?;
		xdr_pack::pack_mapping(&mut self.tcp_client.packer, m.program, m.version, m.protocol.to_u32(), m.port)?;
		self.tcp_client.do_call()?;

		let port:u32 = self.tcp_client.unpacker.unpack_u32()?;
		if !self.tcp_client.unpacker.all_data_consumed() {
			return Err(Error::Rpc("data unexpectedly left over after unpacking port"));
		}

		match u16::try_from(port) {
			Ok(0)  => Err(Error::Rpc("program is not registered with the port mapper")),
			Ok(p)  => Ok(p),
			Err(_) => Err(Error::Rpc("port mapper returned a port outside the u16 range")),
		}
	}

}

/// Broadcasts a GETPORT request and returns every host that has the program registered.
pub fn discover(m:&Mapping, timeout:Duration) -> Result<Vec<(IpAddr, u16)>> {
	let mut client = BroadcastUdpClient::bind(PMAP_PORT, PMAP_PROG, PMAP_VERS, timeout)?;
	client.start_call(PMAPPROC_GETPORT)?;
	xdr_pack::pack_mapping(&mut client.packer, m.program, m.version, m.protocol.to_u32(), m.port)?;

	let mut hosts:Vec<(IpAddr, u16)> = vec![];
	for (addr, mut results) in client.make_call()? {
		match results.unpack_u32() {
			Ok(port) if port > 0 && port <= u16::MAX as u32 => hosts.push((addr.ip(), port as u16)),
			Ok(_)  => debug!("{} answered but doesn't have program {:#x} registered", addr, m.program),
			Err(e) => debug!("ignoring malformed port mapper reply from {}: {}", addr, e),
		}
	}

	hosts.sort();
	hosts.dedup();
	Ok(hosts)
}
