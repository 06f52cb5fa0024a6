//! A small VISA-like resource manager: resource strings in, [`Instrument`] sessions out.
//!
//! The backend is picked from the resource prefix. `USB` resources go over USB-TMC and
//! `TCPIP` resources over VXI-11.

use std::thread;
use std::time::Duration;

use log::{debug, info, trace};

use crate::block;
use crate::error::{Error, Result};
use crate::rpc::port_mapping::{self, Mapping};
use crate::transport::Transport;
use crate::usbtmc::{self, UsbTmcDevice};
use crate::vxi11::{CoreClient, DEVICE_CORE_PROG, DEVICE_CORE_VERS};

mod resource;

pub use resource::{ResourceName, DEFAULT_LAN_DEVICE};

pub const DEFAULT_TIMEOUT:Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ResourceManager {
	timeout: Duration,
	discover_lan: bool,
}

impl Default for ResourceManager {
	fn default() -> Self {
		Self{ timeout: DEFAULT_TIMEOUT, discover_lan: false }
	}
}

impl ResourceManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_timeout(mut self, timeout:Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Also broadcast for VXI-11 instruments on the local network when listing.
	pub fn with_lan_discovery(mut self, discover:bool) -> Self {
		self.discover_lan = discover;
		self
	}

	pub fn list_resources(&self) -> Result<Vec<ResourceName>> {
		let mut resources:Vec<ResourceName> = usbtmc::list_devices()?
			.into_iter()
			.filter_map(|d| match d.serial {
				Some(serial) => Some(ResourceName::Usb{ board: 0, vendor_id: d.vendor_id, product_id: d.product_id, serial, interface: None }),
				None => {
					debug!("skipping USB-TMC device {:04X}:{:04X} without a serial number", d.vendor_id, d.product_id);
					None
				}
			})
			.collect();

		if self.discover_lan {
			let mapping = Mapping::tcp(DEVICE_CORE_PROG, DEVICE_CORE_VERS);
			for (addr, _) in port_mapping::discover(&mapping, self.timeout)? {
				resources.push(ResourceName::Tcpip{ board: 0, host: addr.to_string(), device: DEFAULT_LAN_DEVICE.to_owned() });
			}
		}

		Ok(resources)
	}

	/// Only the USB instruments.
	pub fn list_usb_devices(&self) -> Result<Vec<ResourceName>> {
		Ok(self.list_resources()?.into_iter().filter(ResourceName::is_usb).collect())
	}

	pub fn open_resource(&self, resource:&str) -> Result<Instrument> {
		self.open(&resource.parse()?)
	}

	pub fn open(&self, resource:&ResourceName) -> Result<Instrument> {
		let mut transport:Box<dyn Transport> = match resource {
			ResourceName::Usb{ vendor_id, product_id, serial, interface, .. } => {
				Box::new(UsbTmcDevice::open(*vendor_id, *product_id, Some(serial.as_str()), *interface)?)
			}
			ResourceName::Tcpip{ host, device, .. } => {
				let mut core = CoreClient::new(host, self.timeout)?;
				core.create_link(device)?;
				Box::new(core)
			}
		};
		transport.set_timeout(self.timeout)?;

		info!("opened {}", resource);
		Ok(Instrument::new(resource.to_string(), transport))
	}
}

/// An open session with one instrument. Dropping it closes the link.
pub struct Instrument {
	resource: String,
	transport: Box<dyn Transport>,
	query_delay: Duration,
}

impl Instrument {
	pub fn new(resource:impl Into<String>, transport:Box<dyn Transport>) -> Self {
		Self{ resource: resource.into(), transport, query_delay: Duration::ZERO }
	}

	pub fn resource(&self) -> &str {
		&self.resource
	}

	/// Pause between writing a query and reading its reply.
	pub fn set_query_delay(&mut self, delay:Duration) {
		self.query_delay = delay;
	}

	pub fn set_timeout(&mut self, timeout:Duration) -> Result<()> {
		self.transport.set_timeout(timeout)
	}

	pub fn clear(&mut self) -> Result<()> {
		self.transport.clear()
	}

	pub fn write(&mut self, message:&str) -> Result<()> {
		debug!("{} <- {}", self.resource, message);
		let mut data = Vec::with_capacity(message.len() + 1);
		data.extend_from_slice(message.as_bytes());
		data.push(b'\n');
		self.transport.write_raw(&data)
	}

	pub fn read_raw(&mut self) -> Result<Vec<u8>> {
		let data = self.transport.read_raw()?;
		trace!("{} -> {} bytes", self.resource, data.len());
		Ok(data)
	}

	fn ask(&mut self, message:&str) -> Result<Vec<u8>> {
		self.write(message)?;
		if !self.query_delay.is_zero() {
			thread::sleep(self.query_delay);
		}
		self.read_raw()
	}

	/// Text query with the trailing line terminator removed.
	pub fn query(&mut self, message:&str) -> Result<String> {
		let reply = String::from_utf8(self.ask(message)?)?;
		let reply = reply.trim_end_matches(['\n', '\r']).to_owned();
		debug!("{} -> {}", self.resource, reply);
		Ok(reply)
	}

	pub fn query_f64(&mut self, message:&str) -> Result<f64> {
		let reply = self.query(message)?;
		reply.trim().parse().map_err(|_| Error::parse(message, &reply))
	}

	/// Binary block query. Returns the block header and the payload with framing removed.
	pub fn query_raw(&mut self, message:&str) -> Result<(Vec<u8>, Vec<u8>)> {
		let reply = self.ask(message)?;
		let block = block::parse_block(&reply)?;
		debug!(
			"{} -> block {} with {} bytes",
			self.resource,
			String::from_utf8_lossy(block.header),
			block.data.len()
		);
		Ok((block.header.to_vec(), block.data.to_vec()))
	}
}
