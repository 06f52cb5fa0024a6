//! USB Test & Measurement Class transport.
//!
//! Commands go out as DEV_DEP_MSG_OUT transfers on the bulk-out endpoint. A read sends
//! REQUEST_DEV_DEP_MSG_IN and collects DEV_DEP_MSG_IN transfers from the bulk-in endpoint until
//! one carries the EOM bit.

use std::time::Duration;

use futures_lite::future::block_on;
use log::{debug, trace};
use nusb::transfer::{Control, ControlType, Direction, EndpointType, Recipient, RequestBuffer};
use nusb::{DeviceInfo, Interface};

use crate::error::{Error, Result};
use crate::transport::Transport;

pub mod constants;
pub mod header;

use constants::{
	control_request, msg_id, status, DEFAULT_TIMEOUT, READ_CHUNK_SIZE, USBTMC_CLASS_CODE,
	USBTMC_HEADER_SIZE, USBTMC_SUBCLASS_CODE,
};

/// A USB-TMC instrument found on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbTmcInfo {
	pub vendor_id: u16,
	pub product_id: u16,
	pub serial: Option<String>,
	pub interface: u8,
	pub product: Option<String>,
}

/// Picks a USB-TMC interface out of `(class, subclass, number)` triples: the one numbered
/// `wanted` when given, otherwise the first.
fn select_interface<I: IntoIterator<Item=(u8, u8, u8)>>(interfaces:I, wanted:Option<u8>) -> Option<u8> {
	interfaces.into_iter()
		.filter(|&(class, subclass, _)| class == USBTMC_CLASS_CODE && subclass == USBTMC_SUBCLASS_CODE)
		.map(|(_, _, number)| number)
		.find(|&number| wanted.map_or(true, |w| w == number))
}

fn tmc_interface(info:&DeviceInfo, wanted:Option<u8>) -> Option<u8> {
	select_interface(info.interfaces().map(|i| (i.class(), i.subclass(), i.interface_number())), wanted)
}

pub fn list_devices() -> Result<Vec<UsbTmcInfo>> {
	let devices = nusb::list_devices()?
		.filter_map(|info| {
			let interface = tmc_interface(&info, None)?;
			Some(UsbTmcInfo{
				vendor_id: info.vendor_id(),
				product_id: info.product_id(),
				serial: info.serial_number().map(str::to_owned),
				interface,
				product: info.product_string().map(str::to_owned),
			})
		})
		.collect();
	Ok(devices)
}

pub struct UsbTmcDevice {
	interface: Interface,
	interface_number: u8,
	bulk_out: u8,
	bulk_in: u8,
	max_packet_size: usize,
	tag: u8,
	timeout: Duration,
}

impl UsbTmcDevice {
	/// Opens the first USB-TMC device matching the ids, and the serial number when one is given.
	/// `interface` selects a specific USB-TMC interface on composite devices.
	pub fn open(vendor_id:u16, product_id:u16, serial:Option<&str>, interface:Option<u8>) -> Result<Self> {
		let info = nusb::list_devices()?
			.find(|d| d.vendor_id() == vendor_id && d.product_id() == product_id && serial.map_or(true, |s| d.serial_number() == Some(s)))
			.ok_or_else(|| Error::ResourceNotFound(format!("USB device {:04X}:{:04X} serial {}", vendor_id, product_id, serial.unwrap_or("*"))))?;

		let interface_number = tmc_interface(&info, interface).ok_or_else(|| match interface {
			Some(n) => Error::UsbTmc(format!("interface {} of {:04X}:{:04X} is not a USB-TMC interface", n, vendor_id, product_id)),
			None    => Error::UsbTmc(format!("device {:04X}:{:04X} has no USB-TMC interface", vendor_id, product_id)),
		})?;

		let device = info.open()?;
		// The kernel usbtmc driver usually owns the interface already
		let interface = device.detach_and_claim_interface(interface_number)?;

		let mut bulk_out = None;
		let mut bulk_in = None;
		let mut max_packet_size = 64;
		for alt in interface.descriptors() {
			for ep in alt.endpoints() {
				if ep.transfer_type() != EndpointType::Bulk {
					continue;
				}
				match ep.direction() {
					Direction::Out => bulk_out = Some(ep.address()),
					Direction::In => {
						bulk_in = Some(ep.address());
						max_packet_size = ep.max_packet_size();
					}
				}
			}
		}

		let (bulk_out, bulk_in) = match (bulk_out, bulk_in) {
			(Some(o), Some(i)) => (o, i),
			_ => return Err(Error::UsbTmc("missing bulk endpoints".to_string())),
		};

		debug!(
			"opened USB-TMC{:04X}:{:04X} interface {} (out {:#04x}, in {:#04x})",
			vendor_id, product_id, interface_number, bulk_out, bulk_in
		);

		Ok(Self{
			interface,
			interface_number,
			bulk_out,
			bulk_in,
			max_packet_size,
			tag: 0,
			timeout: DEFAULT_TIMEOUT,
		})
	}

	fn next_tag(&mut self) -> u8 {
		self.tag = header::next_tag(self.tag);
		self.tag
	}

	fn send(&mut self, buf:Vec<u8>) -> Result<()> {
		block_on(self.interface.bulk_out(self.bulk_out, buf)).into_result()?;
		Ok(())
	}

	fn receive(&mut self) -> Result<Vec<u8>> {
		// Round up so a full chunk never ends mid-packet
		let len = USBTMC_HEADER_SIZE + READ_CHUNK_SIZE as usize;
		let len = len.div_ceil(self.max_packet_size) * self.max_packet_size;
		let data = block_on(self.interface.bulk_in(self.bulk_in, RequestBuffer::new(len)))
			.into_result()?;
		Ok(data)
	}

	pub fn write(&mut self, data:&[u8]) -> Result<()> {
		let tag = self.next_tag();
		trace!("bulk-out tag {} with {} bytes", tag, data.len());
		self.send(header::dev_dep_msg_out(tag, data, true))
	}

	pub fn read(&mut self) -> Result<Vec<u8>> {
		let mut message:Vec<u8> = vec![];

		loop {
			let tag = self.next_tag();
			self.send(header::request_dev_dep_msg_in(tag, READ_CHUNK_SIZE, None))?;

			let mut transfer = self.receive()?;
			let head = header::parse_bulk_in_header(&transfer)?;
			if head.msg_id != msg_id::DEV_DEP_MSG_IN || head.tag != tag {
				return Err(Error::UsbTmc(format!(
					"unexpected bulk-in header {:?} for request tag {}",
					head, tag
				)));
			}

			let size = head.transfer_size as usize;
			let mut data = transfer.split_off(USBTMC_HEADER_SIZE);
			while data.len() < size {
				let more = self.receive()?;
				if more.is_empty() {
					return Err(Error::UsbTmc("bulk-in transfer ended early".to_string()));
				}
				data.extend_from_slice(&more);
			}

			// Anything past transfer_size is alignment padding
			data.truncate(size);
			trace!("bulk-in tag {} with {} bytes, eom={}", tag, size, head.eom);
			message.extend_from_slice(&data);

			if head.eom {
				return Ok(message);
			}
		}
	}

	fn class_request(&self, request:u8, buf:&mut [u8]) -> Result<usize> {
		let n = self.interface.control_in_blocking(
			Control{
				control_type: ControlType::Class,
				recipient: Recipient::Interface,
				request,
				value: 0,
				index: self.interface_number as u16,
			},
			buf,
			self.timeout,
		)?;
		Ok(n)
	}

	/// INITIATE_CLEAR, then poll CHECK_CLEAR_STATUS until the device finishes.
	pub fn clear(&mut self) -> Result<()> {
		let mut buf = [0u8; 2];
		self.class_request(control_request::INITIATE_CLEAR, &mut buf[..1])?;
		if buf[0] != status::SUCCESS {
			return Err(Error::UsbTmc(format!("INITIATE_CLEAR returned status {:#04x}", buf[0])));
		}

		loop {
			self.class_request(control_request::CHECK_CLEAR_STATUS, &mut buf)?;
			match buf[0] {
				status::PENDING => std::thread::sleep(Duration::from_millis(10)),
				status::SUCCESS => break,
				s => return Err(Error::UsbTmc(format!("CHECK_CLEAR_STATUS returned status {:#04x}", s))),
			}
		}

		self.interface.clear_halt(self.bulk_out)?;
		Ok(())
	}
}

impl Transport for UsbTmcDevice {
	fn write_raw(&mut self, data:&[u8]) -> Result<()> {
		self.write(data)
	}

	fn read_raw(&mut self) -> Result<Vec<u8>> {
		self.read()
	}

	fn clear(&mut self) -> Result<()> {
		UsbTmcDevice::clear(self)
	}

	// Applies to control requests; bulk transfers block until the device answers
	fn set_timeout(&mut self, timeout:Duration) -> Result<()> {
		self.timeout = timeout;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TMC:(u8, u8) = (USBTMC_CLASS_CODE, USBTMC_SUBCLASS_CODE);

	#[test]
	fn first_tmc_interface_by_default() {
		let interfaces = vec![(0x03, 0x00, 0), (TMC.0, TMC.1, 1), (TMC.0, TMC.1, 2)];
		assert_eq!(select_interface(interfaces, None), Some(1));
	}

	#[test]
	fn named_interface_must_be_tmc() {
		let interfaces = vec![(0x03, 0x00, 0), (TMC.0, TMC.1, 1), (TMC.0, TMC.1, 2)];
		assert_eq!(select_interface(interfaces.clone(), Some(2)), Some(2));
		assert_eq!(select_interface(interfaces.clone(), Some(0)), None);
		assert_eq!(select_interface(interfaces, Some(7)), None);
	}
}
