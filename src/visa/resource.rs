use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
	static ref USB_RE: Regex = Regex::new(
		r"(?i)^USB(\d*)::(0x[0-9a-f]+|\d+)::(0x[0-9a-f]+|\d+)::([^:]+)(?:::(\d+))?$"
	).unwrap();
	static ref TCPIP_RE: Regex = Regex::new(r"(?i)^TCPIP(\d*)::([^:]+)(?:::([^:]+))?$").unwrap();
}

pub const DEFAULT_LAN_DEVICE:&str = "inst0";

/// A VISA style instrument address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceName {
	/// `USB0::0x1AB1::0x04CE::DS1ZA170000000::INSTR`
	Usb{
		board: u16,
		vendor_id: u16,
		product_id: u16,
		serial: String,
		interface: Option<u8>,
	},
	/// `TCPIP0::192.168.1.5::inst0::INSTR`
	Tcpip{
		board: u16,
		host: String,
		device: String,
	},
}

fn parse_board(s:&str, resource:&str) -> Result<u16> {
	if s.is_empty() {
		return Ok(0);
	}
	s.parse()
		.map_err(|_| Error::InvalidResource(resource.to_owned()))
}

fn parse_id(s:&str, resource:&str) -> Result<u16> {
	let parsed = match s.get(..2) {
		Some(p) if p.eq_ignore_ascii_case("0x") => u16::from_str_radix(&s[2..], 16),
		_ => s.parse(),
	};
	parsed.map_err(|_| Error::InvalidResource(resource.to_owned()))
}

impl ResourceName {
	pub fn is_usb(&self) -> bool {
		matches!(self, ResourceName::Usb{ .. })
	}
}

impl FromStr for ResourceName {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self> {
		let trimmed = s.trim();
		let body = match trimmed.len().checked_sub("::INSTR".len()) {
			Some(i) if trimmed.is_char_boundary(i) && trimmed[i..].eq_ignore_ascii_case("::INSTR") => {
				&trimmed[..i]
			}
			_ => trimmed,
		};

		if let Some(caps) = USB_RE.captures(body) {
			let interface = match caps.get(5) {
				Some(m) => Some(
					m.as_str()
						.parse()
						.map_err(|_| Error::InvalidResource(s.to_owned()))?,
				),
				None => None,
			};
			return Ok(ResourceName::Usb{
				board: parse_board(&caps[1], s)?,
				vendor_id: parse_id(&caps[2], s)?,
				product_id: parse_id(&caps[3], s)?,
				serial: caps[4].to_owned(),
				interface,
			});
		}

		if let Some(caps) = TCPIP_RE.captures(body) {
			return Ok(ResourceName::Tcpip{
				board: parse_board(&caps[1], s)?,
				host: caps[2].to_owned(),
				device: caps
					.get(3)
					.map_or(DEFAULT_LAN_DEVICE, |m| m.as_str())
					.to_owned(),
			});
		}

		Err(Error::InvalidResource(s.to_owned()))
	}
}

impl fmt::Display for ResourceName {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResourceName::Usb{ board, vendor_id, product_id, serial, interface } => {
				write!(f, "USB{}::0x{:04X}::0x{:04X}::{}", board, vendor_id, product_id, serial)?;
				if let Some(i) = interface {
					write!(f, "::{}", i)?;
				}
				write!(f, "::INSTR")
			}
			ResourceName::Tcpip{ board, host, device } => {
				write!(f, "TCPIP{}::{}::{}::INSTR", board, host, device)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_usb_resource() {
		let name:ResourceName = "USB0::0x1AB1::0x04CE::DS1ZA170000000::INSTR".parse().unwrap();
		assert_eq!(
			name,
			ResourceName::Usb{
				board: 0,
				vendor_id: 0x1AB1,
				product_id: 0x04CE,
				serial: "DS1ZA170000000".into(),
				interface: None,
			}
		);
		assert_eq!(name.to_string(), "USB0::0x1AB1::0x04CE::DS1ZA170000000::INSTR");
	}

	#[test]
	fn usb_ids_may_be_decimal_and_interface_given() {
		let name:ResourceName = "usb::6833::1230::SER1::0::instr".parse().unwrap();
		assert_eq!(name.to_string(), "USB0::0x1AB1::0x04CE::SER1::0::INSTR");
	}

	#[test]
	fn parses_tcpip_resource() {
		let name:ResourceName = "TCPIP0::192.168.1.5::INSTR".parse().unwrap();
		assert_eq!(
			name,
			ResourceName::Tcpip{ board: 0, host: "192.168.1.5".into(), device: "inst0".into() }
		);

		let name:ResourceName = "TCPIP1::scope.lab::inst1".parse().unwrap();
		assert_eq!(name.to_string(), "TCPIP1::scope.lab::inst1::INSTR");
		assert!(!name.is_usb());
	}

	#[test]
	fn rejects_unknown_resources() {
		assert!("GPIB0::12::INSTR".parse::<ResourceName>().is_err());
		assert!("USB0::0xZZZZ::0x04CE::X::INSTR".parse::<ResourceName>().is_err());
		assert!("USB0::0x11AB1::0x04CE::X::INSTR".parse::<ResourceName>().is_err());
		assert!("".parse::<ResourceName>().is_err());
	}
}
