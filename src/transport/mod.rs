//! The byte-level seam between an [`Instrument`](crate::visa::Instrument) and the bus it talks over.
//!
//! A transport moves whole device messages: `write_raw` sends one message and `read_raw` returns
//! one complete reply, reassembled up to the END (VXI-11) or EOM (USB-TMC) marker.

use std::time::Duration;

use crate::error::Result;

mod loopback;

pub use loopback::LoopbackTransport;

pub trait Transport {
	/// Send one complete message to the device.
	fn write_raw(&mut self, data:&[u8]) -> Result<()>;

	/// Read one complete message from the device.
	fn read_raw(&mut self) -> Result<Vec<u8>>;

	/// Device clear. Transports without a clear operation do nothing.
	fn clear(&mut self) -> Result<()> {
		Ok(())
	}

	fn set_timeout(&mut self, _timeout:Duration) -> Result<()> {
		Ok(())
	}
}
