use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("usb transfer error: {0}")]
	UsbTransfer(#[from] nusb::transfer::TransferError),

	/// Protocol violation on the USB-TMC bulk pipes
	#[error("usbtmc protocol error: {0}")]
	UsbTmc(String),

	#[error("invalid resource name: {0}")]
	InvalidResource(String),

	#[error("no instrument found for {0}")]
	ResourceNotFound(String),

	#[error("xdr error: {0}")]
	Xdr(&'static str),

	#[error("rpc error: {0}")]
	Rpc(&'static str),

	/// Non-zero error field in a VXI-11 core channel reply
	#[error("vxi-11 device error {code}: {message}")]
	Vxi11{ code: i32, message: &'static str },

	#[error("malformed binary block: {0}")]
	Block(&'static str),

	#[error("unable to parse response to {command}: {response:?}")]
	ParseResponse{ command: String, response: String },

	#[error("response is not valid utf-8")]
	Utf8(#[from] std::string::FromUtf8Error),

	#[error("connected to a device but it doesn't appear to be a Rigol oscilloscope: {0}")]
	WrongDevice(String),

	#[error("channel {channel} is out of range, valid channels are 1-{max}")]
	ChannelOutOfRange{ channel: u8, max: u8 },

	#[error("trigger did not reach STOP within {0:?}")]
	TriggerTimeout(Duration),

	#[error("capture contains no samples")]
	NoData,

	#[error("configuration error: {0}")]
	Config(#[from] config::ConfigError),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("csv error: {0}")]
	Csv(#[from] csv::Error),
}

impl Error {
	pub(crate) fn parse(command:&str, response:&str) -> Self {
		Error::ParseResponse{
			command: command.to_owned(),
			response: response.to_owned(),
		}
	}
}
