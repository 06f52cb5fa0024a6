//! Numbers from the USBTMC and USB488 class specifications.

use std::time::Duration;

/// Interface class, subclass and protocol of a USB488 instrument
pub const USBTMC_CLASS_CODE:u8 = 0xFE;
pub const USBTMC_SUBCLASS_CODE:u8 = 0x03;

/// Size in bytes of the header that starts every bulk transfer
pub const USBTMC_HEADER_SIZE:usize = 12;

/// Largest reply chunk requested from the device in one REQUEST_DEV_DEP_MSG_IN
pub const READ_CHUNK_SIZE:u32 = 1024 * 1024;

pub const DEFAULT_TIMEOUT:Duration = Duration::from_secs(2);

pub mod msg_id {
	pub const DEV_DEP_MSG_OUT:u8 = 1;
	pub const REQUEST_DEV_DEP_MSG_IN:u8 = 2;
	pub const DEV_DEP_MSG_IN:u8 = 2;
}

pub mod control_request {
	pub const INITIATE_CLEAR:u8 = 5;
	pub const CHECK_CLEAR_STATUS:u8 = 6;
}

pub mod status {
	pub const SUCCESS:u8 = 0x01;
	pub const PENDING:u8 = 0x02;
}

/// bmTransferAttributes bits
pub const ATTR_EOM:u8 = 0x01;
pub const ATTR_TERM_CHAR_ENABLED:u8 = 0x02;
