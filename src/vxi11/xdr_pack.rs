use crate::error::Result;
use crate::xdr::Packer;

pub fn pack_device_link(packer:&mut Packer, link:i32) -> Result<()> {
	packer.pack_i32(link)
}

pub fn pack_create_link_parms(packer:&mut Packer, id:i32, lock_device:bool, lock_timeout:u32, device:&str) -> Result<()> {
	packer.pack_i32(id)?;
	packer.pack_bool(lock_device)?;
	packer.pack_u32(lock_timeout)?;
	packer.pack_string(device)
}

pub fn pack_device_write_parms(packer:&mut Packer, link:i32, timeout:u32, lock_timeout:u32, flags:i32, data:&[u8]) -> Result<()> {
	packer.pack_i32(link)?;
	packer.pack_u32(timeout)?;
	packer.pack_u32(lock_timeout)?;
	packer.pack_i32(flags)?;
	packer.pack_variable_len_opaque(data)
}

pub fn pack_device_read_parms(packer:&mut Packer, link:i32, request_size:u32, timeout:u32, lock_timeout:u32, flags:i32, term_char:i32) -> Result<()> {
	packer.pack_i32(link)?;
	packer.pack_u32(request_size)?;
	packer.pack_u32(timeout)?;
	packer.pack_u32(lock_timeout)?;
	packer.pack_i32(flags)?;
	packer.pack_i32(term_char)
}

pub fn pack_device_generic_parms(packer:&mut Packer, link:i32, flags:i32, lock_timeout:u32, timeout:u32) -> Result<()> {
	packer.pack_i32(link)?;
	packer.pack_i32(flags)?;
	packer.pack_u32(lock_timeout)?;
	packer.pack_u32(timeout)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn create_link_parms() {
		let mut packer = Packer::new();
		pack_create_link_parms(&mut packer, 3333, false, 10000, "inst0").unwrap();
		assert_eq!(packer.as_bytes(), &[
			0, 0, 0x0d, 0x05,
			0, 0, 0, 0,
			0, 0, 0x27, 0x10,
			0, 0, 0, 5, b'i', b'n', b's', b't', b'0', 0, 0, 0,
		]);
	}

	#[test]
	fn non_ascii_device_name_is_rejected() {
		let mut packer = Packer::new();
		assert!(pack_create_link_parms(&mut packer, 1, false, 0, "inst\u{e9}").is_err());
	}
}
