use crate::error::{Error, Result};
use crate::xdr::Unpacker;
use crate::rpc::{REPLY, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED, PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

pub fn unpack_auth(unpacker:&mut Unpacker) -> Result<(i32, Vec<u8>)> {
	let flavor:i32    = unpacker.unpack_enum()?;
	let stuff:Vec<u8> = unpacker.unpack_variable_len_opaque()?;
	Ok((flavor, stuff))
}

/// Consumes an RPC reply header and leaves the unpacker positioned at the procedure results.
pub fn unpack_replyheader(unpacker:&mut Unpacker) -> Result<(u32, (i32, Vec<u8>))> {
	let xid:u32 = unpacker.unpack_u32()?;

	if unpacker.unpack_enum()? != REPLY {
		return Err(Error::Rpc("expected REPLY message type"));
	}

	match unpacker.unpack_enum()? {
		MSG_DENIED => {
			return match unpacker.unpack_enum()? {
				RPC_MISMATCH => Err(Error::Rpc("message denied due to RPC_MISMATCH")),
				AUTH_ERROR   => Err(Error::Rpc("message denied due to AUTH_ERROR")),
				_            => Err(Error::Rpc("message denied for an unknown reason")),
			};
		},
		MSG_ACCEPTED => { },
		_ => return Err(Error::Rpc("neither MSG_DENIED nor MSG_ACCEPTED in reply")),
	}

	let verf = unpack_auth(unpacker)?;

	match unpacker.unpack_enum()? {
		SUCCESS       => Ok((xid, verf)),
		PROG_UNAVAIL  => Err(Error::Rpc("program unavailable")),
		PROG_MISMATCH => Err(Error::Rpc("program version mismatch")),
		PROC_UNAVAIL  => Err(Error::Rpc("procedure unavailable")),
		GARBAGE_ARGS  => Err(Error::Rpc("server could not decode arguments")),
		_             => Err(Error::Rpc("call failed for an unknown reason")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::xdr::Packer;

	fn accepted_reply(xid:u32, accept_stat:i32) -> Vec<u8> {
		let mut packer = Packer::new();
		packer.pack_u32(xid).unwrap();
		packer.pack_enum(REPLY).unwrap();
		packer.pack_enum(MSG_ACCEPTED).unwrap();
		packer.pack_enum(0).unwrap();
		packer.pack_variable_len_opaque(&[]).unwrap();
		packer.pack_enum(accept_stat).unwrap();
		packer.as_bytes().to_vec()
	}

	#[test]
	fn successful_reply_leaves_results() {
		let mut reply = accepted_reply(42, SUCCESS);
		reply.extend_from_slice(&[0, 0, 0x13, 0x88]);

		let mut unpacker = Unpacker::new();
		unpacker.reset(&reply);
		let (xid, (flavor, _)) = unpack_replyheader(&mut unpacker).unwrap();
		assert_eq!(xid, 42);
		assert_eq!(flavor, 0);
		assert_eq!(unpacker.unpack_u32().unwrap(), 5000);
	}

	#[test]
	fn prog_unavail_is_an_error() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&accepted_reply(1, PROG_UNAVAIL));
		assert!(matches!(unpack_replyheader(&mut unpacker), Err(Error::Rpc("program unavailable"))));
	}

	#[test]
	fn denied_reply_is_an_error() {
		let mut packer = Packer::new();
		packer.pack_u32(3).unwrap();
		packer.pack_enum(REPLY).unwrap();
		packer.pack_enum(MSG_DENIED).unwrap();
		packer.pack_enum(AUTH_ERROR).unwrap();
		packer.pack_u32(1).unwrap();

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.as_bytes());
		assert!(unpack_replyheader(&mut unpacker).is_err());
	}
}
