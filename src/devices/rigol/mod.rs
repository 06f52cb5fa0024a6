use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use log::{debug, info};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::visa::Instrument;
use crate::waveform::VerticalScaling;

mod capture;

pub use capture::{read, CaptureOptions};

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

pub const MAX_CHANNELS:u8 = 4;
pub const DEFAULT_POLL_INTERVAL:Duration = Duration::from_millis(10);

pub struct RigolScope {
	inst: Instrument,
	pub identity: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerStatus { Td, Wait, Run, Auto, Stop }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coupling { Ac, Dc, Gnd }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformMode {
	#[default]
	Normal,
	Maximum,
	Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveformFormat { Byte, Word, Ascii }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryDepth {
	Auto,
	Points(u64),
}

/// The ten fields of `:WAVeform:PREamble?`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
	pub format: WaveformFormat,
	pub mode: WaveformMode,
	pub points: u64,
	pub count: u64,
	pub x_increment: f64,
	pub x_origin: f64,
	pub x_reference: f64,
	pub y_increment: f64,
	pub y_origin: f64,
	pub y_reference: f64,
}

impl Preamble {
	pub fn vertical_scaling(&self) -> VerticalScaling {
		VerticalScaling{ y_increment: self.y_increment, y_origin: self.y_origin, y_reference: self.y_reference }
	}
}

impl FromStr for TriggerStatus {
	type Err = ();
	fn from_str(s:&str) -> std::result::Result<Self, ()> {
		match s.trim().to_ascii_uppercase().as_str() {
			"TD"   => Ok(TriggerStatus::Td),
			"WAIT" => Ok(TriggerStatus::Wait),
			"RUN"  => Ok(TriggerStatus::Run),
			"AUTO" => Ok(TriggerStatus::Auto),
			"STOP" => Ok(TriggerStatus::Stop),
			_      => Err(()),
		}
	}
}

impl FromStr for Coupling {
	type Err = ();
	fn from_str(s:&str) -> std::result::Result<Self, ()> {
		match s.trim().to_ascii_uppercase().as_str() {
			"AC"  => Ok(Coupling::Ac),
			"DC"  => Ok(Coupling::Dc),
			"GND" => Ok(Coupling::Gnd),
			_     => Err(()),
		}
	}
}

impl fmt::Display for Coupling {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self { Coupling::Ac => "AC", Coupling::Dc => "DC", Coupling::Gnd => "GND" })
	}
}

impl WaveformMode {
	pub fn scpi(&self) -> &'static str {
		match self { WaveformMode::Normal => "NORMal", WaveformMode::Maximum => "MAXimum", WaveformMode::Raw => "RAW" }
	}
}

impl FromStr for WaveformMode {
	type Err = String;
	fn from_str(s:&str) -> std::result::Result<Self, String> {
		match s.trim().to_ascii_lowercase().as_str() {
			"norm" | "normal" => Ok(WaveformMode::Normal),
			"max" | "maximum" => Ok(WaveformMode::Maximum),
			"raw"             => Ok(WaveformMode::Raw),
			other             => Err(format!("unknown waveform mode {:?}", other)),
		}
	}
}

impl WaveformFormat {
	pub fn scpi(&self) -> &'static str {
		match self { WaveformFormat::Byte => "BYTE", WaveformFormat::Word => "WORD", WaveformFormat::Ascii => "ASCii" }
	}
}

impl fmt::Display for MemoryDepth {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MemoryDepth::Auto      => f.write_str("AUTO"),
			MemoryDepth::Points(n) => write!(f, "{}", n),
		}
	}
}

impl FromStr for MemoryDepth {
	type Err = String;
	fn from_str(s:&str) -> std::result::Result<Self, String> {
		let s = s.trim();
		if s.eq_ignore_ascii_case("auto") {
			return Ok(MemoryDepth::Auto);
		}
		// The scope reports depths like 1.2000e+04
		match s.parse::<u64>() {
			Ok(n) => Ok(MemoryDepth::Points(n)),
			Err(_) => match s.parse::<f64>() {
				Ok(x) if x >= 0.0 && x.fract() == 0.0 => Ok(MemoryDepth::Points(x as u64)),
				_ => Err(format!("invalid memory depth {:?}", s)),
			},
		}
	}
}

impl FromStr for Preamble {
	type Err = ();
	fn from_str(s:&str) -> std::result::Result<Self, ()> {
		let fields:Vec<&str> = s.trim().split(',').map(str::trim).collect();
		if fields.len() != 10 {
			return Err(());
		}
		let f = |i:usize| fields[i].parse::<f64>().map_err(|_| ());
		let u = |i:usize| fields[i].parse::<u64>().map_err(|_| ());

		let format = match u(0)? { 0 => WaveformFormat::Byte, 1 => WaveformFormat::Word, 2 => WaveformFormat::Ascii, _ => return Err(()) };
		let mode   = match u(1)? { 0 => WaveformMode::Normal, 1 => WaveformMode::Maximum, 2 => WaveformMode::Raw, _ => return Err(()) };

		Ok(Preamble{
			format, mode,
			points: u(2)?, count: u(3)?,
			x_increment: f(4)?, x_origin: f(5)?, x_reference: f(6)?,
			y_increment: f(7)?, y_origin: f(8)?, y_reference: f(9)?,
		})
	}
}

pub fn parse_identity(idn:&str) -> Option<Identity> {
	let caps:Captures = IDN_RE.captures(idn)?;
	Some(Identity{
		manufacturer: caps[1].trim().to_owned(),
		model:        caps[2].trim().to_owned(),
		serial_num:   caps[3].trim().to_owned(),
		fw_version:   caps[4].trim().to_owned(),
	})
}

pub fn chan_ok(n:u8) -> Result<()> {
	if n == 0 || n > MAX_CHANNELS { Err(Error::ChannelOutOfRange{ channel: n, max: MAX_CHANNELS }) }
	else { Ok(()) }
}

impl RigolScope {

	pub fn new(mut inst:Instrument) -> Result<Self> {
		let idn = inst.query("*IDN?")?;
		let identity = parse_identity(&idn).ok_or_else(|| Error::parse("*IDN?", &idn))?;
		if !identity.manufacturer.to_ascii_uppercase().contains("RIGOL") {
			return Err(Error::WrongDevice(idn));
		}
		info!("connected to {} {} (serial {}, firmware {})", identity.manufacturer, identity.model, identity.serial_num, identity.fw_version);

		Ok(Self{ inst, identity })
	}

	pub fn instrument(&mut self) -> &mut Instrument { &mut self.inst }

	pub fn into_instrument(self) -> Instrument { self.inst }

	fn parse_reply<T:FromStr>(&mut self, cmd:&str) -> Result<T> {
		let res = self.inst.query(cmd)?;
		res.trim().parse::<T>().map_err(|_| Error::parse(cmd, &res))
	}

	// One-liners
	pub fn single(&mut self) -> Result<()> { self.inst.write(":SINGle") }
	pub fn run(&mut self)    -> Result<()> { self.inst.write(":RUN") }
	pub fn stop(&mut self)   -> Result<()> { self.inst.write(":STOP") }

	pub fn set_keys_locked(&mut self, locked:bool) -> Result<()> {
		self.inst.write(&format!(":SYSTem:LOCKed {}", locked as u8))
	}

	pub fn memory_depth(&mut self) -> Result<MemoryDepth> { self.parse_reply(":ACQuire:MDEPth?") }

	pub fn set_memory_depth(&mut self, depth:MemoryDepth) -> Result<()> {
		self.inst.write(&format!(":ACQuire:MDEPth {}", depth))
	}

	pub fn sample_rate(&mut self) -> Result<f64> { self.inst.query_f64(":ACQuire:SRATe?") }

	pub fn trigger_status(&mut self) -> Result<TriggerStatus> { self.parse_reply(":TRIGger:STATus?") }

	/// Polls the trigger status until the acquisition has stopped.
	pub fn wait_for_stop(&mut self, poll:Duration, timeout:Option<Duration>) -> Result<()> {
		let start = Instant::now();
		loop {
			// Older families answer with spellings like T'D, so only STOP is looked for
			let reply:String = self.inst.query(":TRIGger:STATus?")?;
			if reply.to_ascii_uppercase().contains("STOP") {
				debug!("acquisition stopped after {:?}", start.elapsed());
				return Ok(());
			}
			if reply.parse::<TriggerStatus>().is_err() {
				debug!("unrecognised trigger status {:?}, still waiting", reply);
			}
			if let Some(t) = timeout {
				if start.elapsed() >= t {
					return Err(Error::TriggerTimeout(t));
				}
			}
			thread::sleep(poll);
		}
	}

	pub fn time_scale(&mut self)  -> Result<f64> { self.inst.query_f64(":TIM:SCAL?") }
	pub fn time_offset(&mut self) -> Result<f64> { self.inst.query_f64(":TIM:OFFS?") }

	pub fn volt_scale(&mut self, chan_num:u8) -> Result<f64> {
		chan_ok(chan_num)?;
		self.inst.query_f64(&format!(":CHAN{}:SCAL?", chan_num))
	}

	pub fn volt_offset(&mut self, chan_num:u8) -> Result<f64> {
		chan_ok(chan_num)?;
		self.inst.query_f64(&format!(":CHAN{}:OFFS?", chan_num))
	}

	pub fn coupling(&mut self, chan_num:u8) -> Result<Coupling> {
		chan_ok(chan_num)?;
		self.parse_reply(&format!(":CHANnel{}:COUPling?", chan_num))
	}

	/// Coupling as reported, normalised when it is one of AC, DC or GND.
	pub fn coupling_text(&mut self, chan_num:u8) -> Result<String> {
		chan_ok(chan_num)?;
		let reply:String = self.inst.query(&format!(":CHANnel{}:COUPling?", chan_num))?;
		match reply.parse::<Coupling>() {
			Ok(c)  => Ok(c.to_string()),
			Err(_) => {
				debug!("CH{} reports unrecognised coupling {:?}", chan_num, reply);
				Ok(reply.trim().to_owned())
			},
		}
	}

	pub fn set_waveform_format(&mut self, format:WaveformFormat) -> Result<()> {
		self.inst.write(&format!(":WAVeform:FORMat {}", format.scpi()))
	}

	pub fn set_waveform_mode(&mut self, mode:WaveformMode) -> Result<()> {
		self.inst.write(&format!(":WAVeform:MODE {}", mode.scpi()))
	}

	pub fn set_waveform_source(&mut self, chan_num:u8) -> Result<()> {
		chan_ok(chan_num)?;
		self.inst.write(&format!(":WAV:SOUR CHAN{}", chan_num))
	}

	pub fn y_increment(&mut self) -> Result<f64> { self.inst.query_f64(":WAVeform:YINCrement?") }
	pub fn y_reference(&mut self) -> Result<f64> { self.inst.query_f64(":WAVeform:YREFerence?") }
	pub fn y_origin(&mut self)    -> Result<f64> { self.inst.query_f64(":WAVeform:YORigin?") }
	pub fn x_increment(&mut self) -> Result<f64> { self.inst.query_f64(":WAVeform:XINCrement?") }
	pub fn x_reference(&mut self) -> Result<f64> { self.inst.query_f64(":WAVeform:XREFerence?") }
	pub fn x_origin(&mut self)    -> Result<f64> { self.inst.query_f64(":WAVeform:XORigin?") }

	/// Y increment, reference and origin for the current waveform source.
	pub fn vertical_scaling(&mut self) -> Result<VerticalScaling> {
		let y_increment = self.y_increment()?;
		let y_reference = self.y_reference()?;
		let y_origin    = self.y_origin()?;
		Ok(VerticalScaling{ y_increment, y_origin, y_reference })
	}

	pub fn preamble(&mut self) -> Result<Preamble> { self.parse_reply(":WAVeform:PREamble?") }

	pub fn transfer_waveform_raw(&mut self, chan_num:u8) -> Result<Vec<u8>> {
		chan_ok(chan_num)?;
		let (_, data) = self.inst.query_raw(&format!(":WAV:DATA? CHAN{}", chan_num))?;
		Ok(data)
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transport::LoopbackTransport;

	fn scope(loopback:&LoopbackTransport) -> RigolScope {
		loopback.push_line("RIGOL TECHNOLOGIES,DS1104Z,DS1ZA000000001,00.04.04.SP3");
		RigolScope::new(Instrument::new("loopback", Box::new(loopback.clone()))).unwrap()
	}

	#[test]
	fn identity_is_parsed() {
		let loopback = LoopbackTransport::new();
		let scope = scope(&loopback);
		assert_eq!(scope.identity.model, "DS1104Z");
		assert_eq!(scope.identity.serial_num, "DS1ZA000000001");
		assert_eq!(scope.identity.fw_version, "00.04.04.SP3");
	}

	#[test]
	fn other_vendors_are_rejected() {
		let loopback = LoopbackTransport::new();
		loopback.push_line("Siglent Technologies,SDS1202X-E,SDS1ECDX,1.3.27");
		let res = RigolScope::new(Instrument::new("loopback", Box::new(loopback.clone())));
		assert!(matches!(res, Err(Error::WrongDevice(_))));
	}

	#[test]
	fn channel_range_is_checked() {
		let loopback = LoopbackTransport::new();
		let mut scope = scope(&loopback);
		assert!(matches!(scope.volt_scale(5), Err(Error::ChannelOutOfRange{ channel: 5, max: 4 })));
		assert!(scope.set_waveform_source(0).is_err());
		assert_eq!(loopback.written(), vec!["*IDN?"]);
	}

	#[test]
	fn wait_for_stop_polls_until_stop() {
		let loopback = LoopbackTransport::new();
		let mut scope = scope(&loopback);
		loopback.push_line("WAIT").push_line("TD").push_line("STOP");
		scope.wait_for_stop(Duration::ZERO, None).unwrap();
		assert_eq!(loopback.pending_replies(), 0);
	}

	#[test]
	fn wait_for_stop_tolerates_unknown_status_spellings() {
		let loopback = LoopbackTransport::new();
		let mut scope = scope(&loopback);
		loopback.push_line("T'D").push_line("stop");
		scope.wait_for_stop(Duration::ZERO, None).unwrap();
		assert_eq!(loopback.written(), vec!["*IDN?", ":TRIGger:STATus?", ":TRIGger:STATus?"]);
		assert_eq!(loopback.pending_replies(), 0);
	}

	#[test]
	fn coupling_text_keeps_unknown_replies() {
		let loopback = LoopbackTransport::new();
		let mut scope = scope(&loopback);
		loopback.push_line("dc").push_line("LF REJect");
		assert_eq!(scope.coupling_text(1).unwrap(), "DC");
		assert_eq!(scope.coupling_text(2).unwrap(), "LF REJect");
	}

	#[test]
	fn wait_for_stop_times_out() {
		let loopback = LoopbackTransport::new();
		let mut scope = scope(&loopback);
		loopback.push_line("WAIT");
		let res = scope.wait_for_stop(Duration::ZERO, Some(Duration::ZERO));
		assert!(matches!(res, Err(Error::TriggerTimeout(_))));
	}

	#[test]
	fn preamble_fields() {
		let p:Preamble = "0,0,1200,1,1.000000e-06,-6.000000e-04,0,4.000000e-02,0,127".parse().unwrap();
		assert_eq!(p.format, WaveformFormat::Byte);
		assert_eq!(p.points, 1200);
		assert_eq!(p.vertical_scaling(), VerticalScaling{ y_increment: 0.04, y_origin: 0.0, y_reference: 127.0 });
		assert!("0,0,1200".parse::<Preamble>().is_err());
	}

	#[test]
	fn memory_depth_replies() {
		assert_eq!("AUTO".parse::<MemoryDepth>().unwrap(), MemoryDepth::Auto);
		assert_eq!("12000".parse::<MemoryDepth>().unwrap(), MemoryDepth::Points(12000));
		assert_eq!("1.2000e+04".parse::<MemoryDepth>().unwrap(), MemoryDepth::Points(12000));
		assert!("lots".parse::<MemoryDepth>().is_err());
		assert_eq!(MemoryDepth::Points(600000).to_string(), "600000");
	}
}
