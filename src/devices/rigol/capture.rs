use std::time::Duration;

use log::{info, warn};

use crate::error::Result;
use crate::visa::ResourceManager;
use crate::waveform::{self, Capture, ChannelTrace};

use super::{chan_ok, MemoryDepth, RigolScope, WaveformFormat, WaveformMode, DEFAULT_POLL_INTERVAL};

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
	pub channels: Vec<u8>,
	pub memory_depth: Option<MemoryDepth>,
	pub lock_keys: bool,
	pub mode: WaveformMode,
	pub poll_interval: Duration,
	/// `None` waits for the trigger forever
	pub trigger_timeout: Option<Duration>,
}

impl Default for CaptureOptions {
	fn default() -> Self {
		Self{
			channels: vec![1],
			memory_depth: None,
			lock_keys: false,
			mode: WaveformMode::Normal,
			poll_interval: DEFAULT_POLL_INTERVAL,
			trigger_timeout: None,
		}
	}
}

impl RigolScope {

	/// Takes one single-trigger acquisition and converts every requested channel.
	///
	/// The scope is put back into run mode afterwards, and the front panel is unlocked again if
	/// `lock_keys` locked it, even when the capture fails.
	pub fn capture(&mut self, opts:&CaptureOptions) -> Result<Capture> {
		for &ch in &opts.channels {
			chan_ok(ch)?;
		}

		if opts.lock_keys {
			self.set_keys_locked(true)?;
		}

		let result = self.acquire(opts);

		if opts.lock_keys {
			if let Err(e) = self.set_keys_locked(false) {
				warn!("unable to unlock front panel keys: {}", e);
			}
		}

		result
	}

	fn acquire(&mut self, opts:&CaptureOptions) -> Result<Capture> {
		if let Some(depth) = opts.memory_depth {
			self.set_memory_depth(depth)?;
		}
		let memory_depth = self.instrument().query(":ACQuire:MDEPth?")?;
		let sample_rate  = self.instrument().query(":ACQuire:SRATe?")?;

		self.single()?;
		self.wait_for_stop(opts.poll_interval, opts.trigger_timeout)?;

		let time_scale  = self.time_scale()?;
		let time_offset = self.time_offset()?;
		info!("timescale {:.3e} s, timeoffset {:.3e} s", time_scale, time_offset);

		self.set_waveform_format(WaveformFormat::Byte)?;
		self.set_waveform_mode(opts.mode)?;

		let mut traces:Vec<ChannelTrace> = Vec::with_capacity(opts.channels.len());
		for &channel in &opts.channels {
			self.set_waveform_source(channel)?;

			let coupling    = self.coupling_text(channel)?;
			let volt_scale  = self.volt_scale(channel)?;
			let volt_offset = self.volt_offset(channel)?;
			info!("CH{} voltscale {:.3} V, voltoffset {:.3} V", channel, volt_scale, volt_offset);

			let scaling = self.vertical_scaling()?;
			info!("CH{} y_inc = {:.3e}, y_ref = {}, y_ori = {}", channel, scaling.y_increment, scaling.y_reference, scaling.y_origin);

			let raw = self.transfer_waveform_raw(channel)?;
			info!("CH{}({}): data size: {}; sample rate: {}; memory depth: {}", channel, coupling, raw.len(), sample_rate, memory_depth);

			traces.push(ChannelTrace{
				channel,
				coupling,
				volt_scale,
				volt_offset,
				scaling,
				voltages: waveform::to_voltages(&raw, &scaling),
			});
		}

		self.run()?;

		let n = traces.last().map_or(0, |t| t.voltages.len());
		Ok(Capture{
			time: waveform::time_axis(time_offset, time_scale, n),
			dt: waveform::sample_interval(time_scale, n),
			traces,
			time_scale,
			time_offset,
			sample_rate,
			memory_depth,
		})
	}

}

/// Opens `resource`, captures `channels` with default options and closes the session again.
pub fn read(resource:&str, channels:&[u8]) -> Result<Capture> {
	let inst = ResourceManager::new().open_resource(resource)?;
	let mut scope = RigolScope::new(inst)?;
	scope.capture(&CaptureOptions{ channels: channels.to_vec(), ..CaptureOptions::default() })
}
