use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::devices::rigol::{CaptureOptions, MemoryDepth, WaveformMode};
use crate::error::{Error, Result};

/// Capture settings, read from an optional TOML file and `RIGOL_*` environment variables.
///
/// ```toml
/// resource = "USB0::0x1AB1::0x04CE::DS1ZA170000000::INSTR"
/// channels = [1, 2]
/// memory_depth = "12000"
/// lock_keys = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
	pub resource: Option<String>,
	pub channels: Vec<u8>,
	/// `"AUTO"` or a point count
	pub memory_depth: Option<String>,
	pub lock_keys: bool,
	pub waveform_mode: WaveformMode,
	pub poll_interval_ms: u64,
	pub trigger_timeout_ms: Option<u64>,
	pub timeout_ms: u64,
	pub discover_lan: bool,
}

impl Default for CaptureConfig {
	fn default() -> Self {
		Self{
			resource: None,
			channels: vec![1],
			memory_depth: None,
			lock_keys: false,
			waveform_mode: WaveformMode::Normal,
			poll_interval_ms: 10,
			trigger_timeout_ms: None,
			timeout_ms: 2000,
			discover_lan: false,
		}
	}
}

fn environment() -> Environment {
	Environment::with_prefix("RIGOL")
		.try_parsing(true)
		.list_separator(",")
		.with_list_parse_key("channels")
}

impl CaptureConfig {
	pub fn load(path:Option<&Path>) -> Result<Self> {
		let mut builder = Config::builder();
		if let Some(path) = path {
			builder = builder.add_source(File::from(path).format(FileFormat::Toml));
		}
		let cfg = builder.add_source(environment()).build()?;
		Ok(cfg.try_deserialize()?)
	}

	pub fn from_toml(s:&str) -> Result<Self> {
		let cfg = Config::builder()
			.add_source(File::from_str(s, FileFormat::Toml))
			.build()?;
		Ok(cfg.try_deserialize()?)
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	pub fn capture_options(&self) -> Result<CaptureOptions> {
		let memory_depth = match &self.memory_depth {
			Some(s) => Some(
				s.parse::<MemoryDepth>()
					.map_err(|e| Error::Config(config::ConfigError::Message(e)))?,
			),
			None => None,
		};

		Ok(CaptureOptions{
			channels: self.channels.clone(),
			memory_depth,
			lock_keys: self.lock_keys,
			mode: self.waveform_mode,
			poll_interval: Duration::from_millis(self.poll_interval_ms),
			trigger_timeout: self.trigger_timeout_ms.map(Duration::from_millis),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_file_gives_defaults() {
		assert_eq!(CaptureConfig::from_toml("").unwrap(), CaptureConfig::default());
	}

	#[test]
	fn toml_overrides() {
		let cfg = CaptureConfig::from_toml(
			r#"
			resource = "TCPIP0::192.168.1.5::INSTR"
			channels = [1, 3]
			memory_depth = "AUTO"
			waveform_mode = "raw"
			trigger_timeout_ms = 5000
			"#,
		)
		.unwrap();

		assert_eq!(cfg.resource.as_deref(), Some("TCPIP0::192.168.1.5::INSTR"));
		let opts = cfg.capture_options().unwrap();
		assert_eq!(opts.channels, vec![1, 3]);
		assert_eq!(opts.memory_depth, Some(MemoryDepth::Auto));
		assert_eq!(opts.mode, WaveformMode::Raw);
		assert_eq!(opts.trigger_timeout, Some(Duration::from_secs(5)));
		assert_eq!(opts.poll_interval, Duration::from_millis(10));
	}

	#[test]
	fn bad_memory_depth_is_a_config_error() {
		let cfg = CaptureConfig{ memory_depth: Some("deep".into()), ..CaptureConfig::default() };
		assert!(matches!(cfg.capture_options(), Err(Error::Config(_))));
	}
}
