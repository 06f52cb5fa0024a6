//! Conversion of raw waveform codes into voltages, and the time axis that goes with them.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of horizontal divisions on the screen
pub const HORIZONTAL_DIVISIONS:f64 = 12.0;

/// The affine map from raw byte codes to volts, valid only for the acquisition it was read with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalScaling {
	pub y_increment: f64,
	pub y_origin: f64,
	pub y_reference: f64,
}

impl VerticalScaling {
	pub fn voltage(&self, raw:u8) -> f64 {
		(raw as f64 - self.y_origin - self.y_reference) * self.y_increment
	}
}

pub fn to_voltages(raw:&[u8], scaling:&VerticalScaling) -> Vec<f64> {
	raw.iter().map(|&b| scaling.voltage(b)).collect()
}

/// `n` evenly spaced points from `offset - 6*scale` to `offset + 6*scale`, both ends included.
pub fn time_axis(offset:f64, scale:f64, n:usize) -> Vec<f64> {
	let half_width = scale * HORIZONTAL_DIVISIONS / 2.0;
	let start = offset - half_width;
	let stop = offset + half_width;

	match n {
		0 => vec![],
		1 => vec![start],
		_ => {
			let step = (stop - start) / (n - 1) as f64;
			(0..n)
				.map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
				.collect()
		}
	}
}

/// Time per sample across the full screen; zero when there are no samples.
pub fn sample_interval(scale:f64, n:usize) -> f64 {
	if n == 0 {
		0.0
	} else {
		scale * HORIZONTAL_DIVISIONS / n as f64
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTrace {
	pub channel: u8,
	pub coupling: String,
	pub volt_scale: f64,
	pub volt_offset: f64,
	pub scaling: VerticalScaling,
	pub voltages: Vec<f64>,
}

/// One single-trigger acquisition, converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
	pub time: Vec<f64>,
	pub traces: Vec<ChannelTrace>,
	pub dt: f64,
	pub time_scale: f64,
	pub time_offset: f64,
	pub sample_rate: String,
	pub memory_depth: String,
}

impl Capture {
	pub fn trace(&self, channel:u8) -> Option<&ChannelTrace> {
		self.traces.iter().find(|t| t.channel == channel)
	}

	/// One row per time point: `time,CH1,CH2,...`. A trace shorter than the time axis leaves
	/// its remaining cells empty.
	pub fn write_csv<W: Write>(&self, wtr:W) -> Result<()> {
		let mut wtr = csv::Writer::from_writer(wtr);

		let mut header = vec!["time".to_string()];
		header.extend(self.traces.iter().map(|t| format!("CH{}", t.channel)));
		wtr.write_record(&header)?;

		for (i, t) in self.time.iter().enumerate() {
			let mut row = vec![t.to_string()];
			row.extend(
				self.traces
					.iter()
					.map(|trace| trace.voltages.get(i).map(f64::to_string).unwrap_or_default()),
			);
			wtr.write_record(&row)?;
		}

		wtr.flush()?;
		Ok(())
	}

	pub fn write_json<W: Write>(&self, mut wtr:W) -> Result<()> {
		serde_json::to_writer_pretty(&mut wtr, self)?;
		wtr.flush()?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scaling(y_increment:f64, y_origin:f64, y_reference:f64) -> VerticalScaling {
		VerticalScaling{ y_increment, y_origin, y_reference }
	}

	#[test]
	fn voltage_of_raw_code() {
		let v = scaling(0.04, 0.0, 0.0).voltage(128);
		assert!((v - 5.12).abs() < 1e-12);
	}

	#[test]
	fn reference_and_origin_shift_the_code() {
		let s = scaling(0.5, 2.0, 127.0);
		assert_eq!(to_voltages(&[129, 127], &s), vec![0.0, -1.0]);
	}

	#[test]
	fn time_axis_spans_twelve_divisions() {
		assert_eq!(time_axis(0.0, 1.0, 5), vec![-6.0, -3.0, 0.0, 3.0, 6.0]);
	}

	#[test]
	fn time_axis_is_monotonic_and_symmetric() {
		let offset = 2.5e-4;
		let t = time_axis(offset, 1e-4, 1200);
		assert_eq!(t.len(), 1200);
		assert!(t.windows(2).all(|w| w[1] > w[0]));
		for i in 0..t.len() {
			let mirrored = t[t.len() - 1 - i];
			assert!(((t[i] - offset) + (mirrored - offset)).abs() < 1e-15);
		}
	}

	#[test]
	fn time_axis_degenerate_lengths() {
		assert!(time_axis(1.0, 1.0, 0).is_empty());
		assert_eq!(time_axis(1.0, 1.0, 1), vec![-5.0]);
	}

	#[test]
	fn sample_interval_covers_the_screen() {
		assert!((sample_interval(1e-3, 1200) - 1e-5).abs() < 1e-18);
		assert_eq!(sample_interval(1e-3, 0), 0.0);
	}

	fn two_channels() -> Capture {
		Capture{
			time: vec![-1.0, 1.0],
			traces: vec![
				ChannelTrace{
					channel: 1,
					coupling: "DC".into(),
					volt_scale: 1.0,
					volt_offset: 0.0,
					scaling: scaling(1.0, 0.0, 0.0),
					voltages: vec![0.5, 1.5],
				},
				ChannelTrace{
					channel: 3,
					coupling: "AC".into(),
					volt_scale: 1.0,
					volt_offset: 0.0,
					scaling: scaling(1.0, 0.0, 0.0),
					voltages: vec![2.0],
				},
			],
			dt: 1.0,
			time_scale: 0.5,
			time_offset: 0.0,
			sample_rate: "1.0e+09".into(),
			memory_depth: "12000".into(),
		}
	}

	// Accepts nothing, so buffered output only fails once it is flushed
	struct FullDisk;

	impl Write for FullDisk {
		fn write(&mut self, _buf:&[u8]) -> std::io::Result<usize> {
			Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
		}
		fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
	}

	#[test]
	fn csv_has_a_column_per_channel() {
		let capture = two_channels();

		let mut out = vec![];
		capture.write_csv(&mut out).unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "time,CH1,CH3\n-1,0.5,2\n1,1.5,\n");
		assert_eq!(capture.trace(3).map(|t| t.coupling.as_str()), Some("AC"));
	}

	#[test]
	fn json_round_trip() {
		let capture = two_channels();

		let mut out = vec![];
		capture.write_json(&mut out).unwrap();
		let back:Capture = serde_json::from_slice(&out).unwrap();
		assert_eq!(back, capture);
	}

	#[test]
	fn export_errors_surface_through_a_buffered_writer() {
		let capture = two_channels();
		assert!(capture.write_json(std::io::BufWriter::new(FullDisk)).is_err());
		assert!(capture.write_csv(std::io::BufWriter::new(FullDisk)).is_err());
	}
}
