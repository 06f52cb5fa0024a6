use textplots::{Chart, Plot, Shape};

use crate::error::{Error, Result};
use crate::waveform::Capture;

/// Determine the best scale and unit prefix for a given maximum magnitude
fn determine_scale(max_value:f64) -> (f64, &'static str) {
	if max_value >= 1.0 || max_value == 0.0 {
		(1.0, "")
	} else if max_value >= 1e-3 {
		(1e3, "m")
	} else if max_value >= 1e-6 {
		(1e6, "μ")
	} else if max_value >= 1e-9 {
		(1e9, "n")
	} else {
		(1e12, "p")
	}
}

fn max_abs(values:&[f64]) -> f64 {
	values.iter().fold(0.0, |a, &b| a.max(b.abs()))
}

/// Print every trace of a capture against its time axis.
pub fn plot_capture(capture:&Capture, width:Option<u32>, height:Option<u32>) -> Result<()> {
	let (first, last) = match (capture.time.first(), capture.time.last()) {
		(Some(&f), Some(&l)) if !capture.traces.is_empty() => (f, l),
		_ => return Err(Error::NoData),
	};

	let width = width.unwrap_or(140);
	let height = height.unwrap_or(60);

	let (time_scale, time_unit) = determine_scale(max_abs(&[first, last]));

	for trace in &capture.traces {
		let (volt_scale, volt_unit) = determine_scale(max_abs(&trace.voltages));

		let frame:Vec<(f32, f32)> = capture
			.time
			.iter()
			.zip(&trace.voltages)
			.map(|(&t, &v)| ((t * time_scale) as f32, (v * volt_scale) as f32))
			.collect();

		println!("CH{} ({})", trace.channel, trace.coupling);
		println!("X-axis: {}s | Y-axis: {}V", time_unit, volt_unit);
		println!("{}", "─".repeat(width as usize));

		Chart::new(width, height, (first * time_scale) as f32, (last * time_scale) as f32)
			.lineplot(&Shape::Lines(&frame))
			.nice();
	}

	Ok(())
}
