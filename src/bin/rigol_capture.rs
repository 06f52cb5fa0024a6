use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info, LevelFilter};

use rigol_scope::config::CaptureConfig;
use rigol_scope::devices::rigol::{MemoryDepth, RigolScope};
use rigol_scope::plotting::plot_capture;
use rigol_scope::visa::ResourceManager;
use rigol_scope::{Error, Result};

#[derive(Parser, Debug)]
#[command(name = "rigol-capture", about = "Capture waveforms from a Rigol oscilloscope")]
struct Cli {
	/// TOML file with capture settings
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// More logging; repeat for trace output
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List connected instruments
	List{
		/// Also broadcast for VXI-11 instruments on the local network
		#[arg(long)]
		lan: bool,
	},
	/// Print the identification string of an instrument
	Idn{ resource: Option<String> },
	/// Take a single-trigger capture
	Capture{
		/// VISA resource string, e.g. USB0::0x1AB1::0x04CE::DS1ZA170000000::INSTR
		#[arg(short, long)]
		resource: Option<String>,

		/// Channel to capture; repeat for several
		#[arg(long = "channel", value_name = "N")]
		channels: Vec<u8>,

		/// AUTO or a number of points
		#[arg(long)]
		memory_depth: Option<MemoryDepth>,

		/// Lock the front panel while capturing
		#[arg(long)]
		lock_keys: bool,

		/// Output file; stdout when absent
		#[arg(short, long)]
		output: Option<PathBuf>,

		#[arg(short, long, value_enum, default_value_t = Format::Json)]
		format: Format,

		/// Draw the traces in the terminal; needs --output so the chart stays out of the data
		#[arg(long, requires = "output")]
		plot: bool,
	},
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
	Json,
	Csv,
}

fn init_logging(verbose:u8) {
	let level = match verbose {
		0 => LevelFilter::Info,
		1 => LevelFilter::Debug,
		_ => LevelFilter::Trace,
	};

	let mut builder = env_logger::Builder::from_env(Env::default());
	if std::env::var_os("RUST_LOG").is_none() {
		builder.filter_level(level);
	}
	builder.format_timestamp_millis().init();
}

fn resource_or_first(cfg:&CaptureConfig, rm:&ResourceManager, arg:Option<String>) -> Result<String> {
	if let Some(r) = arg.or_else(|| cfg.resource.clone()) {
		return Ok(r);
	}

	let first = rm
		.list_usb_devices()?
		.into_iter()
		.next()
		.ok_or_else(|| Error::ResourceNotFound("any connected USB instrument".to_string()))?;
	info!("no resource given, using {}", first);
	Ok(first.to_string())
}

fn run(cli:Cli) -> Result<()> {
	let mut cfg = CaptureConfig::load(cli.config.as_deref())?;

	match cli.command {
		Command::List{ lan } => {
			let rm = ResourceManager::new().with_timeout(cfg.timeout()).with_lan_discovery(lan || cfg.discover_lan);
			for resource in rm.list_resources()? {
				println!("{}", resource);
			}
		}
		Command::Idn{ resource } => {
			let rm = ResourceManager::new().with_timeout(cfg.timeout());
			let resource = resource_or_first(&cfg, &rm, resource)?;
			let mut inst = rm.open_resource(&resource)?;
			println!("{}", inst.query("*IDN?")?);
		}
		Command::Capture{ resource, channels, memory_depth, lock_keys, output, format, plot } => {
			if !channels.is_empty() {
				cfg.channels = channels;
			}
			if let Some(depth) = memory_depth {
				cfg.memory_depth = Some(depth.to_string());
			}
			cfg.lock_keys |= lock_keys;

			let rm = ResourceManager::new().with_timeout(cfg.timeout());
			let resource = resource_or_first(&cfg, &rm, resource)?;
			let mut scope = RigolScope::new(rm.open_resource(&resource)?)?;
			let capture = scope.capture(&cfg.capture_options()?)?;

			let wtr:Box<dyn Write> = match &output {
				Some(path) => Box::new(BufWriter::new(File::create(path)?)),
				None => Box::new(io::stdout().lock()),
			};
			match format {
				Format::Json => capture.write_json(wtr)?,
				Format::Csv => capture.write_csv(wtr)?,
			}
			if let Some(path) = &output {
				info!("wrote {} samples to {}", capture.time.len(), path.display());
			}

			if plot {
				plot_capture(&capture, None, None)?;
			}
		}
	}

	Ok(())
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	match run(cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn plot_needs_an_output_file() {
		assert!(Cli::try_parse_from(["rigol-capture", "capture", "--plot"]).is_err());

		let cli = Cli::try_parse_from(["rigol-capture", "capture", "--plot", "-o", "out.json", "--channel", "1", "--channel", "2"]).unwrap();
		match cli.command {
			Command::Capture{ plot, output, channels, format, .. } => {
				assert!(plot);
				assert_eq!(output, Some(PathBuf::from("out.json")));
				assert_eq!(channels, vec![1, 2]);
				assert_eq!(format, Format::Json);
			},
			other => panic!("unexpected command {:?}", other),
		}
	}
}
