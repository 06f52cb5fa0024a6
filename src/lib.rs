// Crate-wide error type
pub mod error;

// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, power supplies, waveform generators, etc
pub mod vxi11;

// USB Test & Measurement Class, the same kind of message exchange as VXI-11 but over USB bulk pipes
pub mod usbtmc;

// Whole-message byte transport shared by VXI-11, USB-TMC and the loopback used in tests
pub mod transport;

// Resource strings, the resource manager and instrument sessions
pub mod visa;

// IEEE 488.2 binary block framing
pub mod block;

// Raw codes to volts, and the time axis
pub mod waveform;

// Drivers for specific instruments
pub mod devices;

pub mod config;
pub mod plotting;

pub use error::{Error, Result};
