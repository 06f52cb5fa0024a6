// Instruments driven over an Instrument session.  Only Rigol oscilloscopes for now; other
// manufacturers would get their own module next to this one.

pub mod rigol;
