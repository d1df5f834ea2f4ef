// Command-line front ends. Each binary parses its own `Cli` and calls
// `run`; the handlers live here so they can be unit tested.

pub mod crowdaq;
pub mod mturk;
