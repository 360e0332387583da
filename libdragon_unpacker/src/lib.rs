//! # dragon_unpacker
//!
//! dragon_unpacker is the DRAGON event unpacker, written in Rust. It takes the MIDAS (.mid)
//! files produced by the DRAGON data acquisition, decodes the CAEN ADC buffers of the
//! gamma (head) and heavy-ion (tail) subsystems, calibrates the detector data, and matches
//! head and tail events into coincidences using their trigger timestamps.
//!
//! ## Installation
//!
//! Currently the only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./dragon_unpacker_cli` from the
//! top level dragon_unpacker repository. To use the CLI see the `dragon_unpacker_cli`
//! README.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows (detector variables omitted;
//! write a full template with `dragon_unpacker_cli new -p <file>`):
//!
//! ```yml
//! midas_path: /path/to/midas/files
//! output_path: /path/to/output
//! first_run_number: 0
//! last_run_number: 0
//! n_threads: 1
//! singles_mode: false
//! coinc_window: 10
//! queue_timeout: 2000000
//! no_data: -1
//! module_channels: 32
//! ```
//!
//! - `coinc_window`: largest head/tail timestamp difference accepted as a coincidence
//! - `queue_timeout`: how far a subsystem's clock may move past a waiting event before the
//! event is given up on and written as a single
//! - `singles_mode`: if true, no matching is done and every event is written as a single
//! - `no_data`: the sentinel stored in ADC channels which did not fire
//! - `module_channels`: the number of channels of each ADC module (at most 32)
//!
//! ## Output
//!
//! For each run a summary `run_<NNNNN>.yml` is written to the output path, holding the
//! event counts, the coincidence matching diagnostics, the scaler sums and the run start
//! and stop times. A log file is also written; if something goes wrong it will contain the
//! details.
pub mod buffer;
pub mod calc;
pub mod coinc;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod head;
pub mod midas_event;
pub mod midas_file;
pub mod midas_stack;
pub mod module;
pub mod process;
pub mod queue;
pub mod run_parameters;
pub mod scaler;
pub mod summary_writer;
pub mod tail;
pub mod unpacker;
pub mod validity;
pub mod variables;
pub mod worker_status;
