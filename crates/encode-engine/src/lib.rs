//! TinyTV Encode Engine
//!
//! Turns arbitrary video files into the fixed MJPEG/PCM AVI format the
//! device plays, either one output per input (convert) or one output for
//! many inputs (combine).
//!
//! # Pipeline
//!
//! ```text
//! convert:
//!   source ── Command Builder ── Process Runner ── Validator ──► <prefix>_<stem>.avi
//!                                                      │
//!                                                      └── repair once (+genpts)
//!
//! combine:
//!   sources ── size precondition (FAT32) ── Strategy Selector
//!                                              ├── 1 file    : direct transcode
//!                                              ├── 2..49     : filter-graph concat
//!                                              └── 50+       : concat list file
//!                                                        │
//!                                                        ▼
//!                                               <prefix>_<name>.avi
//!
//! estimate:
//!   source ── Calibrator (q=2 / q=31 samples, background) ──┐
//!   duration ───────────────────────────────────────────────┴── Size Estimator
//! ```
//!
//! All external processes go through [`ProcessRunner`], so the whole engine
//! can be driven by a scripted runner in tests.

pub mod batch;
pub mod calibrate;
pub mod command;
pub mod estimate;
pub mod probe;
pub mod runner;
pub mod strategy;
pub mod thumbnail;
pub mod validate;

pub use batch::*;
pub use calibrate::{AnchorsReady, Calibrator};
pub use probe::{parse_probe_report, ProbeReport, Prober};
pub use runner::{LogSink, ProcessRunner, SystemRunner, Toolchain, ToolStatus};
pub use strategy::CombineStrategy;
pub use thumbnail::StillFormat;
pub use validate::{check_conformance, Conformance, ValidationOutcome, Validator};
