//! TinyTV Media Model
//!
//! Defines the data contracts shared by the encode engine and its front ends:
//! - **Profile:** The fixed device format plus per-job encode choices
//!   (frame rate, quality, scale mode, audio normalization, channel prefix)
//! - **Source:** Input files with lazily cached probe results
//! - **Job:** Convert batches and combine jobs, including output naming
//! - **Calibration:** Cache keys and measured bitrate anchors
//!
//! Quality follows the encoder's quantizer convention: **2 is the best
//! (largest) output and 31 the worst (smallest)**. See [`Quality`].

pub mod calibration;
pub mod job;
pub mod profile;
pub mod source;

pub use calibration::*;
pub use job::*;
pub use profile::*;
pub use source::*;
