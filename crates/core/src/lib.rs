//! Core library for utu partial-track data.
//!
//! A partial dataset moves between three shapes: the canonical
//! [`PartialData`] model with one named envelope per parameter, the versioned
//! JSON document handled by [`codec`], and the ordered breakpoint records
//! exchanged with analysis and synthesis engines through [`marshal`].

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod partial;

pub use codec::{decode, decode_with, encode, DecodeOptions, FileInfo, FILE_KIND, FILE_VERSION};
pub use config::{AppConfig, CodecConfig, SynthesisConfig};
pub use engine::{Analyzer, OscillatorBank, Synthesizer};
pub use error::{Result, UtuError};
pub use marshal::{to_breakpoints, to_canonical, Breakpoint, BreakpointPartial};
pub use partial::{AppendMode, Envelope, Envelopes, Partial, PartialData, Source};
