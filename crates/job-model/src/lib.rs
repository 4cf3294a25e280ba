//! PanoFrame Job Model
//!
//! The extraction job parameter set and everything derived purely from it:
//! output format parameters, extraction intervals, and output file naming.
//!
//! A [`Job`] is owned and supplied by the caller and read-only to the
//! extraction pipeline. There is no global settings state.

pub mod job;
pub mod naming;

pub use job::*;
pub use naming::*;
