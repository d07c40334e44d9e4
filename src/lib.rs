//! # Overview
//!
//! A source/sink plugin pair for Common Trace Format (CTF) traces rooted at a filesystem
//! directory, modeled on the source/sink split described in babeltrace2's own
//! `ctf.fs` plugin docs:
//!
//! * Trace (all the specified physical CTF traces must belong to the same logical CTF trace)
//!   - One or more streams (timelines)
//!     * Series of events
//!
//! The schema tree lives in [`schema`]; [`metadata`] parses/renders it to the CTF 1.8 text
//! subset this crate speaks; [`reader`]/[`writer`] are the binary per-stream-file codec;
//! [`discovery`], [`inspector`], and [`grouper`] turn a root directory into stream file
//! groups; [`source`] and [`sink`] are the two plugin halves; [`graph`] is the minimal
//! threading glue that drives a source into a sink end to end.
#![deny(warnings, clippy::all)]

pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod grouper;
pub mod identity;
pub mod inspector;
pub mod interrupt;
pub mod metadata;
pub mod notification;
pub mod opts;
pub mod prelude;
pub mod query;
pub mod reader;
pub mod schema;
pub mod sink;
pub mod source;
pub mod tracing;
pub mod writer;
