//! # Task sources: what a registry task actually executes.
//!
//! This module provides the source-side types:
//! - [`Source`] — trait for implementing async cancelable producers
//! - [`SourceFn`] — closure-based source implementation
//! - [`SourceRef`] — shared reference to a source (`Arc<dyn Source<T>>`)
//! - [`Emitter`] — handle a source uses to push values
//! - [`value`], [`unit`], [`from_stream`] — constructors for the common
//!   source shapes

mod source;
mod source_fn;

pub use source::{Emitter, Source, SourceRef};
pub use source_fn::{from_stream, unit, value, SourceFn};
