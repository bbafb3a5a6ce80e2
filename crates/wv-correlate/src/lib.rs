//! Correlation of Confluence storage markup with the rendered page.
//!
//! A [`Descriptor`] names the same directive twice: once as an XPath over the
//! storage document and once as a CSS selector over the live content. The two
//! result lists are paired by index, which is only sound when both have the
//! same length, so [`correlate`] refuses to produce anything when they differ.

mod correlation;
mod descriptor;
mod error;

pub use correlation::{Bundle, Correlation, correlate};
pub use descriptor::{Descriptor, ElementSnapshot};
pub use error::CorrelationError;
