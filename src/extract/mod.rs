//! Listing extraction
//!
//! Raw listing items are pulled out of a page's hydrated state by the
//! [`ExtractionEngine`] and turned into canonical records by the
//! [`Normalizer`].

mod engine;
mod raw;
mod record;

pub use engine::{Clock, ExtractionEngine, ExtractionOutcome, TokioClock};
pub use raw::RawProductRecord;
pub use record::{discount_label, CanonicalProductRecord, Normalizer};
