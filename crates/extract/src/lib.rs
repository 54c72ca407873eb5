//! Markup extraction for the permit wizard's pages.
//!
//! Everything here is a pure function of an HTML string: no I/O, no session
//! state. The navigator feeds each fetched view through the matching parser.

pub mod availability;
pub mod detail;
pub mod table;

use scraper::ElementRef;

pub use availability::AvailabilityDecoder;
pub use detail::{DetailParser, FieldRule, FieldSpec, DETAIL_FIELDS};
pub use table::TableExtractor;

/// Concatenated text of an element and its descendants, trimmed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join("").trim().to_string()
}
