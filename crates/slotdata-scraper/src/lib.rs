//! Page capture and record extraction for slot-data store pages.

pub mod capture;
pub mod discover;
pub mod error;
pub mod extract;
pub mod fields;
pub mod identity;

pub use capture::{
    CaptureBundle, CaptureTimings, ChromiumRenderer, InteractiveCapture, JsonPayload,
    PageCapture, StaticFetcher,
};
pub use discover::{discover_store_ids, store_ids_from_html};
pub use error::{ExtractError, ScraperError};
pub use extract::{
    extract_records, summarize_tables, ExtractContext, Extraction, ExtractionSource,
    TableSummary,
};
pub use fields::FieldMapper;
pub use identity::{dedup_records, IdentityContext};
