//! SDK Utilities

mod json;
mod time;

pub use aura_core::content_hash;
pub use json::{parse_model_json, strip_code_fences};
pub use time::format_timestamp;
