//! URL modeling: validation and reading candidate URLs from line-oriented input.
//!
//! URLs are opaque strings. Nothing here normalizes case, trailing slashes or
//! query order; two spellings of the same resource are two identities.

mod reader;
mod validate;

pub use reader::{read_urls, UrlLines};
pub use validate::is_valid_url;
