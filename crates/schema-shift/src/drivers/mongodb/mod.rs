//! MongoDB document target driver.
//!
//! - [`MongoWriter`]: collection reset and bulk document insert

mod writer;

pub use writer::{classify_mongo_error, MongoWriter};
