pub mod destination;
pub mod migrate;
pub mod models;
pub mod report;
pub mod source;
pub mod transform;
pub mod units;
pub mod validate;
