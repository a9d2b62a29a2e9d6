pub mod offer;
pub mod query;
