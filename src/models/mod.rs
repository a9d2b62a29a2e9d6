pub mod offer;
pub mod query;

pub use offer::{NewOffer, Offer};
pub use query::Query;
