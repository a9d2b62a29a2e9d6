pub mod prelude;

pub mod offers;
pub mod queries;
pub mod query_offers;
