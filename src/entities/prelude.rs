pub use super::offers::Entity as Offers;
pub use super::queries::Entity as Queries;
pub use super::query_offers::Entity as QueryOffers;
