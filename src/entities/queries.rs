use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "queries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub keywords: String,
    pub location: String,
    pub created_at: DateTimeUtc,
    pub queried_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::query_offers::Entity")]
    QueryOffers,
}

impl Related<super::query_offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QueryOffers.def()
    }
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        super::query_offers::Relation::Offers.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::query_offers::Relation::Queries.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
