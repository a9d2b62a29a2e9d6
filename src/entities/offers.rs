use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    /// Identifier assigned by the job board.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posted_at: Date,
    pub created_at: DateTimeUtc,
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

impl ActiveModelBehavior for ActiveModel {}
