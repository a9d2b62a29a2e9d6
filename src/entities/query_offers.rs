use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "query_offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub query_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub offer_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::queries::Entity",
        from = "Column::QueryId",
        to = "super::queries::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Queries,
    #[sea_orm(
        belongs_to = "super::offers::Entity",
        from = "Column::OfferId",
        to = "super::offers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Offers,
}

impl Related<super::queries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Queries.def()
    }
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
