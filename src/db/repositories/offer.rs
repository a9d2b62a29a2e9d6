use crate::db::{StoreError, StoreResult};
use crate::domain::QueryId;
use crate::entities::{offers, prelude::*, query_offers};
use crate::models::{NewOffer, Offer};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{OnConflict, Query as SelectQuery};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

/// Repository for offers and their links to queries.
pub struct OfferRepository {
    conn: DatabaseConnection,
}

impl OfferRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: offers::Model) -> Offer {
        Offer {
            id: model.id,
            title: model.title,
            company: model.company,
            location: model.location,
            posted_at: model.posted_at,
            created_at: model.created_at,
        }
    }

    /// Inserts an offer once. A second insert of the same id leaves the stored
    /// row untouched and reports `StoreError::Duplicate`.
    pub async fn create(&self, offer: &NewOffer) -> StoreResult<()> {
        let active_model = offers::ActiveModel {
            id: Set(offer.id.clone()),
            title: Set(offer.title.clone()),
            company: Set(offer.company.clone()),
            location: Set(offer.location.clone()),
            posted_at: Set(offer.posted_at),
            created_at: Set(Utc::now()),
        };

        let inserted = Offers::insert(active_model)
            .on_conflict(OnConflict::column(offers::Column::Id).do_nothing().to_owned())
            .exec_without_returning(&self.conn)
            .await?;

        if inserted == 0 {
            return Err(StoreError::Duplicate(format!("offer {}", offer.id)));
        }
        Ok(())
    }

    pub async fn associate(&self, query_id: QueryId, offer_id: &str) -> StoreResult<()> {
        let active_model = query_offers::ActiveModel {
            query_id: Set(query_id.value()),
            offer_id: Set(offer_id.to_string()),
        };

        let inserted = QueryOffers::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    query_offers::Column::QueryId,
                    query_offers::Column::OfferId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        if inserted == 0 {
            return Err(StoreError::Duplicate(format!(
                "association {query_id} -> {offer_id}"
            )));
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> StoreResult<Offer> {
        Offers::find_by_id(id.to_string())
            .one(&self.conn)
            .await?
            .map(Self::map_model)
            .ok_or_else(|| StoreError::NotFound(format!("offer {id}")))
    }

    pub async fn list_for_query(&self, query_id: QueryId, since: NaiveDate) -> StoreResult<Vec<Offer>> {
        let rows = Offers::find()
            .inner_join(QueryOffers)
            .filter(query_offers::Column::QueryId.eq(query_id.value()))
            .filter(offers::Column::PostedAt.gte(since))
            .order_by_desc(offers::Column::PostedAt)
            .order_by_desc(offers::Column::CreatedAt)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn count(&self) -> StoreResult<u64> {
        Ok(Offers::find().count(&self.conn).await?)
    }

    pub async fn count_associations(&self, offer_id: &str) -> StoreResult<u64> {
        Ok(QueryOffers::find()
            .filter(query_offers::Column::OfferId.eq(offer_id))
            .count(&self.conn)
            .await?)
    }

    pub async fn delete_posted_before(&self, cutoff: NaiveDate) -> StoreResult<u64> {
        let txn = self.conn.begin().await?;

        let stale_ids = SelectQuery::select()
            .column(offers::Column::Id)
            .from(Offers)
            .and_where(offers::Column::PostedAt.lt(cutoff))
            .to_owned();

        QueryOffers::delete_many()
            .filter(query_offers::Column::OfferId.in_subquery(stale_ids))
            .exec(&txn)
            .await?;

        let result = Offers::delete_many()
            .filter(offers::Column::PostedAt.lt(cutoff))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(result.rows_affected)
    }
}
