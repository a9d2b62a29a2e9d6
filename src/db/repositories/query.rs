use crate::db::{StoreError, StoreResult};
use crate::domain::QueryId;
use crate::entities::{prelude::*, queries, query_offers};
use crate::models::Query;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
    TransactionTrait,
};
use tracing::info;

/// Repository for persisted search queries.
pub struct QueryRepository {
    conn: DatabaseConnection,
}

impl QueryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: queries::Model) -> Query {
        Query {
            id: QueryId::new(model.id),
            keywords: model.keywords,
            location: model.location,
            created_at: model.created_at,
            queried_at: model.queried_at,
            updated_at: model.updated_at,
        }
    }

    fn not_found(what: impl std::fmt::Display) -> StoreError {
        StoreError::NotFound(format!("query {what}"))
    }

    /// Inserts a new query. The unique index on (keywords, location) turns a
    /// second insert of the same pair into `StoreError::Conflict`.
    pub async fn create(&self, keywords: &str, location: &str) -> StoreResult<Query> {
        let now = Utc::now();
        let active_model = queries::ActiveModel {
            keywords: Set(keywords.to_string()),
            location: Set(location.to_string()),
            created_at: Set(now),
            queried_at: Set(now),
            updated_at: Set(None),
            ..Default::default()
        };

        let res = match Queries::insert(active_model).exec(&self.conn).await {
            Ok(res) => res,
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    return Err(StoreError::Conflict {
                        keywords: keywords.to_string(),
                        location: location.to_string(),
                    });
                }
                return Err(e.into());
            }
        };

        info!(query_id = res.last_insert_id, keywords, location, "Stored new query");
        self.get_by_id(QueryId::new(res.last_insert_id)).await
    }

    pub async fn get(&self, keywords: &str, location: &str) -> StoreResult<Query> {
        Queries::find()
            .filter(queries::Column::Keywords.eq(keywords))
            .filter(queries::Column::Location.eq(location))
            .one(&self.conn)
            .await?
            .map(Self::map_model)
            .ok_or_else(|| Self::not_found(format!("{keywords:?} @ {location:?}")))
    }

    pub async fn get_by_id(&self, id: QueryId) -> StoreResult<Query> {
        Queries::find_by_id(id.value())
            .one(&self.conn)
            .await?
            .map(Self::map_model)
            .ok_or_else(|| Self::not_found(id))
    }

    pub async fn list(&self) -> StoreResult<Vec<Query>> {
        let rows = Queries::find()
            .order_by_asc(queries::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn delete(&self, id: QueryId) -> StoreResult<bool> {
        let txn = self.conn.begin().await?;

        QueryOffers::delete_many()
            .filter(query_offers::Column::QueryId.eq(id.value()))
            .exec(&txn)
            .await?;

        let result = Queries::delete_by_id(id.value()).exec(&txn).await?;
        txn.commit().await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn touch_read(&self, id: QueryId) -> StoreResult<()> {
        self.touch(id, queries::Column::QueriedAt).await
    }

    pub async fn touch_run(&self, id: QueryId) -> StoreResult<()> {
        self.touch(id, queries::Column::UpdatedAt).await
    }

    async fn touch(&self, id: QueryId, column: queries::Column) -> StoreResult<()> {
        let result = Queries::update_many()
            .col_expr(column, Expr::value(Utc::now()))
            .filter(queries::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}
