use anyhow::Result;
use chrono::NaiveDate;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::domain::QueryId;
use crate::models::{NewOffer, Offer, Query};

pub mod migrator;
pub mod repositories;

/// Outcomes of store operations that callers are expected to branch on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query already exists: {keywords:?} @ {location:?}")]
    Conflict { keywords: String, location: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl StoreError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    /// A private in-memory database. The pool is pinned to one connection
    /// because every SQLite connection would otherwise see its own database.
    pub async fn in_memory() -> Result<Self> {
        Self::with_pool_options("sqlite::memory:", 1, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn query_repo(&self) -> repositories::query::QueryRepository {
        repositories::query::QueryRepository::new(self.conn.clone())
    }

    fn offer_repo(&self) -> repositories::offer::OfferRepository {
        repositories::offer::OfferRepository::new(self.conn.clone())
    }

    // Queries

    pub async fn create_query(&self, keywords: &str, location: &str) -> StoreResult<Query> {
        self.query_repo().create(keywords, location).await
    }

    pub async fn get_query(&self, keywords: &str, location: &str) -> StoreResult<Query> {
        self.query_repo().get(keywords, location).await
    }

    pub async fn get_query_by_id(&self, id: QueryId) -> StoreResult<Query> {
        self.query_repo().get_by_id(id).await
    }

    pub async fn list_queries(&self) -> StoreResult<Vec<Query>> {
        self.query_repo().list().await
    }

    pub async fn delete_query(&self, id: QueryId) -> StoreResult<bool> {
        self.query_repo().delete(id).await
    }

    /// Marks the query's feed as read now.
    pub async fn touch_query_read(&self, id: QueryId) -> StoreResult<()> {
        self.query_repo().touch_read(id).await
    }

    /// Marks the query as successfully scraped now.
    pub async fn touch_query_run(&self, id: QueryId) -> StoreResult<()> {
        self.query_repo().touch_run(id).await
    }

    // Offers

    pub async fn create_offer(&self, offer: &NewOffer) -> StoreResult<()> {
        self.offer_repo().create(offer).await
    }

    pub async fn create_association(&self, query_id: QueryId, offer_id: &str) -> StoreResult<()> {
        self.offer_repo().associate(query_id, offer_id).await
    }

    /// Offers linked to the query and posted on or after `since`, newest first.
    pub async fn list_offers(&self, query_id: QueryId, since: NaiveDate) -> StoreResult<Vec<Offer>> {
        self.offer_repo().list_for_query(query_id, since).await
    }

    pub async fn get_offer(&self, id: &str) -> StoreResult<Offer> {
        self.offer_repo().get(id).await
    }

    pub async fn count_offers(&self) -> StoreResult<u64> {
        self.offer_repo().count().await
    }

    pub async fn count_associations(&self, offer_id: &str) -> StoreResult<u64> {
        self.offer_repo().count_associations(offer_id).await
    }

    /// Deletes offers posted before `cutoff` together with their associations.
    pub async fn delete_old_offers(&self, cutoff: NaiveDate) -> StoreResult<u64> {
        self.offer_repo().delete_posted_before(cutoff).await
    }
}
