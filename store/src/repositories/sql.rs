use std::{marker::PhantomData, sync::Arc, time::Duration};

use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    query_builder::Separated,
    FromRow, PgPool, Postgres, QueryBuilder,
};

use crate::{config::StoreConfig, error::RepositoryError};

use super::{Entity, EntityId, Repository, Result};

/// PostgreSQL accepts at most this many bind parameters per statement.
const BIND_LIMIT: usize = u16::MAX as usize;

/// Table layout of an [`Entity`] stored in PostgreSQL.
pub trait SqlEntity: Entity + for<'r> FromRow<'r, PgRow> + Unpin {
    const TABLE: &'static str;
    const ID_COLUMN: &'static str = "id";
    /// Every column but the id, in the order [`SqlEntity::push_columns`] binds them.
    const COLUMNS: &'static [&'static str];

    fn column(field: Self::Field) -> &'static str;

    fn push_columns<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

pub struct SqlRepository<E> {
    pool: PgPool,
    statements: Arc<Statements>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for SqlRepository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            statements: Arc::clone(&self.statements),
            _entity: PhantomData,
        }
    }
}

/// Statement text that only depends on the table layout.
struct Statements {
    select: String,
    returning: String,
    select_by_id: String,
    select_all: String,
    delete_by_id: String,
    exists_by_id: String,
    count: String,
}

impl Statements {
    fn new<E: SqlEntity>() -> Self {
        let table = E::TABLE;
        let id = E::ID_COLUMN;
        let columns = std::iter::once(id)
            .chain(E::COLUMNS.iter().copied())
            .collect::<Vec<_>>()
            .join(", ");

        let select = format!("SELECT {columns} FROM {table}");

        Self {
            returning: format!(" RETURNING {columns}"),
            select_by_id: format!("{select} WHERE {id} = $1"),
            select_all: format!("{select} ORDER BY {id}"),
            delete_by_id: format!("DELETE FROM {table} WHERE {id} = $1"),
            exists_by_id: format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {id} = $1)"),
            count: format!("SELECT COUNT(1) FROM {table}"),
            select,
        }
    }

    fn select_by<E: SqlEntity>(&self, field: E::Field) -> String {
        format!(
            "{} WHERE {} = $1 ORDER BY {}",
            self.select,
            E::column(field),
            E::ID_COLUMN
        )
    }
}

pub async fn connect(config: &StoreConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        target: "store",
        database = %config.redacted_database_url(),
        max_connections = config.max_connections,
        "connected to database"
    );

    Ok(pool)
}

impl<E: SqlEntity> SqlRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statements: Arc::new(Statements::new::<E>()),
            _entity: PhantomData,
        }
    }

    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        connect(config).await.map(Self::new)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn insert_query(&self, entity: &E) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new(format!("INSERT INTO {} (", E::TABLE));

        let mut columns = query.separated(", ");
        if entity.id().is_some() {
            columns.push(E::ID_COLUMN);
        }
        for column in E::COLUMNS {
            columns.push(column);
        }

        query.push(") VALUES (");
        let mut values = query.separated(", ");
        if let Some(id) = entity.id() {
            values.push_bind(id);
        }
        entity.push_columns(&mut values);
        query.push(")").push(&self.statements.returning);

        query
    }
}

#[async_trait::async_trait]
impl<E: SqlEntity> Repository<E> for SqlRepository<E> {
    #[tracing::instrument(skip_all, fields(entity = E::NAME, id = ?entity.id()))]
    async fn insert(&self, entity: E) -> Result<E> {
        let mut query = self.insert_query(&entity);
        let stored: E = query.build_query_as().fetch_one(&self.pool).await?;

        tracing::debug!(id = ?stored.id(), "inserted");
        Ok(stored)
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME, rows = entities.len()))]
    async fn insert_all(&self, entities: Vec<E>) -> Result<Vec<E>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let rows_per_statement = BIND_LIMIT / E::COLUMNS.len().max(1);
        let mut stored = Vec::with_capacity(entities.len());
        let mut tx = self.pool.begin().await?;

        for chunk in entities.chunks(rows_per_statement) {
            let mut query = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                E::TABLE,
                E::COLUMNS.join(", ")
            ));
            query
                .push_values(chunk, |mut row, entity| entity.push_columns(&mut row))
                .push(&self.statements.returning);

            let mut rows: Vec<E> = query.build_query_as().fetch_all(&mut *tx).await?;
            // RETURNING order is unspecified; the sequence hands out ids in VALUES order
            rows.sort_by_key(|row| row.id());
            stored.extend(rows);
        }

        tx.commit().await?;

        tracing::debug!(inserted = stored.len(), "inserted batch");
        Ok(stored)
    }

    #[tracing::instrument(skip(self), fields(entity = E::NAME))]
    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>> {
        sqlx::query_as(&self.statements.select_by_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self), fields(entity = E::NAME))]
    async fn find_all(&self) -> Result<Vec<E>> {
        let rows: Vec<E> = sqlx::query_as(&self.statements.select_all)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(rows = rows.len(), "loaded all");
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(entity = E::NAME))]
    async fn find_by(&self, field: E::Field, value: &str) -> Result<Vec<E>> {
        let statement = self.statements.select_by::<E>(field);
        let rows: Vec<E> = sqlx::query_as(&statement)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(rows = rows.len(), "matched");
        Ok(rows)
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME, id = ?entity.id()))]
    async fn update(&self, entity: E) -> Result<E> {
        let Some(id) = entity.id() else {
            return Err(RepositoryError::not_found(E::NAME, None));
        };

        let mut query = QueryBuilder::new(format!(
            "UPDATE {} SET ({}) = ROW(",
            E::TABLE,
            E::COLUMNS.join(", ")
        ));
        entity.push_columns(&mut query.separated(", "));
        query
            .push(format!(") WHERE {} = ", E::ID_COLUMN))
            .push_bind(id)
            .push(&self.statements.returning);

        query
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found(E::NAME, Some(id)))
    }

    #[tracing::instrument(skip(self), fields(entity = E::NAME))]
    async fn delete_by_id(&self, id: EntityId) -> Result<()> {
        let result = sqlx::query(&self.statements.delete_by_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(E::NAME, Some(id)));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(entity = E::NAME))]
    async fn exists_by_id(&self, id: EntityId) -> Result<bool> {
        sqlx::query_scalar(&self.statements.exists_by_id)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self), fields(entity = E::NAME))]
    async fn count(&self) -> Result<i64> {
        let (rows,) = sqlx::query_as(&self.statements.count)
            .fetch_one(&self.pool)
            .await?;

        Ok(rows)
    }
}
