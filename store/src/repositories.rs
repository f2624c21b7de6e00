pub mod memory;
pub mod sql;
pub mod students;

use std::fmt::Debug;

use crate::error::RepositoryError;

pub use students::StudentRepository;

pub type EntityId = i64;

pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;

/// A record type with a store-assigned numeric identifier.
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    /// Columns a record can be filtered on.
    type Field: Copy + Debug + Send + Sync + 'static;

    const NAME: &'static str;

    /// Fields whose values may appear at most once across all records.
    const UNIQUE: &'static [Self::Field] = &[];

    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: EntityId);
    fn field(&self, field: Self::Field) -> &str;
}

#[async_trait::async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Persists a new record, assigning an id unless the entity already carries one.
    async fn insert(&self, entity: E) -> Result<E>;

    /// Inserts every entity or none of them. Ids are always assigned by the store,
    /// records come back in input order.
    async fn insert_all(&self, entities: Vec<E>) -> Result<Vec<E>>;

    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>>;

    /// Every record, ordered by id.
    async fn find_all(&self) -> Result<Vec<E>>;

    /// Records whose `field` equals `value` exactly, ordered by id.
    async fn find_by(&self, field: E::Field, value: &str) -> Result<Vec<E>>;

    /// Replaces an existing record. Fails with [`RepositoryError::NotFound`] when the
    /// id is absent or unknown; never inserts.
    async fn update(&self, entity: E) -> Result<E>;

    async fn delete_by_id(&self, id: EntityId) -> Result<()>;

    async fn exists_by_id(&self, id: EntityId) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    async fn count(&self) -> Result<i64>;
}
