use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use tokio::sync::RwLock;

use crate::error::RepositoryError;

use super::{Entity, EntityId, Repository, Result};

/// Keeps records in process memory with the same semantics as the SQL backend.
pub struct MemoryRepository<E> {
    state: RwLock<State<E>>,
    closed: AtomicBool,
}

struct State<E> {
    rows: BTreeMap<EntityId, E>,
    /// `None` once the id space is used up, like an exhausted sequence.
    next_id: Option<EntityId>,
}

impl<E: Entity> MemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                rows: BTreeMap::new(),
                next_id: Some(1),
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Every later call fails with [`RepositoryError::StorageUnavailable`], the way a
    /// closed pool does.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RepositoryError::StorageUnavailable(sqlx::Error::PoolClosed));
        }

        Ok(())
    }
}

impl<E: Entity> Default for MemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> State<E> {
    fn next_id(&self) -> Result<EntityId> {
        self.next_id
            .ok_or_else(|| RepositoryError::ConstraintViolation {
                constraint: None,
                message: format!("no {} ids left to assign", E::NAME),
            })
    }

    fn check_unique(&self, entity: &E, own_id: Option<EntityId>) -> Result<()> {
        for &field in E::UNIQUE {
            let value = entity.field(field);
            let taken = self
                .rows
                .iter()
                .any(|(id, row)| Some(*id) != own_id && row.field(field) == value);

            if taken {
                return Err(RepositoryError::ConstraintViolation {
                    constraint: None,
                    message: format!("duplicate {field:?} {value:?} for {}", E::NAME),
                });
            }
        }

        Ok(())
    }

    fn insert(&mut self, mut entity: E) -> Result<E> {
        let id = match entity.id() {
            Some(id) if self.rows.contains_key(&id) => {
                return Err(RepositoryError::ConstraintViolation {
                    constraint: None,
                    message: format!("duplicate id {id} for {}", E::NAME),
                });
            }
            Some(id) => id,
            None => self.next_id()?,
        };

        self.check_unique(&entity, None)?;

        entity.set_id(id);
        if let Some(next_id) = self.next_id {
            self.next_id = id.checked_add(1).map(|after| next_id.max(after));
        }
        self.rows.insert(id, entity.clone());

        Ok(entity)
    }
}

#[async_trait::async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E> {
    async fn insert(&self, entity: E) -> Result<E> {
        self.ensure_open()?;

        self.state.write().await.insert(entity)
    }

    async fn insert_all(&self, entities: Vec<E>) -> Result<Vec<E>> {
        self.ensure_open()?;

        let mut state = self.state.write().await;

        // stage on a copy so a failure leaves nothing behind
        let mut staged = State {
            rows: state.rows.clone(),
            next_id: state.next_id,
        };
        let inserted = entities
            .into_iter()
            .map(|mut entity| {
                entity.set_id(staged.next_id()?);
                staged.insert(entity)
            })
            .collect::<Result<Vec<_>>>()?;

        *state = staged;

        Ok(inserted)
    }

    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>> {
        self.ensure_open()?;

        Ok(self.state.read().await.rows.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<E>> {
        self.ensure_open()?;

        Ok(self.state.read().await.rows.values().cloned().collect())
    }

    async fn find_by(&self, field: E::Field, value: &str) -> Result<Vec<E>> {
        self.ensure_open()?;

        let state = self.state.read().await;
        let rows = state
            .rows
            .values()
            .filter(|row| row.field(field) == value)
            .cloned()
            .collect();

        Ok(rows)
    }

    async fn update(&self, entity: E) -> Result<E> {
        self.ensure_open()?;

        let id = entity.id();
        let mut state = self.state.write().await;
        let Some(id) = id.filter(|id| state.rows.contains_key(id)) else {
            return Err(RepositoryError::not_found(E::NAME, id));
        };

        state.check_unique(&entity, Some(id))?;
        state.rows.insert(id, entity.clone());

        Ok(entity)
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<()> {
        self.ensure_open()?;

        match self.state.write().await.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::not_found(E::NAME, Some(id))),
        }
    }

    async fn count(&self) -> Result<i64> {
        self.ensure_open()?;

        Ok(self.state.read().await.rows.len() as i64)
    }
}
