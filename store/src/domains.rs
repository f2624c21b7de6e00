use anyhow::Result;
use sqlx::{query_builder::Separated, Postgres};

use crate::repositories::{sql::SqlEntity, Entity, EntityId};

const MAX_FIELD_LEN: usize = 255;

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Student {
    /// A student that has not been persisted yet.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.first_name.trim().is_empty(),
            "first name must not be blank"
        );
        anyhow::ensure!(
            !self.last_name.trim().is_empty(),
            "last name must not be blank"
        );

        let valid_email = self
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            });
        anyhow::ensure!(valid_email, "email must look like local@domain");

        for (name, value) in [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("email", &self.email),
        ] {
            anyhow::ensure!(
                value.chars().count() <= MAX_FIELD_LEN,
                "{name} must be at max {MAX_FIELD_LEN} chars wide"
            );
        }

        Ok(())
    }
}

/// Fields a student can be looked up by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StudentField {
    FirstName,
    LastName,
    Email,
}

impl Entity for Student {
    type Field = StudentField;

    const NAME: &'static str = "student";
    const UNIQUE: &'static [StudentField] = &[StudentField::Email];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn field(&self, field: StudentField) -> &str {
        match field {
            StudentField::FirstName => &self.first_name,
            StudentField::LastName => &self.last_name,
            StudentField::Email => &self.email,
        }
    }
}

impl SqlEntity for Student {
    const TABLE: &'static str = "students";
    const COLUMNS: &'static [&'static str] = &["first_name", "last_name", "email"];

    fn column(field: StudentField) -> &'static str {
        match field {
            StudentField::FirstName => "first_name",
            StudentField::LastName => "last_name",
            StudentField::Email => "email",
        }
    }

    fn push_columns<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.first_name.clone())
            .push_bind(self.last_name.clone())
            .push_bind(self.email.clone());
    }
}
