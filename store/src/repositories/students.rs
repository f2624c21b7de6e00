use crate::domains::{Student, StudentField};

use super::{Repository, Result};

/// Student lookups, available on every student repository.
#[async_trait::async_trait]
pub trait StudentRepository: Repository<Student> {
    async fn find_by_first_name(&self, first_name: &str) -> Result<Vec<Student>> {
        self.find_by(StudentField::FirstName, first_name).await
    }

    async fn find_by_last_name(&self, last_name: &str) -> Result<Vec<Student>> {
        self.find_by(StudentField::LastName, last_name).await
    }

    /// May return more than one record if the store does not enforce unique emails.
    async fn find_by_email(&self, email: &str) -> Result<Vec<Student>> {
        self.find_by(StudentField::Email, email).await
    }
}

impl<R: Repository<Student>> StudentRepository for R {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::repositories::memory::MemoryRepository;

    use super::*;

    async fn seeded() -> MemoryRepository<Student> {
        let repository = MemoryRepository::<Student>::new();
        repository
            .insert_all(vec![
                Student::new("Ada", "Lovelace", "ada@example.com"),
                Student::new("Ada", "Byron", "byron@example.com"),
                Student::new("Grace", "Hopper", "grace@example.com"),
                Student::new("Alan", "Lovelace", "alan@example.com"),
            ])
            .await
            .unwrap();
        repository
    }

    fn emails(students: &[Student]) -> Vec<&str> {
        students.iter().map(|s| s.email.as_str()).collect()
    }

    #[tokio::test]
    async fn finds_by_first_name() {
        let repository = seeded().await;

        let found = repository.find_by_first_name("Ada").await.unwrap();
        assert_eq!(emails(&found), ["ada@example.com", "byron@example.com"]);
        assert!(found.iter().all(|s| s.first_name == "Ada"));

        // repeatable
        let again = repository.find_by_first_name("Ada").await.unwrap();
        assert_eq!(found, again);
    }

    #[tokio::test]
    async fn finds_by_last_name() {
        let repository = seeded().await;

        let found = repository.find_by_last_name("Lovelace").await.unwrap();
        assert_eq!(emails(&found), ["ada@example.com", "alan@example.com"]);
    }

    #[tokio::test]
    async fn finds_by_email() {
        let repository = seeded().await;

        let found = repository.find_by_email("grace@example.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Grace");
    }

    #[tokio::test]
    async fn match_is_exact() {
        let repository = seeded().await;

        assert!(repository.find_by_first_name("ada").await.unwrap().is_empty());
        assert!(repository.find_by_first_name("Ad").await.unwrap().is_empty());
        assert!(repository.find_by_email("nobody@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_track_writes() {
        let repository = seeded().await;

        let grace = repository.find_by_email("grace@example.com").await.unwrap().remove(0);
        let renamed = Student {
            first_name: "Ada".into(),
            ..grace
        };
        repository.update(renamed).await.unwrap();
        assert_eq!(repository.find_by_first_name("Ada").await.unwrap().len(), 3);
        assert!(repository.find_by_first_name("Grace").await.unwrap().is_empty());

        let byron = repository.find_by_last_name("Byron").await.unwrap().remove(0);
        repository.delete_by_id(byron.id.unwrap()).await.unwrap();
        assert_eq!(repository.find_by_first_name("Ada").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let repository: Arc<dyn StudentRepository> = Arc::new(seeded().await);

        let found = repository.find_by_last_name("Hopper").await.unwrap();
        assert_eq!(emails(&found), ["grace@example.com"]);
    }

    #[tokio::test]
    async fn lovelace_walkthrough() {
        let repository = MemoryRepository::<Student>::new();

        let ada = repository
            .insert(Student::new("Ada", "Lovelace", "ada@example.com"))
            .await
            .unwrap();
        assert_eq!(ada.id, Some(1));

        assert_eq!(
            repository.find_by_email("ada@example.com").await.unwrap(),
            [ada.clone()]
        );
        assert_eq!(
            repository.find_by_last_name("Lovelace").await.unwrap(),
            [ada.clone()]
        );

        repository.delete_by_id(1).await.unwrap();
        assert_eq!(repository.find_by_id(1).await.unwrap(), None);
    }
}
