//! In-process `users` document collection.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{UserPersistenceError, UserRepository};
use crate::domain::{PlatformUserId, UserDocument};

/// [`UserRepository`] keeping documents in a map keyed by the platform id.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    documents: Mutex<HashMap<String, UserDocument>>,
}

impl InMemoryUserRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no document is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_document(
        &self,
        id: &PlatformUserId,
    ) -> Result<Option<UserDocument>, UserPersistenceError> {
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id.document_key())
            .cloned())
    }

    async fn save(
        &self,
        id: &PlatformUserId,
        document: &UserDocument,
    ) -> Result<(), UserPersistenceError> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.document_key(), document.clone());
        Ok(())
    }
}
