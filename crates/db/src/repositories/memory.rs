use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use citequotes_core::domain::draft::{DraftId, DraftInput, QuoteDraft};
use citequotes_core::domain::role::{Privilege, UserId, UserRole};

use super::{new_id, DraftRepository, RepositoryError, RoleRepository};

#[derive(Default)]
pub struct InMemoryDraftRepository {
    drafts: RwLock<HashMap<String, QuoteDraft>>,
}

#[async_trait::async_trait]
impl DraftRepository for InMemoryDraftRepository {
    async fn create(&self, owner: &str, input: DraftInput) -> Result<QuoteDraft, RepositoryError> {
        let now = Utc::now();
        let draft = QuoteDraft {
            id: DraftId(new_id()),
            user_id: owner.to_string(),
            title: input.title,
            form_data: input.form_data,
            created_at: now,
            updated_at: now,
        };
        let mut drafts = self.drafts.write().await;
        drafts.insert(draft.id.0.clone(), draft.clone());
        Ok(draft)
    }

    async fn find(
        &self,
        owner: &str,
        id: &DraftId,
    ) -> Result<Option<QuoteDraft>, RepositoryError> {
        let drafts = self.drafts.read().await;
        Ok(drafts.get(&id.0).filter(|draft| draft.user_id == owner).cloned())
    }

    async fn list(&self, owner: &str) -> Result<Vec<QuoteDraft>, RepositoryError> {
        let drafts = self.drafts.read().await;
        let mut owned: Vec<QuoteDraft> =
            drafts.values().filter(|draft| draft.user_id == owner).cloned().collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(owned)
    }

    async fn update(
        &self,
        owner: &str,
        id: &DraftId,
        input: DraftInput,
    ) -> Result<QuoteDraft, RepositoryError> {
        let mut drafts = self.drafts.write().await;
        let draft = drafts
            .get_mut(&id.0)
            .filter(|draft| draft.user_id == owner)
            .ok_or_else(|| RepositoryError::not_found("draft", &id.0))?;
        draft.title = input.title;
        draft.form_data = input.form_data;
        draft.updated_at = Utc::now();
        Ok(draft.clone())
    }

    async fn delete(&self, owner: &str, id: &DraftId) -> Result<(), RepositoryError> {
        let mut drafts = self.drafts.write().await;
        match drafts.get(&id.0) {
            Some(draft) if draft.user_id == owner => {
                drafts.remove(&id.0);
                Ok(())
            }
            _ => Err(RepositoryError::not_found("draft", &id.0)),
        }
    }
}

/// Role store keyed by user id; emails are whatever the caller registered.
#[derive(Default)]
pub struct InMemoryRoleRepository {
    emails: RwLock<HashMap<String, String>>,
    roles: RwLock<HashMap<String, UserRole>>,
}

impl InMemoryRoleRepository {
    pub async fn register(&self, user_id: &UserId, email: &str) {
        self.emails.write().await.insert(user_id.0.clone(), email.to_string());
    }
}

#[async_trait::async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn privilege_of(&self, user_id: &UserId) -> Result<Privilege, RepositoryError> {
        let roles = self.roles.read().await;
        Ok(roles.get(&user_id.0).map(|role| role.role).unwrap_or_default())
    }

    async fn set_role(
        &self,
        user_id: &UserId,
        role: Privilege,
        updated_by: &str,
    ) -> Result<UserRole, RepositoryError> {
        let email = self
            .emails
            .read()
            .await
            .get(&user_id.0)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("user", &user_id.0))?;

        let assigned = UserRole {
            user_id: user_id.clone(),
            email,
            role,
            updated_by: Some(updated_by.to_string()),
            updated_at: Utc::now(),
        };
        self.roles.write().await.insert(user_id.0.clone(), assigned.clone());
        Ok(assigned)
    }

    async fn list(&self) -> Result<Vec<UserRole>, RepositoryError> {
        let roles = self.roles.read().await;
        let mut all: Vec<UserRole> = roles.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(all)
    }
}
