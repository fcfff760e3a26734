//! In-memory storage implementation

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{
    CreateUserDto, CredentialStore, IdentityError, IdentityResult, Role, RoleAssigner, User,
};

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    /// email -> user id
    emails: HashMap<String, String>,
    /// username -> user id
    usernames: HashMap<String, String>,
    /// role name -> role
    roles: HashMap<String, Role>,
}

/// In-memory credential store and role assigner for development and testing.
///
/// One lock guards the user map and both uniqueness indexes, so the
/// check-and-insert in `create_user` cannot interleave with another writer.
#[derive(Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with the given role names.
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = State::default();
        for name in roles {
            let name = name.into();
            state.roles.insert(
                name.clone(),
                Role {
                    id: uuid::Uuid::new_v4().to_string(),
                    name,
                },
            );
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

fn unknown_roles(state: &State, requested: &BTreeSet<String>) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !state.roles.contains_key(name.as_str()))
        .cloned()
        .collect()
}

#[async_trait]
impl CredentialStore for InMemoryStorage {
    async fn create_user(&self, dto: CreateUserDto) -> IdentityResult<User> {
        let mut state = self.state.write().await;

        if state.emails.contains_key(&dto.email) {
            return Err(IdentityError::AlreadyRegistered(
                "Email is already registered".into(),
            ));
        }
        if state.usernames.contains_key(&dto.username) {
            return Err(IdentityError::AlreadyRegistered(
                "Username is already registered".into(),
            ));
        }

        let roles: BTreeSet<String> = dto.roles.into_iter().collect();
        let missing = unknown_roles(&state, &roles);
        if !missing.is_empty() {
            return Err(IdentityError::ValidationFailed(format!(
                "Unknown role(s): {}",
                missing.join(", ")
            )));
        }

        let now = Utc::now();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: dto.username,
            email: dto.email,
            full_name: dto.full_name,
            age: dto.age,
            password_hash: dto.password_hash,
            roles,
            created_at: now,
            updated_at: now,
        };

        state.emails.insert(user.email.clone(), user.id.clone());
        state.usernames.insert(user.username.clone(), user.id.clone());
        state.users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn list_users(&self) -> IdentityResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(users)
    }

    async fn count_users(&self) -> IdentityResult<u64> {
        Ok(self.state.read().await.users.len() as u64)
    }

    async fn get_user_by_id(&self, id: &str) -> IdentityResult<Option<User>> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> IdentityResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> IdentityResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }
}

#[async_trait]
impl RoleAssigner for InMemoryStorage {
    async fn ensure_role(&self, name: &str) -> IdentityResult<Role> {
        let mut state = self.state.write().await;
        let role = state
            .roles
            .entry(name.to_string())
            .or_insert_with(|| Role {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
            });
        Ok(role.clone())
    }

    async fn role_exists(&self, name: &str) -> IdentityResult<bool> {
        Ok(self.state.read().await.roles.contains_key(name))
    }

    async fn assign_role(&self, user_id: &str, role: &str) -> IdentityResult<()> {
        let mut state = self.state.write().await;

        if !state.roles.contains_key(role) {
            if !state.users.contains_key(user_id) {
                return Err(IdentityError::user_not_found(user_id));
            }
            return Err(IdentityError::ValidationFailed(format!(
                "Unknown role(s): {}",
                role
            )));
        }

        let Some(user) = state.users.get_mut(user_id) else {
            return Err(IdentityError::user_not_found(user_id));
        };

        if user.roles.insert(role.to_string()) {
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn dto(username: &str, email: &str, roles: &[&str]) -> CreateUserDto {
        CreateUserDto {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test".to_string(),
            age: 20,
            password_hash: "hash".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let storage = InMemoryStorage::with_roles(["Admin"]);
        let user = storage
            .create_user(dto("alice", "a@x.com", &["Admin"]))
            .await
            .unwrap();

        let by_email = storage.get_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(by_email.has_role("Admin"));
        assert!(storage.get_user_by_username("alice").await.unwrap().is_some());
        assert!(storage.get_user_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicates_and_unknown_roles_leave_no_trace() {
        let storage = InMemoryStorage::new();
        storage.create_user(dto("alice", "a@x.com", &[])).await.unwrap();

        let dup_email = storage.create_user(dto("other", "a@x.com", &[])).await;
        assert!(matches!(dup_email, Err(IdentityError::AlreadyRegistered(_))));

        let dup_name = storage.create_user(dto("alice", "b@x.com", &[])).await;
        assert!(matches!(dup_name, Err(IdentityError::AlreadyRegistered(_))));

        let bad_role = storage.create_user(dto("carol", "c@x.com", &["Nope"])).await;
        assert!(matches!(bad_role, Err(IdentityError::ValidationFailed(_))));

        assert_eq!(storage.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_registrations_with_same_email() {
        let storage = Arc::new(InMemoryStorage::new());

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage
                        .create_user(dto(&format!("user{i}"), "same@x.com", &[]))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(storage.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn assign_role_rules() {
        let storage = InMemoryStorage::with_roles(["Admin"]);
        let user = storage.create_user(dto("alice", "a@x.com", &[])).await.unwrap();

        storage.assign_role(&user.id, "Admin").await.unwrap();
        storage.assign_role(&user.id, "Admin").await.unwrap();
        let user = storage.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(user.role_list(), vec!["Admin"]);

        assert!(matches!(
            storage.assign_role("missing", "Admin").await,
            Err(IdentityError::NotFound { .. })
        ));
        assert!(matches!(
            storage.assign_role(&user.id, "Ghost").await,
            Err(IdentityError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn ensure_role_creates_once() {
        let storage = InMemoryStorage::new();
        let a = storage.ensure_role("User").await.unwrap();
        let b = storage.ensure_role("User").await.unwrap();
        assert_eq!(a, b);
        assert!(storage.role_exists("User").await.unwrap());
        assert_eq!(storage.state.read().await.roles.len(), 1);
    }
}
