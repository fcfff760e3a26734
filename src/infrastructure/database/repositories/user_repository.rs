use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use super::is_unique_violation;
use crate::domain::{CreateUserDto, CredentialStore, IdentityError, IdentityResult, User};
use crate::infrastructure::database::entities::{role, user, user_role};

pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn user_model_to_domain(model: user::Model, roles: BTreeSet<String>) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        full_name: model.full_name,
        age: u32::try_from(model.age).unwrap_or_default(),
        password_hash: model.password_hash,
        roles,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn conflict_or_db(e: DbErr) -> IdentityError {
    if is_unique_violation(&e) {
        let what = if e.to_string().contains("email") {
            "Email"
        } else {
            "Username"
        };
        IdentityError::AlreadyRegistered(format!("{} is already registered", what))
    } else {
        e.into()
    }
}

/// Role names per user id, for the given users only.
pub(crate) async fn roles_by_user<C: ConnectionTrait>(
    conn: &C,
    user_ids: Vec<String>,
) -> Result<HashMap<String, BTreeSet<String>>, DbErr> {
    let links = user_role::Entity::find()
        .filter(user_role::Column::UserId.is_in(user_ids))
        .find_also_related(role::Entity)
        .all(conn)
        .await?;

    let mut roles: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (link, role) in links {
        if let Some(role) = role {
            roles.entry(link.user_id).or_default().insert(role.name);
        }
    }
    Ok(roles)
}

async fn with_roles<C: ConnectionTrait>(conn: &C, model: user::Model) -> Result<User, DbErr> {
    let mut roles = roles_by_user(conn, vec![model.id.clone()]).await?;
    let names = roles.remove(&model.id).unwrap_or_default();
    Ok(user_model_to_domain(model, names))
}

// ── CredentialStore implementation ──────────────────────────────

#[async_trait]
impl CredentialStore for UserRepository {
    async fn create_user(&self, dto: CreateUserDto) -> IdentityResult<User> {
        let age = i32::try_from(dto.age)
            .map_err(|_| IdentityError::ValidationFailed(format!("Age {} is out of range", dto.age)))?;
        let requested: BTreeSet<String> = dto.roles.into_iter().collect();

        let now = Utc::now();
        let txn = self.db.begin().await?;

        // Insert first so the write lock is taken before any read; the unique
        // indexes decide which of two racing registrations wins.
        let model = user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            username: Set(dto.username),
            email: Set(dto.email),
            full_name: Set(dto.full_name),
            age: Set(age),
            password_hash: Set(dto.password_hash),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(conflict_or_db)?;

        let roles = if requested.is_empty() {
            Vec::new()
        } else {
            role::Entity::find()
                .filter(role::Column::Name.is_in(requested.iter().cloned()))
                .all(&txn)
                .await?
        };

        if roles.len() != requested.len() {
            let known: BTreeSet<&str> = roles.iter().map(|r| r.name.as_str()).collect();
            let missing: Vec<&str> = requested
                .iter()
                .map(String::as_str)
                .filter(|name| !known.contains(name))
                .collect();
            txn.rollback().await?;
            return Err(IdentityError::ValidationFailed(format!(
                "Unknown role(s): {}",
                missing.join(", ")
            )));
        }

        if !roles.is_empty() {
            let links = roles.iter().map(|r| user_role::ActiveModel {
                user_id: Set(model.id.clone()),
                role_id: Set(r.id.clone()),
            });
            user_role::Entity::insert_many(links)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        debug!(user_id = %model.id, roles = roles.len(), "User row committed");

        let names = roles.into_iter().map(|r| r.name).collect();
        Ok(user_model_to_domain(model, names))
    }

    async fn list_users(&self) -> IdentityResult<Vec<User>> {
        let models = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Username)
            .all(&self.db)
            .await?;

        let ids = models.iter().map(|m| m.id.clone()).collect();
        let mut roles = roles_by_user(&self.db, ids).await?;

        Ok(models
            .into_iter()
            .map(|m| {
                let names = roles.remove(&m.id).unwrap_or_default();
                user_model_to_domain(m, names)
            })
            .collect())
    }

    async fn count_users(&self) -> IdentityResult<u64> {
        Ok(user::Entity::find().count(&self.db).await?)
    }

    async fn get_user_by_id(&self, id: &str) -> IdentityResult<Option<User>> {
        let Some(model) = user::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        Ok(Some(with_roles(&self.db, model).await?))
    }

    async fn get_user_by_email(&self, email: &str) -> IdentityResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        let Some(model) = model else {
            return Ok(None);
        };
        Ok(Some(with_roles(&self.db, model).await?))
    }

    async fn get_user_by_username(&self, username: &str) -> IdentityResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?;

        let Some(model) = model else {
            return Ok(None);
        };
        Ok(Some(with_roles(&self.db, model).await?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::domain::RoleAssigner;
    use crate::infrastructure::database::migrator::Migrator;
    use crate::infrastructure::database::{init_database, DatabaseConfig, RoleRepository};

    async fn setup() -> DatabaseConnection {
        let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let roles = RoleRepository::new(db.clone());
        roles.ensure_role("Admin").await.unwrap();
        roles.ensure_role("User").await.unwrap();
        db
    }

    fn dto(username: &str, email: &str, roles: &[&str]) -> CreateUserDto {
        CreateUserDto {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            age: 28,
            password_hash: "$2b$04$not-a-real-hash".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn create_and_fetch_user_with_roles() {
        let repo = UserRepository::new(setup().await);

        let created = repo
            .create_user(dto("alice", "alice@example.com", &["Admin", "User"]))
            .await
            .unwrap();
        assert!(created.has_role("Admin"));

        let by_email = repo
            .get_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.age, 28);
        assert_eq!(by_email.role_list(), vec!["Admin", "User"]);

        let by_id = repo.get_user_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        let by_name = repo.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.email, "alice@example.com");
    }

    #[tokio::test]
    async fn missing_user_lookups_return_none() {
        let repo = UserRepository::new(setup().await);
        assert!(repo.get_user_by_id("nope").await.unwrap().is_none());
        assert!(repo.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = UserRepository::new(setup().await);
        repo.create_user(dto("alice", "a@x.com", &[])).await.unwrap();

        let err = repo.create_user(dto("alice2", "a@x.com", &[])).await.unwrap_err();
        assert!(matches!(err, IdentityError::AlreadyRegistered(_)));
        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let repo = UserRepository::new(setup().await);
        repo.create_user(dto("alice", "a@x.com", &[])).await.unwrap();

        let err = repo.create_user(dto("alice", "b@x.com", &[])).await.unwrap_err();
        assert!(matches!(err, IdentityError::AlreadyRegistered(_)));
        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_role_rolls_back_user() {
        let repo = UserRepository::new(setup().await);

        let err = repo
            .create_user(dto("bob", "bob@example.com", &["User", "Wizard"]))
            .await
            .unwrap_err();
        match err {
            IdentityError::ValidationFailed(msg) => assert!(msg.contains("Wizard")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(repo.count_users().await.unwrap(), 0);
        assert!(repo.get_user_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_duplicate_registration_keeps_one_user() {
        let repo = Arc::new(UserRepository::new(setup().await));

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.create_user(dto(&format!("racer{i}"), "same@x.com", &[])).await
                })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(IdentityError::AlreadyRegistered(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 3);
        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_users_returns_everyone_with_roles() {
        let repo = UserRepository::new(setup().await);
        repo.create_user(dto("alice", "a@x.com", &["Admin"])).await.unwrap();
        repo.create_user(dto("bob", "b@x.com", &[])).await.unwrap();

        let users = repo.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        let alice = users.iter().find(|u| u.username == "alice").unwrap();
        let bob = users.iter().find(|u| u.username == "bob").unwrap();
        assert!(alice.has_role("Admin"));
        assert!(bob.roles.is_empty());
    }
}
