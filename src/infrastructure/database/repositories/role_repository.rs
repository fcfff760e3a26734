use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::info;

use super::is_unique_violation;
use crate::domain::{IdentityError, IdentityResult, Role, RoleAssigner};
use crate::infrastructure::database::entities::{role, user, user_role};

pub struct RoleRepository {
    db: DatabaseConnection,
}

impl RoleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_by_name(&self, name: &str) -> IdentityResult<Option<role::Model>> {
        Ok(role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }
}

fn role_model_to_domain(model: role::Model) -> Role {
    Role {
        id: model.id,
        name: model.name,
    }
}

#[async_trait]
impl RoleAssigner for RoleRepository {
    async fn ensure_role(&self, name: &str) -> IdentityResult<Role> {
        if let Some(existing) = self.find_by_name(name).await? {
            return Ok(role_model_to_domain(existing));
        }

        let inserted = role::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(name.to_string()),
        }
        .insert(&self.db)
        .await;

        match inserted {
            Ok(model) => {
                info!(role = %model.name, "Role created");
                Ok(role_model_to_domain(model))
            }
            // Created concurrently by someone else
            Err(e) if is_unique_violation(&e) => self
                .find_by_name(name)
                .await?
                .map(role_model_to_domain)
                .ok_or_else(|| e.into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn role_exists(&self, name: &str) -> IdentityResult<bool> {
        Ok(self.find_by_name(name).await?.is_some())
    }

    async fn assign_role(&self, user_id: &str, role_name: &str) -> IdentityResult<()> {
        if user::Entity::find_by_id(user_id).one(&self.db).await?.is_none() {
            return Err(IdentityError::user_not_found(user_id));
        }

        let Some(role) = self.find_by_name(role_name).await? else {
            return Err(IdentityError::ValidationFailed(format!(
                "Unknown role(s): {}",
                role_name
            )));
        };

        let existing = user_role::Entity::find_by_id((user_id.to_string(), role.id.clone()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let link = user_role::ActiveModel {
            user_id: Set(user_id.to_string()),
            role_id: Set(role.id),
        };
        match user_role::Entity::insert(link)
            .exec_without_returning(&self.db)
            .await
        {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        user::Entity::update_many()
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;

        info!(user_id, role = %role.name, "Role assigned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::domain::{CreateUserDto, CredentialStore};
    use crate::infrastructure::database::migrator::Migrator;
    use crate::infrastructure::database::{init_database, DatabaseConfig, UserRepository};

    async fn setup() -> DatabaseConnection {
        let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn create_user(db: &DatabaseConnection) -> String {
        UserRepository::new(db.clone())
            .create_user(CreateUserDto {
                username: "carol".to_string(),
                email: "carol@example.com".to_string(),
                full_name: "Carol".to_string(),
                age: 41,
                password_hash: "hash".to_string(),
                roles: vec![],
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn ensure_role_is_idempotent() {
        let repo = RoleRepository::new(setup().await);

        let first = repo.ensure_role("Admin").await.unwrap();
        let second = repo.ensure_role("Admin").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(role::Entity::find().count(&repo.db).await.unwrap(), 1);
        assert!(repo.role_exists("Admin").await.unwrap());
        assert!(!repo.role_exists("admin").await.unwrap());
    }

    #[tokio::test]
    async fn assign_role_links_user() {
        let db = setup().await;
        let repo = RoleRepository::new(db.clone());
        repo.ensure_role("Admin").await.unwrap();
        let user_id = create_user(&db).await;

        repo.assign_role(&user_id, "Admin").await.unwrap();
        // second assignment is a no-op
        repo.assign_role(&user_id, "Admin").await.unwrap();

        let user = UserRepository::new(db)
            .get_user_by_id(&user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role_list(), vec!["Admin"]);
    }

    #[tokio::test]
    async fn assign_role_to_unknown_user_is_not_found() {
        let repo = RoleRepository::new(setup().await);
        repo.ensure_role("Admin").await.unwrap();

        let err = repo.assign_role("missing", "Admin").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound { .. }));
    }

    #[tokio::test]
    async fn assign_unknown_role_fails_validation() {
        let db = setup().await;
        let repo = RoleRepository::new(db.clone());
        let user_id = create_user(&db).await;

        let err = repo.assign_role(&user_id, "Ghost").await.unwrap_err();
        assert!(matches!(err, IdentityError::ValidationFailed(_)));
    }
}
