//! Authentication service — application-layer orchestration
//!
//! All identity business rules live here. HTTP handlers are thin wrappers
//! that map request DTOs in and `IdentityError` out.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::{
    normalize_email, normalize_username, CreateUserDto, CredentialStore, IdentityError,
    IdentityResult, RoleAssigner, User, ADMIN_ROLE,
};
use crate::infrastructure::crypto::{IssuedToken, PasswordHasher, TokenIssuer};
use crate::support::InfraError;

/// Registration input, already shape-validated by the caller
#[derive(Debug, Clone)]
pub struct RegisterUserCommand {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub age: u32,
    pub password: String,
    pub confirm_password: String,
    pub roles: Vec<String>,
}

/// Authentication result returned by both registration and login
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

impl AuthResult {
    fn new(issued: IssuedToken, user: User) -> Self {
        Self {
            token: issued.token,
            token_type: issued.token_type,
            expires_in: issued.expires_in,
            user,
        }
    }
}

/// Orchestrates the identity use-cases on top of the storage traits.
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    roles: Arc<dyn RoleAssigner>,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
    /// Roles an anonymous registration may request; `None` allows any existing role.
    self_assignable: Option<BTreeSet<String>>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        roles: Arc<dyn RoleAssigner>,
        tokens: TokenIssuer,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            roles,
            tokens,
            hasher,
            self_assignable: None,
        }
    }

    /// Restrict the roles a registration may request to `roles`.
    pub fn with_self_assignable_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.self_assignable = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    // ── Registration ────────────────────────────────────────────

    /// Register a new user and sign them in.
    ///
    /// The user row and its role links are written in one atomic store call,
    /// so an unknown role or a lost uniqueness race leaves nothing behind.
    pub async fn register(&self, cmd: RegisterUserCommand) -> IdentityResult<AuthResult> {
        if cmd.password != cmd.confirm_password {
            return Err(IdentityError::PasswordMismatch);
        }

        let email = normalize_email(&cmd.email);
        let username = normalize_username(&cmd.username);

        if self.users.get_user_by_email(&email).await?.is_some() {
            return Err(IdentityError::AlreadyRegistered(
                "You are already registered".into(),
            ));
        }
        if self.users.get_user_by_username(&username).await?.is_some() {
            return Err(IdentityError::AlreadyRegistered(
                "Username is already taken".into(),
            ));
        }

        let requested: BTreeSet<String> = cmd.roles.into_iter().collect();
        if let Some(allowed) = &self.self_assignable {
            let denied: Vec<&str> = requested
                .iter()
                .filter(|r| !allowed.contains(r.as_str()))
                .map(String::as_str)
                .collect();
            if !denied.is_empty() {
                return Err(IdentityError::ValidationFailed(format!(
                    "Role(s) cannot be self-assigned: {}",
                    denied.join(", ")
                )));
            }
        }

        let mut unknown = Vec::new();
        for role in &requested {
            if !self.roles.role_exists(role).await? {
                unknown.push(role.as_str());
            }
        }
        if !unknown.is_empty() {
            return Err(IdentityError::ValidationFailed(format!(
                "Unknown role(s): {}",
                unknown.join(", ")
            )));
        }

        let password_hash = self.hash_password(cmd.password).await?;

        let user = self
            .users
            .create_user(CreateUserDto {
                username,
                email,
                full_name: cmd.full_name,
                age: cmd.age,
                password_hash,
                roles: requested.into_iter().collect(),
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, roles = ?user.roles, "New user registered");
        metrics::counter!("identity_registrations_total").increment(1);

        let issued = self.issue_token(&user)?;
        Ok(AuthResult::new(issued, user))
    }

    // ── Authentication ──────────────────────────────────────────

    /// Authenticate by email + password and return a signed token.
    pub async fn login(&self, email: &str, password: &str) -> IdentityResult<AuthResult> {
        let user = self.users.get_user_by_email(&normalize_email(email)).await?;

        // Unknown accounts still pay for one bcrypt verification
        let valid = self
            .check_password(password, user.as_ref().map(|u| u.password_hash.clone()))
            .await?;

        let Some(user) = user else {
            warn!(email, "Login for unknown email");
            metrics::counter!("identity_logins_total", "outcome" => "user_not_found").increment(1);
            return Err(IdentityError::UserNotFound);
        };

        if !valid {
            warn!(user_id = %user.id, "Login with invalid password");
            metrics::counter!("identity_logins_total", "outcome" => "invalid_credentials")
                .increment(1);
            return Err(IdentityError::InvalidCredentials);
        }

        let issued = self.issue_token(&user)?;
        metrics::counter!("identity_logins_total", "outcome" => "success").increment(1);
        info!(user_id = %user.id, "User logged in");

        Ok(AuthResult::new(issued, user))
    }

    // ── Queries ─────────────────────────────────────────────────

    /// All users, oldest first.
    pub async fn list_users(&self) -> IdentityResult<Vec<User>> {
        self.users.list_users().await
    }

    pub async fn get_user(&self, id: &str) -> IdentityResult<User> {
        self.users
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| IdentityError::user_not_found(id))
    }

    // ── Roles ───────────────────────────────────────────────────

    /// Add `role` to the user and return the updated record.
    pub async fn assign_role(&self, user_id: &str, role: &str) -> IdentityResult<User> {
        self.roles.assign_role(user_id, role).await?;
        self.get_user(user_id).await
    }

    /// Make sure every configured role exists.
    pub async fn seed_roles(&self, names: &[String]) -> IdentityResult<()> {
        for name in names {
            self.roles.ensure_role(name).await?;
        }
        Ok(())
    }

    /// Create an administrator when the store holds no users yet.
    ///
    /// Returns the created user, or `None` when users already exist.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> IdentityResult<Option<User>> {
        if self.users.count_users().await? > 0 {
            return Ok(None);
        }

        self.roles.ensure_role(ADMIN_ROLE).await?;
        let password_hash = self.hash_password(password.to_string()).await?;

        let admin = self
            .users
            .create_user(CreateUserDto {
                username: normalize_username(username),
                email: normalize_email(email),
                full_name: full_name.to_string(),
                age: 0,
                password_hash,
                roles: vec![ADMIN_ROLE.to_string()],
            })
            .await?;

        info!(user_id = %admin.id, email = %admin.email, "Default admin created");
        Ok(Some(admin))
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn issue_token(&self, user: &User) -> IdentityResult<IssuedToken> {
        self.tokens.issue(user).map_err(|e| {
            error!(user_id = %user.id, error = %e, "Failed to issue token");
            IdentityError::SignInFailure(e.to_string())
        })
    }

    async fn hash_password(&self, password: String) -> IdentityResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| InfraError::Crypto(format!("hashing task failed: {}", e)))?
            .map_err(IdentityError::from)
    }

    async fn check_password(&self, password: &str, hash: Option<String>) -> IdentityResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify_password(&password, &hash),
            None => {
                hasher.verify_dummy(&password);
                Ok(false)
            }
        })
        .await
        .map_err(|e| InfraError::Crypto(format!("verification task failed: {}", e)))?
        .map_err(IdentityError::from)
    }
}
