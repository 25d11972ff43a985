//! User registration and credential checks.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde::Deserialize;
use store::{NewUser, Store, User, constraints};
use thiserror::Error;

use crate::coordinator::{Coordinator, settle};
use crate::error::DomainError;
use crate::validation::{Validate, ValidationErrors, Validator};

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Errors specific to user accounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("Email {0} is already registered")]
    EmailAlreadyExists(String),

    /// Unknown email or wrong password. The two are not told apart.
    #[error("Wrong email or password")]
    WrongCredentials,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl UserError {
    /// Stable, machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            UserError::EmailAlreadyExists(_) => "email_already_exists",
            UserError::WrongCredentials => "wrong_credentials",
            UserError::PasswordHash(_) => "internal_error",
        }
    }
}

/// Request to create an account.
#[derive(Clone, Deserialize)]
pub struct RegisterUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

impl std::fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterUser")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

impl Validate for RegisterUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("email", &self.email)
            .email("email", &self.email)
            .required("password", &self.password)
            .min_length("password", &self.password, MIN_PASSWORD_LEN)
            .required("full_name", &self.full_name)
            .finish()
    }
}

/// Email and password presented at login.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Validate for Credentials {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("email", &self.email)
            .email("email", &self.email)
            .required("password", &self.password)
            .finish()
    }
}

/// Service for user accounts.
pub struct UserService<S: Store> {
    coordinator: Coordinator<S>,
}

impl<S: Store> UserService<S> {
    pub fn new(coordinator: Coordinator<S>) -> Self {
        Self { coordinator }
    }

    /// Creates an account with a hashed password.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, cmd: RegisterUser) -> Result<User, DomainError> {
        cmd.validate()?;

        let password = cmd.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| UserError::PasswordHash(err.to_string()))??;

        let email = cmd.email;
        let user = self
            .coordinator
            .run("register", async {
                let mut tx = self.coordinator.begin().await?;
                let result = tx
                    .insert_user(NewUser {
                        email: email.clone(),
                        password_hash,
                        full_name: cmd.full_name,
                    })
                    .await
                    .map_err(|err| {
                        if err.is_conflict_on(constraints::USERS_EMAIL_KEY) {
                            DomainError::from(UserError::EmailAlreadyExists(email.clone()))
                        } else {
                            err.into()
                        }
                    });
                settle(tx, result).await
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Returns the user owning `credentials`.
    #[tracing::instrument(skip(self))]
    pub async fn authenticate(&self, credentials: Credentials) -> Result<User, DomainError> {
        credentials.validate()?;

        let user = self
            .coordinator
            .run("authenticate", async {
                let mut tx = self.coordinator.begin().await?;
                let result = tx
                    .find_user_by_email(&credentials.email)
                    .await
                    .map_err(DomainError::from);
                settle(tx, result).await
            })
            .await?
            .ok_or(UserError::WrongCredentials)?;

        let password = credentials.password;
        let stored = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|err| UserError::PasswordHash(err.to_string()))?;

        if !matches {
            return Err(UserError::WrongCredentials.into());
        }
        Ok(user)
    }
}

fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| UserError::PasswordHash(err.to_string()))
}

/// A malformed stored hash counts as a mismatch.
fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::warn!(error = %err, "stored password hash is malformed");
            false
        }
    }
}
