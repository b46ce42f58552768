use crate::domain::{Account, Principal};
use crate::infrastructure::{
    constant_time_eq, AccountRepository, CryptoError, PasswordHasher, RepositoryError, TokenError,
    TokenIssuer,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_USERNAME_LEN: usize = 50;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Owner setup is disabled")]
    SetupDisabled,
    #[error("Invalid setup secret")]
    InvalidSetupSecret,
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub account: Account,
}

pub(crate) fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username must be between 1 and {} characters",
            MAX_USERNAME_LEN
        ));
    }
    if username.chars().any(char::is_whitespace) {
        return Err("Username must not contain whitespace".to_string());
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

pub struct CredentialService<A>
where
    A: AccountRepository,
{
    accounts: Arc<A>,
    hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenIssuer>,
    trial_window: Duration,
    owner_setup_secret: String,
}

impl<A> CredentialService<A>
where
    A: AccountRepository,
{
    pub fn new(
        accounts: Arc<A>,
        hasher: Arc<PasswordHasher>,
        tokens: Arc<TokenIssuer>,
        trial_window: Duration,
        owner_setup_secret: String,
    ) -> Self {
        Self {
            accounts,
            hasher,
            tokens,
            trial_window,
            owner_setup_secret,
        }
    }

    /// Self-service sign-up. New accounts start on a trial.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        let username = username.trim();
        validate_username(username).map_err(AuthError::Validation)?;
        validate_password(password).map_err(AuthError::Validation)?;

        let hash = self.hasher.hash(password).await?;
        let account = Account::new_trial(username.to_string(), hash, self.trial_window, now);

        match self.accounts.create(&account).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return Err(AuthError::UsernameTaken),
            Err(e) => return Err(e.into()),
        }

        info!(account_id = %account.id, trial_ends_at = %account.trial_ends_at, "Registered trial account");
        Ok(account)
    }

    /// Check a username/password pair.
    ///
    /// Every failure is the same `InvalidCredentials`, and an unknown username
    /// still costs one hash verification.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let account = match self.accounts.get_by_username(username.trim()).await {
            Ok(account) => account,
            Err(RepositoryError::NotFound(_)) => {
                self.hasher.verify_decoy(password).await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(password, &account.password_hash).await {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(account)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginSession, AuthError> {
        let account = self.authenticate(username, password).await?;
        let token = self.tokens.issue(account.id, account.role)?;
        Ok(LoginSession { token, account })
    }

    pub fn validate_token(&self, token: &str) -> Result<Principal, AuthError> {
        self.tokens
            .validate(token)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Create an administrator, guarded by the configured setup secret.
    pub async fn setup_owner(
        &self,
        username: &str,
        password: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        if self.owner_setup_secret.is_empty() {
            return Err(AuthError::SetupDisabled);
        }
        if !constant_time_eq(secret.as_bytes(), self.owner_setup_secret.as_bytes()) {
            warn!("Owner setup attempted with a wrong secret");
            return Err(AuthError::InvalidSetupSecret);
        }

        let username = username.trim();
        validate_username(username).map_err(AuthError::Validation)?;
        validate_password(password).map_err(AuthError::Validation)?;

        let hash = self.hasher.hash(password).await?;
        let owner = Account::new_owner(username.to_string(), hash, now);

        match self.accounts.create(&owner).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return Err(AuthError::UsernameTaken),
            Err(e) => return Err(e.into()),
        }

        info!(account_id = %owner.id, "Owner account created");
        Ok(owner)
    }
}
