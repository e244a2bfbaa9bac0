use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{generate_reset_token, hash_password, hash_token, verify_password};
use crate::auth::{
    AuthError, AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, JwtService,
    LoginRequest, MessageResponse, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest,
    TokenResponse, TokenType, UpdateProfileRequest, UserInfo, UserRole, UserSession,
};
use crate::errors::is_unique_violation;
use crate::models::validation::{normalize_email, validate_email, validate_text};
use crate::models::User;
use crate::services::EmailService;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at";
const MAX_NAME_LEN: usize = 100;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

fn checked_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    validate_email(&email).map_err(|e| AuthError::EmailValidation(e.0))?;
    Ok(email)
}

fn checked_name(name: &str) -> Result<String, AuthError> {
    validate_text("Name", name, MAX_NAME_LEN).map_err(|e| AuthError::Validation(e.0))?;
    Ok(name.trim().to_string())
}

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    email_service: EmailService,
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool, jwt_secret: &str, email_service: EmailService) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_secret),
            email_service,
            db,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = checked_email(&request.email)?;
        let name = checked_name(&request.name)?;

        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&name)
        .bind(&password_hash)
        .bind(UserRole::User.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AuthError::EmailAlreadyExists
            } else {
                AuthError::Database(err)
            }
        })?;

        tracing::info!("Registered user {}", user.id);

        // Welcome mail must never hold up or fail registration
        let email_service = self.email_service.clone();
        let (to, user_name) = (user.email.clone(), user.name.clone());
        tokio::spawn(async move {
            if let Err(err) = email_service.send_welcome(&to, &user_name).await {
                tracing::warn!("Failed to send welcome email to {}: {}", to, err);
            }
        });

        self.issue_tokens(user).await
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);
        let user = self
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            tracing::warn!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_tokens(user).await
    }

    /// Exchange a stored refresh token for a new access token
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        let claims = self.jwt_service.validate_token(&request.refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }

        // role may have changed since the refresh token was issued
        let user = self.get_user(user_id).await?;
        let access_token = self
            .jwt_service
            .create_access_token(user.id, &user.email, user.role)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Blacklist the access token and revoke every refresh token of the user
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        self.blacklist_token(&claims.jti, claims.exp as i64).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        Ok(MessageResponse::new("Successfully logged out"))
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await
            .map_err(AuthError::Database)?;

        Ok(result.is_some())
    }

    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        Ok(session)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserInfo, AuthError> {
        Ok(self.get_user(user_id).await?.into())
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserInfo, AuthError> {
        let email = request.email.as_deref().map(checked_email).transpose()?;
        let name = request.name.as_deref().map(checked_name).transpose()?;

        if let Some(email) = &email {
            if let Some(other) = self.get_user_by_email(email).await? {
                if other.id != user_id {
                    return Err(AuthError::EmailAlreadyExists);
                }
            }
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET email = COALESCE($2, email), name = COALESCE($3, name), updated_at = $4
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(email)
        .bind(name)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AuthError::EmailAlreadyExists
            } else {
                AuthError::Database(err)
            }
        })?
        .ok_or(AuthError::UserNotFound)?;

        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        let user = self.get_user(user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_password(&request.new_password)?;
        self.set_password(user_id, &password_hash).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        tracing::info!("Password changed for user {}", user_id);
        Ok(MessageResponse::new("Password updated"))
    }

    /// Always succeeds so callers cannot probe which emails are registered
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<MessageResponse, AuthError> {
        let response = MessageResponse::new(
            "If an account exists for that email, a reset link has been sent",
        );

        let email = normalize_email(&request.email);
        let Some(user) = self.get_user_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(response);
        };

        let token = generate_reset_token();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, used, created_at)
             VALUES ($1, $2, $3, $4, false, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(hash_token(&token))
        .bind(now + Duration::minutes(RESET_TOKEN_TTL_MINUTES))
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(AuthError::Database)?;

        if let Err(err) = self
            .email_service
            .send_password_reset(&user.email, &user.name, &token)
            .await
        {
            tracing::warn!("Failed to send password reset email for user {}: {}", user.id, err);
        }

        Ok(response)
    }

    /// Consume a reset token; it works once and only within its lifetime
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<MessageResponse, AuthError> {
        let password_hash = hash_password(&request.new_password)?;
        let mut tx = self.db.begin().await.map_err(AuthError::Database)?;

        let user_id: Uuid = sqlx::query_scalar(
            "UPDATE password_reset_tokens SET used = true
             WHERE token_hash = $1 AND NOT used AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(hash_token(request.token.trim()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(AuthError::Database)?
        .ok_or(AuthError::InvalidResetToken)?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await
            .map_err(AuthError::Database)?;

        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(AuthError::Database)?;

        tx.commit().await.map_err(AuthError::Database)?;

        tracing::info!("Password reset for user {}", user_id);
        Ok(MessageResponse::new("Password has been reset"))
    }

    pub async fn list_users(&self) -> Result<Vec<UserInfo>, AuthError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(users.into_iter().map(UserInfo::from).collect())
    }

    pub async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> Result<UserInfo, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(AuthError::Database)?
        .ok_or(AuthError::UserNotFound)?;

        tracing::info!("User {} is now {}", user_id, role.as_str());
        Ok(user.into())
    }

    // Private helper methods

    async fn issue_tokens(&self, user: User) -> Result<AuthResponse, AuthError> {
        let (access_token, refresh_token) = self
            .jwt_service
            .create_token_pair(user.id, &user.email, user.role.clone())?;

        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: user.into(),
        })
    }

    async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .map_err(AuthError::Database)?
            .ok_or(AuthError::UserNotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(user)
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .map_err(AuthError::Database)?;

        Ok(())
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.jwt_service.validate_token(refresh_token)?;
        let expires_at = chrono::DateTime::from_timestamp(claims.exp as i64, 0)
            .ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND expires_at > NOW() AND NOT revoked",
        )
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .fetch_optional(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(result.is_some())
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(AuthError::Database)?;

        Ok(())
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> Result<(), AuthError> {
        let expires_at = chrono::DateTime::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(AuthError::Database)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_email_normalizes() {
        assert_eq!(checked_email("  Sam@Example.COM ").unwrap(), "sam@example.com");
        assert!(matches!(checked_email("nope"), Err(AuthError::EmailValidation(_))));
    }

    #[test]
    fn test_checked_name() {
        assert_eq!(checked_name("  Sam ").unwrap(), "Sam");
        assert!(matches!(checked_name("   "), Err(AuthError::Validation(_))));
        assert!(checked_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
