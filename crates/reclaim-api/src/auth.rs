use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;

use reclaim_types::api::{
    Claims, Envelope, SigninRequest, SigninResponse, SignupRequest, SignupResponse,
    UpdateProfileRequest, UpdateProfileResponse,
};

use crate::error::{ApiError, join_error};
use crate::state::AppState;

pub async fn signup(state: AppState, req: SignupRequest) -> Result<Response, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();

    // Validate input
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Name, email and password are required."));
    }
    if !email.contains('@') {
        return Err(ApiError::validation("Invalid email address."));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation("Password must be at least 8 characters."));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hash failed: {e}"))?
        .to_string();

    let db = state.clone();
    let (user_id, full_name) =
        tokio::task::spawn_blocking(move || -> Result<(i64, String), ApiError> {
            // Check if the email is taken
            if db.db.get_user_by_email(&email)?.is_some() {
                return Err(ApiError::conflict("An account with this email already exists."));
            }

            let user_id = db.db.create_user(&name, &email, &password_hash)?;
            Ok((user_id, name))
        })
        .await
        .map_err(join_error)??;

    let token = create_token(&state.jwt_secret, user_id, &full_name)?;
    info!("New account {} ({})", user_id, full_name);

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Registration successful.",
            SignupResponse {
                user_id,
                full_name,
                token,
            },
        )),
    )
        .into_response())
}

pub async fn signin(state: AppState, req: SigninRequest) -> Result<Response, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required."));
    }

    let db = state.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(join_error)??
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password."))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| anyhow!("stored hash unreadable for user {}: {e}", user.user_id))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::unauthorized("Invalid email or password."))?;

    let token = create_token(&state.jwt_secret, user.user_id, &user.full_name)?;

    Ok(Json(Envelope::with_message(
        "Login successful.",
        SigninResponse {
            user_id: user.user_id,
            full_name: user.full_name,
            email: user.email,
            phone_number: user.phone_number,
            token,
        },
    ))
    .into_response())
}

pub async fn update_profile(
    state: AppState,
    req: UpdateProfileRequest,
) -> Result<Response, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::validation("Missing user id."));
    }
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::validation("Name cannot be empty."));
    }
    let phone_number = req
        .phone_number
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from);

    // Optional password rotation, gated on the current password
    let new_password = req.new_password.as_deref().filter(|p| !p.is_empty());
    if let Some(password) = new_password {
        if password.len() < 8 {
            return Err(ApiError::validation("New password must be at least 8 characters."));
        }
        if req.current_password.as_deref().filter(|c| !c.is_empty()).is_none() {
            return Err(ApiError::validation("Current password is required to set a new one."));
        }
    }
    let new_hash = match new_password {
        Some(password) => {
            let salt = SaltString::generate(&mut OsRng);
            Some(
                Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| anyhow!("password hash failed: {e}"))?
                    .to_string(),
            )
        }
        None => None,
    };

    let db = state.clone();
    let user_id = req.user_id;
    let name = full_name.clone();
    let phone = phone_number.clone();
    let current_password = req.current_password.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let user = db
            .db
            .get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::not_found("Account not found."))?;

        if new_hash.is_some() {
            let parsed_hash = PasswordHash::new(&user.password_hash)
                .map_err(|e| anyhow!("stored hash unreadable for user {}: {e}", user.user_id))?;
            Argon2::default()
                .verify_password(
                    current_password.as_deref().unwrap_or_default().as_bytes(),
                    &parsed_hash,
                )
                .map_err(|_| ApiError::unauthorized("Current password is incorrect."))?;
        }

        db.db.update_profile(user_id, &name, phone.as_deref(), new_hash.as_deref())?;
        Ok(())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(Envelope::with_message(
        "Profile updated.",
        UpdateProfileResponse {
            full_name,
            phone_number,
        },
    ))
    .into_response())
}

pub fn create_token(secret: &str, user_id: i64, full_name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: full_name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate the Authorization header and check that the token belongs to
/// `actor_id`, the user the request body claims to act as.
pub fn require_actor(headers: &HeaderMap, secret: &str, actor_id: i64) -> Result<Claims, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token."))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token."))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::unauthorized("Invalid or expired token."))?;

    if token_data.claims.sub != actor_id {
        return Err(ApiError::forbidden("Token does not match the acting user."));
    }

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn tokens_round_trip_for_the_right_actor() {
        let token = create_token("secret", 42, "Ana").unwrap();
        let claims = require_actor(&headers_with(&token), "secret", 42).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.name, "Ana");
    }

    #[test]
    fn actor_mismatch_is_forbidden() {
        let token = create_token("secret", 42, "Ana").unwrap();
        let err = require_actor(&headers_with(&token), "secret", 7).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn bad_or_missing_tokens_are_unauthorized() {
        let err = require_actor(&HeaderMap::new(), "secret", 42).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = require_actor(&headers_with("not-a-jwt"), "secret", 42).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        // Signed with a different secret
        let token = create_token("other-secret", 42, "Ana").unwrap();
        let err = require_actor(&headers_with(&token), "secret", 42).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
