use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use crate::auth::jwt::{self, Claims};
use crate::error::AppError;
use crate::state::SharedState;

/// Identity of whoever is submitting. Anonymous submissions are allowed and
/// carry no identity; a token that is present but invalid is rejected.
#[derive(Debug, Clone)]
pub struct Submitter {
    pub identity: Option<String>,
}

/// An authenticated operator allowed to use the reconciliation console.
#[derive(Debug, Clone)]
pub struct Operator {
    pub identity: String,
}

fn bearer_or_cookie(parts: &Parts) -> Result<Option<String>, AppError> {
    // Try Bearer token from Authorization header first
    if let Some(auth_header) = parts.headers.get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(Some(token.to_string()));
        }
    }

    let jar = CookieJar::from_headers(&parts.headers);
    Ok(jar.get("access_token").map(|c| c.value().to_string()))
}

fn claims_from(parts: &Parts, state: &SharedState) -> Result<Option<Claims>, AppError> {
    let Some(token) = bearer_or_cookie(parts)? else {
        return Ok(None);
    };

    jwt::decode_token(&token, &state.config.jwt_secret)
        .map(Some)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
}

impl FromRequestParts<SharedState> for Submitter {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let identity = claims_from(parts, state)?.map(|c| c.sub);
        Ok(Submitter { identity })
    }
}

impl FromRequestParts<SharedState> for Operator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let claims = claims_from(parts, state)?
            .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?;

        if !claims.is_operator() {
            return Err(AppError::Forbidden("Operator access required".to_string()));
        }

        Ok(Operator {
            identity: claims.sub,
        })
    }
}
