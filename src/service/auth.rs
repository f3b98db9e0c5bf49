use std::{
    future::{ready, Ready},
    sync::Arc,
    time::Duration,
};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::UserStore,
    dto::{LoginResponse, Registration, UserResponse},
    errors::AppError,
    models::{NewUser, Role},
};

use super::crypto;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

/// Signs and verifies the HS256 bearer tokens handed out at login.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AppError> {
        let iat = Utc::now().timestamp().max(0) as u64;
        self.sign(&Claims {
            sub: user_id,
            role,
            iat,
            exp: iat + self.ttl.as_secs(),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|err| {
            error!("failed to sign token: {:?}", err);
            AppError::InternalError
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthenticated("Invalid token".to_string()))
    }
}

/// The caller identity, extracted from the bearer token of each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Access denied: insufficient permissions".to_string(),
            ))
        }
    }
}

impl FromRequest for AuthContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthContext, AppError> {
    let tokens = req.app_data::<web::Data<TokenIssuer>>().ok_or_else(|| {
        error!("token issuer is not registered as app data");
        AppError::InternalError
    })?;
    let token = parse_request(req, "Bearer ")?;
    let claims = tokens.verify(token)?;
    Ok(AuthContext {
        user_id: claims.sub,
        role: claims.role,
    })
}

pub fn parse_request<'a>(req: &'a HttpRequest, prefix: &str) -> Result<&'a str, AppError> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(prefix))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Authentication required".to_string()))
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenIssuer>,
    /// Checked against when the email is unknown, so both login failures
    /// cost one hash.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            users,
            tokens,
            dummy_hash: crypto::hash_password("dummy-password"),
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<UserResponse, AppError> {
        let Registration { email, password, role } = registration;
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        let password_hash = crypto::hash_password(&password);
        let user = self
            .users
            .create_user(NewUser {
                email,
                password_hash,
                role,
            })
            .await?;
        info!("registered user {} as {}", user.id, user.role.as_str());
        Ok(UserResponse::from(&user))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AppError> {
        let user = self.users.find_user_by_email(email).await?;
        let stored = user
            .as_ref()
            .map_or(self.dummy_hash.as_str(), |u| u.password_hash.as_str());
        let matches = crypto::verify_password(password, stored);
        let user = match user {
            Some(user) if matches => user,
            _ => {
                warn!("rejected login attempt");
                return Err(AppError::InvalidCredentials);
            }
        };
        let token = self.tokens.issue(user.id, user.role)?;
        Ok(LoginResponse {
            token,
            user: UserResponse::from(&user),
        })
    }
}
