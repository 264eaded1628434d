use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http, web, Error, HttpMessage, HttpResponse, ResponseError,
};
use chrono::{Duration, Utc};
use futures::future::{ok, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::context::{AuthenticatedUserId, RequestContext};
use crate::error::AppError;
use crate::models::{User, UserProfile};
use crate::response;
use crate::services::{self, users::{LoginRequest, SignupRequest}};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

// JWT Creation
pub fn create_jwt(user_id: &str, secret: &str, ttl_hours: i64) -> Result<String, AppError> {
    let expiration = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal(format!("token lifetime out of range: {}h", ttl_hours)))?;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| AppError::Internal(format!("signing token: {}", e)))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Verifies `Authorization: Bearer <token>` and stores the user id in the
/// request extensions. Requests without a token pass through untouched;
/// handlers that need a requester reject them via [`RequestContext`].
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: Rc<String>,
}

impl Authentication {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: Rc::new(secret.into()) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service, secret: self.secret.clone() })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string());

        if let Some(token) = bearer {
            match validate_jwt(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(AuthenticatedUserId(claims.sub));
                }
                Err(e) => {
                    debug!("Rejected bearer token: {}", e);
                    let resp = AppError::Unauthorized("Invalid token".to_string()).error_response();
                    let (req_parts, _payload) = req.into_parts();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn auth_payload(data: &AppState, user: &User) -> Result<AuthPayload, AppError> {
    let token = create_jwt(&user.id, &data.config.jwt_secret, data.config.jwt_ttl_hours)?;
    Ok(AuthPayload { token, user: UserProfile::from(user) })
}

/// POST /api/auth/signup
pub async fn signup(
    data: web::Data<AppState>,
    payload: web::Json<SignupRequest>,
) -> Result<HttpResponse, AppError> {
    let user = services::users::signup(&data, payload.into_inner()).await?;
    Ok(response::created(auth_payload(&data, &user)?))
}

/// POST /api/auth/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let user = services::users::authenticate(&data, payload.into_inner()).await?;
    Ok(response::ok(auth_payload(&data, &user)?))
}

/// GET /api/auth/me
pub async fn me(data: web::Data<AppState>, ctx: RequestContext) -> Result<HttpResponse, AppError> {
    let profile = services::users::get_user(&data, &ctx, &ctx.user_id).await?;
    Ok(response::ok(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_subject() {
        let token = create_jwt("user-1", "s3cret", 1).unwrap();
        let claims = validate_jwt(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(validate_jwt(&token, "other").is_err());
    }

    #[test]
    fn absurd_lifetime_is_an_error_not_a_panic() {
        assert!(matches!(
            create_jwt("user-1", "s3cret", i64::MAX),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_jwt("user-1", "s3cret", -2).unwrap();
        assert!(validate_jwt(&token, "s3cret").is_err());
    }
}
