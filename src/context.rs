use actix_web::{dev::Payload, web, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::GlobalRole;

/// User id placed in request extensions by the `Authentication` middleware
/// once the bearer token has been verified.
#[derive(Debug, Clone)]
pub struct AuthenticatedUserId(pub String);

/// The requester of a single call, passed explicitly into every service
/// operation. Built from the stored user so role changes and deactivation
/// apply immediately.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub global_role: GlobalRole,
}

impl FromRequest for RequestContext {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req.extensions().get::<AuthenticatedUserId>().cloned();
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let AuthenticatedUserId(user_id) =
                user_id.ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;
            let state = state
                .ok_or_else(|| AppError::Internal("application state is not configured".into()))?;

            let user = state
                .store
                .find_user(&user_id)
                .await?
                .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;
            if !user.active {
                return Err(AppError::Unauthorized("Account is deactivated".to_string()));
            }

            Ok(RequestContext { user_id: user.id, global_role: user.role })
        })
    }
}
