use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderValue, AUTHORIZATION};
use actix_web::{web, Error, HttpMessage};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::*;

use super::validation::{bearer_token, Claims, TokenValidator};
use super::AuthError;
use crate::error::ApiError;

/// Requires `permission` before the wrapped route runs.
///
/// ```ignore
/// web::post().to(handler).wrap(RequirePermission::new("post:drinks"))
/// ```
///
/// On success the validated [`Claims`] are available to the handler as
/// `web::ReqData<Claims>`. Failures are answered here as JSON error
/// responses and the handler never runs.
#[derive(Debug, Clone)]
pub struct RequirePermission {
    permission: Rc<str>,
}

pub struct RequirePermissionMiddleware<S> {
    service: Rc<S>,
    permission: Rc<str>,
}

pub fn check_permission(required: &str, claims: &Claims) -> Result<(), AuthError> {
    let granted = claims
        .permissions
        .as_ref()
        .ok_or(AuthError::InvalidClaims("Permissions not included in JWT."))?;

    if granted.contains(required) {
        Ok(())
    } else {
        Err(AuthError::Unauthorized)
    }
}

/// Validates the request's bearer token and checks it grants `required`.
pub async fn authorize(
    validator: &TokenValidator,
    header: Option<&HeaderValue>,
    required: &str,
) -> Result<Claims, AuthError> {
    let header = header
        .map(|value| {
            value.to_str().map_err(|_| {
                AuthError::MalformedHeader("Authorization header must be bearer token.")
            })
        })
        .transpose()?;
    let token = bearer_token(header)?;
    let claims = validator.validate(token).await?;
    check_permission(required, &claims)?;
    Ok(claims)
}

impl RequirePermission {
    pub fn new(permission: &str) -> Self {
        RequirePermission {
            permission: Rc::from(permission),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequirePermission
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequirePermissionMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequirePermissionMiddleware {
            service: Rc::new(service),
            permission: Rc::clone(&self.permission),
        }))
    }
}

impl<S, B> Service<ServiceRequest> for RequirePermissionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let permission = Rc::clone(&self.permission);

        Box::pin(async move {
            let validator = match req.app_data::<web::Data<TokenValidator>>() {
                Some(validator) => validator.clone(),
                None => {
                    let err = ApiError::Internal(anyhow::anyhow!(
                        "no token validator registered for {}",
                        req.path()
                    ));
                    return Ok(req.error_response(err).map_into_right_body());
                }
            };

            let claims =
                match authorize(&validator, req.headers().get(AUTHORIZATION), &permission).await {
                    Ok(claims) => claims,
                    Err(e) => {
                        info!(
                            "Refusing {} {} (needs {}): {}",
                            req.method(),
                            req.path(),
                            permission,
                            e
                        );
                        return Ok(req.error_response(ApiError::from(e)).map_into_right_body());
                    }
                };

            debug!("Granted {} to {:?}", permission, claims.sub);
            req.extensions_mut().insert(claims);
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
