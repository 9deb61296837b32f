//! Bearer token authentication.
//!
//! Wraps the `/api` scope. The `Authorization: Bearer <token>` header is validated against the HS256 secret and the
//! claims are stored in the request extensions, where [`JwtClaims`] (as an extractor) and the ACL middleware pick them
//! up. Requests without a valid token never reach a handler.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace};

use crate::{
    auth::{JwtClaims, TokenValidator},
    errors::{AuthError, ServerError},
    helpers::bearer_token,
};

pub struct JwtMiddlewareFactory {
    validator: TokenValidator,
}

impl JwtMiddlewareFactory {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { validator: Rc::new(self.validator.clone()), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    validator: Rc<TokenValidator>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let validator = Rc::clone(&self.validator);
        Box::pin(async move {
            let claims = authenticate(&req, &validator).map_err(|e| {
                debug!("🔐️ Refusing {} {}: {e}", req.method(), req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("🔐️ {} authenticated with roles {:?}", claims.sub, claims.roles);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn authenticate(req: &ServiceRequest, validator: &TokenValidator) -> Result<JwtClaims, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;
    validator.validate(token)
}
