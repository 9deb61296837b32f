//! Stripe webhook signature middleware.
//!
//! Stripe signs every webhook delivery with the endpoint's signing secret and sends the result in the
//! `Stripe-Signature` header. This middleware reads the raw body, verifies the signature and the timestamp window, and
//! only then hands the untouched body on to the handler. Deliveries that fail the check are refused with 400 so that
//! Stripe shows them as failed in its dashboard.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use gateway_tools::stripe_signature::{verify_signature, STRIPE_SIGNATURE_HEADER};
use log::{trace, warn};
use settlement_common::Secret;

use crate::errors::ServerError;

pub struct StripeSignatureMiddlewareFactory {
    secret: Secret<String>,
    tolerance: i64,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl StripeSignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, tolerance: i64, enabled: bool) -> Self {
        Self { secret, tolerance, enabled }
    }

    /// For when Stripe is not configured. Every delivery fails verification.
    pub fn rejecting() -> Self {
        Self { secret: Secret::default(), tolerance: 0, enabled: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for StripeSignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = StripeSignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(StripeSignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance: self.tolerance,
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct StripeSignatureMiddlewareService<S> {
    secret: Secret<String>,
    tolerance: i64,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for StripeSignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let tolerance = self.tolerance;
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking Stripe signature for request");
            if !enabled {
                trace!("🔐️ Stripe signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let header = req
                .headers()
                .get(STRIPE_SIGNATURE_HEADER)
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔐️ No Stripe signature found in request. Denying access.");
                    ServerError::InvalidWebhook("No Stripe signature found.".into())
                })?
                .to_string();
            match verify_signature(&header, data.as_ref(), &secret, tolerance, Utc::now().timestamp()) {
                Ok(()) => {
                    trace!("🔐️ Stripe signature check for request ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Invalid Stripe signature in request: {e}. Denying access.");
                    Err(ServerError::InvalidWebhook(e.to_string()).into())
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
