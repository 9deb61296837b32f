mod acl;
mod jwt;
mod stripe_signature;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use jwt::{JwtMiddlewareFactory, JwtMiddlewareService};
pub use stripe_signature::{StripeSignatureMiddlewareFactory, StripeSignatureMiddlewareService};
