use log::*;
use settlement_common::{helpers::parse_boolean_flag, Secret};

/// How far a Stripe signature timestamp may drift from our clock, in seconds.
pub const DEFAULT_SIGNATURE_TOLERANCE: i64 = 300;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub signature_tolerance: i64,
    /// If false, webhook signatures are not checked. Only ever turn this off for local testing.
    pub signature_checks: bool,
    pub api_base: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            signature_tolerance: DEFAULT_SIGNATURE_TOLERANCE,
            signature_checks: true,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }
}

impl StripeConfig {
    /// Reads the Stripe settings from the environment. Returns `None` if no secret key is configured, in which case
    /// Stripe is simply not offered.
    pub fn from_env() -> Option<Self> {
        let secret_key = std::env::var("STL_STRIPE_SECRET_KEY").ok().filter(|s| !s.trim().is_empty())?;
        let webhook_secret = std::env::var("STL_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ STL_STRIPE_WEBHOOK_SECRET is not set. Every Stripe webhook will be rejected.");
            String::new()
        });
        let signature_tolerance = std::env::var("STL_STRIPE_SIGNATURE_TOLERANCE")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid STL_STRIPE_SIGNATURE_TOLERANCE ({s}): {e}. Using the default."))
                    .ok()
            })
            .unwrap_or(DEFAULT_SIGNATURE_TOLERANCE);
        let signature_checks = parse_boolean_flag(std::env::var("STL_STRIPE_SIGNATURE_CHECKS").ok(), true);
        if !signature_checks {
            warn!("🪛️ Stripe webhook signature checks are DISABLED. Never run like this in production.");
        }
        Some(Self {
            secret_key: Secret::new(secret_key),
            webhook_secret: Secret::new(webhook_secret),
            signature_tolerance,
            signature_checks,
            ..Default::default()
        })
    }

    /// Checks the credentials look like Stripe credentials.
    pub fn validate(&self) -> Result<(), String> {
        let key = self.secret_key.reveal();
        if !(key.starts_with("sk_") || key.starts_with("rk_")) {
            return Err(format!("The Stripe secret key {} must start with sk_ or rk_", self.secret_key.hint()));
        }
        if self.signature_checks && !self.webhook_secret.reveal().starts_with("whsec_") {
            return Err(format!("The Stripe webhook secret {} must start with whsec_", self.webhook_secret.hint()));
        }
        if self.signature_tolerance <= 0 {
            return Err("The Stripe signature tolerance must be positive".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaypalMode {
    #[default]
    Sandbox,
    Live,
}

impl PaypalMode {
    pub fn api_base(&self) -> &'static str {
        match self {
            PaypalMode::Sandbox => "https://api-m.sandbox.paypal.com",
            PaypalMode::Live => "https://api-m.paypal.com",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaypalConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub webhook_id: String,
    pub mode: PaypalMode,
    /// Overrides the base URL implied by `mode`.
    pub api_base: Option<String>,
}

impl PaypalConfig {
    /// Reads the PayPal settings from the environment. Returns `None` if no client id is configured.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("STL_PAYPAL_CLIENT_ID").ok().filter(|s| !s.trim().is_empty())?;
        let client_secret = Secret::new(std::env::var("STL_PAYPAL_CLIENT_SECRET").unwrap_or_default());
        let webhook_id = std::env::var("STL_PAYPAL_WEBHOOK_ID").unwrap_or_else(|_| {
            warn!("🪛️ STL_PAYPAL_WEBHOOK_ID is not set. Every PayPal webhook will be rejected.");
            String::new()
        });
        let mode = match std::env::var("STL_PAYPAL_MODE").map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Ok("live") => PaypalMode::Live,
            Ok("sandbox") | Err(_) => PaypalMode::Sandbox,
            Ok(other) => {
                warn!("🪛️ Unknown STL_PAYPAL_MODE '{other}'. Using the sandbox.");
                PaypalMode::Sandbox
            },
        };
        Some(Self { client_id, client_secret, webhook_id, mode, api_base: None })
    }

    pub fn base_url(&self) -> &str {
        self.api_base.as_deref().unwrap_or_else(|| self.mode.api_base())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() || self.client_secret.is_empty() {
            return Err("PayPal needs both a client id and a client secret".into());
        }
        if self.webhook_id.trim().is_empty() {
            return Err("PayPal needs a webhook id to verify webhook signatures".into());
        }
        Ok(())
    }
}
