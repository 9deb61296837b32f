use std::{env, fmt::Display, io::Write, path::PathBuf, str::FromStr};

use gateway_tools::{PaypalConfig, StripeConfig};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use settlement_common::{
    helpers::{normalize_currency_code, parse_boolean_flag},
    Secret,
    DEFAULT_CURRENCY_CODE,
};
use settlement_engine::{
    db_types::{BankDetails, Party},
    fees::FeePolicy,
    invoice_objects::{
        InvoiceSettings,
        DEFAULT_INVOICE_PREFIX,
        DEFAULT_PAYMENT_TERM_DAYS,
        DEFAULT_VAT_RATE,
    },
    payment_objects::LedgerSettings,
};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_STL_HOST: &str = "127.0.0.1";
const DEFAULT_STL_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/settlement.db";
const DEFAULT_INVOICE_DIR: &str = "data/invoices";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DOCUMENT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EMAIL_TIMEOUT_SECS: u64 = 20;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;
const DEFAULT_RECONCILE_STALE_AFTER_MINS: i64 = 30;
const DEFAULT_RECONCILE_ABANDON_AFTER_HRS: i64 = 24;
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub ledger: LedgerSettings,
    pub invoices: InvoiceSettings,
    pub reconciliation: ReconciliationConfig,
    /// `None` if Stripe is not configured. Stripe payments are then refused.
    pub stripe: Option<StripeConfig>,
    /// `None` if PayPal is not configured. PayPal payments are then refused.
    pub paypal: Option<PaypalConfig>,
    pub smtp: SmtpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_STL_HOST.to_string(),
            port: DEFAULT_STL_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            ledger: LedgerSettings::default(),
            invoices: InvoiceSettings::default(),
            reconciliation: ReconciliationConfig::default(),
            stripe: None,
            paypal: None,
            smtp: SmtpConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("STL_HOST").ok().unwrap_or_else(|| DEFAULT_STL_HOST.into());
        let port = env_or("STL_PORT", DEFAULT_STL_PORT);
        let database_url = env::var("STL_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ STL_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let ledger = ledger_settings_from_env();
        let invoices = invoice_settings_from_env();
        let reconciliation = ReconciliationConfig::from_env_or_default();
        let stripe = StripeConfig::from_env();
        if stripe.is_none() {
            info!("🪛️ STL_STRIPE_SECRET_KEY is not set. Stripe payments are disabled.");
        }
        let paypal = PaypalConfig::from_env();
        if paypal.is_none() {
            info!("🪛️ STL_PAYPAL_CLIENT_ID is not set. PayPal payments are disabled.");
        }
        let smtp = SmtpConfig::from_env_or_default();
        Self { host, port, database_url, auth, ledger, invoices, reconciliation, stripe, paypal, smtp }
    }

    /// Startup checks on the provider and mail credentials. A server with bad credentials refuses to start.
    pub fn validate(&self) -> Result<(), ServerError> {
        if let Some(stripe) = &self.stripe {
            stripe.validate().map_err(ServerError::ConfigurationError)?;
            info!("🪛️ Stripe is enabled with key {}", stripe.secret_key.hint());
        }
        if let Some(paypal) = &self.paypal {
            paypal.validate().map_err(ServerError::ConfigurationError)?;
            info!("🪛️ PayPal is enabled ({:?}) with client id {}", paypal.mode, paypal.client_id);
        }
        if self.smtp.enabled {
            self.smtp.validate()?;
        }
        Ok(())
    }
}

fn ledger_settings_from_env() -> LedgerSettings {
    let fees = match env::var("STL_PLATFORM_FEE") {
        Ok(s) => s.parse::<FeePolicy>().unwrap_or_else(|e| {
            warn!("🪛️ {e}. Using the default platform fee of {} instead.", FeePolicy::default());
            FeePolicy::default()
        }),
        Err(_) => {
            info!("🪛️ STL_PLATFORM_FEE is not set. Using the default platform fee of {}.", FeePolicy::default());
            FeePolicy::default()
        },
    };
    let currency = env::var("STL_CURRENCY")
        .ok()
        .and_then(|c| {
            normalize_currency_code(&c).or_else(|| {
                warn!("🪛️ {c} is not a valid currency code for STL_CURRENCY.");
                None
            })
        })
        .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
    let provider_timeout = seconds_from_env("STL_PROVIDER_TIMEOUT", DEFAULT_PROVIDER_TIMEOUT_SECS);
    LedgerSettings { fees, currency, provider_timeout }
}

fn invoice_settings_from_env() -> InvoiceSettings {
    let prefix = env::var("STL_INVOICE_PREFIX")
        .ok()
        .filter(|p| !p.trim().is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_INVOICE_PREFIX.to_string());
    let vat_rate = env_or("STL_VAT_RATE", DEFAULT_VAT_RATE);
    let vat_rate = if (0..=100).contains(&vat_rate) {
        vat_rate
    } else {
        warn!("🪛️ STL_VAT_RATE must be between 0 and 100, not {vat_rate}. Using {DEFAULT_VAT_RATE}.");
        DEFAULT_VAT_RATE
    };
    let payment_term_days = env_or("STL_PAYMENT_TERM_DAYS", DEFAULT_PAYMENT_TERM_DAYS);
    let document_dir = PathBuf::from(env::var("STL_INVOICE_DIR").unwrap_or_else(|_| DEFAULT_INVOICE_DIR.into()));
    let issuer = Party {
        legal_name: env_text("STL_ISSUER_NAME", "Marketplace Platform"),
        street: env_text("STL_ISSUER_STREET", "Street 1"),
        postal_code: env_text("STL_ISSUER_POSTAL_CODE", "00000"),
        city: env_text("STL_ISSUER_CITY", "City"),
        country: env_text("STL_ISSUER_COUNTRY", "DE"),
        tax_id: env::var("STL_ISSUER_TAX_ID").ok(),
        vat_id: env::var("STL_ISSUER_VAT_ID").ok(),
        email: env::var("STL_ISSUER_EMAIL").ok(),
    };
    let bank = BankDetails {
        account_holder: env_text("STL_BANK_ACCOUNT_HOLDER", &issuer.legal_name),
        bank_name: env_text("STL_BANK_NAME", "Bank"),
        iban: env_text("STL_BANK_IBAN", "DE00 0000 0000 0000 0000 00"),
        bic: env_text("STL_BANK_BIC", "XXXXXXXXXXX"),
    };
    InvoiceSettings {
        prefix,
        vat_rate,
        payment_term_days,
        issuer,
        bank,
        document_dir,
        public_url: env::var("STL_PUBLIC_URL").ok().filter(|s| !s.trim().is_empty()),
        document_timeout: seconds_from_env("STL_DOCUMENT_TIMEOUT", DEFAULT_DOCUMENT_TIMEOUT_SECS),
        email_timeout: seconds_from_env("STL_EMAIL_TIMEOUT", DEFAULT_EMAIL_TIMEOUT_SECS),
    }
}

//-------------------------------------------------  Reconciliation  ---------------------------------------------------
#[derive(Clone, Debug)]
pub struct ReconciliationConfig {
    /// Time between reconciliation runs.
    pub interval: std::time::Duration,
    /// Open payments younger than this are left alone; their webhook may still be on its way.
    pub stale_after: chrono::Duration,
    /// Open payments older than this are marked failed if the provider cannot resolve them.
    pub abandon_after: chrono::Duration,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            stale_after: chrono::Duration::minutes(DEFAULT_RECONCILE_STALE_AFTER_MINS),
            abandon_after: chrono::Duration::hours(DEFAULT_RECONCILE_ABANDON_AFTER_HRS),
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env_or_default() -> Self {
        let interval = seconds_from_env("STL_RECONCILE_INTERVAL", DEFAULT_RECONCILE_INTERVAL_SECS);
        let stale_after =
            chrono::Duration::minutes(env_or("STL_RECONCILE_STALE_AFTER", DEFAULT_RECONCILE_STALE_AFTER_MINS));
        let abandon_after =
            chrono::Duration::hours(env_or("STL_RECONCILE_ABANDON_AFTER", DEFAULT_RECONCILE_ABANDON_AFTER_HRS));
        if abandon_after <= stale_after {
            warn!(
                "🪛️ STL_RECONCILE_ABANDON_AFTER ({} hrs) should be well beyond STL_RECONCILE_STALE_AFTER ({} mins).",
                abandon_after.num_hours(),
                stale_after.num_minutes()
            );
        }
        Self { interval, stale_after, abandon_after }
    }
}

//-------------------------------------------------  SmtpConfig  -------------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct SmtpConfig {
    /// When false, no email is sent and every delivery is recorded as failed.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    /// The sender mailbox, e.g. `Marketplace Billing <billing@example.com>`.
    pub from: String,
}

impl SmtpConfig {
    pub fn from_env_or_default() -> Self {
        let enabled = parse_boolean_flag(env::var("STL_SMTP_ENABLED").ok(), false);
        if !enabled {
            info!("🪛️ SMTP is disabled. Invoices will be issued but not emailed.");
            return Self { port: DEFAULT_SMTP_PORT, ..Default::default() };
        }
        Self {
            enabled,
            host: env::var("STL_SMTP_HOST").unwrap_or_default(),
            port: env_or("STL_SMTP_PORT", DEFAULT_SMTP_PORT),
            user: env::var("STL_SMTP_USER").unwrap_or_default(),
            password: Secret::new(env::var("STL_SMTP_PASSWORD").unwrap_or_default()),
            from: env::var("STL_SMTP_FROM").unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.host.trim().is_empty() {
            return Err(ServerError::ConfigurationError("STL_SMTP_HOST must be set when SMTP is enabled".into()));
        }
        if !self.from.contains('@') {
            return Err(ServerError::ConfigurationError(format!(
                "STL_SMTP_FROM must be a mailbox address, not '{}'",
                self.from
            )));
        }
        if self.user.is_empty() || self.password.is_empty() {
            return Err(ServerError::ConfigurationError("SMTP credentials are incomplete".into()));
        }
        Ok(())
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret used to verify access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the STL_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => warn!("🪛️ Could not create a temporary file to store the JWT secret."),
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("STL_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [STL_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError("STL_JWT_SECRET must be at least 32 characters long".into()));
        }
        Ok(Self::new(secret))
    }
}

//-------------------------------------------------  helpers  ----------------------------------------------------------
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

fn seconds_from_env(name: &str, default: u64) -> std::time::Duration {
    std::time::Duration::from_secs(env_or(name, default))
}

fn env_text(name: &str, placeholder: &str) -> String {
    env::var(name).ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
        warn!("🪛️ {name} is not set. Invoices will show the placeholder '{placeholder}'.");
        placeholder.to_string()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn smtp_validation() {
        let mut smtp = SmtpConfig {
            enabled: true,
            host: "smtp.example.com".into(),
            port: 587,
            user: "billing".into(),
            password: Secret::new("hunter2hunter2".into()),
            from: "Marketplace Billing <billing@example.com>".into(),
        };
        assert!(smtp.validate().is_ok());
        smtp.from = "billing".into();
        assert!(smtp.validate().is_err());
        smtp.from = "billing@example.com".into();
        smtp.host = " ".into();
        assert!(smtp.validate().is_err());
    }

    #[test]
    fn default_auth_config_has_a_usable_secret() {
        let a = AuthConfig::default();
        let b = AuthConfig::default();
        assert_eq!(a.jwt_secret.reveal().len(), 48);
        assert_ne!(a.jwt_secret.reveal(), b.jwt_secret.reveal());
    }

    #[test]
    fn reconciliation_defaults() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.interval.as_secs(), 300);
        assert_eq!(config.stale_after.num_minutes(), 30);
        assert_eq!(config.abandon_after.num_hours(), 24);
    }
}
