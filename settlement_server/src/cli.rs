use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Explicit list, so that secrets never get printed
    const DISPLAY_ENVS: [&str; 38] = [
        "RUST_LOG",
        "STL_HOST",
        "STL_PORT",
        "STL_DATABASE_URL",
        "STL_PUBLIC_URL",
        "STL_PLATFORM_FEE",
        "STL_CURRENCY",
        "STL_INVOICE_PREFIX",
        "STL_VAT_RATE",
        "STL_PAYMENT_TERM_DAYS",
        "STL_INVOICE_DIR",
        "STL_ISSUER_NAME",
        "STL_ISSUER_STREET",
        "STL_ISSUER_POSTAL_CODE",
        "STL_ISSUER_CITY",
        "STL_ISSUER_COUNTRY",
        "STL_ISSUER_TAX_ID",
        "STL_ISSUER_VAT_ID",
        "STL_ISSUER_EMAIL",
        "STL_BANK_ACCOUNT_HOLDER",
        "STL_BANK_NAME",
        "STL_BANK_IBAN",
        "STL_BANK_BIC",
        "STL_PROVIDER_TIMEOUT",
        "STL_DOCUMENT_TIMEOUT",
        "STL_EMAIL_TIMEOUT",
        "STL_RECONCILE_INTERVAL",
        "STL_RECONCILE_STALE_AFTER",
        "STL_RECONCILE_ABANDON_AFTER",
        "STL_STRIPE_SIGNATURE_TOLERANCE",
        "STL_STRIPE_SIGNATURE_CHECKS",
        "STL_PAYPAL_CLIENT_ID",
        "STL_PAYPAL_MODE",
        "STL_SMTP_ENABLED",
        "STL_SMTP_HOST",
        "STL_SMTP_PORT",
        "STL_SMTP_USER",
        "STL_SMTP_FROM",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
