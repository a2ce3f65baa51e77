//! SBP transfer references.
//!
//! A [`PaymentReference`] is derived on demand from an amount and a package
//! label. Nothing here touches storage and the output depends only on the
//! inputs and the injected [`PaymentConfig`].

use serde::Serialize;

use crate::config::PaymentConfig;

/// Placeholder substituted with the amount in the transfer link template.
const AMOUNT_PLACEHOLDER: &str = "{amount}";

/// Amount used when a request carries none.
pub const DEFAULT_AMOUNT: &str = "0";

/// Display-ready transfer details for one pledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReference {
    pub phone: String,
    pub bank_name: String,
    pub amount: String,
    pub package_name: String,
    pub transfer_link: String,
    pub display_text: String,
}

/// Builds [`PaymentReference`]s for a fixed payee.
#[derive(Debug, Clone, Default)]
pub struct PaymentReferenceFormatter {
    config: PaymentConfig,
}

impl PaymentReferenceFormatter {
    pub const fn new(config: PaymentConfig) -> Self {
        Self { config }
    }

    /// Format a reference. `None` inputs fall back to `"0"` and the
    /// configured default package. The amount is passed through verbatim,
    /// numeric or not.
    pub fn format(&self, amount: Option<&str>, package_name: Option<&str>) -> PaymentReference {
        let amount = amount.unwrap_or(DEFAULT_AMOUNT);
        let package_name = package_name.unwrap_or(self.config.default_package.as_str());

        PaymentReference {
            phone: self.config.payee_phone.clone(),
            bank_name: self.config.bank_name.clone(),
            amount: amount.to_string(),
            package_name: package_name.to_string(),
            transfer_link: self.config.proxy_template.replace(AMOUNT_PLACEHOLDER, amount),
            display_text: format!("Перевод {amount}₽ для {package_name}"),
        }
    }
}
