//! Merchant configuration for the Opayo Server provider.

use std::str::FromStr;

use secrecy::{ExposeSecret, Secret};

use crate::{
    consts,
    enums::TransactionType,
    errors::{CustomResult, OpayoError},
};

/// Order attribute keys holding one party's address details. Billing and
/// delivery use the same shape; only the configured keys differ.
#[derive(Debug, serde::Deserialize)]
pub struct AddressPropertyKeys {
    pub surname: String,
    pub first_name: String,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

/// Provider settings as stored by the host's merchant configuration.
///
/// `vps_protocol` and `tx_type` fall back to the protocol defaults when
/// unset; the URLs may carry `{orderReference}` / `{orderId}` placeholders.
#[derive(Debug, serde::Deserialize)]
pub struct OpayoSettings {
    /// Vendor identifier assigned by the gateway at sign-up. Also a
    /// signature input, lower-cased.
    pub vendor_name: Secret<String>,
    #[serde(default)]
    pub vps_protocol: Option<String>,
    #[serde(default)]
    pub tx_type: Option<String>,
    pub billing: AddressPropertyKeys,
    pub delivery: AddressPropertyKeys,
    #[serde(default)]
    pub description_property: Option<String>,
    #[serde(default)]
    pub include_display_order_lines: bool,
    #[serde(default)]
    pub test_mode: bool,
    pub continue_url: String,
    pub cancel_url: String,
    pub error_url: String,
}

impl OpayoSettings {
    /// Messaging version for the wire, defaulting to "3.00".
    pub fn vps_protocol(&self) -> &str {
        self.vps_protocol
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(consts::DEFAULT_VPS_PROTOCOL)
    }

    /// Configured transaction type, defaulting to `PAYMENT`. A value outside
    /// the protocol vocabulary is a configuration error, never sent as-is.
    pub fn transaction_type(&self) -> CustomResult<TransactionType, OpayoError> {
        match self
            .tx_type
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            None => Ok(TransactionType::default()),
            Some(raw) => TransactionType::from_str(&raw.trim().to_uppercase()).map_err(|_| {
                OpayoError::InvalidTransactionType {
                    tx_type: raw.to_string(),
                }
                .into()
            }),
        }
    }

    pub(crate) fn vendor_name_checked(&self) -> CustomResult<&Secret<String>, OpayoError> {
        if self.vendor_name.expose_secret().trim().is_empty() {
            return Err(OpayoError::MissingRequiredField {
                field_name: "vendor name".to_string(),
            }
            .into());
        }
        Ok(&self.vendor_name)
    }
}
