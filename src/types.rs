//! Host-facing domain types and the collaborator seams the protocol client
//! reads through.

use std::collections::HashMap;

use secrecy::{ExposeSecret, Secret};

use crate::{consts, enums::PaymentStatus};

/// Money as hundredths of the major unit.
///
/// The protocol always renders amounts with exactly two fraction digits and a
/// `.` separator, independent of host locale, so hundredths are the native
/// resolution of the wire format.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct MinorUnit(i64);

impl MinorUnit {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn get_amount_as_i64(&self) -> i64 {
        self.0
    }

    /// Renders the amount the way the gateway expects it: two fraction
    /// digits, `.` separator, no grouping.
    pub fn to_major_unit_string(&self) -> StringMajorUnit {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        StringMajorUnit(format!("{}{}.{:02}", sign, abs / 100, abs % 100))
    }

    /// Parses a major-unit decimal string such as `"1.50"` back into minor
    /// units. Fraction digits beyond the second are dropped.
    pub fn from_major_unit_string(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let (sign, magnitude): (i64, &str) = match trimmed.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, trimmed),
        };
        let mut parts = magnitude.splitn(2, '.');
        let units: i64 = parts.next()?.parse().ok()?;
        let minor: i64 = match parts.next() {
            None => 0,
            Some(fraction) => {
                let fraction: String = fraction.chars().take(2).collect();
                let parsed: i64 = fraction.parse().ok()?;
                if fraction.len() == 1 {
                    parsed * 10
                } else {
                    parsed
                }
            }
        };
        let magnitude = units.checked_mul(100)?.checked_add(minor)?;
        Some(Self(sign.checked_mul(magnitude)?))
    }
}

/// A major-unit amount already formatted for the wire.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct StringMajorUnit(String);

impl StringMajorUnit {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One order line, used for the optional `Basket` summary.
#[derive(Clone, Debug)]
pub struct OrderLine {
    pub product_reference: String,
    pub quantity: u32,
    pub unit_price_without_tax: MinorUnit,
    pub unit_price_tax: MinorUnit,
    pub unit_price_with_tax: MinorUnit,
    pub total_price_with_tax: MinorUnit,
}

/// Read-only view of the order being paid for, supplied by the host.
///
/// `properties` is the host's free-form attribute bag; which keys hold the
/// billing/delivery details is merchant configuration, not protocol.
#[derive(Clone, Debug, Default)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub currency_id: String,
    pub billing_country_id: Option<String>,
    pub shipping_country_id: Option<String>,
    pub total_quantity: u32,
    pub total_price_with_tax: MinorUnit,
    pub properties: HashMap<String, String>,
    pub order_lines: Vec<OrderLine>,
}

impl Order {
    /// Looks up an order attribute, treating blank values as absent.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Substitutes `{orderReference}` / `{orderId}` placeholders in a
    /// merchant-configured URL template.
    pub fn fill_url_placeholders(&self, template: &str) -> String {
        template
            .replace(consts::placeholders::ORDER_REFERENCE, &self.order_number)
            .replace(consts::placeholders::ORDER_ID, &self.id)
    }
}

/// Currency record resolved from the host's reference data.
#[derive(Clone, Debug)]
pub struct CurrencyRecord {
    pub code: String,
    pub name: String,
}

/// Country record resolved from the host's reference data.
#[derive(Clone, Debug)]
pub struct CountryRecord {
    pub code: String,
}

/// Reference-data lookups owned by the host (collaborator reads only).
pub trait ReferenceData {
    fn currency(&self, currency_id: &str) -> Option<CurrencyRecord>;
    fn country(&self, country_id: &str) -> Option<CountryRecord>;
}

/// Provider state returned at initiation time for the host to persist
/// against the order.
///
/// The security key is the binding secret between initiation and callback;
/// without it a notification's signature cannot be validated and validation
/// fails closed.
#[derive(Debug)]
pub struct StoredProviderMetadata {
    pub security_key: Secret<String>,
    pub transaction_id: String,
}

impl StoredProviderMetadata {
    /// Renders the metadata under the order property keys hosts persist it
    /// with (`opayoSecurityKey`, `opayoTransactionId`).
    pub fn as_order_properties(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                consts::order_properties::SECURITY_KEY.to_string(),
                self.security_key.expose_secret().clone(),
            ),
            (
                consts::order_properties::TRANSACTION_ID.to_string(),
                self.transaction_id.clone(),
            ),
        ])
    }
}

/// Outcome of a successful transaction registration.
#[derive(Debug)]
pub struct InitiateResult {
    /// Where to send the shopper to enter card details.
    pub next_url: String,
    /// Must be persisted by the host before the notification can arrive.
    pub metadata: StoredProviderMetadata,
}

/// Normalized payment record produced by a validated notification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionInfo {
    pub transaction_id: String,
    pub amount_authorized: MinorUnit,
    pub transaction_fee: MinorUnit,
    pub payment_status: PaymentStatus,
}

/// The reply a notification must be answered with. Always HTTP 200 — the
/// gateway treats any other status as a delivery failure and retries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallbackResponse {
    pub status_code: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl CallbackResponse {
    pub(crate) fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            content_type: "text/plain",
            body,
        }
    }
}

/// Normalized outcome of handling one notification.
#[derive(Debug)]
pub struct CallbackResult {
    pub transaction_info: Option<TransactionInfo>,
    pub response: CallbackResponse,
    pub meta_data: Option<HashMap<String, String>>,
}

impl CallbackResult {
    /// Pass-through outcome for statuses outside the protocol vocabulary.
    pub(crate) fn pass_through() -> Self {
        Self {
            transaction_info: None,
            response: CallbackResponse::ok(String::new()),
            meta_data: None,
        }
    }
}

/// Merchant-facing continue/cancel/error URLs with placeholders already
/// expanded for the order at hand.
#[derive(Clone, Debug)]
pub struct ProviderUrls {
    pub continue_url: String,
    pub cancel_url: String,
    pub error_url: String,
}

/// The pieces of the inbound notification request needed to resolve a
/// relative error URL to an absolute one.
#[derive(Clone, Debug)]
pub struct InboundRequestContext {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub forwarded_proto: Option<String>,
    pub forwarded_host: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_always_render_two_fraction_digits_with_a_point() {
        assert_eq!(MinorUnit::new(1050).to_major_unit_string().as_str(), "10.50");
        assert_eq!(MinorUnit::new(5).to_major_unit_string().as_str(), "0.05");
        assert_eq!(MinorUnit::new(100).to_major_unit_string().as_str(), "1.00");
        assert_eq!(MinorUnit::new(0).to_major_unit_string().as_str(), "0.00");
        assert_eq!(
            MinorUnit::new(-1234).to_major_unit_string().as_str(),
            "-12.34"
        );
    }

    #[test]
    fn major_unit_strings_parse_back_into_minor_units() {
        assert_eq!(
            MinorUnit::from_major_unit_string("1.50"),
            Some(MinorUnit::new(150))
        );
        assert_eq!(
            MinorUnit::from_major_unit_string("2"),
            Some(MinorUnit::new(200))
        );
        assert_eq!(
            MinorUnit::from_major_unit_string("0.5"),
            Some(MinorUnit::new(50))
        );
        assert_eq!(
            MinorUnit::from_major_unit_string("-3.25"),
            Some(MinorUnit::new(-325))
        );
        assert_eq!(MinorUnit::from_major_unit_string("not-a-number"), None);
    }

    #[test]
    fn amounts_too_large_for_minor_units_fail_to_parse() {
        assert_eq!(
            MinorUnit::from_major_unit_string("99999999999999999999.00"),
            None
        );
        assert_eq!(
            MinorUnit::from_major_unit_string("99999999999999999.00"),
            None
        );
        assert_eq!(
            MinorUnit::from_major_unit_string("-99999999999999999.00"),
            None
        );
    }

    #[test]
    fn stored_metadata_renders_the_host_property_keys() {
        let metadata = StoredProviderMetadata {
            security_key: Secret::new("sk-secret".to_string()),
            transaction_id: "{TX-1}".to_string(),
        };
        let properties = metadata.as_order_properties();
        assert_eq!(
            properties.get("opayoSecurityKey").map(String::as_str),
            Some("sk-secret")
        );
        assert_eq!(
            properties.get("opayoTransactionId").map(String::as_str),
            Some("{TX-1}")
        );
    }

    #[test]
    fn blank_order_properties_count_as_absent() {
        let order = Order {
            properties: HashMap::from([
                ("surname".to_string(), "Smith".to_string()),
                ("city".to_string(), "   ".to_string()),
            ]),
            ..Order::default()
        };
        assert_eq!(order.property("surname"), Some("Smith"));
        assert_eq!(order.property("city"), None);
        assert_eq!(order.property("missing"), None);
    }

    #[test]
    fn url_placeholders_expand_from_the_order() {
        let order = Order {
            id: "42".to_string(),
            order_number: "ORDER-0001".to_string(),
            ..Order::default()
        };
        assert_eq!(
            order.fill_url_placeholders("/continue/{orderReference}?id={orderId}"),
            "/continue/ORDER-0001?id=42"
        );
    }
}
