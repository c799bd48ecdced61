//! Builds the outbound transaction field set from an order and the merchant
//! settings.
//!
//! The gateway consumes a flat, ordered `name=value` field set. Required
//! fields must be present and non-blank before transport; overlong values are
//! truncated to the protocol limits rather than rejected.

use std::str::FromStr;

use error_stack::{Report, ResultExt};
use secrecy::ExposeSecret;

use crate::{
    consts,
    enums::Currency,
    errors::{CustomResult, OpayoError},
    settings::{AddressPropertyKeys, OpayoSettings},
    types::{Order, OrderLine, ReferenceData},
};

/// Finished, ordered protocol field set. Immutable once built, so a
/// partially-encoded request can never be observed.
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    fields: Vec<(String, String)>,
}

impl TransactionRequest {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Renders the field set as an `application/x-www-form-urlencoded` body.
    pub fn to_form_body(&self) -> CustomResult<String, OpayoError> {
        serde_urlencoded::to_string(&self.fields)
            .change_context(OpayoError::RequestEncodingFailed)
    }
}

#[derive(Default)]
struct TransactionRequestBuilder {
    fields: Vec<(String, String)>,
}

impl TransactionRequestBuilder {
    fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    fn build(self) -> TransactionRequest {
        TransactionRequest {
            fields: self.fields,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Party {
    Billing,
    Delivery,
}

impl Party {
    fn field(self, suffix: &str) -> String {
        let prefix = match self {
            Self::Billing => "Billing",
            Self::Delivery => "Delivery",
        };
        format!("{prefix}{suffix}")
    }

    fn label(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Delivery => "delivery",
        }
    }
}

/// Encodes `order` into the gateway's transaction registration field set.
pub fn encode(
    order: &Order,
    settings: &OpayoSettings,
    reference_data: &dyn ReferenceData,
    notification_url: &str,
) -> CustomResult<TransactionRequest, OpayoError> {
    let vendor = settings.vendor_name_checked()?;
    let transaction_type = settings.transaction_type()?;
    let currency = resolve_currency(order, reference_data)?;

    let mut builder = TransactionRequestBuilder::default()
        .field(consts::request::VPS_PROTOCOL, settings.vps_protocol())
        .field(consts::request::TX_TYPE, transaction_type.to_string())
        .field(consts::request::VENDOR, vendor.expose_secret().as_str())
        .field(consts::request::VENDOR_TX_CODE, order.order_number.as_str())
        .field(consts::request::CURRENCY, currency.to_string())
        .field(
            consts::request::AMOUNT,
            order.total_price_with_tax.to_major_unit_string().as_str(),
        )
        .field(consts::request::DESCRIPTION, description(order, settings))
        .field(consts::request::NOTIFICATION_URL, notification_url);

    builder = encode_party(
        builder,
        Party::Billing,
        order,
        &settings.billing,
        order.billing_country_id.as_deref(),
        reference_data,
    )?;
    builder = encode_party(
        builder,
        Party::Delivery,
        order,
        &settings.delivery,
        order.shipping_country_id.as_deref(),
        reference_data,
    )?;

    if settings.include_display_order_lines {
        builder = builder.field(consts::request::BASKET, basket_summary(&order.order_lines));
    }

    Ok(builder.build())
}

fn resolve_currency(
    order: &Order,
    reference_data: &dyn ReferenceData,
) -> CustomResult<Currency, OpayoError> {
    let record = reference_data.currency(&order.currency_id).ok_or_else(|| {
        Report::from(OpayoError::MissingRequiredField {
            field_name: "currency".to_string(),
        })
    })?;
    Currency::from_str(&record.code.to_uppercase()).map_err(|_| {
        OpayoError::InvalidCurrencyCode {
            code: record.name.clone(),
        }
        .into()
    })
}

fn description(order: &Order, settings: &OpayoSettings) -> String {
    settings
        .description_property
        .as_deref()
        .and_then(|key| order.property(key))
        .map(|value| truncate(value, consts::DESCRIPTION_MAX_LEN))
        .unwrap_or_else(|| format!("Order - {} items", order.total_quantity))
}

fn encode_party(
    builder: TransactionRequestBuilder,
    party: Party,
    order: &Order,
    keys: &AddressPropertyKeys,
    country_id: Option<&str>,
    reference_data: &dyn ReferenceData,
) -> CustomResult<TransactionRequestBuilder, OpayoError> {
    let surname = require_property(order, &keys.surname, party, "surname")?;
    let first_name = require_property(order, &keys.first_name, party, "first name")?;
    let address1 = require_property(order, &keys.address1, party, "address 1")?;
    let city = require_property(order, &keys.city, party, "city")?;

    let mut builder = builder
        .field(party.field("Surname"), truncate(&surname, consts::NAME_MAX_LEN))
        .field(
            party.field("Firstnames"),
            truncate(&first_name, consts::NAME_MAX_LEN),
        )
        .field(
            party.field("Address1"),
            truncate(&address1, consts::ADDRESS_MAX_LEN),
        );

    if let Some(value) = optional_property(order, keys.address2.as_deref()) {
        builder = builder.field(
            party.field("Address2"),
            truncate(value, consts::ADDRESS_MAX_LEN),
        );
    }

    builder = builder.field(party.field("City"), truncate(&city, consts::CITY_MAX_LEN));

    if let Some(value) = optional_property(order, keys.postcode.as_deref()) {
        builder = builder.field(
            party.field("PostCode"),
            truncate(value, consts::POSTCODE_MAX_LEN),
        );
    }

    let country = country_id
        .and_then(|id| reference_data.country(id))
        .ok_or_else(|| {
            Report::from(OpayoError::MissingRequiredField {
                field_name: format!("{} country", party.label()),
            })
        })?;
    builder = builder.field(party.field("Country"), country.code.as_str());

    // The gateway mandates a state for US addresses only.
    if country.code == "US" {
        let county_key = keys.county.as_deref().unwrap_or_default();
        let state = require_property(order, county_key, party, "county/state")?;
        builder = builder.field(party.field("State"), state);
    }

    Ok(builder)
}

fn require_property(
    order: &Order,
    key: &str,
    party: Party,
    role: &str,
) -> CustomResult<String, OpayoError> {
    if key.trim().is_empty() {
        return Err(OpayoError::MissingRequiredField {
            field_name: format!("{} {}", party.label(), role),
        }
        .into());
    }
    order
        .property(key)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            OpayoError::MissingRequiredField {
                field_name: format!("{} {}", party.label(), role),
            }
            .into()
        })
}

fn optional_property<'a>(order: &'a Order, key: Option<&str>) -> Option<&'a str> {
    key.filter(|key| !key.trim().is_empty())
        .and_then(|key| order.property(key))
}

/// Renders the count-prefixed, `:`-joined order line summary.
fn basket_summary(lines: &[OrderLine]) -> String {
    let mut rendered: Vec<String> = lines
        .iter()
        .map(|line| {
            format!(
                "{}:{}:{}:{}:{}:{}",
                line.product_reference,
                line.quantity,
                line.unit_price_without_tax.to_major_unit_string().as_str(),
                line.unit_price_tax.to_major_unit_string().as_str(),
                line.unit_price_with_tax.to_major_unit_string().as_str(),
                line.total_price_with_tax.to_major_unit_string().as_str(),
            )
        })
        .collect();
    rendered.insert(0, rendered.len().to_string());
    rendered.join(":")
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
