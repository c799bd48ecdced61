//! Inbound notification handling: decode, authenticate and resolve the
//! gateway's server-to-server callback into a host-facing outcome.

use std::{collections::HashMap, str::FromStr};

use error_stack::ResultExt;
use url::Url;

use crate::{
    consts, crypto,
    enums::{CallbackStatus, PaymentStatus, TransactionType},
    errors::{CustomResult, OpayoError},
    settings::OpayoSettings,
    types::{
        CallbackResponse, CallbackResult, InboundRequestContext, MinorUnit, Order, ProviderUrls,
        StoredProviderMetadata, TransactionInfo,
    },
};

/// Raw notification fields as posted by the gateway.
///
/// Everything is optional on the wire; an absent field participates in the
/// signature as the empty string. Field names follow the gateway's spelling.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct CallbackNotification {
    #[serde(rename = "VPSProtocol")]
    pub vps_protocol: Option<String>,
    #[serde(rename = "TxType")]
    pub tx_type: Option<String>,
    #[serde(rename = "VendorTxCode")]
    pub vendor_tx_code: Option<String>,
    #[serde(rename = "VPSTxId")]
    pub transaction_id: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "StatusDetail")]
    pub status_detail: Option<String>,
    #[serde(rename = "TxAuthNo")]
    pub tx_auth_no: Option<String>,
    #[serde(rename = "AVSCV2")]
    pub avs_cv2: Option<String>,
    #[serde(rename = "AddressResult")]
    pub address_result: Option<String>,
    #[serde(rename = "PostCodeResult")]
    pub post_code_result: Option<String>,
    #[serde(rename = "CV2Result")]
    pub cv2_result: Option<String>,
    #[serde(rename = "GiftAid")]
    pub gift_aid: Option<String>,
    #[serde(rename = "3DSecureStatus")]
    pub secure_status: Option<String>,
    #[serde(rename = "CAVV")]
    pub cavv: Option<String>,
    #[serde(rename = "AddressStatus")]
    pub address_status: Option<String>,
    #[serde(rename = "PayerStatus")]
    pub payer_status: Option<String>,
    #[serde(rename = "CardType")]
    pub card_type: Option<String>,
    #[serde(rename = "Last4Digits")]
    pub last4_digits: Option<String>,
    #[serde(rename = "DeclineCode")]
    pub decline_code: Option<String>,
    #[serde(rename = "ExpiryDate")]
    pub expiry_date: Option<String>,
    #[serde(rename = "FraudResponse")]
    pub fraud_response: Option<String>,
    #[serde(rename = "BankAuthCode")]
    pub bank_auth_code: Option<String>,
    #[serde(rename = "Surcharge")]
    pub surcharge: Option<String>,
    #[serde(rename = "VPSSignature")]
    pub signature: Option<String>,
}

impl CallbackNotification {
    /// Decodes a notification from its form-encoded request body.
    pub fn from_form_body(body: &[u8]) -> CustomResult<Self, OpayoError> {
        serde_urlencoded::from_bytes(body).change_context(OpayoError::NotificationParsingFailed)
    }

    /// Reported status, if it belongs to the protocol vocabulary.
    pub fn status(&self) -> Option<CallbackStatus> {
        self.status
            .as_deref()
            .and_then(|raw| CallbackStatus::from_str(raw).ok())
    }

    /// Gateway surcharge applied on top of the order total, zero when absent.
    pub fn surcharge_minor(&self) -> MinorUnit {
        self.surcharge
            .as_deref()
            .and_then(MinorUnit::from_major_unit_string)
            .unwrap_or_else(MinorUnit::zero)
    }

    /// `authCode:cardType:last4` summary persisted against the order. Absent
    /// slots stay empty but keep their separators.
    pub fn transaction_details(&self) -> String {
        format!(
            "{}:{}:{}",
            self.tx_auth_no.as_deref().unwrap_or_default(),
            self.card_type.as_deref().unwrap_or_default(),
            self.last4_digits.as_deref().unwrap_or_default(),
        )
    }
}

/// Resolves one notification into the outcome the host must apply: an
/// optional payment record, optional order metadata, and the reply body the
/// gateway is answered with.
///
/// Unrecognised statuses resolve to the empty pass-through before any
/// signature work; everything else is authenticated first, and a bad
/// signature always yields the error redirect with no record.
pub fn resolve_callback(
    order: &Order,
    notification: &CallbackNotification,
    stored_metadata: Option<&StoredProviderMetadata>,
    settings: &OpayoSettings,
    urls: &ProviderUrls,
    request_context: &InboundRequestContext,
) -> CallbackResult {
    let Some(status) = notification.status() else {
        tracing::info!(
            order_number = %order.order_number,
            status = notification.status.as_deref().unwrap_or(""),
            "notification status outside protocol vocabulary, passing through"
        );
        return CallbackResult::pass_through();
    };

    let stored_key = stored_metadata.map(|metadata| &metadata.security_key);
    if !crate::signature::validate_signature(notification, stored_key, settings) {
        tracing::warn!(
            order_number = %order.order_number,
            %status,
            "notification signature mismatch, answering with error redirect"
        );
        let error_url = make_url_absolute(&urls.error_url, request_context);
        return CallbackResult {
            transaction_info: None,
            response: redirect_response(consts::response::status_codes::ERROR, &error_url),
            meta_data: None,
        };
    }

    let transaction_id = notification.transaction_id.clone().unwrap_or_default();
    let surcharge = notification.surcharge_minor();
    let error_url = make_url_absolute(&urls.error_url, request_context);

    match status {
        CallbackStatus::Abort => {
            tracing::info!(order_number = %order.order_number, "shopper aborted payment");
            CallbackResult {
                transaction_info: None,
                response: redirect_response(consts::response::status_codes::OK, &urls.cancel_url),
                meta_data: None,
            }
        }
        CallbackStatus::Rejected => {
            tracing::warn!(order_number = %order.order_number, "payment rejected by fraud rules");
            CallbackResult {
                transaction_info: None,
                response: redirect_response(consts::response::status_codes::OK, &error_url),
                meta_data: None,
            }
        }
        CallbackStatus::Registered | CallbackStatus::Error => {
            tracing::warn!(
                order_number = %order.order_number,
                %status,
                status_detail = notification.status_detail.as_deref().unwrap_or(""),
                "gateway reported a failed transaction"
            );
            CallbackResult {
                transaction_info: None,
                response: redirect_response(consts::response::status_codes::OK, &error_url),
                meta_data: None,
            }
        }
        CallbackStatus::Pending => {
            tracing::info!(order_number = %order.order_number, "payment pending at the gateway");
            CallbackResult {
                transaction_info: Some(TransactionInfo {
                    transaction_id,
                    amount_authorized: order.total_price_with_tax,
                    transaction_fee: surcharge,
                    payment_status: PaymentStatus::PendingExternalSystem,
                }),
                response: redirect_response(consts::response::status_codes::OK, &urls.continue_url),
                meta_data: None,
            }
        }
        CallbackStatus::Ok => {
            // PAYMENT settles immediately, every other type only authorizes.
            let payment_status = if notification
                .tx_type
                .as_deref()
                .map(|tx_type| TransactionType::from_str(tx_type) == Ok(TransactionType::Payment))
                .unwrap_or(false)
            {
                PaymentStatus::Captured
            } else {
                PaymentStatus::Authorized
            };
            tracing::info!(
                order_number = %order.order_number,
                %payment_status,
                "payment authorised"
            );
            CallbackResult {
                transaction_info: Some(TransactionInfo {
                    transaction_id,
                    amount_authorized: order.total_price_with_tax,
                    transaction_fee: surcharge,
                    payment_status,
                }),
                response: redirect_response(consts::response::status_codes::OK, &urls.continue_url),
                meta_data: order_meta(notification),
            }
        }
        CallbackStatus::NotAuthorised => {
            tracing::warn!(
                order_number = %order.order_number,
                decline_code = notification.decline_code.as_deref().unwrap_or(""),
                "payment not authorised"
            );
            CallbackResult {
                transaction_info: Some(TransactionInfo {
                    transaction_id,
                    amount_authorized: MinorUnit::zero(),
                    transaction_fee: surcharge,
                    payment_status: PaymentStatus::Error,
                }),
                response: redirect_response(consts::response::status_codes::OK, &error_url),
                meta_data: order_meta(notification),
            }
        }
        CallbackStatus::Authenticated => {
            tracing::info!(order_number = %order.order_number, "card authenticated only");
            CallbackResult {
                transaction_info: None,
                response: redirect_response(consts::response::status_codes::OK, &urls.continue_url),
                meta_data: order_meta(notification),
            }
        }
    }
}

/// Card summary metadata persisted on conclusive outcomes, alongside its
/// lower-case MD5 fingerprint.
fn order_meta(notification: &CallbackNotification) -> Option<HashMap<String, String>> {
    let details = notification.transaction_details();
    let hash = crypto::md5_hex(details.as_bytes()).ok()?;
    Some(HashMap::from([
        (
            consts::order_properties::TRANS_DETAILS.to_string(),
            details,
        ),
        (consts::order_properties::TRANS_DETAILS_HASH.to_string(), hash),
    ]))
}

fn redirect_response(status_code: &str, redirect_url: &str) -> CallbackResponse {
    CallbackResponse::ok(format!(
        "{}={}\n{}={}\n",
        consts::response::STATUS,
        status_code,
        consts::response::REDIRECT_URL,
        redirect_url,
    ))
}

/// Resolves a possibly-relative URL against the inbound request, honouring
/// proxy forwarding headers.
///
/// Externally-visible scheme and host come from `X-Forwarded-Proto` /
/// `X-Forwarded-Host` when present. The port is pinned to 443 for HTTPS on
/// anything but localhost, since a forwarded request's local port is not the
/// one the shopper's browser sees.
pub fn make_url_absolute(url: &str, request: &InboundRequestContext) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if !parsed.cannot_be_a_base() {
            return parsed.to_string();
        }
    }

    let scheme = request
        .forwarded_proto
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(&request.scheme);
    let host = request
        .forwarded_host
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(&request.host);

    let port = if scheme.eq_ignore_ascii_case("https") && !host.eq_ignore_ascii_case("localhost") {
        Some(443)
    } else {
        request.port
    };

    let base = match port {
        Some(port) => format!("{scheme}://{host}:{port}/"),
        None => format!("{scheme}://{host}/"),
    };
    match Url::parse(&base).and_then(|base| base.join(url)) {
        Ok(absolute) => absolute.to_string(),
        Err(error) => {
            tracing::warn!(%url, %error, "failed to absolutise redirect url, using it verbatim");
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_context() -> InboundRequestContext {
        InboundRequestContext {
            scheme: "http".to_string(),
            host: "internal-host".to_string(),
            port: Some(8080),
            forwarded_proto: None,
            forwarded_host: None,
        }
    }

    #[test]
    fn notification_decodes_from_form_body() {
        let notification = CallbackNotification::from_form_body(
            b"VPSTxId=%7BABC-123%7D&Status=OK&TxType=PAYMENT&Last4Digits=1234&3DSecureStatus=OK",
        )
        .expect("notification decodes");
        assert_eq!(notification.transaction_id.as_deref(), Some("{ABC-123}"));
        assert_eq!(notification.status(), Some(CallbackStatus::Ok));
        assert_eq!(notification.secure_status.as_deref(), Some("OK"));
        assert_eq!(notification.surcharge_minor(), MinorUnit::zero());
    }

    #[test]
    fn surcharge_parses_from_major_units() {
        let notification = CallbackNotification {
            surcharge: Some("1.50".to_string()),
            ..CallbackNotification::default()
        };
        assert_eq!(notification.surcharge_minor(), MinorUnit::new(150));
    }

    #[test]
    fn transaction_details_keep_separators_for_absent_slots() {
        let notification = CallbackNotification {
            card_type: Some("VISA".to_string()),
            ..CallbackNotification::default()
        };
        assert_eq!(notification.transaction_details(), ":VISA:");
    }

    #[test]
    fn absolute_urls_pass_through_untouched() {
        assert_eq!(
            make_url_absolute("https://store.example.com/error", &request_context()),
            "https://store.example.com/error"
        );
    }

    #[test]
    fn relative_urls_resolve_against_the_request_host() {
        assert_eq!(
            make_url_absolute("/error", &request_context()),
            "http://internal-host:8080/error"
        );
    }

    #[test]
    fn forwarded_headers_take_precedence_and_pin_https_to_443() {
        let request = InboundRequestContext {
            forwarded_proto: Some("https".to_string()),
            forwarded_host: Some("store.example.com".to_string()),
            ..request_context()
        };
        // The url crate drops the default port for the scheme.
        assert_eq!(
            make_url_absolute("/error", &request),
            "https://store.example.com/error"
        );
    }

    #[test]
    fn https_to_localhost_keeps_the_request_port() {
        let request = InboundRequestContext {
            scheme: "https".to_string(),
            host: "localhost".to_string(),
            port: Some(8443),
            forwarded_proto: None,
            forwarded_host: None,
        };
        assert_eq!(
            make_url_absolute("/error", &request),
            "https://localhost:8443/error"
        );
    }
}
