//! Notification authenticity check.
//!
//! The gateway signs each notification by concatenating a fixed sequence of
//! field values (empty values elided), hashing the result with MD5 and
//! sending the upper-case hex digest as `VPSSignature`. Reproducing the
//! digest requires the per-transaction security key and the vendor name, so
//! a valid signature proves the notification came from the gateway for this
//! transaction.

use secrecy::{ExposeSecret, Secret};

use crate::{callback::CallbackNotification, crypto, settings::OpayoSettings};

/// Checks the notification's `VPSSignature` against the locally computed
/// digest. A missing security key leaves an empty slot, so validation fails
/// closed for notifications arriving before initiation state was stored.
pub fn validate_signature(
    notification: &CallbackNotification,
    stored_security_key: Option<&Secret<String>>,
    settings: &OpayoSettings,
) -> bool {
    let vendor = settings.vendor_name.expose_secret().to_lowercase();
    let security_key = stored_security_key
        .map(|key| key.expose_secret().as_str())
        .unwrap_or_default();

    // Field sequence fixed by the protocol; reordering changes the digest.
    let parts: [&str; 21] = [
        value(&notification.transaction_id),
        value(&notification.vendor_tx_code),
        value(&notification.status),
        value(&notification.tx_auth_no),
        &vendor,
        value(&notification.avs_cv2),
        security_key,
        value(&notification.address_result),
        value(&notification.post_code_result),
        value(&notification.cv2_result),
        value(&notification.gift_aid),
        value(&notification.secure_status),
        value(&notification.cavv),
        value(&notification.address_status),
        value(&notification.payer_status),
        value(&notification.card_type),
        value(&notification.last4_digits),
        value(&notification.decline_code),
        value(&notification.expiry_date),
        value(&notification.fraud_response),
        value(&notification.bank_auth_code),
    ];
    let message: String = parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect();

    let computed = match crypto::md5_hex(message.as_bytes()) {
        Ok(digest) => digest.to_uppercase(),
        Err(error) => {
            tracing::error!(?error, "failed to compute notification digest");
            return false;
        }
    };

    let presented = value(&notification.signature);
    let valid = computed == presented;
    if !valid {
        tracing::warn!(
            vendor_tx_code = value(&notification.vendor_tx_code),
            "notification signature does not match"
        );
    }
    valid
}

fn value(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or_default()
}
