//! End-to-end notification handling: a signed callback arriving for an order
//! with stored initiation state must produce the right payment record and
//! redirect reply.

use std::collections::HashMap;

use secrecy::Secret;

use opayo_server::{
    callback::CallbackNotification,
    crypto,
    enums::PaymentStatus,
    settings::{AddressPropertyKeys, OpayoSettings},
    types::{InboundRequestContext, MinorUnit, Order, StoredProviderMetadata},
    OpayoServerClient,
};

const VENDOR: &str = "AcmeStore";
const SECURITY_KEY: &str = "sk-0123456789";

fn settings() -> OpayoSettings {
    let keys = |prefix: &str| AddressPropertyKeys {
        surname: format!("{prefix}Surname"),
        first_name: format!("{prefix}FirstName"),
        address1: format!("{prefix}Address1"),
        address2: None,
        city: format!("{prefix}City"),
        county: None,
        postcode: None,
    };
    OpayoSettings {
        vendor_name: Secret::new(VENDOR.to_string()),
        vps_protocol: None,
        tx_type: None,
        billing: keys("billing"),
        delivery: keys("delivery"),
        description_property: None,
        include_display_order_lines: false,
        test_mode: true,
        continue_url: "https://store.example.com/continue/{orderReference}".to_string(),
        cancel_url: "https://store.example.com/cancel".to_string(),
        error_url: "/error".to_string(),
    }
}

fn order() -> Order {
    Order {
        id: "42".to_string(),
        order_number: "ORDER-0001".to_string(),
        currency_id: "currency-1".to_string(),
        billing_country_id: Some("country-1".to_string()),
        shipping_country_id: Some("country-1".to_string()),
        total_quantity: 2,
        total_price_with_tax: MinorUnit::new(12550),
        properties: HashMap::new(),
        order_lines: Vec::new(),
    }
}

fn stored_metadata() -> StoredProviderMetadata {
    StoredProviderMetadata {
        security_key: Secret::new(SECURITY_KEY.to_string()),
        transaction_id: "{TX-1}".to_string(),
    }
}

fn request_context() -> InboundRequestContext {
    InboundRequestContext {
        scheme: "http".to_string(),
        host: "internal-host".to_string(),
        port: Some(8080),
        forwarded_proto: Some("https".to_string()),
        forwarded_host: Some("store.example.com".to_string()),
    }
}

/// Signs `notification` the way the gateway does: the fixed field sequence,
/// empty values elided, MD5, upper-case hex.
fn sign(notification: &mut CallbackNotification) {
    let vendor = VENDOR.to_lowercase();
    let parts: [&str; 21] = [
        notification.transaction_id.as_deref().unwrap_or_default(),
        notification.vendor_tx_code.as_deref().unwrap_or_default(),
        notification.status.as_deref().unwrap_or_default(),
        notification.tx_auth_no.as_deref().unwrap_or_default(),
        &vendor,
        notification.avs_cv2.as_deref().unwrap_or_default(),
        SECURITY_KEY,
        notification.address_result.as_deref().unwrap_or_default(),
        notification.post_code_result.as_deref().unwrap_or_default(),
        notification.cv2_result.as_deref().unwrap_or_default(),
        notification.gift_aid.as_deref().unwrap_or_default(),
        notification.secure_status.as_deref().unwrap_or_default(),
        notification.cavv.as_deref().unwrap_or_default(),
        notification.address_status.as_deref().unwrap_or_default(),
        notification.payer_status.as_deref().unwrap_or_default(),
        notification.card_type.as_deref().unwrap_or_default(),
        notification.last4_digits.as_deref().unwrap_or_default(),
        notification.decline_code.as_deref().unwrap_or_default(),
        notification.expiry_date.as_deref().unwrap_or_default(),
        notification.fraud_response.as_deref().unwrap_or_default(),
        notification.bank_auth_code.as_deref().unwrap_or_default(),
    ];
    let message: String = parts.iter().filter(|part| !part.is_empty()).copied().collect();
    notification.signature = Some(
        crypto::md5_hex(message.as_bytes())
            .expect("digest")
            .to_uppercase(),
    );
}

fn successful_payment_notification() -> CallbackNotification {
    let mut notification = CallbackNotification {
        transaction_id: Some("{TX-1}".to_string()),
        vendor_tx_code: Some("ORDER-0001".to_string()),
        status: Some("OK".to_string()),
        tx_type: Some("PAYMENT".to_string()),
        tx_auth_no: Some("123456".to_string()),
        avs_cv2: Some("ALL MATCH".to_string()),
        card_type: Some("VISA".to_string()),
        last4_digits: Some("4242".to_string()),
        surcharge: Some("1.50".to_string()),
        ..CallbackNotification::default()
    };
    sign(&mut notification);
    notification
}

#[test]
fn successful_payment_captures_and_redirects_to_continue() {
    let client = OpayoServerClient::new(settings()).expect("client builds");
    let result = client.handle_callback(
        &order(),
        &successful_payment_notification(),
        Some(&stored_metadata()),
        &request_context(),
    );

    let info = result.transaction_info.expect("payment record");
    assert_eq!(info.transaction_id, "{TX-1}");
    assert_eq!(info.payment_status, PaymentStatus::Captured);
    assert_eq!(info.amount_authorized, MinorUnit::new(12550));
    assert_eq!(info.transaction_fee, MinorUnit::new(150));

    assert_eq!(result.response.status_code, 200);
    assert_eq!(result.response.content_type, "text/plain");
    assert_eq!(
        result.response.body,
        "Status=OK\nRedirectURL=https://store.example.com/continue/ORDER-0001\n"
    );

    let meta = result.meta_data.expect("card summary metadata");
    assert_eq!(
        meta.get("opayoTransDetails").map(String::as_str),
        Some("123456:VISA:4242")
    );
    let expected_hash =
        crypto::md5_hex("123456:VISA:4242".as_bytes()).expect("digest");
    assert_eq!(
        meta.get("opayoTransDetailsHash").map(String::as_str),
        Some(expected_hash.as_str())
    );
}

#[test]
fn deferred_success_authorizes_instead_of_capturing() {
    let mut notification = successful_payment_notification();
    notification.tx_type = Some("DEFERRED".to_string());
    sign(&mut notification);

    let client = OpayoServerClient::new(settings()).expect("client builds");
    let result = client.handle_callback(
        &order(),
        &notification,
        Some(&stored_metadata()),
        &request_context(),
    );
    let info = result.transaction_info.expect("payment record");
    assert_eq!(info.payment_status, PaymentStatus::Authorized);
}

#[test]
fn tampered_notification_gets_the_error_redirect_and_no_record() {
    let mut notification = successful_payment_notification();
    notification.avs_cv2 = Some("NONE MATCH".to_string());

    let client = OpayoServerClient::new(settings()).expect("client builds");
    let result = client.handle_callback(
        &order(),
        &notification,
        Some(&stored_metadata()),
        &request_context(),
    );

    assert!(result.transaction_info.is_none());
    assert!(result.meta_data.is_none());
    // The relative error URL resolves against the forwarded host, with HTTPS
    // pinned to its default port.
    assert_eq!(
        result.response.body,
        "Status=ERROR\nRedirectURL=https://store.example.com/error\n"
    );
}

#[test]
fn aborted_payment_redirects_to_cancel_without_a_record() {
    let mut notification = CallbackNotification {
        transaction_id: Some("{TX-1}".to_string()),
        vendor_tx_code: Some("ORDER-0001".to_string()),
        status: Some("ABORT".to_string()),
        ..CallbackNotification::default()
    };
    sign(&mut notification);

    let client = OpayoServerClient::new(settings()).expect("client builds");
    let result = client.handle_callback(
        &order(),
        &notification,
        Some(&stored_metadata()),
        &request_context(),
    );

    assert!(result.transaction_info.is_none());
    assert!(result.meta_data.is_none());
    assert_eq!(
        result.response.body,
        "Status=OK\nRedirectURL=https://store.example.com/cancel\n"
    );
}

#[test]
fn declined_payment_records_an_error_with_zero_amount() {
    let mut notification = CallbackNotification {
        transaction_id: Some("{TX-1}".to_string()),
        vendor_tx_code: Some("ORDER-0001".to_string()),
        status: Some("NOTAUTHED".to_string()),
        decline_code: Some("00".to_string()),
        card_type: Some("VISA".to_string()),
        last4_digits: Some("4242".to_string()),
        ..CallbackNotification::default()
    };
    sign(&mut notification);

    let client = OpayoServerClient::new(settings()).expect("client builds");
    let result = client.handle_callback(
        &order(),
        &notification,
        Some(&stored_metadata()),
        &request_context(),
    );

    let info = result.transaction_info.expect("declines are recorded");
    assert_eq!(info.payment_status, PaymentStatus::Error);
    assert_eq!(info.amount_authorized, MinorUnit::zero());
    assert!(result.meta_data.is_some());
    assert_eq!(
        result.response.body,
        "Status=OK\nRedirectURL=https://store.example.com/error\n"
    );
}

#[test]
fn unknown_status_passes_through_without_signature_validation() {
    // No signature at all: an out-of-vocabulary status must never reach the
    // signature check.
    let notification = CallbackNotification {
        status: Some("SOMETHING_NEW".to_string()),
        ..CallbackNotification::default()
    };

    let client = OpayoServerClient::new(settings()).expect("client builds");
    let result = client.handle_callback(&order(), &notification, None, &request_context());

    assert!(result.transaction_info.is_none());
    assert!(result.meta_data.is_none());
    assert_eq!(result.response.status_code, 200);
    assert_eq!(result.response.body, "");
}

#[test]
fn every_known_status_fails_closed_without_stored_state() {
    let client = OpayoServerClient::new(settings()).expect("client builds");
    for status in [
        "OK",
        "PENDING",
        "NOTAUTHED",
        "ABORT",
        "REJECTED",
        "REGISTERED",
        "AUTHENTICATED",
        "ERROR",
    ] {
        let mut notification = CallbackNotification {
            transaction_id: Some("{TX-1}".to_string()),
            vendor_tx_code: Some("ORDER-0001".to_string()),
            status: Some(status.to_string()),
            ..CallbackNotification::default()
        };
        sign(&mut notification);

        // Signature was built with the real key, but none is stored.
        let result = client.handle_callback(&order(), &notification, None, &request_context());
        assert!(
            result.transaction_info.is_none(),
            "status {status} must not record a payment without stored state"
        );
        assert!(
            result.response.body.starts_with("Status=ERROR\n"),
            "status {status} must answer with the error redirect"
        );
    }
}
