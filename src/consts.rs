//! Protocol field names and fixed defaults for the Opayo Server profile.

/// Messaging version sent when the merchant has not configured one.
pub const DEFAULT_VPS_PROTOCOL: &str = "3.00";

/// Gateway request timeout. The protocol has no notion of a partial send, so
/// a timed-out registration is treated as a failed initiation.
pub const GATEWAY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Per-field truncation limits. Overlong values are cut, never rejected.
pub const NAME_MAX_LEN: usize = 20;
pub const CITY_MAX_LEN: usize = 40;
pub const ADDRESS_MAX_LEN: usize = 100;
pub const POSTCODE_MAX_LEN: usize = 10;
pub const DESCRIPTION_MAX_LEN: usize = 100;

/// Outbound transaction request field names.
pub mod request {
    pub const VPS_PROTOCOL: &str = "VPSProtocol";
    pub const TX_TYPE: &str = "TxType";
    pub const VENDOR: &str = "Vendor";
    pub const VENDOR_TX_CODE: &str = "VendorTxCode";
    pub const CURRENCY: &str = "Currency";
    pub const AMOUNT: &str = "Amount";
    pub const DESCRIPTION: &str = "Description";
    pub const NOTIFICATION_URL: &str = "NotificationURL";
    pub const BASKET: &str = "Basket";
}

/// Gateway reply field names, shared by the registration response and the
/// body sent back to a notification.
pub mod response {
    pub const STATUS: &str = "Status";
    pub const STATUS_DETAIL: &str = "StatusDetail";
    pub const TRANSACTION_ID: &str = "VPSTxId";
    pub const SECURITY_KEY: &str = "SecurityKey";
    pub const NEXT_URL: &str = "NextURL";
    pub const REDIRECT_URL: &str = "RedirectURL";

    pub mod status_codes {
        pub const OK: &str = "OK";
        pub const REPEATED: &str = "OK REPEATED";
        pub const ERROR: &str = "ERROR";
    }
}

/// Keys under which the host persists provider metadata against an order.
pub mod order_properties {
    pub const SECURITY_KEY: &str = "opayoSecurityKey";
    pub const TRANSACTION_ID: &str = "opayoTransactionId";
    pub const TRANS_DETAILS: &str = "opayoTransDetails";
    pub const TRANS_DETAILS_HASH: &str = "opayoTransDetailsHash";
}

/// Placeholders the merchant may embed in continue/cancel/error URL templates.
pub mod placeholders {
    pub const ORDER_REFERENCE: &str = "{orderReference}";
    pub const ORDER_ID: &str = "{orderId}";
}
