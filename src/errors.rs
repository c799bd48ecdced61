//! Error and result types shared across the crate.

/// Result alias wrapping the error variant in an [`error_stack::Report`].
pub type CustomResult<T, E> = error_stack::Result<T, E>;

/// Failures raised while encoding, transporting or resolving a gateway
/// transaction.
///
/// A signature mismatch on a notification is deliberately not represented
/// here: it resolves to the invalid branch of the callback outcome table and
/// is answered with the error redirect body, never surfaced as an error value.
#[derive(Debug, thiserror::Error)]
pub enum OpayoError {
    /// A required order attribute or setting was absent or blank.
    #[error("Missing required field: {field_name}")]
    MissingRequiredField { field_name: String },

    /// The order's currency resolved to a code outside the ISO 4217 table.
    #[error("Currency must be a valid ISO 4217 currency code: {code}")]
    InvalidCurrencyCode { code: String },

    /// The configured transaction type is not part of the protocol vocabulary.
    #[error("Unrecognised transaction type: {tx_type}")]
    InvalidTransactionType { tx_type: String },

    #[error("Failed to encode transaction request body")]
    RequestEncodingFailed,

    /// Network failure, timeout or a non-success HTTP status from the
    /// gateway. Safe to retry with a fresh initiation; no partial state is
    /// written.
    #[error("Failed to submit transaction request to the gateway")]
    TransportFailed,

    /// The gateway reply contained a line without a `=` separator.
    #[error("Failed to parse gateway response")]
    ResponseParsingFailed,

    /// A field the protocol mandates on a successful reply was absent.
    #[error("Gateway response is missing expected field: {field_name}")]
    MissingResponseField { field_name: &'static str },

    /// The gateway refused to register the transaction.
    #[error("Gateway declined transaction registration with status {status}: {detail}")]
    InitiationDeclined { status: String, detail: String },

    #[error("Failed to decode notification body")]
    NotificationParsingFailed,
}

/// Cryptographic digest errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Failed to generate digest")]
    DigestFailed,
}
