//! Client for the Opayo Server (formerly Sage Pay Server) card payment
//! gateway protocol: a legacy form-encoded exchange in which the shopper is
//! redirected to a gateway-hosted card page and the outcome arrives as a
//! signed server-to-server notification.
//!
//! The crate covers the full transaction lifecycle:
//!
//! - [`transformers`] encodes an order into the registration field set
//! - [`transport`] posts it to the right gateway endpoint and parses the
//!   line-delimited reply
//! - [`signature`] authenticates inbound notifications with the protocol's
//!   MD5 scheme
//! - [`callback`] resolves an authenticated notification into the payment
//!   record, order metadata and redirect reply the host must apply
//!
//! [`OpayoServerClient`] ties these together for one merchant configuration.

pub mod callback;
pub mod connector;
pub mod consts;
pub mod crypto;
pub mod enums;
pub mod errors;
pub mod settings;
pub mod signature;
pub mod transformers;
pub mod transport;
pub mod types;

pub use connector::OpayoServerClient;
