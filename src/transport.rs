//! HTTP transport to the gateway and the line-delimited reply parser.

use std::collections::HashMap;

use error_stack::ResultExt;

use crate::{
    consts,
    enums::TransactionType,
    errors::{CustomResult, OpayoError},
    transformers::TransactionRequest,
};

/// Gateway endpoint for a transaction type. Registration types share one
/// endpoint; the management types each have their own.
pub fn endpoint_url(transaction_type: TransactionType, test_mode: bool) -> &'static str {
    match (transaction_type, test_mode) {
        (TransactionType::Authorise, false) => {
            "https://live.sagepay.com/gateway/service/authorise.vsp"
        }
        (TransactionType::Authorise, true) => {
            "https://test.sagepay.com/gateway/service/authorise.vsp"
        }
        (
            TransactionType::Payment | TransactionType::Deferred | TransactionType::Authenticate,
            false,
        ) => "https://live.sagepay.com/gateway/service/vspserver-register.vsp",
        (
            TransactionType::Payment | TransactionType::Deferred | TransactionType::Authenticate,
            true,
        ) => "https://test.sagepay.com/gateway/service/vspserver-register.vsp",
        (TransactionType::Cancel, false) => "https://live.sagepay.com/gateway/service/cancel.vsp",
        (TransactionType::Cancel, true) => "https://test.sagepay.com/gateway/service/cancel.vsp",
        (TransactionType::Refund, false) => "https://live.sagepay.com/gateway/service/refund.vsp",
        (TransactionType::Refund, true) => "https://test.sagepay.com/gateway/service/refund.vsp",
    }
}

/// Parsed gateway reply. Every `name=value` line is kept verbatim; typed
/// accessors pull out the fields the client interprets.
#[derive(Clone, Debug, Default)]
pub struct TransactionResponse {
    fields: HashMap<String, String>,
}

impl TransactionResponse {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field the protocol guarantees on a successful reply. Its absence is a
    /// gateway contract violation, not a caller error.
    pub fn require(&self, name: &'static str) -> CustomResult<&str, OpayoError> {
        self.get(name)
            .ok_or_else(|| OpayoError::MissingResponseField { field_name: name }.into())
    }

    pub fn status(&self) -> Option<&str> {
        self.get(consts::response::STATUS)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }
}

/// Splits a gateway reply body into its `name=value` fields.
///
/// Lines split at the first `=` only, so values may themselves contain `=`.
/// Empty lines are discarded; a non-empty line without `=` is malformed.
pub fn parse_response_fields(body: &str) -> CustomResult<TransactionResponse, OpayoError> {
    let mut fields = HashMap::new();
    for line in body.lines().filter(|line| !line.trim().is_empty()) {
        let (name, value) = line
            .split_once('=')
            .ok_or(OpayoError::ResponseParsingFailed)
            .attach_printable_lazy(|| format!("malformed reply line: {line}"))?;
        fields.insert(name.to_string(), value.to_string());
    }
    Ok(TransactionResponse { fields })
}

/// Blocking-free HTTP client for the gateway endpoints.
pub struct GatewayTransport {
    http_client: reqwest::Client,
}

impl GatewayTransport {
    pub fn new() -> CustomResult<Self, OpayoError> {
        // The gateway's replies are terminal documents; a redirect from it
        // would be a protocol violation and must surface as an error.
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(consts::GATEWAY_TIMEOUT)
            .build()
            .change_context(OpayoError::TransportFailed)?;
        Ok(Self { http_client })
    }

    /// Posts `request` to the endpoint for `transaction_type` and parses the
    /// reply fields.
    pub async fn send(
        &self,
        request: &TransactionRequest,
        transaction_type: TransactionType,
        test_mode: bool,
    ) -> CustomResult<TransactionResponse, OpayoError> {
        let url = endpoint_url(transaction_type, test_mode);
        let body = request.to_form_body()?;

        tracing::debug!(%url, %transaction_type, "posting transaction registration");

        let response = self
            .http_client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .change_context(OpayoError::TransportFailed)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "gateway returned a non-success status");
            return Err(OpayoError::TransportFailed)
                .attach_printable_lazy(|| format!("http status {status}"));
        }

        let reply = response
            .text()
            .await
            .change_context(OpayoError::ResponseParsingFailed)?;
        parse_response_fields(&reply)
    }
}
