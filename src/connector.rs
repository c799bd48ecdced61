//! High-level provider client tying encoding, transport and callback
//! resolution together.

use error_stack::ResultExt;
use secrecy::Secret;

use crate::{
    callback::{self, CallbackNotification},
    consts,
    errors::{CustomResult, OpayoError},
    settings::OpayoSettings,
    transformers,
    transport::GatewayTransport,
    types::{
        CallbackResult, InboundRequestContext, InitiateResult, Order, ProviderUrls, ReferenceData,
        StoredProviderMetadata,
    },
};

/// Client for one merchant's Opayo Server integration.
pub struct OpayoServerClient {
    settings: OpayoSettings,
    transport: GatewayTransport,
}

impl OpayoServerClient {
    pub fn new(settings: OpayoSettings) -> CustomResult<Self, OpayoError> {
        Ok(Self {
            settings,
            transport: GatewayTransport::new()?,
        })
    }

    pub fn settings(&self) -> &OpayoSettings {
        &self.settings
    }

    /// Registers a transaction with the gateway and returns the hosted page
    /// URL together with the state the host must persist before the
    /// notification can be validated.
    pub async fn initiate_transaction(
        &self,
        order: &Order,
        reference_data: &dyn ReferenceData,
        notification_url: &str,
    ) -> CustomResult<InitiateResult, OpayoError> {
        let transaction_type = self.settings.transaction_type()?;
        let request =
            transformers::encode(order, &self.settings, reference_data, notification_url)?;

        let response = self
            .transport
            .send(&request, transaction_type, self.settings.test_mode)
            .await
            .attach_printable_lazy(|| format!("order {}", order.order_number))?;

        // "OK REPEATED" acknowledges a re-registration of the same
        // VendorTxCode and carries the same guaranteed fields as "OK".
        let status = response.status().unwrap_or_default();
        if status != consts::response::status_codes::OK
            && status != consts::response::status_codes::REPEATED
        {
            let detail = response
                .get(consts::response::STATUS_DETAIL)
                .unwrap_or_default();
            tracing::warn!(
                order_number = %order.order_number,
                %status,
                %detail,
                "gateway declined transaction registration"
            );
            return Err(OpayoError::InitiationDeclined {
                status: status.to_string(),
                detail: detail.to_string(),
            }
            .into());
        }

        let next_url = response.require(consts::response::NEXT_URL)?.to_string();
        let security_key = response.require(consts::response::SECURITY_KEY)?.to_string();
        let transaction_id = response
            .require(consts::response::TRANSACTION_ID)?
            .to_string();

        tracing::info!(
            order_number = %order.order_number,
            %transaction_id,
            "transaction registered with the gateway"
        );

        Ok(InitiateResult {
            next_url,
            metadata: StoredProviderMetadata {
                security_key: Secret::new(security_key),
                transaction_id,
            },
        })
    }

    /// Authenticates and resolves an inbound notification for `order`.
    pub fn handle_callback(
        &self,
        order: &Order,
        notification: &CallbackNotification,
        stored_metadata: Option<&StoredProviderMetadata>,
        request_context: &InboundRequestContext,
    ) -> CallbackResult {
        let urls = self.provider_urls(order);
        callback::resolve_callback(
            order,
            notification,
            stored_metadata,
            &self.settings,
            &urls,
            request_context,
        )
    }

    /// Merchant continue/cancel/error URLs with order placeholders expanded.
    pub fn provider_urls(&self, order: &Order) -> ProviderUrls {
        ProviderUrls {
            continue_url: order.fill_url_placeholders(&self.settings.continue_url),
            cancel_url: order.fill_url_placeholders(&self.settings.cancel_url),
            error_url: order.fill_url_placeholders(&self.settings.error_url),
        }
    }
}
