//! Registration orchestrator: encode, send, decode.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::EzdConfig;
use crate::error::EzdError;
use crate::ezd::decoder::decode_register_inflow;
use crate::ezd::encoder::{REGISTER_INFLOW_ACTION, encode_register_inflow};
use crate::ezd::transport::{HttpTransport, Transport};
use crate::models::email::EmailMessage;
use crate::models::form::RegistrationForm;
use crate::models::result::RegistrationResult;

/// Registers inflow documents in EZD.
///
/// Holds only immutable config and a transport, so one instance can serve
/// any number of concurrent registrations.
pub struct EzdService {
    config: EzdConfig,
    transport: Arc<dyn Transport>,
}

impl EzdService {
    /// Service posting to `config.endpoint` over HTTP.
    pub fn new(config: EzdConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.endpoint.clone()));
        Self { config, transport }
    }

    /// Service over an arbitrary transport.
    pub fn with_transport(config: EzdConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &EzdConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Register `email` as an inflow using the reviewed `form`.
    ///
    /// Single attempt, no retry. Every failure (missing config, transport,
    /// HTTP status, unreadable response) comes back as
    /// [`RegistrationResult::Failed`].
    pub async fn register_inflow(
        &self,
        email: &EmailMessage,
        form: &RegistrationForm,
    ) -> RegistrationResult {
        match self.try_register(email, form).await {
            Ok(result) => result,
            Err(e) => {
                match &e {
                    EzdError::NotConfigured { .. } => warn!("{e}"),
                    _ => error!(uid = %email.unique_id, "EZD registration failed: {e}"),
                }
                RegistrationResult::failure(e.to_string())
            }
        }
    }

    async fn try_register(
        &self,
        email: &EmailMessage,
        form: &RegistrationForm,
    ) -> Result<RegistrationResult, EzdError> {
        let missing = self.config.missing_items();
        if !missing.is_empty() {
            return Err(EzdError::NotConfigured { missing });
        }

        info!(uid = %email.unique_id, "Registering email '{}' in EZD", form.title);

        let payload = encode_register_inflow(form, &self.config)?;
        let response = self.transport.send(payload, REGISTER_INFLOW_ACTION).await?;

        if !response.status.is_success() {
            error!(
                status = %response.status,
                "EZD API error: {}",
                response.body
            );
        }

        let result = decode_register_inflow(&response.body, response.status);
        match &result {
            RegistrationResult::Registered(reg) => {
                info!(uid = %email.unique_id, "Email registered successfully. RPW: {}", reg.rpw_number);
            }
            RegistrationResult::Failed { message } => {
                warn!(uid = %email.unique_id, "EZD registration failed: {message}");
            }
        }
        Ok(result)
    }
}
