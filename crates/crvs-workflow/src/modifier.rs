//! Registration lifecycle entry points.
//!
//! Each entry point takes ownership of the submitted document, runs its
//! steps in a fixed order and hands the document back only when every step
//! succeeded. Persisting the result is the caller's job.

use std::sync::Arc;

use crvs_auth::{TokenDecoder, TokenPayload};
use crvs_core::resource_id;
use serde_json::Value;
use tracing::instrument;

use crate::bundle::{
    event_type, is_event_notification, is_in_progress, select_or_create_task, task_mut,
    validate_bundle,
};
use crate::config::WorkflowConfig;
use crate::constants::SpecNamespace;
use crate::error::{WorkflowError, WorkflowResult};
use crate::gateway::{DynGateway, HttpGateway};
use crate::identifiers::{push_registration_number, set_tracking_id};
use crate::lifecycle::{StatusTransition, setup_registration_type, setup_registration_workflow};
use crate::provenance::{setup_author_on_notes, setup_last_reg_location, setup_last_reg_user};
use crate::status::RegistrationStatus;
use crate::tracking::{RandomTrackingIds, TrackingIdGenerator};

/// A document after a successful transition.
#[derive(Debug, Clone)]
pub struct ModifiedBundle {
    /// The submitted Bundle or Task, mutated.
    pub bundle: Value,
    pub transition: StatusTransition,
}

/// Applies registration lifecycle transitions to submitted documents.
#[derive(Clone)]
pub struct BundleModifier {
    gateway: DynGateway,
    tokens: Arc<TokenDecoder>,
    tracking_ids: Arc<dyn TrackingIdGenerator>,
    ns: SpecNamespace,
}

impl std::fmt::Debug for BundleModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleModifier")
            .field("tokens", &self.tokens)
            .field("ns", &self.ns)
            .finish_non_exhaustive()
    }
}

impl BundleModifier {
    pub fn new(gateway: DynGateway, tokens: TokenDecoder) -> Self {
        Self {
            gateway,
            tokens: Arc::new(tokens),
            tracking_ids: Arc::new(RandomTrackingIds),
            ns: SpecNamespace::default(),
        }
    }

    /// Wires the HTTP gateway and token decoder described by `config`.
    pub fn from_config(config: &WorkflowConfig) -> WorkflowResult<Self> {
        let gateway = HttpGateway::new(config.gateway_config())
            .map_err(|e| WorkflowError::configuration(e.to_string()))?;
        let tokens = config
            .auth
            .token_decoder()
            .map_err(WorkflowError::configuration)?;
        Ok(Self::new(Arc::new(gateway), tokens).with_namespace(config.namespace()))
    }

    #[must_use]
    pub fn with_tracking_ids(mut self, generator: impl TrackingIdGenerator + 'static) -> Self {
        self.tracking_ids = Arc::new(generator);
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, ns: SpecNamespace) -> Self {
        self.ns = ns;
        self
    }

    pub fn namespace(&self) -> &SpecNamespace {
        &self.ns
    }

    fn decode_token(&self, token: &str) -> WorkflowResult<TokenPayload> {
        self.tokens.decode(token).map_err(|e| {
            tracing::warn!(error = %e, "rejecting bearer token");
            WorkflowError::from(e)
        })
    }

    async fn practitioner(&self, payload: &TokenPayload, token: &str) -> WorkflowResult<Value> {
        self.gateway
            .practitioner_for_user(&payload.sub, token)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %payload.sub, error = %e, "failed to resolve practitioner");
                WorkflowError::from(e)
            })
    }

    /// Initial submission of a declaration or notification.
    ///
    /// Assigns a tracking id, stamps the event type, moves the Task to
    /// IN_PROGRESS or DECLARED, then records provenance and note authors.
    #[instrument(skip_all)]
    pub async fn modify_registration_bundle(
        &self,
        mut bundle: Value,
        token: &str,
    ) -> WorkflowResult<ModifiedBundle> {
        validate_bundle(&bundle).inspect_err(|e| tracing::error!(error = %e, "rejecting declaration"))?;
        let payload = self.decode_token(token)?;
        let event = event_type(&bundle)?;
        let target = if is_in_progress(&bundle, &self.ns) {
            RegistrationStatus::InProgress
        } else {
            RegistrationStatus::Declared
        };
        let notification = is_event_notification(&bundle);

        let tracking_id = set_tracking_id(&mut bundle, event, self.tracking_ids.as_ref(), &self.ns)?;
        let task = select_or_create_task(&mut bundle, event, &self.ns)?;
        setup_registration_type(task, event, &self.ns)?;
        let transition =
            setup_registration_workflow(task, &payload, Some(target), self.gateway.as_ref(), &self.ns)
                .await?;

        let practitioner = self.practitioner(&payload, token).await?;
        setup_last_reg_user(task, &practitioner, &self.ns)?;
        setup_last_reg_location(task, &practitioner, notification, self.gateway.as_ref(), &self.ns)
            .await?;
        setup_author_on_notes(task, &practitioner)?;

        tracing::info!(%tracking_id, %event, status = %transition.target, "declaration accepted");
        Ok(ModifiedBundle { bundle, transition })
    }

    /// Moves the record to VALIDATED.
    #[instrument(skip_all)]
    pub async fn mark_bundle_as_validated(
        &self,
        bundle: Value,
        token: &str,
    ) -> WorkflowResult<ModifiedBundle> {
        self.advance(bundle, token, RegistrationStatus::Validated).await
    }

    /// Issues a registration number and moves the record to REGISTERED.
    ///
    /// The number is requested before the duplicate check runs, so a
    /// rejected transition may still consume one.
    #[instrument(skip_all)]
    pub async fn mark_bundle_as_registered(
        &self,
        mut bundle: Value,
        token: &str,
    ) -> WorkflowResult<ModifiedBundle> {
        let payload = self.decode_token(token)?;
        let practitioner = self.practitioner(&payload, token).await?;
        let practitioner_id = resource_id(&practitioner)
            .ok_or_else(|| WorkflowError::invalid_practitioner("practitioner has no id"))?
            .to_owned();
        let event = event_type(&bundle)?;

        let registration_number = push_registration_number(
            task_mut(&mut bundle).ok(),
            event,
            &practitioner_id,
            token,
            self.gateway.as_ref(),
            &self.ns,
        )
        .await?;
        tracing::debug!(%registration_number, "registration number attached");

        self.finish_transition(bundle, &payload, &practitioner, RegistrationStatus::Registered)
            .await
    }

    /// Moves the record to CERTIFIED. No transition leaves CERTIFIED.
    #[instrument(skip_all)]
    pub async fn mark_bundle_as_certified(
        &self,
        bundle: Value,
        token: &str,
    ) -> WorkflowResult<ModifiedBundle> {
        self.advance(bundle, token, RegistrationStatus::Certified).await
    }

    async fn advance(
        &self,
        bundle: Value,
        token: &str,
        target: RegistrationStatus,
    ) -> WorkflowResult<ModifiedBundle> {
        let payload = self.decode_token(token)?;
        let practitioner = self.practitioner(&payload, token).await?;
        self.finish_transition(bundle, &payload, &practitioner, target)
            .await
    }

    async fn finish_transition(
        &self,
        mut bundle: Value,
        payload: &TokenPayload,
        practitioner: &Value,
        target: RegistrationStatus,
    ) -> WorkflowResult<ModifiedBundle> {
        let task = task_mut(&mut bundle)
            .inspect_err(|e| tracing::error!(error = %e, %target, "rejecting transition"))?;
        let transition =
            setup_registration_workflow(task, payload, Some(target), self.gateway.as_ref(), &self.ns)
                .await?;
        setup_last_reg_location(task, practitioner, false, self.gateway.as_ref(), &self.ns).await?;
        setup_last_reg_user(task, practitioner, &self.ns)?;

        tracing::info!(
            task_id = resource_id(task).unwrap_or("<new>"),
            status = %transition.target,
            "transition applied"
        );
        Ok(ModifiedBundle { bundle, transition })
    }
}
