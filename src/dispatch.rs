//! Operation dispatch.
//!
//! A dispatch validates the canonical payload, formats the carrier request,
//! hands it to the carrier client and formats the response. Whatever happens,
//! the caller gets an [`Envelope`]: a failure at any stage short-circuits the
//! stages after it and lands in `errors`.

use serde_json::Value;
use std::time::Instant;

use crate::carrier::{Carrier, Operation};
use crate::carrier_client::CarrierClient;
use crate::errors::ShippingError;
use crate::formatters::{self, RequestContext};
use crate::models::Envelope;
use crate::validator::{SchemaId, Validator};

/// Lifecycle of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    FormattingRequest,
    AwaitingClient,
    FormattingResponse,
    Done,
    Failed,
}

impl DispatchState {
    /// Whether a dispatch in `self` may move to `next`.
    ///
    /// Stages only move forward. Any stage that has not finished may fail.
    pub fn can_advance_to(self, next: DispatchState) -> bool {
        use DispatchState::*;
        matches!(
            (self, next),
            (Pending, FormattingRequest)
                | (FormattingRequest, AwaitingClient)
                | (AwaitingClient, FormattingResponse)
                | (FormattingResponse, Done)
                | (Pending | FormattingRequest | AwaitingClient | FormattingResponse, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DispatchState::Done | DispatchState::Failed)
    }
}

/// Tracks the state of one dispatch and logs its transitions.
#[derive(Debug)]
struct DispatchCall<'a> {
    operation: Operation,
    carrier: &'a str,
    state: DispatchState,
    started: Instant,
}

impl<'a> DispatchCall<'a> {
    fn new(operation: Operation, carrier: &'a str) -> Self {
        Self {
            operation,
            carrier,
            state: DispatchState::Pending,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: DispatchState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                "Ignoring dispatch transition {:?} -> {:?} for {} {}",
                self.state,
                next,
                self.carrier,
                self.operation
            );
            return;
        }
        tracing::debug!(
            "{} {}: {:?} -> {:?}",
            self.carrier,
            self.operation,
            self.state,
            next
        );
        self.state = next;
        if next.is_terminal() {
            tracing::info!(
                "{} {} ended {:?} in {}ms",
                self.carrier,
                self.operation,
                next,
                self.started.elapsed().as_millis()
            );
        }
    }

    fn fail(&mut self, err: &ShippingError) {
        tracing::warn!(
            "{} {} failed during {:?}: {}",
            self.carrier,
            self.operation,
            self.state,
            err
        );
        self.advance(DispatchState::Failed);
    }

    fn finish(&mut self) {
        self.advance(DispatchState::Done);
    }
}

/// Runs operations against carriers through a [`CarrierClient`].
pub struct Dispatcher<C, V> {
    client: C,
    validator: V,
}

impl<C: CarrierClient, V: Validator> Dispatcher<C, V> {
    pub fn new(client: C, validator: V) -> Self {
        Self { client, validator }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Dispatches by operation name, as received from a caller.
    pub async fn dispatch_named(&self, operation: &str, carrier: &str, payload: &Value) -> Envelope {
        match operation.parse::<Operation>() {
            Ok(op) => self.dispatch(op, carrier, payload).await,
            Err(e) => {
                tracing::warn!("Rejected dispatch for {}: {}", carrier, e);
                Envelope::from_error(e)
            }
        }
    }

    pub async fn dispatch(&self, operation: Operation, carrier: &str, payload: &Value) -> Envelope {
        self.dispatch_with(operation, carrier, payload, &RequestContext::now())
            .await
    }

    /// Same as [`Dispatcher::dispatch`] with an explicit request context.
    pub async fn dispatch_with(
        &self,
        operation: Operation,
        carrier: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Envelope {
        let mut call = DispatchCall::new(operation, carrier);

        match self.run(&mut call, operation, carrier, payload, ctx).await {
            Ok(data) => {
                call.finish();
                Envelope::success(data)
            }
            Err(e) => {
                call.fail(&e);
                Envelope::from_error(e)
            }
        }
    }

    async fn run(
        &self,
        call: &mut DispatchCall<'_>,
        operation: Operation,
        carrier_name: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, ShippingError> {
        let carrier: Carrier = carrier_name.parse()?;
        if !formatters::supports(carrier, operation) {
            return Err(ShippingError::UnsupportedOperation { carrier, operation });
        }

        let errors = self
            .validator
            .validate(SchemaId::for_operation(carrier, operation), payload)?;
        if !errors.is_empty() {
            return Err(ShippingError::Validation(errors));
        }

        call.advance(DispatchState::FormattingRequest);
        let request = formatters::format_request(carrier, operation, payload, ctx)?;
        if formatters::is_empty_mapping(&request) {
            return Err(ShippingError::UnsupportedOperation { carrier, operation });
        }

        call.advance(DispatchState::AwaitingClient);
        let response = self.client.call(carrier, operation, &request).await?;

        call.advance(DispatchState::FormattingResponse);
        Ok(formatters::format_response(carrier, operation, &response))
    }
}
