// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Drivers for the customer quote flow and for admin order editing.
//!
//! Collaborators (oracles and stores) are passed in by reference on every
//! call; sessions own only their in-memory state.

use std::thread;

use anyhow::anyhow;

use crate::error::{ANALYSIS_FAILED_MESSAGE, PRICING_LOAD_FAILED_MESSAGE, StoreAction};
use crate::{
    ClientData, CustomerFlow, DamageOracle, EstimateEdit, FlowEffect, FlowError, FlowEvent,
    FlowState, NewOrder, OrderId, OrderStatus, OrderStore, QuoteError, RepairEstimate,
    ServiceOrder, SettingsStore, VisualizationOracle,
};

pub const IMAGE_READ_FAILED_MESSAGE: &str = "Erro ao processar arquivo de imagem.";

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub estimate: RepairEstimate,
    pub repaired_image: String,
}

#[derive(Debug, Default)]
pub struct QuoteSession {
    flow: CustomerFlow,
    client: Option<ClientData>,
    original_image: Option<String>,
    analysis: Option<Analysis>,
    error_message: Option<String>,
    submitted: Option<ServiceOrder>,
}

impl QuoteSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FlowState {
        self.flow.state()
    }

    pub fn client(&self) -> Option<&ClientData> {
        self.client.as_ref()
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn submitted_order(&self) -> Option<&ServiceOrder> {
        self.submitted.as_ref()
    }

    pub fn start(&mut self) -> Result<(), QuoteError> {
        self.dispatch(FlowEvent::StartQuote)
    }

    pub fn cancel_registration(&mut self) -> Result<(), QuoteError> {
        self.dispatch(FlowEvent::CancelRegistration)
    }

    /// Validates and stores the customer's details. An invalid form keeps the
    /// session in `Registering`.
    pub fn register(&mut self, client: ClientData) -> Result<(), QuoteError> {
        self.ensure(FlowEvent::RegistrationSubmitted)?;
        client
            .validate()
            .map_err(|error| QuoteError::Validation(format!("{error:#}")))?;
        self.dispatch(FlowEvent::RegistrationSubmitted)?;
        self.client = Some(client);
        Ok(())
    }

    /// Runs both oracles on the uploaded photo.
    ///
    /// Prices and the labor rate are read fresh from settings for every
    /// analysis. The two oracle calls run concurrently and both must succeed;
    /// any failure moves the session to `Error`.
    pub fn analyze<D, V, S>(
        &mut self,
        image_base64: String,
        damage: &D,
        visualizer: &V,
        settings: &S,
    ) -> Result<&Analysis, QuoteError>
    where
        D: DamageOracle + Sync,
        V: VisualizationOracle + Sync,
        S: SettingsStore,
    {
        self.dispatch(FlowEvent::ImageSelected)?;

        if image_base64.trim().is_empty() {
            return Err(self.fail_analysis(
                IMAGE_READ_FAILED_MESSAGE,
                QuoteError::Validation(IMAGE_READ_FAILED_MESSAGE.to_owned()),
            ));
        }

        let pricing = settings
            .materials()
            .and_then(|materials| Ok((materials, settings.labor_rate()?)));
        let (materials, labor_rate) = match pricing {
            Ok(pricing) => pricing,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "could not load shop pricing");
                return Err(self.fail_analysis(
                    PRICING_LOAD_FAILED_MESSAGE,
                    QuoteError::persistence(StoreAction::LoadPricing, error),
                ));
            }
        };

        let image = image_base64.as_str();
        let outcome = thread::scope(|scope| {
            let visual = scope.spawn(|| visualizer.visualize_repair(image));
            let estimate = scope.spawn(|| damage.estimate_damage(image, &materials, labor_rate));
            let estimate = estimate
                .join()
                .unwrap_or_else(|_| Err(anyhow!("damage estimate worker panicked")));
            let visual = visual
                .join()
                .unwrap_or_else(|_| Err(anyhow!("visualization worker panicked")));
            Ok::<_, anyhow::Error>((estimate?, visual?))
        });

        match outcome {
            Ok((estimate, repaired_image)) => {
                self.dispatch(FlowEvent::AnalysisSucceeded)?;
                self.original_image = Some(image_base64);
                tracing::info!(
                    total = estimate.total_estimate(),
                    parts = estimate.parts().len(),
                    materials = estimate.materials().len(),
                    "analysis complete"
                );
                Ok(&*self.analysis.insert(Analysis {
                    estimate,
                    repaired_image,
                }))
            }
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "damage analysis failed");
                Err(self.fail_analysis(ANALYSIS_FAILED_MESSAGE, QuoteError::Oracle(error)))
            }
        }
    }

    /// Persists the analyzed quote as a pending order. On failure the session
    /// stays in `Results` with everything intact so the customer can retry.
    pub fn finalize<S: OrderStore>(&mut self, store: &S) -> Result<&ServiceOrder, QuoteError> {
        self.ensure(FlowEvent::OrderSubmitted)?;
        let (Some(client), Some(analysis), Some(original_image)) =
            (&self.client, &self.analysis, &self.original_image)
        else {
            return Err(QuoteError::Validation(
                "no analyzed quote to submit -- upload a photo first".to_owned(),
            ));
        };
        let new_order = NewOrder {
            client: client.clone(),
            estimate: analysis.estimate.clone(),
            original_image: original_image.clone(),
            repaired_image: Some(analysis.repaired_image.clone()),
        };
        let order = store.create_order(new_order).map_err(|error| {
            tracing::error!(error = %format!("{error:#}"), "could not save order");
            QuoteError::persistence(StoreAction::SaveOrder, error)
        })?;
        self.dispatch(FlowEvent::OrderSubmitted)?;
        Ok(&*self.submitted.insert(order))
    }

    pub fn reset(&mut self) -> Result<(), QuoteError> {
        self.dispatch(FlowEvent::Reset)
    }

    pub fn open_admin(&mut self) -> Result<(), QuoteError> {
        self.dispatch(FlowEvent::OpenAdmin)
    }

    /// Leaves the admin area. Returns true when landing media should be
    /// reloaded.
    pub fn close_admin(&mut self) -> Result<bool, QuoteError> {
        let effects = self.flow.dispatch(FlowEvent::CloseAdmin)?;
        Ok(effects.contains(&FlowEffect::ReloadLandingMedia))
    }

    fn ensure(&self, event: FlowEvent) -> Result<(), FlowError> {
        if self.flow.can(event) {
            Ok(())
        } else {
            Err(FlowError {
                state: self.flow.state(),
                event,
            })
        }
    }

    fn dispatch(&mut self, event: FlowEvent) -> Result<(), QuoteError> {
        let effects = self.flow.dispatch(event)?;
        if effects.contains(&FlowEffect::ClearSession) {
            self.client = None;
            self.original_image = None;
            self.analysis = None;
            self.error_message = None;
            self.submitted = None;
        }
        Ok(())
    }

    fn fail_analysis(&mut self, message: &str, error: QuoteError) -> QuoteError {
        if let Err(flow_error) = self.dispatch(FlowEvent::AnalysisFailed) {
            return flow_error;
        }
        self.error_message = Some(message.to_owned());
        error
    }
}

/// One order opened for review in the admin area.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSession {
    order: ServiceOrder,
    dirty: bool,
}

impl AdminSession {
    pub fn new(order: ServiceOrder) -> Self {
        Self {
            order,
            dirty: false,
        }
    }

    pub fn open<S: OrderStore>(store: &S, id: OrderId) -> Result<Self, QuoteError> {
        store
            .get_order(id)
            .map(Self::new)
            .map_err(|error| QuoteError::persistence(StoreAction::LoadOrder, error))
    }

    pub fn order(&self) -> &ServiceOrder {
        &self.order
    }

    pub fn estimate(&self) -> &RepairEstimate {
        &self.order.estimate
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn apply(&mut self, edit: &EstimateEdit) -> Result<(), QuoteError> {
        self.order.estimate.apply(edit)?;
        self.dirty = true;
        Ok(())
    }

    /// Saves the edited estimate and marks the order approved.
    ///
    /// If the store rejects the write the session keeps the edits and the
    /// previous status, so saving again retries the same change.
    pub fn save<S: OrderStore>(&mut self, store: &S) -> Result<&ServiceOrder, QuoteError> {
        if self.order.status == OrderStatus::Completed {
            return Err(QuoteError::Validation(format!(
                "order {} is already completed -- completed orders cannot be re-approved",
                self.order.id
            )));
        }
        let mut approved = self.order.clone();
        approved.status = OrderStatus::Approved;
        store.update_order(&approved).map_err(|error| {
            tracing::error!(
                order = %approved.id,
                error = %format!("{error:#}"),
                "could not save estimate"
            );
            QuoteError::persistence(StoreAction::SaveEstimate, error)
        })?;
        tracing::info!(
            order = %approved.id,
            total = approved.estimate.total_estimate(),
            "estimate approved"
        );
        self.order = approved;
        self.dirty = false;
        Ok(&self.order)
    }

    pub fn delete<S: OrderStore>(self, store: &S) -> Result<OrderId, QuoteError> {
        let id = self.order.id;
        store
            .delete_order(id)
            .map_err(|error| QuoteError::persistence(StoreAction::DeleteOrder, error))?;
        tracing::info!(order = %id, "order deleted");
        Ok(id)
    }
}
