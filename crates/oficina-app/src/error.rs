// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

use thiserror::Error;

use crate::{EditError, FlowError};

pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Não foi possível analisar a imagem. Tente novamente com uma foto mais clara.";
pub const ORDER_SAVE_FAILED_MESSAGE: &str = "Erro ao salvar o pedido. Tente novamente.";
pub const ESTIMATE_SAVE_FAILED_MESSAGE: &str = "Erro ao salvar orçamento.";
pub const ORDER_LOAD_FAILED_MESSAGE: &str = "Pedido não encontrado ou indisponível.";
pub const ORDER_DELETE_FAILED_MESSAGE: &str = "Erro ao excluir o pedido.";
pub const PRICING_LOAD_FAILED_MESSAGE: &str =
    "Não foi possível carregar a tabela de preços da oficina. Tente novamente.";

/// What the store was asked to do when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    SaveOrder,
    SaveEstimate,
    LoadOrder,
    LoadPricing,
    DeleteOrder,
}

impl StoreAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SaveOrder => "save order",
            Self::SaveEstimate => "save estimate",
            Self::LoadOrder => "load order",
            Self::LoadPricing => "load pricing",
            Self::DeleteOrder => "delete order",
        }
    }

    pub const fn user_message(self) -> &'static str {
        match self {
            Self::SaveOrder => ORDER_SAVE_FAILED_MESSAGE,
            Self::SaveEstimate => ESTIMATE_SAVE_FAILED_MESSAGE,
            Self::LoadOrder => ORDER_LOAD_FAILED_MESSAGE,
            Self::LoadPricing => PRICING_LOAD_FAILED_MESSAGE,
            Self::DeleteOrder => ORDER_DELETE_FAILED_MESSAGE,
        }
    }
}

impl fmt::Display for StoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("oracle request failed: {0:#}")]
    Oracle(anyhow::Error),
    #[error("{action} failed: {cause:#}")]
    Persistence {
        action: StoreAction,
        cause: anyhow::Error,
    },
}

impl QuoteError {
    pub fn persistence(action: StoreAction, cause: anyhow::Error) -> Self {
        Self::Persistence { action, cause }
    }

    /// Oracle and storage failures can be retried by the user as-is; the
    /// in-memory state that triggered them is still intact.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Oracle(_) | Self::Persistence { .. })
    }

    /// Message suitable for showing to the shop's customer or admin.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Edit(error) => error.to_string(),
            Self::Flow(error) => error.to_string(),
            Self::Oracle(_) => ANALYSIS_FAILED_MESSAGE.to_owned(),
            Self::Persistence { action, .. } => action.user_message().to_owned(),
        }
    }
}
