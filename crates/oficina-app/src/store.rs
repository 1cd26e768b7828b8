// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::{MaterialPrice, NewOrder, OrderId, ServiceCard, ServiceOrder};

/// Persistence for service orders.
pub trait OrderStore {
    /// Records a new order as pending, stamped with the current time.
    fn create_order(&self, order: NewOrder) -> Result<ServiceOrder>;
    /// All orders, newest first.
    fn list_orders(&self) -> Result<Vec<ServiceOrder>>;
    fn get_order(&self, id: OrderId) -> Result<ServiceOrder>;
    /// Overwrites the stored order. The last write wins.
    fn update_order(&self, order: &ServiceOrder) -> Result<()>;
    fn delete_order(&self, id: OrderId) -> Result<()>;
}

/// Shop settings. Getters return the built-in default, writing it first, when
/// nothing is stored yet.
pub trait SettingsStore {
    fn materials(&self) -> Result<Vec<MaterialPrice>>;
    fn save_materials(&self, materials: &[MaterialPrice]) -> Result<()>;
    fn labor_rate(&self) -> Result<f64>;
    fn save_labor_rate(&self, rate: f64) -> Result<()>;
    fn service_cards(&self) -> Result<Vec<ServiceCard>>;
    fn save_service_cards(&self, cards: &[ServiceCard]) -> Result<()>;
    fn video_url(&self) -> Result<String>;
    fn save_video_url(&self, url: &str) -> Result<()>;
}
