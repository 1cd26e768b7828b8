// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::{Cell, RefCell};

use anyhow::{Result, anyhow, bail};
use oficina_app::{
    ANALYSIS_FAILED_MESSAGE, AdminSession, ClientData, CostItem, DamageOracle,
    ESTIMATE_SAVE_FAILED_MESSAGE, EstimateEdit, FlowState, LineField, LineSection, MaterialPrice,
    NewOrder, ORDER_LOAD_FAILED_MESSAGE, ORDER_SAVE_FAILED_MESSAGE, OrderId, OrderStatus,
    OrderStore, QuoteError, QuoteSession, RepairEstimate, ServiceCard, ServiceOrder,
    SettingsStore, StoreAction, VisualizationOracle, default_materials, default_service_cards,
};
use time::macros::datetime;

struct FixedOracle {
    fail: bool,
}

impl DamageOracle for FixedOracle {
    fn estimate_damage(
        &self,
        _image_base64: &str,
        materials: &[MaterialPrice],
        labor_rate: f64,
    ) -> Result<RepairEstimate> {
        if self.fail {
            bail!("oracle unavailable");
        }
        let paint = materials
            .iter()
            .find(|material| material.name.starts_with("Tinta"))
            .ok_or_else(|| anyhow!("no paint in price list"))?;
        Ok(RepairEstimate::new(
            "Parachoque amassado",
            vec![CostItem::new("Parachoque", 450.0)],
            vec![CostItem::new(paint.name.clone(), paint.price)],
            4.0,
            4.0 * labor_rate,
        ))
    }
}

impl VisualizationOracle for FixedOracle {
    fn visualize_repair(&self, image_base64: &str) -> Result<String> {
        Ok(format!("repaired:{image_base64}"))
    }
}

struct NoImage;

impl VisualizationOracle for NoImage {
    fn visualize_repair(&self, _image_base64: &str) -> Result<String> {
        bail!("no image generated")
    }
}

struct MemorySettings {
    labor_rate: Cell<f64>,
    unreadable: bool,
}

impl SettingsStore for MemorySettings {
    fn materials(&self) -> Result<Vec<MaterialPrice>> {
        if self.unreadable {
            bail!("settings table is unreadable");
        }
        Ok(default_materials())
    }

    fn save_materials(&self, _materials: &[MaterialPrice]) -> Result<()> {
        Ok(())
    }

    fn labor_rate(&self) -> Result<f64> {
        Ok(self.labor_rate.get())
    }

    fn save_labor_rate(&self, rate: f64) -> Result<()> {
        self.labor_rate.set(rate);
        Ok(())
    }

    fn service_cards(&self) -> Result<Vec<ServiceCard>> {
        Ok(default_service_cards())
    }

    fn save_service_cards(&self, _cards: &[ServiceCard]) -> Result<()> {
        Ok(())
    }

    fn video_url(&self) -> Result<String> {
        Ok(String::new())
    }

    fn save_video_url(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryOrders {
    orders: RefCell<Vec<ServiceOrder>>,
    fail_writes: Cell<bool>,
}

impl OrderStore for MemoryOrders {
    fn create_order(&self, order: NewOrder) -> Result<ServiceOrder> {
        if self.fail_writes.get() {
            bail!("database is locked");
        }
        let mut orders = self.orders.borrow_mut();
        let created = ServiceOrder {
            id: OrderId::new(orders.len() as i64 + 1),
            date: datetime!(2026-02-01 10:00 UTC),
            status: OrderStatus::Pending,
            client: order.client,
            estimate: order.estimate,
            original_image: order.original_image,
            repaired_image: order.repaired_image,
        };
        orders.push(created.clone());
        Ok(created)
    }

    fn list_orders(&self) -> Result<Vec<ServiceOrder>> {
        Ok(self.orders.borrow().iter().rev().cloned().collect())
    }

    fn get_order(&self, id: OrderId) -> Result<ServiceOrder> {
        self.orders
            .borrow()
            .iter()
            .find(|order| order.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("order {id} not found"))
    }

    fn update_order(&self, order: &ServiceOrder) -> Result<()> {
        if self.fail_writes.get() {
            bail!("database is locked");
        }
        let mut orders = self.orders.borrow_mut();
        let slot = orders
            .iter_mut()
            .find(|existing| existing.id == order.id)
            .ok_or_else(|| anyhow!("order {} not found", order.id))?;
        *slot = order.clone();
        Ok(())
    }

    fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut orders = self.orders.borrow_mut();
        let before = orders.len();
        orders.retain(|order| order.id != id);
        if orders.len() == before {
            bail!("order {id} not found");
        }
        Ok(())
    }
}

fn client() -> ClientData {
    ClientData {
        full_name: "Ana Pereira".to_owned(),
        cpf: "987.654.321-00".to_owned(),
        phone: "(34) 99111-2222".to_owned(),
        email: "ana@example.com".to_owned(),
        zip_code: "38400-100".to_owned(),
        address: "Rua Goiás".to_owned(),
        number: "15".to_owned(),
        complement: Some("Apto 3".to_owned()),
        neighborhood: "Centro".to_owned(),
        city: "Uberlândia".to_owned(),
        state: "MG".to_owned(),
        car_model: "Onix".to_owned(),
        car_plate: "QWE-9R87".to_owned(),
        car_year: "2020".to_owned(),
        car_color: "Vermelho".to_owned(),
    }
}

fn settings() -> MemorySettings {
    MemorySettings {
        labor_rate: Cell::new(100.0),
        unreadable: false,
    }
}

fn session_at_upload() -> QuoteSession {
    let mut session = QuoteSession::new();
    session.start().expect("start quote");
    session.register(client()).expect("register client");
    session
}

#[test]
fn customer_flow_creates_pending_order() {
    let oracle = FixedOracle { fail: false };
    let orders = MemoryOrders::default();
    let mut session = session_at_upload();
    assert_eq!(session.state(), FlowState::UploadPrompt);

    let analysis = session
        .analyze("aW1hZ2U=".to_owned(), &oracle, &oracle, &settings())
        .expect("analysis succeeds");
    assert_eq!(analysis.repaired_image, "repaired:aW1hZ2U=");
    assert_eq!(analysis.estimate.total_estimate(), 450.0 + 120.0 + 400.0);
    assert_eq!(session.state(), FlowState::Results);

    let order = session.finalize(&orders).expect("order saved");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.client.full_name, "Ana Pereira");
    assert_eq!(order.repaired_image.as_deref(), Some("repaired:aW1hZ2U="));
    assert_eq!(session.state(), FlowState::Success);

    session.reset().expect("reset");
    assert_eq!(session.state(), FlowState::Idle);
    assert!(session.client().is_none());
    assert!(session.submitted_order().is_none());
}

#[test]
fn analysis_uses_current_labor_rate() {
    let oracle = FixedOracle { fail: false };
    let settings = settings();
    settings.save_labor_rate(150.0).expect("save rate");
    let mut session = session_at_upload();

    let analysis = session
        .analyze("aW1n".to_owned(), &oracle, &oracle, &settings)
        .expect("analysis succeeds");
    assert_eq!(analysis.estimate.labor_cost(), 600.0);
}

#[test]
fn invalid_registration_stays_on_form() {
    let mut session = QuoteSession::new();
    session.start().expect("start quote");
    let mut incomplete = client();
    incomplete.car_model.clear();

    let error = session.register(incomplete).expect_err("model is required");
    assert!(matches!(error, QuoteError::Validation(_)));
    assert_eq!(session.state(), FlowState::Registering);
}

#[test]
fn oracle_failure_moves_to_error_with_friendly_message() {
    let oracle = FixedOracle { fail: true };
    let mut session = session_at_upload();

    let error = session
        .analyze("aW1n".to_owned(), &oracle, &oracle, &settings())
        .expect_err("oracle fails");
    assert!(error.is_retryable());
    assert_eq!(session.state(), FlowState::Error);
    assert_eq!(session.error_message(), Some(ANALYSIS_FAILED_MESSAGE));
    assert!(session.analysis().is_none());
}

#[test]
fn missing_visualization_fails_the_whole_analysis() {
    let oracle = FixedOracle { fail: false };
    let mut session = session_at_upload();

    let error = session
        .analyze("aW1n".to_owned(), &oracle, &NoImage, &settings())
        .expect_err("no image");
    assert!(matches!(error, QuoteError::Oracle(_)));
    assert_eq!(session.state(), FlowState::Error);
}

#[test]
fn failed_submit_keeps_results_for_retry() {
    let oracle = FixedOracle { fail: false };
    let orders = MemoryOrders::default();
    let mut session = session_at_upload();
    session
        .analyze("aW1n".to_owned(), &oracle, &oracle, &settings())
        .expect("analysis succeeds");

    orders.fail_writes.set(true);
    let error = session.finalize(&orders).expect_err("store is down");
    assert!(matches!(
        error,
        QuoteError::Persistence {
            action: StoreAction::SaveOrder,
            ..
        }
    ));
    assert_eq!(error.user_message(), ORDER_SAVE_FAILED_MESSAGE);
    assert_eq!(session.state(), FlowState::Results);
    assert!(session.analysis().is_some());

    orders.fail_writes.set(false);
    session.finalize(&orders).expect("retry succeeds");
    assert_eq!(session.state(), FlowState::Success);
}

#[test]
fn finalize_before_analysis_is_a_flow_error() {
    let orders = MemoryOrders::default();
    let mut session = session_at_upload();
    let error = session.finalize(&orders).expect_err("nothing to submit");
    assert!(matches!(error, QuoteError::Flow(_)));
    assert!(orders.list_orders().expect("list").is_empty());
}

#[test]
fn unreadable_price_list_fails_the_analysis_as_a_load_error() {
    let oracle = FixedOracle { fail: false };
    let settings = MemorySettings {
        unreadable: true,
        ..settings()
    };
    let mut session = session_at_upload();
    let error = session
        .analyze("aW1n".to_owned(), &oracle, &oracle, &settings)
        .expect_err("pricing unavailable");
    assert!(matches!(
        error,
        QuoteError::Persistence {
            action: StoreAction::LoadPricing,
            ..
        }
    ));
    assert_ne!(error.user_message(), ORDER_SAVE_FAILED_MESSAGE);
    assert_eq!(session.state(), FlowState::Error);
    assert_eq!(session.error_message(), Some(error.user_message().as_str()));
}

#[test]
fn customer_can_leave_before_uploading() {
    let mut session = session_at_upload();
    assert!(session.client().is_some());

    session.reset().expect("reset from upload prompt");
    assert_eq!(session.state(), FlowState::Idle);
    assert!(session.client().is_none());

    session.open_admin().expect("admin reachable after reset");
    assert_eq!(session.state(), FlowState::Admin);
}

#[test]
fn customer_can_reset_mid_registration() {
    let mut session = QuoteSession::new();
    session.start().expect("start quote");
    session.reset().expect("reset from registration");
    assert_eq!(session.state(), FlowState::Idle);
}

fn stored_order(orders: &MemoryOrders) -> OrderId {
    orders
        .create_order(NewOrder {
            client: client(),
            estimate: RepairEstimate::new(
                "Porta riscada",
                vec![CostItem::new("Maçaneta", 80.0)],
                vec![CostItem::new("Verniz", 85.0)],
                3.0,
                300.0,
            ),
            original_image: "b3JpZw==".to_owned(),
            repaired_image: None,
        })
        .expect("seed order")
        .id
}

#[test]
fn admin_save_approves_edited_estimate() {
    let orders = MemoryOrders::default();
    let id = stored_order(&orders);
    let mut admin = AdminSession::open(&orders, id).expect("open order");

    admin
        .apply(&EstimateEdit::Update {
            section: LineSection::Parts,
            index: 0,
            field: LineField::EstimatedPrice,
            value: "120".to_owned(),
        })
        .expect("edit price");
    admin
        .apply(&EstimateEdit::Add(LineSection::Materials))
        .expect("add material");
    assert!(admin.is_dirty());

    let saved = admin.save(&orders).expect("save");
    assert_eq!(saved.status, OrderStatus::Approved);
    assert_eq!(saved.estimate.total_estimate(), 120.0 + 85.0 + 300.0);

    let reloaded = orders.get_order(id).expect("reload");
    assert_eq!(reloaded.status, OrderStatus::Approved);
    assert_eq!(reloaded.estimate.materials().len(), 2);
    assert!(!admin.is_dirty());
}

#[test]
fn admin_save_failure_keeps_edits_and_status() {
    let orders = MemoryOrders::default();
    let id = stored_order(&orders);
    let mut admin = AdminSession::open(&orders, id).expect("open order");
    admin
        .apply(&EstimateEdit::LaborCost("450".to_owned()))
        .expect("edit labor");

    orders.fail_writes.set(true);
    let error = admin.save(&orders).expect_err("write fails");
    assert!(error.is_retryable());
    assert_eq!(error.user_message(), ESTIMATE_SAVE_FAILED_MESSAGE);
    assert_eq!(admin.order().status, OrderStatus::Pending);
    assert_eq!(admin.estimate().labor_cost(), 450.0);
    assert!(admin.is_dirty());
}

#[test]
fn admin_edit_out_of_range_is_rejected() {
    let orders = MemoryOrders::default();
    let id = stored_order(&orders);
    let mut admin = AdminSession::open(&orders, id).expect("open order");
    let before = admin.estimate().clone();

    let error = admin
        .apply(&EstimateEdit::Remove(LineSection::Parts, 4))
        .expect_err("index out of range");
    assert!(matches!(error, QuoteError::Edit(_)));
    assert_eq!(admin.estimate(), &before);
    assert!(!admin.is_dirty());
}

#[test]
fn completed_orders_are_not_reapproved() {
    let orders = MemoryOrders::default();
    let id = stored_order(&orders);
    let mut order = orders.get_order(id).expect("load");
    order.status = OrderStatus::Completed;
    orders.update_order(&order).expect("mark completed");

    let mut admin = AdminSession::open(&orders, id).expect("open order");
    assert!(matches!(
        admin.save(&orders),
        Err(QuoteError::Validation(_))
    ));
}

#[test]
fn opening_unknown_order_is_a_load_failure() {
    let orders = MemoryOrders::default();
    let error = AdminSession::open(&orders, OrderId::new(999)).expect_err("no such order");
    assert!(matches!(
        error,
        QuoteError::Persistence {
            action: StoreAction::LoadOrder,
            ..
        }
    ));
    assert_eq!(error.user_message(), ORDER_LOAD_FAILED_MESSAGE);
    assert_ne!(error.user_message(), ORDER_SAVE_FAILED_MESSAGE);
    assert!(error.to_string().contains("order 999 not found"));
}

#[test]
fn admin_delete_removes_order() {
    let orders = MemoryOrders::default();
    let id = stored_order(&orders);
    let admin = AdminSession::open(&orders, id).expect("open order");
    admin.delete(&orders).expect("delete");
    assert!(orders.get_order(id).is_err());
}
