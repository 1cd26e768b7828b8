// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use oficina_app::render::{
    RowKind, format_brl, mailto_link, message_text, print_document, share_text, summary_rows,
    whatsapp_link,
};
use oficina_app::{
    AdminSession, ClientData, DamageOracle, EstimateEdit, MaterialCategory, MaterialPrice,
    OrderId, OrderStatus, QuoteError, QuoteSession, RepairEstimate, ServiceCard, ServiceOrder,
    ShopProfile, VisualizationOracle, default_service_cards,
};
use oficina_db::Store;
use oficina_testkit::{ScriptedOracle, ShopFaker};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use time::macros::format_description;

const DEMO_ORDER_COUNT: usize = 6;
const CARD_IMAGE_MAX_BYTES: u64 = 2 * 1024 * 1024;

/// One change to the shop's material price table.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialChange {
    Add {
        name: String,
        unit: String,
        price: f64,
        category: MaterialCategory,
    },
    Set {
        id: String,
        field: MaterialField,
        value: String,
    },
    Remove(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialField {
    Name,
    Unit,
    Price,
    Category,
}

impl MaterialField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "name" => Some(Self::Name),
            "unit" => Some(Self::Unit),
            "price" => Some(Self::Price),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

/// One change to a landing-page service card.
#[derive(Debug, Clone, PartialEq)]
pub enum CardChange {
    Title { id: String, title: String },
    /// `source` is an http(s) URL or a local image file to embed.
    Image { id: String, source: String },
    Restore(String),
}

/// Where damage estimates and repair previews come from.
#[derive(Debug, Clone)]
pub enum OracleBackend {
    Remote(oficina_llm::Client),
    Scripted(ScriptedOracle),
    Disabled,
}

impl DamageOracle for OracleBackend {
    fn estimate_damage(
        &self,
        image_base64: &str,
        materials: &[MaterialPrice],
        labor_rate: f64,
    ) -> Result<RepairEstimate> {
        match self {
            Self::Remote(client) => client.estimate_damage(image_base64, materials, labor_rate),
            Self::Scripted(oracle) => oracle.estimate_damage(image_base64, materials, labor_rate),
            Self::Disabled => bail!(disabled_message()),
        }
    }
}

impl VisualizationOracle for OracleBackend {
    fn visualize_repair(&self, image_base64: &str) -> Result<String> {
        match self {
            Self::Remote(client) => client.visualize_repair(image_base64),
            Self::Scripted(oracle) => oracle.visualize_repair(image_base64),
            Self::Disabled => bail!(disabled_message()),
        }
    }
}

fn disabled_message() -> &'static str {
    "the damage oracle is disabled -- set [oracle] enabled = true in your config, or run with --demo"
}

pub struct Runtime<'a> {
    store: &'a Store,
    oracle: OracleBackend,
    shop: ShopProfile,
}

impl<'a> Runtime<'a> {
    pub fn new(store: &'a Store, oracle: OracleBackend, shop: ShopProfile) -> Self {
        Self {
            store,
            oracle,
            shop,
        }
    }

    /// Runs the whole customer flow: register, analyze the photo, submit.
    pub fn quote(
        &self,
        client_path: &Path,
        image_path: &Path,
        repaired_out: Option<&Path>,
    ) -> Result<String> {
        let raw = fs::read_to_string(client_path)
            .with_context(|| format!("read client file {}", client_path.display()))?;
        let client: ClientData = toml::from_str(&raw).with_context(|| {
            format!(
                "decode client file {} -- see `oficina --help` for the expected fields",
                client_path.display()
            )
        })?;
        let image = fs::read(image_path)
            .with_context(|| format!("read image {}", image_path.display()))?;

        let mut session = QuoteSession::new();
        session.start().map_err(quote_failure)?;
        session.register(client).map_err(quote_failure)?;
        let repaired_image = session
            .analyze(BASE64.encode(image), &self.oracle, &self.oracle, self.store)
            .map_err(quote_failure)?
            .repaired_image
            .clone();
        let order = session.finalize(self.store).map_err(quote_failure)?.clone();

        if let Some(out) = repaired_out {
            let bytes = BASE64
                .decode(repaired_image.as_bytes())
                .context("decode repaired image returned by the oracle")?;
            fs::write(out, bytes)
                .with_context(|| format!("write repaired image {}", out.display()))?;
        }

        let mut out = String::new();
        let _ = writeln!(out, "{}", order.estimate.summary());
        out.push('\n');
        out.push_str(&format_rows(&order.estimate));
        let _ = writeln!(
            out,
            "\nPedido #{} enviado ({}).",
            order.id,
            order.status.label()
        );
        let _ = writeln!(
            out,
            "\nPara compartilhar:\n{}",
            share_text(&self.shop, &order.estimate)
        );
        Ok(out)
    }

    pub fn orders(&self) -> Result<String> {
        let orders = self.store.list_orders()?;
        if orders.is_empty() {
            return Ok("Nenhum pedido encontrado.\n".to_owned());
        }
        let mut out = String::new();
        for order in &orders {
            let _ = writeln!(
                out,
                "#{:<4} {}  {:<9} {:<24} {} ({})  {}",
                order.id,
                format_date(order),
                order.status.label(),
                order.client.full_name,
                order.client.car_model,
                order.client.car_plate,
                format_brl(order.estimate.total_estimate())
            );
        }
        Ok(out)
    }

    pub fn show(&self, id: OrderId) -> Result<String> {
        let order = self.store.get_order(id)?;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Pedido #{} - {} - {}",
            order.id,
            order.status.label(),
            format_date(&order)
        );
        let _ = writeln!(
            out,
            "Cliente: {} | {} | {}",
            order.client.full_name, order.client.phone, order.client.email
        );
        let _ = writeln!(
            out,
            "Veículo: {} {} ({}) placa {}",
            order.client.car_model,
            order.client.car_year,
            order.client.car_color,
            order.client.car_plate
        );
        let _ = writeln!(out, "Diagnóstico: {}\n", order.estimate.summary());
        out.push_str(&format_rows(&order.estimate));
        Ok(out)
    }

    /// Applies edits in order and saves, which approves the order. Nothing is
    /// written if any edit is rejected.
    pub fn edit(&self, id: OrderId, edits: &[EstimateEdit]) -> Result<String> {
        let mut admin = AdminSession::open(self.store, id).map_err(quote_failure)?;
        for (position, edit) in edits.iter().enumerate() {
            admin
                .apply(edit)
                .map_err(quote_failure)
                .with_context(|| format!("edit #{} rejected; nothing was saved", position + 1))?;
        }
        let order = admin.save(self.store).map_err(quote_failure)?;

        let mut out = format_rows(&order.estimate);
        let _ = writeln!(
            out,
            "\nPedido #{} salvo ({}).",
            order.id,
            order.status.label()
        );
        Ok(out)
    }

    pub fn message(&self, id: OrderId) -> Result<String> {
        let order = self.store.get_order(id)?;
        Ok(format!("{}\n", self.message_for(&order)))
    }

    pub fn whatsapp(&self, id: OrderId) -> Result<String> {
        let order = self.store.get_order(id)?;
        let text = self.message_for(&order);
        Ok(format!(
            "{}\n",
            whatsapp_link(&self.shop, &order.client, &text)
        ))
    }

    pub fn email(&self, id: OrderId) -> Result<String> {
        let order = self.store.get_order(id)?;
        let text = self.message_for(&order);
        Ok(format!("{}\n", mailto_link(&self.shop, &order.client, &text)))
    }

    pub fn print(&self, id: OrderId, out: &Path) -> Result<String> {
        let order = self.store.get_order(id)?;
        fs::write(out, print_document(&self.shop, &order))
            .with_context(|| format!("write printable quote {}", out.display()))?;
        Ok(format!(
            "Orçamento #{} salvo em {}\n",
            order.id,
            out.display()
        ))
    }

    pub fn delete(&self, id: OrderId) -> Result<String> {
        let admin = AdminSession::open(self.store, id).map_err(quote_failure)?;
        let id = admin.delete(self.store).map_err(quote_failure)?;
        Ok(format!("Pedido #{id} excluído.\n"))
    }

    /// Lists the price table after applying `change`, if any. The whole
    /// table is validated again before it is saved.
    pub fn materials(&self, change: Option<&MaterialChange>) -> Result<String> {
        if let Some(change) = change {
            let mut materials = self.store.materials()?;
            apply_material_change(&mut materials, change)?;
            self.store.save_materials(&materials)?;
        }
        let mut out = String::new();
        for material in self.store.materials()? {
            let _ = writeln!(
                out,
                "{:>3}  {:<32} {:<12} {:<12} {}",
                material.id,
                material.name,
                material.unit,
                material.category.label(),
                format_brl(material.price)
            );
        }
        Ok(out)
    }

    pub fn labor_rate(&self, update: Option<f64>) -> Result<String> {
        if let Some(rate) = update {
            self.store.save_labor_rate(rate)?;
        }
        Ok(format!(
            "Valor da hora técnica: {}\n",
            format_brl(self.store.labor_rate()?)
        ))
    }

    pub fn video_url(&self, update: Option<&str>) -> Result<String> {
        if let Some(url) = update {
            self.store.save_video_url(url)?;
        }
        Ok(format!("{}\n", self.store.video_url()?))
    }

    pub fn cards(&self, change: Option<&CardChange>) -> Result<String> {
        if let Some(change) = change {
            let mut cards = self.store.service_cards()?;
            apply_card_change(&mut cards, change)?;
            self.store.save_service_cards(&cards)?;
        }
        let mut out = String::new();
        for card in self.store.service_cards()? {
            let image = if card.image_url.starts_with("data:") {
                format!("(imagem enviada, {} caracteres)", card.image_url.len())
            } else {
                card.image_url.clone()
            };
            let _ = writeln!(out, "{:>12}  {:<28} {}", card.id, card.title, image);
        }
        Ok(out)
    }

    fn message_for(&self, order: &ServiceOrder) -> String {
        message_text(&self.shop, &order.client, &order.estimate)
    }
}

/// Fills an empty store with fake orders for `--demo`.
pub fn seed_demo_orders(store: &Store, seed: u64) -> Result<()> {
    let materials = store.materials()?;
    let labor_rate = store.labor_rate()?;
    let mut faker = ShopFaker::new(seed);
    for position in 0..DEMO_ORDER_COUNT {
        let mut order = store.create_order(&faker.new_order(&materials, labor_rate))?;
        if position % 2 == 1 {
            order.status = OrderStatus::Approved;
            store.update_order(&order)?;
        }
    }
    tracing::info!(orders = DEMO_ORDER_COUNT, "seeded demo data");
    Ok(())
}

fn quote_failure(error: QuoteError) -> anyhow::Error {
    let message = error.user_message();
    match error {
        QuoteError::Oracle(cause) | QuoteError::Persistence { cause, .. } => cause.context(message),
        other => anyhow::Error::new(other),
    }
}

fn apply_material_change(
    materials: &mut Vec<MaterialPrice>,
    change: &MaterialChange,
) -> Result<()> {
    match change {
        MaterialChange::Add {
            name,
            unit,
            price,
            category,
        } => {
            let id = next_material_id(materials);
            tracing::info!(material = %id, name = %name, "material added");
            materials.push(MaterialPrice {
                id,
                name: name.clone(),
                unit: unit.clone(),
                price: *price,
                category: *category,
            });
        }
        MaterialChange::Set { id, field, value } => {
            let material = materials
                .iter_mut()
                .find(|material| &material.id == id)
                .ok_or_else(|| unknown_material(id))?;
            match field {
                MaterialField::Name => material.name = value.clone(),
                MaterialField::Unit => material.unit = value.clone(),
                MaterialField::Price => material.price = parse_amount(value)?,
                MaterialField::Category => {
                    material.category = parse_category(value)?;
                }
            }
        }
        MaterialChange::Remove(id) => {
            let position = materials
                .iter()
                .position(|material| &material.id == id)
                .ok_or_else(|| unknown_material(id))?;
            let removed = materials.remove(position);
            tracing::info!(material = %removed.id, name = %removed.name, "material removed");
        }
    }
    Ok(())
}

/// Next free numeric id; ids that aren't numbers are skipped.
fn next_material_id(materials: &[MaterialPrice]) -> String {
    let highest = materials
        .iter()
        .filter_map(|material| material.id.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (highest + 1).to_string()
}

fn unknown_material(id: &str) -> anyhow::Error {
    anyhow!("no material with id {id:?} -- run `oficina materials` to list ids")
}

pub(crate) fn parse_category(raw: &str) -> Result<MaterialCategory> {
    MaterialCategory::parse(raw).ok_or_else(|| {
        anyhow!("unknown category {raw:?}; use preparation, paint, or consumables")
    })
}

pub(crate) fn parse_amount(raw: &str) -> Result<f64> {
    raw.trim()
        .replace(',', ".")
        .parse()
        .with_context(|| format!("invalid amount {raw:?}; use a number such as 120 or 120,50"))
}

fn apply_card_change(cards: &mut [ServiceCard], change: &CardChange) -> Result<()> {
    let id = match change {
        CardChange::Title { id, .. } | CardChange::Image { id, .. } | CardChange::Restore(id) => id,
    };
    let card = cards
        .iter_mut()
        .find(|card| &card.id == id)
        .ok_or_else(|| {
            anyhow!("no service card {id:?} -- run `oficina cards` to list ids")
        })?;
    match change {
        CardChange::Title { title, .. } => card.title = title.clone(),
        CardChange::Image { source, .. } => card.image_url = card_image(source)?,
        CardChange::Restore(_) => {
            card.image_url = default_service_cards()
                .into_iter()
                .find(|default| &default.id == id)
                .map(|default| default.image_url)
                .with_context(|| format!("service card {id:?} has no built-in image to restore"))?;
        }
    }
    tracing::info!(card = %id, "service card updated");
    Ok(())
}

/// Web URLs are stored as given; a local file is embedded as a data URL.
fn card_image(source: &str) -> Result<String> {
    if source.starts_with("https://") || source.starts_with("http://") {
        return Ok(source.to_owned());
    }
    let path = Path::new(source);
    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => bail!(
            "card image {source:?} must be a .jpg, .png, .webp or .gif file or an http(s) URL"
        ),
    };
    let size = fs::metadata(path)
        .with_context(|| format!("read card image {}", path.display()))?
        .len();
    if size > CARD_IMAGE_MAX_BYTES {
        bail!(
            "card image {} is {size} bytes -- pick an image smaller than 2MB",
            path.display()
        );
    }
    let bytes = fs::read(path).with_context(|| format!("read card image {}", path.display()))?;
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

fn format_rows(estimate: &RepairEstimate) -> String {
    let mut out = String::new();
    for row in summary_rows(estimate) {
        let tag = match (row.kind, row.index) {
            (RowKind::Part, Some(index)) => format!("parts {index}"),
            (RowKind::Material, Some(index)) => format!("materials {index}"),
            _ => String::new(),
        };
        let _ = writeln!(
            out,
            "{:<9} {:<13} {:<44} {:>14}",
            row.kind.label(),
            tag,
            row.description,
            format_brl(row.amount)
        );
    }
    out
}

fn format_date(order: &ServiceOrder) -> String {
    order
        .date
        .format(format_description!("[day]/[month]/[year]"))
        .unwrap_or_default()
}
