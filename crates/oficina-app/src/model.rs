// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::RepairEstimate;
use crate::ids::OrderId;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientData {
    pub full_name: String,
    pub cpf: String,
    pub phone: String,
    pub email: String,
    pub zip_code: String,
    pub address: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub car_model: String,
    pub car_plate: String,
    pub car_year: String,
    pub car_color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Completed,
}

impl OrderStatus {
    pub const ALL: [Self; 3] = [Self::Pending, Self::Approved, Self::Completed];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pendente",
            Self::Approved => "Aprovado",
            Self::Completed => "Concluído",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOrder {
    pub id: OrderId,
    pub date: OffsetDateTime,
    pub status: OrderStatus,
    pub client: ClientData,
    pub estimate: RepairEstimate,
    pub original_image: String,
    pub repaired_image: Option<String>,
}

/// Everything needed to record a quote request. Status and date are assigned
/// by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub client: ClientData,
    pub estimate: RepairEstimate,
    pub original_image: String,
    pub repaired_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialCategory {
    Consumables,
    Paint,
    Preparation,
}

impl MaterialCategory {
    pub const ALL: [Self; 3] = [Self::Preparation, Self::Paint, Self::Consumables];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consumables => "consumables",
            Self::Paint => "paint",
            Self::Preparation => "preparation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "consumables" => Some(Self::Consumables),
            "paint" => Some(Self::Paint),
            "preparation" => Some(Self::Preparation),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Consumables => "Consumíveis",
            Self::Paint => "Pintura",
            Self::Preparation => "Preparação",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPrice {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub price: f64,
    pub category: MaterialCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCard {
    pub id: String,
    pub title: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Materials,
    LaborRate,
    ServiceCards,
    VideoUrl,
}

impl SettingKey {
    pub const ALL: [Self; 4] = [
        Self::Materials,
        Self::LaborRate,
        Self::ServiceCards,
        Self::VideoUrl,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Materials => "materials",
            Self::LaborRate => "labor_rate",
            Self::ServiceCards => "service_cards",
            Self::VideoUrl => "video_url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "materials" => Some(Self::Materials),
            "labor_rate" => Some(Self::LaborRate),
            "service_cards" => Some(Self::ServiceCards),
            "video_url" => Some(Self::VideoUrl),
            _ => None,
        }
    }
}

/// Shop identity printed on every quote and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopProfile {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub phone: String,
    pub country_code: String,
}

impl Default for ShopProfile {
    fn default() -> Self {
        Self {
            name: "Auto Reparos José Eduardo".to_owned(),
            street: "Rua Eclipse, s/nº - Chácara Paraíso IV".to_owned(),
            city: "Uberlândia".to_owned(),
            state: "MG".to_owned(),
            phone: "(34) 99767-2375".to_owned(),
            country_code: "55".to_owned(),
        }
    }
}

impl ShopProfile {
    /// Street and city on one line, as used in chat messages.
    pub fn address_line(&self) -> String {
        format!("{} - {}", self.street, self.city)
    }
}

pub const DEFAULT_LABOR_RATE: f64 = 100.0;

pub const DEFAULT_VIDEO_URL: &str =
    "https://cdn.pixabay.com/video/2022/12/13/142826-781033569_large.mp4";

const DEFAULT_MATERIAL_ROWS: [(&str, &str, &str, f64, MaterialCategory); 14] = [
    ("1", "Massa Poliéster (K800)", "Lata 1Kg", 35.00, MaterialCategory::Preparation),
    ("2", "Massa Rápida", "Bisnaga", 25.00, MaterialCategory::Preparation),
    ("3", "Lixa d'água (Grs 80-2000)", "Folha", 3.50, MaterialCategory::Preparation),
    ("4", "Disco de Lixa Roto Orbital", "Unidade", 4.50, MaterialCategory::Preparation),
    ("5", "Fita Crepe Automotiva", "Rolo", 12.00, MaterialCategory::Preparation),
    ("6", "Papel de Mascaramento", "Rolo", 45.00, MaterialCategory::Preparation),
    ("7", "Primer PU 5.1", "Kit 900ml", 65.00, MaterialCategory::Paint),
    ("8", "Tinta Base Poliéster (Nacional)", "Litro", 120.00, MaterialCategory::Paint),
    ("9", "Tinta Base Poliéster (Perolizada)", "Litro", 160.00, MaterialCategory::Paint),
    ("10", "Verniz Alto Sólidos", "Kit", 85.00, MaterialCategory::Paint),
    ("11", "Massa de Polir", "Lata 1kg", 55.00, MaterialCategory::Paint),
    ("12", "Thinner de Limpeza", "Litro", 22.00, MaterialCategory::Consumables),
    ("13", "Desengraxante", "Litro", 28.00, MaterialCategory::Consumables),
    ("14", "Estopa/Pano Microfibra", "Pacote", 15.00, MaterialCategory::Consumables),
];

const DEFAULT_CARD_ROWS: [(&str, &str, &str); 3] = [
    (
        "funilaria",
        "FUNILARIA",
        "https://images.unsplash.com/photo-1625047509168-a7026f36de04?q=80&w=800&auto=format&fit=crop",
    ),
    (
        "pintura",
        "PINTURA",
        "https://plus.unsplash.com/premium_photo-1661963013277-2388b6190809?q=80&w=800&auto=format&fit=crop",
    ),
    (
        "polimento",
        "POLIMENTO",
        "https://images.unsplash.com/photo-1601362840469-51e4d8d58785?q=80&w=800&auto=format&fit=crop",
    ),
];

pub fn default_materials() -> Vec<MaterialPrice> {
    DEFAULT_MATERIAL_ROWS
        .iter()
        .map(|(id, name, unit, price, category)| MaterialPrice {
            id: (*id).to_owned(),
            name: (*name).to_owned(),
            unit: (*unit).to_owned(),
            price: *price,
            category: *category,
        })
        .collect()
}

pub fn default_service_cards() -> Vec<ServiceCard> {
    DEFAULT_CARD_ROWS
        .iter()
        .map(|(id, title, image_url)| ServiceCard {
            id: (*id).to_owned(),
            title: (*title).to_owned(),
            image_url: (*image_url).to_owned(),
        })
        .collect()
}
