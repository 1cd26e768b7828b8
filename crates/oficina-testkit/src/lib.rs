// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use oficina_app::{
    ClientData, CostItem, DamageOracle, MaterialCategory, MaterialPrice, NewOrder, RepairEstimate,
    VisualizationOracle, mask_cep, mask_cpf, mask_phone,
};
use std::path::PathBuf;

const FIRST_NAMES: [&str; 16] = [
    "Ana", "Bruno", "Carla", "Diego", "Elisa", "Fábio", "Gabriela", "Henrique", "Isabela",
    "João", "Karina", "Lucas", "Mariana", "Nelson", "Patrícia", "Rafael",
];
const LAST_NAMES: [&str; 14] = [
    "Silva", "Souza", "Oliveira", "Santos", "Pereira", "Costa", "Rodrigues", "Almeida",
    "Nascimento", "Lima", "Araújo", "Fernandes", "Carvalho", "Gomes",
];
const STREETS: [&str; 10] = [
    "Rua Goiás",
    "Av. Rondon Pacheco",
    "Rua Olegário Maciel",
    "Av. João Naves de Ávila",
    "Rua Tiradentes",
    "Rua Santos Dumont",
    "Av. Getúlio Vargas",
    "Rua Bernardo Guimarães",
    "Rua Duque de Caxias",
    "Av. Floriano Peixoto",
];
const NEIGHBORHOODS: [&str; 8] = [
    "Centro",
    "Santa Mônica",
    "Tibery",
    "Martins",
    "Fundinho",
    "Saraiva",
    "Jardim Patrícia",
    "Chácara Paraíso IV",
];
const CAR_MODELS: [&str; 12] = [
    "Fiat Uno",
    "VW Gol",
    "Chevrolet Onix",
    "Hyundai HB20",
    "Fiat Argo",
    "Renault Kwid",
    "Toyota Corolla",
    "Honda Civic",
    "VW Polo",
    "Jeep Renegade",
    "Fiat Strada",
    "Ford Ka",
];
const CAR_COLORS: [&str; 7] = [
    "Branco", "Prata", "Preto", "Vermelho", "Cinza", "Azul", "Bege",
];
const DAMAGED_PARTS: [(&str, i64, i64); 8] = [
    ("Parachoque dianteiro", 350, 900),
    ("Parachoque traseiro", 300, 850),
    ("Farol", 250, 1200),
    ("Retrovisor", 150, 600),
    ("Paralama", 280, 700),
    ("Capô", 600, 1800),
    ("Porta dianteira", 900, 2500),
    ("Lanterna traseira", 180, 650),
];
const DAMAGE_SUMMARIES: [&str; 6] = [
    "Amassado leve com risco na pintura",
    "Colisão frontal com trinca no parachoque",
    "Riscos profundos na lateral",
    "Pintura queimada pelo sol no capô",
    "Amassado na porta com perda de verniz",
    "Farol quebrado e parachoque deslocado",
];

/// A few bytes of JPEG header, base64-encoded. Enough for code that only
/// passes the image along.
pub const SAMPLE_IMAGE_BASE64: &str = "/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAP//////////////////////////////////////////////////////////////////////////////////////wgALCAABAAEBAREA/8QAFBABAAAAAAAAAAAAAAAAAAAAAP/aAAgBAQABPxA=";

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Generates plausible customers, estimates and orders from a seed.
#[derive(Debug, Clone)]
pub struct ShopFaker {
    rng: DeterministicRng,
}

impl ShopFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn client(&mut self) -> ClientData {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let email_user = format!("{first}.{last}")
            .to_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>();
        ClientData {
            full_name: format!("{first} {last}"),
            cpf: mask_cpf(&self.digits(11)),
            phone: mask_phone(&format!("349{}", self.digits(8))),
            email: format!("{email_user}@example.com"),
            zip_code: mask_cep(&format!("384{}", self.digits(5))),
            address: self.pick(&STREETS).to_owned(),
            number: self.int_range(1, 2500).to_string(),
            complement: None,
            neighborhood: self.pick(&NEIGHBORHOODS).to_owned(),
            city: "Uberlândia".to_owned(),
            state: "MG".to_owned(),
            car_model: self.pick(&CAR_MODELS).to_owned(),
            car_plate: self.plate(),
            car_year: self.int_range(2008, 2025).to_string(),
            car_color: self.pick(&CAR_COLORS).to_owned(),
        }
    }

    /// An estimate whose materials are drawn from `materials` at their listed
    /// price and whose labor cost is `hours * labor_rate`.
    pub fn estimate(&mut self, materials: &[MaterialPrice], labor_rate: f64) -> RepairEstimate {
        let part_count = self.rng.int_n(3);
        let parts = (0..part_count)
            .map(|_| {
                let (name, min, max) = DAMAGED_PARTS[self.rng.int_n(DAMAGED_PARTS.len())];
                CostItem::new(name, self.int_range(min, max) as f64)
            })
            .collect();

        let mut chosen = Vec::new();
        for category in MaterialCategory::ALL {
            let in_category: Vec<_> = materials
                .iter()
                .filter(|material| material.category == category)
                .collect();
            if in_category.is_empty() {
                continue;
            }
            let material = in_category[self.rng.int_n(in_category.len())];
            chosen.push(CostItem::new(material.name.clone(), material.price));
        }

        let hours = self.int_range(2, 16) as f64 / 2.0;
        RepairEstimate::new(
            self.pick(&DAMAGE_SUMMARIES),
            parts,
            chosen,
            hours,
            hours * labor_rate,
        )
    }

    pub fn new_order(&mut self, materials: &[MaterialPrice], labor_rate: f64) -> NewOrder {
        NewOrder {
            client: self.client(),
            estimate: self.estimate(materials, labor_rate),
            original_image: SAMPLE_IMAGE_BASE64.to_owned(),
            repaired_image: Some(SAMPLE_IMAGE_BASE64.to_owned()),
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }

    fn digits(&mut self, count: usize) -> String {
        (0..count)
            .map(|_| char::from(b'0' + self.rng.int_n(10) as u8))
            .collect()
    }

    // Mercosul plate: ABC1D23
    fn plate(&mut self) -> String {
        let letter = |rng: &mut DeterministicRng| char::from(b'A' + rng.int_n(26) as u8);
        let digit = |rng: &mut DeterministicRng| char::from(b'0' + rng.int_n(10) as u8);
        let rng = &mut self.rng;
        [
            letter(rng),
            letter(rng),
            letter(rng),
            digit(rng),
            letter(rng),
            digit(rng),
            digit(rng),
        ]
        .into_iter()
        .collect()
    }
}

/// Oracle double that answers from the faker, or fails on demand.
#[derive(Debug, Clone)]
pub struct ScriptedOracle {
    seed: u64,
    fail_estimate: bool,
    fail_visualization: bool,
}

impl ScriptedOracle {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            fail_estimate: false,
            fail_visualization: false,
        }
    }

    pub fn failing_estimate(mut self) -> Self {
        self.fail_estimate = true;
        self
    }

    pub fn failing_visualization(mut self) -> Self {
        self.fail_visualization = true;
        self
    }
}

impl DamageOracle for ScriptedOracle {
    fn estimate_damage(
        &self,
        image_base64: &str,
        materials: &[MaterialPrice],
        labor_rate: f64,
    ) -> Result<RepairEstimate> {
        if self.fail_estimate {
            bail!("scripted oracle: estimate unavailable");
        }
        let seed = self.seed ^ image_base64.len() as u64;
        Ok(ShopFaker::new(seed).estimate(materials, labor_rate))
    }
}

impl VisualizationOracle for ScriptedOracle {
    fn visualize_repair(&self, image_base64: &str) -> Result<String> {
        if self.fail_visualization {
            bail!("scripted oracle: no image generated");
        }
        Ok(image_base64.to_owned())
    }
}

pub fn sample_client() -> ClientData {
    ClientData {
        full_name: "João Silva".to_owned(),
        cpf: "123.456.789-09".to_owned(),
        phone: "(34) 99876-5432".to_owned(),
        email: "joao@example.com".to_owned(),
        zip_code: "38400-000".to_owned(),
        address: "Rua das Flores".to_owned(),
        number: "42".to_owned(),
        complement: None,
        neighborhood: "Centro".to_owned(),
        city: "Uberlândia".to_owned(),
        state: "MG".to_owned(),
        car_model: "Gol G5".to_owned(),
        car_plate: "ABC-1D23".to_owned(),
        car_year: "2012".to_owned(),
        car_color: "Branco".to_owned(),
    }
}

/// Parachoque 450, Tinta 120, Verniz 85, 4h of labor at 400: total 1055.
pub fn bumper_estimate() -> RepairEstimate {
    RepairEstimate::new(
        "Parachoque dianteiro amassado",
        vec![CostItem::new("Parachoque", 450.0)],
        vec![CostItem::new("Tinta", 120.0), CostItem::new("Verniz", 85.0)],
        4.0,
        400.0,
    )
}

pub fn sample_new_order() -> NewOrder {
    NewOrder {
        client: sample_client(),
        estimate: bumper_estimate(),
        original_image: SAMPLE_IMAGE_BASE64.to_owned(),
        repaired_image: None,
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("oficina.db");
    Ok((dir, db_path))
}
