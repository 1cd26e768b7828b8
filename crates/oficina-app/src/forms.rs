// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashSet;

use anyhow::{Result, bail};

use crate::{ClientData, MaterialPrice, ServiceCard};

impl ClientData {
    pub fn validate(&self) -> Result<()> {
        let required = [
            (&self.full_name, "full name"),
            (&self.cpf, "CPF"),
            (&self.phone, "phone"),
            (&self.email, "email"),
            (&self.zip_code, "zip code"),
            (&self.address, "address"),
            (&self.number, "street number"),
            (&self.neighborhood, "neighborhood"),
            (&self.city, "city"),
            (&self.state, "state"),
            (&self.car_model, "car model"),
            (&self.car_plate, "car plate"),
            (&self.car_year, "car year"),
            (&self.car_color, "car color"),
        ];
        for (value, label) in required {
            if value.trim().is_empty() {
                bail!("client {label} is required -- fill it in and retry");
            }
        }
        if !self.email.contains('@') {
            bail!(
                "client email {:?} is not an address -- use the form name@domain and retry",
                self.email
            );
        }
        if digits_only(&self.phone).len() < 10 {
            bail!(
                "client phone {:?} needs area code and number -- e.g. (34) 99767-2375",
                self.phone
            );
        }
        Ok(())
    }
}

impl MaterialPrice {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("material id is required");
        }
        if self.name.trim().is_empty() {
            bail!("material name is required -- enter a name and retry");
        }
        if self.unit.trim().is_empty() {
            bail!(
                "unit for material {:?} is required -- e.g. Litro, Kit, Rolo",
                self.name
            );
        }
        if !self.price.is_finite() || self.price < 0.0 {
            bail!("price for material {:?} cannot be negative", self.name);
        }
        Ok(())
    }
}

pub fn validate_price_list(materials: &[MaterialPrice]) -> Result<()> {
    let mut seen = HashSet::new();
    for material in materials {
        material.validate()?;
        if !seen.insert(material.id.as_str()) {
            bail!(
                "material id {:?} appears twice -- give each material its own id",
                material.id
            );
        }
    }
    Ok(())
}

pub fn validate_labor_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        bail!("labor rate must be a non-negative amount per hour, got {rate}");
    }
    Ok(())
}

const CARD_IMAGE_PREFIXES: [&str; 3] = ["https://", "http://", "data:image/"];

pub fn validate_service_cards(cards: &[ServiceCard]) -> Result<()> {
    for card in cards {
        if card.title.trim().is_empty() {
            bail!("service card {:?} needs a title", card.id);
        }
        let url = card.image_url.as_str();
        if !CARD_IMAGE_PREFIXES
            .iter()
            .any(|prefix| url.starts_with(prefix))
        {
            bail!(
                "service card {:?} image must be an http(s) URL or an embedded image, got {:?}",
                card.id,
                url
            );
        }
    }
    Ok(())
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Formats up to 11 digits as `000.000.000-00`.
pub fn mask_cpf(value: &str) -> String {
    let digits: String = digits_only(value).chars().take(11).collect();
    let mut out = String::with_capacity(14);
    for (index, ch) in digits.chars().enumerate() {
        match index {
            3 | 6 => out.push('.'),
            9 => out.push('-'),
            _ => {}
        }
        out.push(ch);
    }
    out
}

/// Formats a Brazilian phone as `(00) 00000-0000` (or `(00) 0000-0000` for
/// landlines). Partial input is formatted as far as it goes.
pub fn mask_phone(value: &str) -> String {
    let digits: Vec<char> = digits_only(value).chars().take(11).collect();
    if digits.len() <= 2 {
        return digits.into_iter().collect();
    }
    let area: String = digits[..2].iter().collect();
    let rest = &digits[2..];
    let local: String = if rest.len() > 4 {
        let split = rest.len() - 4;
        let head: String = rest[..split].iter().collect();
        let tail: String = rest[split..].iter().collect();
        format!("{head}-{tail}")
    } else {
        rest.iter().collect()
    };
    format!("({area}) {local}")
}

/// Formats a CEP as `00000-000`.
pub fn mask_cep(value: &str) -> String {
    let digits: String = digits_only(value).chars().take(8).collect();
    if digits.len() > 5 {
        format!("{}-{}", &digits[..5], &digits[5..])
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::{
        digits_only, mask_cep, mask_cpf, mask_phone, validate_labor_rate, validate_price_list,
        validate_service_cards,
    };
    use crate::{
        ClientData, MaterialCategory, MaterialPrice, ServiceCard, default_materials,
        default_service_cards,
    };

    fn client() -> ClientData {
        ClientData {
            full_name: "Maria Souza".to_owned(),
            cpf: "123.456.789-09".to_owned(),
            phone: "(34) 99876-5432".to_owned(),
            email: "maria@example.com".to_owned(),
            zip_code: "38400-000".to_owned(),
            address: "Av. Rondon Pacheco".to_owned(),
            number: "100".to_owned(),
            complement: None,
            neighborhood: "Centro".to_owned(),
            city: "Uberlândia".to_owned(),
            state: "MG".to_owned(),
            car_model: "Fiat Uno".to_owned(),
            car_plate: "ABC-1234".to_owned(),
            car_year: "2015".to_owned(),
            car_color: "Prata".to_owned(),
        }
    }

    #[test]
    fn complete_client_is_valid() {
        assert!(client().validate().is_ok());
    }

    #[test]
    fn complement_is_optional_but_plate_is_not() {
        let mut data = client();
        data.complement = None;
        assert!(data.validate().is_ok());

        data.car_plate = "  ".to_owned();
        let error = data.validate().expect_err("plate required");
        assert!(error.to_string().contains("car plate"));
    }

    #[test]
    fn email_without_at_is_rejected() {
        let mut data = client();
        data.email = "maria.example.com".to_owned();
        assert!(data.validate().is_err());
    }

    #[test]
    fn masks_format_partial_and_full_input() {
        assert_eq!(mask_cpf("12345678909"), "123.456.789-09");
        assert_eq!(mask_cpf("1234"), "123.4");
        assert_eq!(mask_cpf("123456789091234"), "123.456.789-09");
        assert_eq!(mask_phone("34997672375"), "(34) 99767-2375");
        assert_eq!(mask_phone("3432101234"), "(34) 3210-1234");
        assert_eq!(mask_phone("349"), "(34) 9");
        assert_eq!(mask_cep("38400000"), "38400-000");
        assert_eq!(mask_cep("384"), "384");
        assert_eq!(digits_only("(34) 99767-2375"), "34997672375");
    }

    #[test]
    fn service_cards_take_web_or_embedded_images() {
        let mut cards = default_service_cards();
        assert!(validate_service_cards(&cards).is_ok());

        cards[0].image_url = "data:image/png;base64,iVBORw0KGgo=".to_owned();
        assert!(validate_service_cards(&cards).is_ok());

        cards[1] = ServiceCard {
            image_url: "/home/shop/pintura.jpg".to_owned(),
            ..cards[1].clone()
        };
        let error = validate_service_cards(&cards).expect_err("local path is not an image url");
        assert!(error.to_string().contains("pintura"));
    }

    #[test]
    fn price_list_rejects_duplicates_and_negative_prices() {
        assert!(validate_price_list(&default_materials()).is_ok());

        let mut materials = default_materials();
        materials[1].id = materials[0].id.clone();
        assert!(validate_price_list(&materials).is_err());

        let negative = MaterialPrice {
            id: "x".to_owned(),
            name: "Lixa".to_owned(),
            unit: "Folha".to_owned(),
            price: -1.0,
            category: MaterialCategory::Preparation,
        };
        assert!(validate_price_list(&[negative]).is_err());
    }

    #[test]
    fn labor_rate_must_be_non_negative() {
        assert!(validate_labor_rate(120.0).is_ok());
        assert!(validate_labor_rate(-5.0).is_err());
        assert!(validate_labor_rate(f64::NAN).is_err());
    }
}
