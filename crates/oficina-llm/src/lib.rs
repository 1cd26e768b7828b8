// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use oficina_app::{
    DamageOracle, MaterialPrice, RepairEstimate, VisualizationOracle, validate_oracle_estimate,
};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ESTIMATE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

const REPAIR_INSTRUCTION: &str = "Make this car look completely repaired, shiny, and new. \
Remove all dents, scratches, and rust. Keep the same color and lighting. Photorealistic result.";

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    estimate_model: String,
    image_model: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(
        base_url: &str,
        api_key: &str,
        estimate_model: &str,
        image_model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("oracle.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("oracle.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "oracle.base_url must use http or https, got {:?} -- fix the URL in your config",
                parsed.scheme()
            );
        }
        if api_key.trim().is_empty() {
            bail!("oracle API key is empty -- export it in the variable named by oracle.api_key_env");
        }
        if estimate_model.trim().is_empty() {
            bail!("oracle.estimate_model must not be empty");
        }
        if image_model.trim().is_empty() {
            bail!("oracle.image_model must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.to_owned(),
            estimate_model: estimate_model.to_owned(),
            image_model: image_model.to_owned(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn estimate_model(&self) -> &str {
        &self.estimate_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Asks the estimate model for a structured repair quote priced against
    /// the shop's own material list and hourly rate.
    pub fn estimate_damage(
        &self,
        image_base64: &str,
        materials: &[MaterialPrice],
        labor_rate: f64,
    ) -> Result<RepairEstimate> {
        let image = InlineData::from_input(image_base64)?;
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline(image),
                    Part::text(build_estimate_prompt(materials, labor_rate)),
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(estimate_response_schema()),
                response_modalities: None,
            }),
        };

        let response = self.generate(&self.estimate_model, &request)?;
        let text = response.text();
        if text.trim().is_empty() {
            bail!("no text response from estimate model {:?}", self.estimate_model);
        }

        let value: Value = serde_json::from_str(extract_json(&text))
            .context("decode estimate JSON from model response")?;
        let estimate = validate_oracle_estimate(&value).context("validate estimate response")?;
        tracing::debug!(
            model = %self.estimate_model,
            total = estimate.total_estimate(),
            "estimate received"
        );
        Ok(estimate)
    }

    /// Asks the image model for a photo of the vehicle after repair. Returns
    /// the generated image as base64.
    pub fn visualize_repair(&self, image_base64: &str) -> Result<String> {
        let image = InlineData::from_input(image_base64)?;
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part::inline(image), Part::text(REPAIR_INSTRUCTION.to_owned())],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_schema: None,
                response_modalities: Some(vec!["IMAGE"]),
            }),
        };

        let response = self.generate(&self.image_model, &request)?;
        response
            .first_image()
            .ok_or_else(|| anyhow!("no image generated by model {:?}", self.image_model))
    }

    fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        let response = self
            .http
            .post(format!("{}/models/{model}:generateContent", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        response.json().context("decode generateContent response")
    }
}

impl DamageOracle for Client {
    fn estimate_damage(
        &self,
        image_base64: &str,
        materials: &[MaterialPrice],
        labor_rate: f64,
    ) -> Result<RepairEstimate> {
        Client::estimate_damage(self, image_base64, materials, labor_rate)
    }
}

impl VisualizationOracle for Client {
    fn visualize_repair(&self, image_base64: &str) -> Result<String> {
        Client::visualize_repair(self, image_base64)
    }
}

/// Builds the Portuguese instructions sent alongside the photo.
pub fn build_estimate_prompt(materials: &[MaterialPrice], labor_rate: f64) -> String {
    let mut out = String::new();
    out.push_str("Você é um especialista em funilaria e pintura automotiva no Brasil.\n");
    out.push_str("Analise a imagem do carro danificado.\n");
    out.push_str("Identifique os danos visíveis.\n\n");
    out.push_str("USE A SEGUINTE TABELA DE PREÇOS BASE DA OFICINA PARA CALCULAR MATERIAIS:\n");
    for material in materials {
        let _ = writeln!(
            out,
            "- {} ({}): R$ {:.2}",
            material.name, material.unit, material.price
        );
    }
    out.push_str("\nSe precisar de materiais não listados, estime com preço de mercado.\n\n");
    out.push_str("PARA CÁLCULO DE MÃO DE OBRA:\n");
    let _ = writeln!(out, "Utilize o valor base de R$ {labor_rate:.2} por hora técnica.\n");
    out.push_str("Liste as peças que precisam de reparo ou troca.\n");
    out.push_str(
        "Liste os materiais necessários (quantidade aproximada baseada no dano x preço unitário da tabela).\n",
    );
    let _ = writeln!(
        out,
        "Estime as horas de trabalho e calcule o custo (horas * {labor_rate})."
    );
    out.push_str("Estime os custos em Reais (BRL).\n\n");
    out.push_str("Retorne APENAS JSON.\n");
    out
}

/// JSON schema the estimate model must answer with.
pub fn estimate_response_schema() -> Value {
    let line_items = |price_description: &str| {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "name": { "type": "STRING" },
                    "estimatedPrice": { "type": "NUMBER", "description": price_description },
                },
            },
        })
    };

    json!({
        "type": "OBJECT",
        "properties": {
            "summary": {
                "type": "STRING",
                "description": "Resumo técnico dos danos encontrados.",
            },
            "parts": line_items("Preço em BRL"),
            "materials": line_items("Preço calculado (Qtd x Valor Unitário) em BRL"),
            "laborHours": { "type": "NUMBER" },
            "laborCost": {
                "type": "NUMBER",
                "description": "Custo total de mão de obra em BRL (Horas x Taxa)",
            },
            "totalEstimate": {
                "type": "NUMBER",
                "description": "Soma total de peças, materiais e mão de obra",
            },
        },
        "required": ["summary", "parts", "materials", "laborHours", "laborCost", "totalEstimate"],
    })
}

/// Strips a markdown code fence around a JSON answer, if present.
pub fn extract_json(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Splits a `data:<mime>;base64,<payload>` URL into its parts. Plain base64
/// input is treated as JPEG.
pub fn split_data_url(input: &str) -> (&str, &str) {
    let input = input.trim();
    if let Some(rest) = input.strip_prefix("data:")
        && let Some((header, payload)) = rest.split_once(',')
    {
        let mime = header.trim_end_matches(";base64");
        let mime = if mime.is_empty() { DEFAULT_IMAGE_MIME } else { mime };
        return (mime, payload);
    }
    (DEFAULT_IMAGE_MIME, input)
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check oracle.base_url and your network connection ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return anyhow!(
                "server error ({}): {} -- check the API key",
                status.as_u16(),
                error.message
            );
        }
        return anyhow!("server error ({}): {}", status.as_u16(), error.message);
    }

    if body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn inline(data: InlineData) -> Self {
        Self {
            text: None,
            inline_data: Some(data),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl InlineData {
    fn from_input(input: &str) -> Result<Self> {
        let (mime_type, data) = split_data_url(input);
        if data.is_empty() {
            bail!("image is empty -- choose a photo and retry");
        }
        BASE64
            .decode(data)
            .context("image is not valid base64 -- re-encode the photo and retry")?;
        Ok(Self {
            mime_type: mime_type.to_owned(),
            data: data.to_owned(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
    }

    fn text(&self) -> String {
        self.parts()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    fn first_image(&self) -> Option<String> {
        self.parts()
            .filter_map(|part| part.inline_data.as_ref())
            .map(|inline| inline.data.clone())
            .find(|data| !data.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}
