// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Read-only projections of an estimate: chat text, printable HTML and
//! on-screen rows. Totals always come from `RepairEstimate::total_estimate`.

use std::fmt::Write as _;

use time::macros::format_description;

use crate::forms::digits_only;
use crate::{ClientData, CostItem, LineSection, RepairEstimate, ServiceOrder, ShopProfile};

const RULE: &str = "--------------------------------";

/// Formats an amount as Brazilian reais: `R$ 1.234,56`.
pub fn format_brl(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, ch) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{sign}R$ {grouped},{:02}", cents % 100)
}

pub fn format_hours(value: f64) -> String {
    if value.is_finite() {
        format!("{value}")
    } else {
        "0".to_owned()
    }
}

pub fn message_text(shop: &ShopProfile, client: &ClientData, estimate: &RepairEstimate) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "🛠️ *{}* 🛠️", shop.name.to_uppercase());
    let _ = writeln!(text, "📍 {}", shop.address_line());
    text.push('\n');
    let _ = writeln!(
        text,
        "Olá, *{}*! Segue o orçamento detalhado para o veículo *{}* ({}).",
        client.full_name, client.car_model, client.car_plate
    );
    text.push('\n');

    push_message_section(&mut text, "PEÇAS", estimate.parts());
    push_message_section(&mut text, "MATERIAIS", estimate.materials());

    let _ = writeln!(text, "*MÃO DE OBRA:* {}", format_brl(estimate.labor_cost()));
    let _ = writeln!(text, "{RULE}");
    let _ = writeln!(
        text,
        "*TOTAL GERAL: {}*",
        format_brl(estimate.total_estimate())
    );
    text.push('\n');
    let _ = writeln!(text, "📞 *AGENDAMENTO:* {}", shop.phone);
    text.push_str("Fico à disposição para agendarmos o serviço!");
    text
}

fn push_message_section(text: &mut String, title: &str, items: &[CostItem]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(text, "*{title}:*");
    for item in items {
        let _ = writeln!(text, "- {}: {}", item.name, format_brl(item.estimated_price));
    }
    text.push('\n');
}

/// Short summary the customer can forward right after the analysis.
pub fn share_text(shop: &ShopProfile, estimate: &RepairEstimate) -> String {
    [
        format!("🚗 *Orçamento - {}* 🚗", shop.name),
        String::new(),
        format!("🛠️ *Serviço:* {}", estimate.summary()),
        String::new(),
        format!("💰 *Peças:* {} itens", estimate.parts().len()),
        format!("🎨 *Materiais:* {} itens", estimate.materials().len()),
        format!(
            "👨‍🔧 *Mão de Obra:* ~{} horas",
            format_hours(estimate.labor_hours())
        ),
        String::new(),
        format!(
            "*TOTAL ESTIMADO: {}*",
            format_brl(estimate.total_estimate())
        ),
        String::new(),
        format!("📍 Endereço: {}", shop.address_line()),
        format!("📞 Contato: {}", shop.phone),
    ]
    .join("\n")
}

pub fn whatsapp_link(shop: &ShopProfile, client: &ClientData, text: &str) -> String {
    format!(
        "https://wa.me/{}{}?text={}",
        shop.country_code,
        digits_only(&client.phone),
        urlencoding::encode(text)
    )
}

pub fn mailto_link(shop: &ShopProfile, client: &ClientData, text: &str) -> String {
    let subject = format!("Orçamento - {} - {}", shop.name, client.car_model);
    format!(
        "mailto:{}?subject={}&body={}",
        client.email.trim(),
        urlencoding::encode(&subject),
        urlencoding::encode(text)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Part,
    Material,
    Labor,
    Total,
}

impl RowKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Part => "Peça",
            Self::Material => "Material",
            Self::Labor => "Serviço",
            Self::Total => "Total",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub kind: RowKind,
    /// Position inside its section; `None` for labor and total rows.
    pub index: Option<usize>,
    pub description: String,
    pub amount: f64,
}

/// Rows for on-screen display: parts, materials, labor, then the total.
pub fn summary_rows(estimate: &RepairEstimate) -> Vec<SummaryRow> {
    let mut rows = Vec::with_capacity(estimate.parts().len() + estimate.materials().len() + 2);
    for section in LineSection::ALL {
        let kind = match section {
            LineSection::Parts => RowKind::Part,
            LineSection::Materials => RowKind::Material,
        };
        rows.extend(
            estimate
                .items(section)
                .iter()
                .enumerate()
                .map(|(index, item)| SummaryRow {
                    kind,
                    index: Some(index),
                    description: item.name.clone(),
                    amount: item.estimated_price,
                }),
        );
    }
    rows.push(SummaryRow {
        kind: RowKind::Labor,
        index: None,
        description: labor_description(estimate),
        amount: estimate.labor_cost(),
    });
    rows.push(SummaryRow {
        kind: RowKind::Total,
        index: None,
        description: "Valor Total Estimado".to_owned(),
        amount: estimate.total_estimate(),
    });
    rows
}

fn labor_description(estimate: &RepairEstimate) -> String {
    format!(
        "Mão de Obra Especializada ({}h)",
        format_hours(estimate.labor_hours())
    )
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const PRINT_STYLE: &str = r#"
    body { font-family: 'Arial', sans-serif; color: #000; padding: 40px; max-width: 800px; margin: 0 auto; }
    .header { display: flex; align-items: center; justify-content: space-between; margin-bottom: 30px; border-bottom: 2px solid #dc2626; padding-bottom: 20px; }
    .logo-container { display: flex; flex-direction: column; align-items: flex-start; }
    .logo-text { font-family: 'Impact', sans-serif; font-size: 32px; color: #dc2626; line-height: 1; margin-bottom: 5px; }
    .logo-sub { font-size: 16px; font-weight: bold; color: #000; font-style: italic; }
    .logo-name { font-size: 18px; font-weight: bold; margin-top: 4px; }
    .company-info { text-align: right; font-size: 14px; color: #555; }
    .company-info strong { color: #000; font-size: 16px; }
    .section-title { background: #f3f4f6; padding: 10px; font-weight: bold; margin: 20px 0 10px 0; border-left: 4px solid #dc2626; }
    .grid { display: flex; gap: 40px; margin-bottom: 20px; }
    .col { flex: 1; }
    .field { margin-bottom: 8px; font-size: 14px; }
    .field strong { color: #444; width: 80px; display: inline-block; }
    table { border-collapse: collapse; width: 100%; margin-bottom: 20px; font-size: 14px; }
    th { text-align: left; border-bottom: 2px solid #ddd; padding: 8px; }
    td { border-bottom: 1px solid #eee; padding: 8px; }
    .text-right { text-align: right; }
    .total-section { text-align: right; margin-top: 30px; padding-top: 20px; border-top: 2px solid #000; }
    .total-label { font-size: 14px; text-transform: uppercase; color: #666; }
    .total-value { font-size: 32px; font-weight: bold; color: #dc2626; }
    .footer { margin-top: 50px; text-align: center; font-size: 12px; color: #666; border-top: 1px solid #ddd; padding-top: 20px; }
    .contact-highlight { font-size: 18px; font-weight: bold; color: #000; margin-bottom: 5px; }
"#;

/// Builds the standalone printable quote sheet for an order.
pub fn print_document(shop: &ShopProfile, order: &ServiceOrder) -> String {
    let client = &order.client;
    let estimate = &order.estimate;
    let date = order
        .date
        .format(format_description!("[day]/[month]/[year]"))
        .unwrap_or_default();
    let (logo_head, logo_tail) = split_logo(&shop.name);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(
        html,
        "<title>Orçamento - {}</title>",
        escape_html(&client.full_name)
    );
    let _ = writeln!(html, "<style>{PRINT_STYLE}</style>\n</head>\n<body>");

    let _ = writeln!(
        html,
        r#"<div class="header">
  <div class="logo-container">
    <div style="margin-bottom: 5px;"><span class="logo-text">{}</span> <span class="logo-sub">{}</span></div>
    <div class="logo-name">{}</div>
  </div>
  <div class="company-info">
    <strong>{}</strong><br>
    {}<br>
    {} - {}<br>
    {}
  </div>
</div>"#,
        escape_html(&logo_head),
        escape_html(&logo_tail),
        escape_html(&split_owner(&shop.name)),
        escape_html(&shop.name),
        escape_html(&shop.street),
        escape_html(&shop.city),
        escape_html(&shop.state),
        escape_html(&shop.phone),
    );
    html.push_str(
        "<h2 style=\"text-align: center; margin-bottom: 30px;\">ORÇAMENTO DE SERVIÇO</h2>\n",
    );

    html.push_str("<div class=\"grid\">\n<div class=\"col\">\n");
    html.push_str("<div class=\"section-title\">DADOS DO CLIENTE</div>\n");
    push_field(&mut html, "Nome", &client.full_name);
    push_field(&mut html, "CPF", &client.cpf);
    push_field(&mut html, "Telefone", &client.phone);
    push_field(&mut html, "Email", &client.email);
    push_field(
        &mut html,
        "Endereço",
        &format!("{}, {}", client.address, client.number),
    );
    html.push_str("</div>\n<div class=\"col\">\n");
    html.push_str("<div class=\"section-title\">DADOS DO VEÍCULO</div>\n");
    push_field(&mut html, "Modelo", &client.car_model);
    push_field(&mut html, "Placa", &client.car_plate);
    push_field(&mut html, "Cor", &client.car_color);
    push_field(&mut html, "Data", &date);
    html.push_str("</div>\n</div>\n");

    html.push_str("<div class=\"section-title\">DESCRIÇÃO DOS SERVIÇOS E PEÇAS</div>\n");
    html.push_str(
        "<table>\n<thead>\n<tr><th>Descrição</th><th>Tipo</th><th class=\"text-right\">Valor</th></tr>\n</thead>\n<tbody>\n",
    );
    for row in summary_rows(estimate) {
        match row.kind {
            RowKind::Part | RowKind::Material => {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td class=\"text-right\">{}</td></tr>",
                    escape_html(&row.description),
                    row.kind.label(),
                    format_brl(row.amount)
                );
            }
            RowKind::Labor => {
                let _ = writeln!(
                    html,
                    "<tr><td><strong>{}</strong></td><td>{}</td><td class=\"text-right\"><strong>{}</strong></td></tr>",
                    escape_html(&row.description),
                    row.kind.label(),
                    format_brl(row.amount)
                );
            }
            RowKind::Total => {}
        }
    }
    html.push_str("</tbody>\n</table>\n");

    let _ = writeln!(
        html,
        r#"<div class="total-section">
  <div class="total-label">Valor Total Estimado</div>
  <div class="total-value">{}</div>
</div>"#,
        format_brl(estimate.total_estimate())
    );
    let _ = writeln!(
        html,
        r#"<div class="footer">
  <div class="contact-highlight">📞 AGENDAMENTO: {}</div>
  <p>Orçamento válido por 15 dias. Valores sujeitos a alteração em caso de danos ocultos.</p>
  <p>Obrigado pela preferência!</p>
</div>"#,
        escape_html(&shop.phone)
    );
    html.push_str("<script>\n  window.onload = function() { window.print(); }\n</script>\n");
    html.push_str("</body>\n</html>\n");
    html
}

fn push_field(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<div class=\"field\"><strong>{label}:</strong> {}</div>",
        escape_html(value)
    );
}

// "Auto Reparos José Eduardo" -> ("AUTO", "REPAROS")
fn split_logo(name: &str) -> (String, String) {
    let mut words = name.split_whitespace();
    let head = words.next().unwrap_or_default().to_uppercase();
    let tail = words.next().unwrap_or_default().to_uppercase();
    (head, tail)
}

fn split_owner(name: &str) -> String {
    name.split_whitespace().skip(2).collect::<Vec<_>>().join(" ")
}
