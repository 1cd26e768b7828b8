// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use oficina_app::{
    ClientData, MaterialPrice, NewOrder, OrderId, OrderStatus, OrderStore, RepairEstimate,
    ServiceCard, ServiceOrder, SettingKey, SettingsStore, DEFAULT_LABOR_RATE, DEFAULT_VIDEO_URL,
    default_materials, default_service_cards, validate_labor_rate, validate_price_list,
    validate_service_cards,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub const APP_NAME: &str = "oficina";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "orders",
        &[
            "id",
            "date",
            "status",
            "client_json",
            "estimate_json",
            "original_image",
            "repaired_image",
            "image_sha256",
            "created_at",
            "updated_at",
        ],
    ),
    ("settings", &["key", "value", "updated_at"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_orders_date",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_orders_date ON orders (date DESC, id DESC);",
    },
    RequiredIndex {
        name: "idx_orders_status",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status);",
    },
];

const ORDER_COLUMNS: &str = "
  id, date, status, client_json, estimate_json,
  original_image, repaired_image
";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    pub fn create_order(&self, order: &NewOrder) -> Result<ServiceOrder> {
        let date = OffsetDateTime::now_utc();
        let date_raw = format_timestamp(date)?;
        let client_json = to_json(&order.client, "client")?;
        let estimate_json = to_json(&order.estimate, "estimate")?;
        self.conn
            .execute(
                "
                INSERT INTO orders (
                  date, status, client_json, estimate_json,
                  original_image, repaired_image, image_sha256,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    date_raw,
                    OrderStatus::Pending.as_str(),
                    client_json,
                    estimate_json,
                    order.original_image,
                    order.repaired_image,
                    image_sha256(&order.original_image),
                    date_raw,
                    date_raw,
                ],
            )
            .context("insert order")?;

        let id = OrderId::new(self.conn.last_insert_rowid());
        tracing::info!(
            order = %id,
            client = %order.client.full_name,
            total = order.estimate.total_estimate(),
            "order created"
        );
        Ok(ServiceOrder {
            id,
            date: parse_datetime(&date_raw)?,
            status: OrderStatus::Pending,
            client: order.client.clone(),
            estimate: order.estimate.clone(),
            original_image: order.original_image.clone(),
            repaired_image: order.repaired_image.clone(),
        })
    }

    /// All orders, newest first; ties on date fall back to the higher id.
    pub fn list_orders(&self) -> Result<Vec<ServiceOrder>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders ORDER BY date DESC, id DESC"
            ))
            .context("prepare orders query")?;
        let rows = stmt
            .query_map([], order_from_row)
            .context("query orders")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect orders")
    }

    pub fn get_order(&self, order_id: OrderId) -> Result<ServiceOrder> {
        self.conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"),
                params![order_id.get()],
                order_from_row,
            )
            .optional()
            .with_context(|| format!("load order {order_id}"))?
            .ok_or_else(|| {
                anyhow!("order {order_id} not found -- run `oficina orders` to list existing ids")
            })
    }

    /// Overwrites status, client, estimate and images. The creation date is
    /// kept. Concurrent writers are not detected; the last one wins.
    pub fn update_order(&self, order: &ServiceOrder) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE orders
                SET
                  status = ?,
                  client_json = ?,
                  estimate_json = ?,
                  original_image = ?,
                  repaired_image = ?,
                  image_sha256 = ?,
                  updated_at = ?
                WHERE id = ?
                ",
                params![
                    order.status.as_str(),
                    to_json(&order.client, "client")?,
                    to_json(&order.estimate, "estimate")?,
                    order.original_image,
                    order.repaired_image,
                    image_sha256(&order.original_image),
                    now,
                    order.id.get(),
                ],
            )
            .with_context(|| format!("update order {}", order.id))?;
        if rows_affected == 0 {
            bail!(
                "order {} not found -- it may have been deleted; reload the list and retry",
                order.id
            );
        }
        tracing::info!(
            order = %order.id,
            status = order.status.as_str(),
            total = order.estimate.total_estimate(),
            "order updated"
        );
        Ok(())
    }

    pub fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM orders WHERE id = ?", params![order_id.get()])
            .with_context(|| format!("delete order {order_id}"))?;
        if rows_affected == 0 {
            bail!("order {order_id} not found -- nothing was deleted");
        }
        tracing::info!(order = %order_id, "order deleted");
        Ok(())
    }

    /// Checks that the stored original photo still matches the fingerprint
    /// recorded when it was written.
    pub fn verify_image_checksum(&self, order_id: OrderId) -> Result<bool> {
        let (image, checksum): (String, String) = self
            .conn
            .query_row(
                "SELECT original_image, image_sha256 FROM orders WHERE id = ?",
                params![order_id.get()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .with_context(|| format!("load image checksum for order {order_id}"))?
            .ok_or_else(|| anyhow!("order {order_id} not found"))?;
        Ok(image_sha256(&image) == checksum)
    }

    pub fn get_setting_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("load setting {key}"))
    }

    pub fn put_setting_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert setting {key}"))?;
        Ok(())
    }

    pub fn materials(&self) -> Result<Vec<MaterialPrice>> {
        self.get_or_init(SettingKey::Materials, default_materials)
    }

    pub fn save_materials(&self, materials: &[MaterialPrice]) -> Result<()> {
        validate_price_list(materials)?;
        self.put_setting(SettingKey::Materials, &materials)
    }

    pub fn labor_rate(&self) -> Result<f64> {
        self.get_or_init(SettingKey::LaborRate, || DEFAULT_LABOR_RATE)
    }

    pub fn save_labor_rate(&self, rate: f64) -> Result<()> {
        validate_labor_rate(rate)?;
        self.put_setting(SettingKey::LaborRate, &rate)
    }

    pub fn service_cards(&self) -> Result<Vec<ServiceCard>> {
        self.get_or_init(SettingKey::ServiceCards, default_service_cards)
    }

    pub fn save_service_cards(&self, cards: &[ServiceCard]) -> Result<()> {
        validate_service_cards(cards)?;
        self.put_setting(SettingKey::ServiceCards, &cards)
    }

    pub fn video_url(&self) -> Result<String> {
        self.get_or_init(SettingKey::VideoUrl, || DEFAULT_VIDEO_URL.to_owned())
    }

    pub fn save_video_url(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            bail!("video URL {url:?} must start with http:// or https://");
        }
        self.put_setting(SettingKey::VideoUrl, &url)
    }

    /// Reads a setting, writing the default first when nothing is stored.
    ///
    /// A stored value that no longer decodes is left in place and the default
    /// is returned, so a bad write never takes the shop offline.
    fn get_or_init<T, F>(&self, key: SettingKey, default: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.get_setting_raw(key.as_str())? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(value),
                Err(error) => {
                    tracing::warn!(
                        setting = key.as_str(),
                        %error,
                        "stored setting is unreadable; using the default"
                    );
                    Ok(default())
                }
            },
            None => {
                let value = default();
                self.put_setting(key, &value)?;
                tracing::info!(setting = key.as_str(), "initialized default setting");
                Ok(value)
            }
        }
    }

    fn put_setting<T: Serialize + ?Sized>(&self, key: SettingKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("encode setting {}", key.as_str()))?;
        self.put_setting_raw(key.as_str(), &raw)?;
        tracing::info!(setting = key.as_str(), "setting saved");
        Ok(())
    }
}

impl OrderStore for Store {
    fn create_order(&self, order: NewOrder) -> Result<ServiceOrder> {
        Store::create_order(self, &order)
    }

    fn list_orders(&self) -> Result<Vec<ServiceOrder>> {
        Store::list_orders(self)
    }

    fn get_order(&self, id: OrderId) -> Result<ServiceOrder> {
        Store::get_order(self, id)
    }

    fn update_order(&self, order: &ServiceOrder) -> Result<()> {
        Store::update_order(self, order)
    }

    fn delete_order(&self, id: OrderId) -> Result<()> {
        Store::delete_order(self, id)
    }
}

impl SettingsStore for Store {
    fn materials(&self) -> Result<Vec<MaterialPrice>> {
        Store::materials(self)
    }

    fn save_materials(&self, materials: &[MaterialPrice]) -> Result<()> {
        Store::save_materials(self, materials)
    }

    fn labor_rate(&self) -> Result<f64> {
        Store::labor_rate(self)
    }

    fn save_labor_rate(&self, rate: f64) -> Result<()> {
        Store::save_labor_rate(self, rate)
    }

    fn service_cards(&self) -> Result<Vec<ServiceCard>> {
        Store::service_cards(self)
    }

    fn save_service_cards(&self, cards: &[ServiceCard]) -> Result<()> {
        Store::save_service_cards(self, cards)
    }

    fn video_url(&self) -> Result<String> {
        Store::video_url(self)
    }

    fn save_video_url(&self, url: &str) -> Result<()> {
        Store::save_video_url(self, url)
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("OFICINA_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set OFICINA_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("oficina.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

pub fn image_sha256(image_base64: &str) -> String {
    let digest = Sha256::digest(image_base64.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceOrder> {
    let date_raw: String = row.get(1)?;
    let status_raw: String = row.get(2)?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| to_sql_error(anyhow!("unknown order status {status_raw}")))?;
    let client_raw: String = row.get(3)?;
    let estimate_raw: String = row.get(4)?;
    let client: ClientData = from_json(&client_raw, "client").map_err(to_sql_error)?;
    let estimate: RepairEstimate = from_json(&estimate_raw, "estimate").map_err(to_sql_error)?;

    Ok(ServiceOrder {
        id: OrderId::new(row.get(0)?),
        date: parse_datetime(&date_raw).map_err(to_sql_error)?,
        status,
        client,
        estimate,
        original_image: row.get(5)?,
        repaired_image: row.get(6)?,
    })
}

fn to_json<T: Serialize>(value: &T, label: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("encode {label}"))
}

fn from_json<T: DeserializeOwned>(raw: &str, label: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("decode stored {label}"))
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point OFICINA_DB_PATH at an oficina database or start a fresh one"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

// Fixed-width UTC so that text ordering in SQL matches time ordering.
fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .context("format timestamp")
}

fn now_rfc3339() -> Result<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{error:#}"),
        )),
    )
}
