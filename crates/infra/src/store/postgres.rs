//! Postgres-backed store.
//!
//! ## Locking
//!
//! Writers use `SELECT ... FOR UPDATE` on the offer, reservation and device
//! rows they read before deciding, and stock is decremented with a guarded
//! `UPDATE ... WHERE stock >= $1`, so two transactions accepting offers on the
//! same device are serialized and the second one sees the first one's stock.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Conflict` |
//! | Database (other) | Any other | `Database` |
//! | PoolClosed / Other | N/A | `Database` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use storefront_core::{
    Customer, DeviceId, Money, OfferId, ReservationId, ensure_positive_quantity,
};
use storefront_inventory::{Device, DeviceFilter, DeviceSpec};
use storefront_offers::{Offer, OfferStatus};
use storefront_reservations::{Reservation, ReservationCode, ReservationItem, ReservationStatus};

use super::{Store, StoreError, StoreTransaction};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        brand       TEXT NOT NULL DEFAULT '',
        device_type TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        price       NUMERIC NOT NULL CHECK (price > 0),
        stock       BIGINT NOT NULL CHECK (stock >= 0),
        image       TEXT NOT NULL DEFAULT '',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS offers (
        id               UUID PRIMARY KEY,
        device_id        TEXT NOT NULL REFERENCES devices (id),
        customer_name    TEXT NOT NULL,
        customer_email   TEXT NOT NULL,
        customer_phone   TEXT NOT NULL,
        comments         TEXT NOT NULL DEFAULT '',
        offer_price      NUMERIC NOT NULL CHECK (offer_price > 0),
        original_price   NUMERIC NOT NULL CHECK (original_price > 0),
        quantity         BIGINT NOT NULL CHECK (quantity > 0),
        status           TEXT NOT NULL,
        rejection_reason TEXT NULL,
        created_at       TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS offers_device_status_idx ON offers (device_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS reservations (
        id                  UUID PRIMARY KEY,
        code                TEXT NOT NULL UNIQUE,
        customer_name       TEXT NOT NULL,
        customer_email      TEXT NOT NULL,
        customer_phone      TEXT NOT NULL,
        comments            TEXT NOT NULL DEFAULT '',
        status              TEXT NOT NULL,
        cancellation_reason TEXT NULL,
        total               NUMERIC NOT NULL,
        offer_id            UUID NULL,
        created_at          TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reservation_items (
        reservation_id UUID NOT NULL REFERENCES reservations (id) ON DELETE CASCADE,
        line_no        INTEGER NOT NULL,
        device_id      TEXT NOT NULL REFERENCES devices (id),
        price          NUMERIC NOT NULL,
        original_price NUMERIC NOT NULL,
        quantity       BIGINT NOT NULL CHECK (quantity > 0),
        PRIMARY KEY (reservation_id, line_no)
    )
    "#,
];

const DEVICE_COLUMNS: &str =
    "id, name, brand, device_type, description, price, stock, image, created_at, updated_at";

const OFFER_COLUMNS: &str = "id, device_id, customer_name, customer_email, customer_phone, \
     comments, offer_price, original_price, quantity, status, rejection_reason, created_at";

const RESERVATION_COLUMNS: &str = "id, code, customer_name, customer_email, customer_phone, \
     comments, status, cancellation_reason, total, offer_id, created_at";

/// Postgres-backed store.
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool and make sure the tables exist.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn conn(&self) -> Result<sqlx::pool::PoolConnection<Postgres>, StoreError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    #[instrument(skip(self), fields(device_id = %id), err)]
    async fn device(&self, id: &DeviceId) -> Result<Option<Device>, StoreError> {
        let mut conn = self.conn().await?;
        select_device(&mut conn, id, false).await
    }

    #[instrument(skip(self), err)]
    async fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        let sql = format!(
            "SELECT {DEVICE_COLUMNS} FROM devices \
             WHERE ($1::TEXT IS NULL OR LOWER(TRIM(device_type)) = LOWER(TRIM($1))) \
               AND ($2::TEXT IS NULL OR LOWER(TRIM(brand)) = LOWER(TRIM($2))) \
               AND ($3::NUMERIC IS NULL OR price >= $3) \
               AND ($4::NUMERIC IS NULL OR price <= $4) \
               AND ($5::TEXT IS NULL \
                    OR name ILIKE '%' || $5 || '%' \
                    OR description ILIKE '%' || $5 || '%' \
                    OR brand ILIKE '%' || $5 || '%') \
             ORDER BY created_at DESC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(non_blank(&filter.device_type))
            .bind(non_blank(&filter.brand))
            .bind(filter.min_price.map(|m| m.amount()))
            .bind(filter.max_price.map(|m| m.amount()))
            .bind(non_blank(&filter.search))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_devices", e))?;
        rows.iter().map(device_from_row).collect()
    }

    #[instrument(skip(self), fields(offer_id = %id), err)]
    async fn offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        let mut conn = self.conn().await?;
        select_offer(&mut conn, id, false).await
    }

    #[instrument(skip(self), err)]
    async fn offers(&self, status: Option<OfferStatus>) -> Result<Vec<Offer>, StoreError> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM offers \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_offers", e))?;
        rows.iter().map(offer_from_row).collect()
    }

    #[instrument(skip(self), fields(reservation_id = %id), err)]
    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn().await?;
        select_reservation(&mut conn, "id = $1", id.as_uuid(), false).await
    }

    #[instrument(skip(self), err)]
    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        let mut conn = self.conn().await?;
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations ORDER BY created_at DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list_reservations", e))?;

        let item_rows = sqlx::query(
            r#"
            SELECT reservation_id, device_id, price, original_price, quantity
            FROM reservation_items
            ORDER BY reservation_id, line_no
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_reservation_items", e))?;

        let mut items: HashMap<Uuid, Vec<ReservationItem>> = HashMap::new();
        for row in &item_rows {
            let reservation_id: Uuid = row.try_get("reservation_id").map_err(decode_error)?;
            items
                .entry(reservation_id)
                .or_default()
                .push(item_from_row(row)?);
        }

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id").map_err(decode_error)?;
                reservation_from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    #[instrument(skip(self), fields(offer_id = %offer_id), err)]
    async fn reservation_by_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn().await?;
        select_reservation(&mut conn, "offer_id = $1", offer_id.as_uuid(), false).await
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn device_for_update(&mut self, id: &DeviceId) -> Result<Device, StoreError> {
        select_device(&mut self.tx, id, true)
            .await?
            .ok_or_else(|| StoreError::device_not_found(id))
    }

    #[instrument(skip(self, device), fields(device_id = %device.id), err)]
    async fn upsert_device(&mut self, device: &Device) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO devices (
                id, name, brand, device_type, description, price, stock, image, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                brand = EXCLUDED.brand,
                device_type = EXCLUDED.device_type,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                image = EXCLUDED.image,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(device.id.as_str())
        .bind(&device.name)
        .bind(&device.brand)
        .bind(&device.device_type)
        .bind(&device.description)
        .bind(device.price.amount())
        .bind(device.stock())
        .bind(&device.image)
        .bind(device.created_at)
        .bind(device.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_device", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(device_id = %id), err)]
    async fn decrement_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError> {
        ensure_positive_quantity(quantity).map_err(|e| StoreError::Conflict(e.to_string()))?;

        let updated = sqlx::query(
            r#"
            UPDATE devices
            SET stock = stock - $1, updated_at = NOW()
            WHERE id = $2 AND stock >= $1
            RETURNING stock
            "#,
        )
        .bind(quantity)
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        if updated.is_some() {
            return Ok(());
        }

        // Either the device is missing or the floor check failed.
        match select_device(&mut self.tx, id, false).await? {
            Some(device) => Err(StoreError::InsufficientStock(device.shortage(quantity))),
            None => Err(StoreError::device_not_found(id)),
        }
    }

    #[instrument(skip(self), fields(device_id = %id), err)]
    async fn increment_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError> {
        ensure_positive_quantity(quantity).map_err(|e| StoreError::Conflict(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE devices SET stock = stock + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(quantity)
        .bind(id.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("increment_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::device_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self, offer), fields(offer_id = %offer.id), err)]
    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO offers (
                id, device_id, customer_name, customer_email, customer_phone, comments,
                offer_price, original_price, quantity, status, rejection_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(offer.id.as_uuid())
        .bind(offer.device_id.as_str())
        .bind(&offer.customer.name)
        .bind(&offer.customer.email)
        .bind(&offer.customer.phone)
        .bind(&offer.customer.comments)
        .bind(offer.offer_price.amount())
        .bind(offer.original_price.amount())
        .bind(offer.quantity)
        .bind(offer.status().as_str())
        .bind(offer.rejection_reason())
        .bind(offer.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_offer", e))?;
        Ok(())
    }

    async fn offer_for_update(&mut self, id: OfferId) -> Result<Offer, StoreError> {
        select_offer(&mut self.tx, id, true)
            .await?
            .ok_or_else(|| StoreError::offer_not_found(id))
    }

    #[instrument(skip(self, offer), fields(offer_id = %offer.id, status = %offer.status()), err)]
    async fn update_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE offers SET status = $1, rejection_reason = $2 WHERE id = $3")
            .bind(offer.status().as_str())
            .bind(offer.rejection_reason())
            .bind(offer.id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_offer", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::offer_not_found(offer.id));
        }
        Ok(())
    }

    async fn pending_offers_for_device(
        &mut self,
        device_id: &DeviceId,
        exclude: OfferId,
    ) -> Result<Vec<Offer>, StoreError> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM offers \
             WHERE device_id = $1 AND status = 'pending' AND id <> $2 \
             ORDER BY created_at \
             FOR UPDATE"
        );
        let rows = sqlx::query(&sql)
            .bind(device_id.as_str())
            .bind(exclude.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("pending_offers_for_device", e))?;
        rows.iter().map(offer_from_row).collect()
    }

    async fn reservation_code_exists(&mut self, code: &ReservationCode) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM reservations WHERE code = $1)")
            .bind(code.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("reservation_code_exists", e))?;
        row.try_get::<bool, _>(0).map_err(decode_error)
    }

    #[instrument(skip(self, reservation), fields(code = %reservation.code), err)]
    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, code, customer_name, customer_email, customer_phone, comments,
                status, cancellation_reason, total, offer_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.code.as_str())
        .bind(&reservation.customer.name)
        .bind(&reservation.customer.email)
        .bind(&reservation.customer.phone)
        .bind(&reservation.customer.comments)
        .bind(reservation.status().as_str())
        .bind(reservation.cancellation_reason())
        .bind(reservation.total().amount())
        .bind(reservation.offer_id.map(Uuid::from))
        .bind(reservation.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_reservation", e))?;

        for (idx, item) in reservation.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO reservation_items (
                    reservation_id, line_no, device_id, price, original_price, quantity
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(reservation.id.as_uuid())
            .bind(idx as i32 + 1)
            .bind(item.device_id.as_str())
            .bind(item.price.amount())
            .bind(item.original_price.amount())
            .bind(item.quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_reservation_item", e))?;
        }
        Ok(())
    }

    async fn reservation_for_update(
        &mut self,
        id: ReservationId,
    ) -> Result<Reservation, StoreError> {
        select_reservation(&mut self.tx, "id = $1", id.as_uuid(), true)
            .await?
            .ok_or_else(|| StoreError::reservation_not_found(id))
    }

    #[instrument(skip(self, reservation), fields(code = %reservation.code, status = %reservation.status()), err)]
    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE reservations SET status = $1, cancellation_reason = $2 WHERE id = $3",
        )
        .bind(reservation.status().as_str())
        .bind(reservation.cancellation_reason())
        .bind(reservation.id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_reservation", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::reservation_not_found(reservation.id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

async fn select_device(
    conn: &mut PgConnection,
    id: &DeviceId,
    lock: bool,
) -> Result<Option<Device>, StoreError> {
    let sql = format!(
        "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("select_device", e))?;
    row.as_ref().map(device_from_row).transpose()
}

async fn select_offer(
    conn: &mut PgConnection,
    id: OfferId,
    lock: bool,
) -> Result<Option<Offer>, StoreError> {
    let sql = format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("select_offer", e))?;
    row.as_ref().map(offer_from_row).transpose()
}

/// Load one reservation (and its items) by a single-uuid predicate.
async fn select_reservation(
    conn: &mut PgConnection,
    predicate: &str,
    key: &Uuid,
    lock: bool,
) -> Result<Option<Reservation>, StoreError> {
    let sql = format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE {predicate} \
         ORDER BY created_at DESC LIMIT 1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let Some(row) = sqlx::query(&sql)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("select_reservation", e))?
    else {
        return Ok(None);
    };

    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let item_rows = sqlx::query(
        r#"
        SELECT reservation_id, device_id, price, original_price, quantity
        FROM reservation_items
        WHERE reservation_id = $1
        ORDER BY line_no
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("select_reservation_items", e))?;

    let items = item_rows
        .iter()
        .map(item_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    reservation_from_row(&row, items).map(Some)
}

fn device_from_row(row: &PgRow) -> Result<Device, StoreError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let spec = DeviceSpec {
        name: row.try_get("name").map_err(decode_error)?,
        brand: row.try_get("brand").map_err(decode_error)?,
        device_type: row.try_get("device_type").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        price: money(row, "price")?,
        stock: row.try_get("stock").map_err(decode_error)?,
        image: row.try_get("image").map_err(decode_error)?,
    };
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode_error)?;
    let id = DeviceId::new(id).map_err(|e| StoreError::Database(e.to_string()))?;
    Ok(Device::restore(id, spec, created_at, updated_at))
}

fn offer_from_row(row: &PgRow) -> Result<Offer, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let device_id: String = row.try_get("device_id").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    Ok(Offer::restore(
        OfferId::from_uuid(id),
        DeviceId::new(device_id).map_err(|e| StoreError::Database(e.to_string()))?,
        customer_from_row(row)?,
        money(row, "offer_price")?,
        money(row, "original_price")?,
        row.try_get("quantity").map_err(decode_error)?,
        status
            .parse::<OfferStatus>()
            .map_err(|e| StoreError::Database(e.to_string()))?,
        row.try_get("rejection_reason").map_err(decode_error)?,
        row.try_get("created_at").map_err(decode_error)?,
    ))
}

fn reservation_from_row(row: &PgRow, items: Vec<ReservationItem>) -> Result<Reservation, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let code: String = row.try_get("code").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let offer_id: Option<Uuid> = row.try_get("offer_id").map_err(decode_error)?;
    Ok(Reservation::restore(
        ReservationId::from_uuid(id),
        code.parse::<ReservationCode>()
            .map_err(|e| StoreError::Database(e.to_string()))?,
        customer_from_row(row)?,
        status
            .parse::<ReservationStatus>()
            .map_err(|e| StoreError::Database(e.to_string()))?,
        row.try_get("cancellation_reason").map_err(decode_error)?,
        money(row, "total")?,
        offer_id.map(OfferId::from_uuid),
        items,
        row.try_get("created_at").map_err(decode_error)?,
    ))
}

fn item_from_row(row: &PgRow) -> Result<ReservationItem, StoreError> {
    let device_id: String = row.try_get("device_id").map_err(decode_error)?;
    Ok(ReservationItem {
        device_id: DeviceId::new(device_id).map_err(|e| StoreError::Database(e.to_string()))?,
        price: money(row, "price")?,
        original_price: money(row, "original_price")?,
        quantity: row.try_get("quantity").map_err(decode_error)?,
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    Ok(Customer {
        name: row.try_get("customer_name").map_err(decode_error)?,
        email: row.try_get("customer_email").map_err(decode_error)?,
        phone: row.try_get("customer_phone").map_err(decode_error)?,
        comments: row.try_get("comments").map_err(decode_error)?,
    })
}

fn money(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    row.try_get::<Decimal, _>(column)
        .map(Money::new)
        .map_err(decode_error)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Database(format!("failed to decode row: {err}"))
}

/// Map SQLx errors to store errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}
