//! Cart persistence and the order placement engine.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sm_core::error::{AppError, Result};
use sm_core::models::{CartLine, Order, OrderDraft, OrderItem, OrderStatus};
use sm_core::traits::{CartRepo, OrderRepo};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    db_error, decimal_col, id_col, is_foreign_key_violation, json_col, parse_col, to_json, ts, ts_col, uuid_to_blob,
    DbExt, SqliteRepo,
};

const ORDER_COLUMNS: &str = "id, order_number, user_id, user_email, total_amount, status, address, created_at";

impl SqliteRepo {
    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT product_id, name, quantity, unit_price, line_total FROM order_items \
             WHERE order_id = ? ORDER BY position",
        )
        .bind(uuid_to_blob(order_id))
        .fetch_all(&self.pool)
        .await
        .db()?;
        rows.iter()
            .map(|row| {
                Ok(OrderItem {
                    product_id: id_col(row, "product_id")?,
                    name: row.try_get("name").db()?,
                    quantity: row.try_get("quantity").db()?,
                    unit_price: decimal_col(row, "unit_price")?,
                    line_total: decimal_col(row, "line_total")?,
                })
            })
            .collect()
    }

    /// Fills in the line items of orders decoded from their header rows.
    async fn with_items(&self, mut orders: Vec<Order>) -> Result<Vec<Order>> {
        for order in &mut orders {
            order.items = self.load_items(order.id).await?;
        }
        Ok(orders)
    }
}

/// Header columns only; `items` is left empty.
fn order_header(row: &SqliteRow) -> Result<Order> {
    Ok(Order {
        id: id_col(row, "id")?,
        order_number: row.try_get("order_number").db()?,
        user_id: id_col(row, "user_id")?,
        user_email: row.try_get("user_email").db()?,
        items: Vec::new(),
        total_amount: decimal_col(row, "total_amount")?,
        status: parse_col::<OrderStatus>(row, "status")?,
        address: json_col(row, "address")?,
        created_at: ts_col(row, "created_at")?,
    })
}

#[async_trait]
impl CartRepo for SqliteRepo {
    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT c.product_id, p.name, p.price, c.quantity FROM cart_items c \
             JOIN products p ON p.id = c.product_id \
             WHERE c.user_id = ? ORDER BY c.added_at, p.name",
        )
        .bind(uuid_to_blob(user_id))
        .fetch_all(&self.pool)
        .await
        .db()?;
        rows.iter()
            .map(|row| {
                let unit_price = decimal_col(row, "price")?;
                let quantity: i64 = row.try_get("quantity").db()?;
                Ok(CartLine {
                    product_id: id_col(row, "product_id")?,
                    name: row.try_get("name").db()?,
                    unit_price,
                    quantity,
                    line_total: unit_price * Decimal::from(quantity),
                })
            })
            .collect()
    }

    async fn set_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity, added_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = excluded.quantity",
        )
        .bind(uuid_to_blob(user_id))
        .bind(uuid_to_blob(product_id))
        .bind(quantity)
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                AppError::not_found("Product", product_id)
            } else {
                db_error(err)
            }
        })?;
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND product_id = ?")
            .bind(uuid_to_blob(user_id))
            .bind(uuid_to_blob(product_id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(done.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
            .bind(uuid_to_blob(user_id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepo for SqliteRepo {
    /// One transaction. Its first statement is a write, so the write lock is
    /// held from the start and concurrent placements wait on `busy_timeout`.
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order> {
        let mut tx = self.pool.begin().await.db()?;

        let seq: i64 = sqlx::query_scalar(
            "UPDATE counters SET value = value + 1 WHERE name = 'order_number' RETURNING value",
        )
        .fetch_one(&mut *tx)
        .await
        .db()?;

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let product = sqlx::query("SELECT name, price FROM products WHERE id = ?")
                .bind(uuid_to_blob(line.product_id))
                .fetch_optional(&mut *tx)
                .await
                .db()?
                .ok_or_else(|| AppError::not_found("Product", line.product_id))?;
            let name: String = product.try_get("name").db()?;
            let unit_price = decimal_col(&product, "price")?;

            let taken = sqlx::query("UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ?")
                .bind(line.quantity)
                .bind(uuid_to_blob(line.product_id))
                .bind(line.quantity)
                .execute(&mut *tx)
                .await
                .db()?;
            if taken.rows_affected() == 0 {
                return Err(AppError::InsufficientStock(name));
            }

            items.push(OrderItem {
                product_id: line.product_id,
                name,
                quantity: line.quantity,
                unit_price,
                line_total: unit_price * Decimal::from(line.quantity),
            });
        }

        let order = Order {
            id: Uuid::now_v7(),
            order_number: Order::number_from_sequence(seq),
            user_id: draft.user_id,
            user_email: draft.user_email.clone(),
            total_amount: items.iter().map(|item| item.line_total).sum(),
            items,
            status: OrderStatus::Pending,
            address: draft.address.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO orders (id, order_number, user_id, user_email, total_amount, status, address, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(order.id))
        .bind(&order.order_number)
        .bind(uuid_to_blob(order.user_id))
        .bind(&order.user_email)
        .bind(order.total_amount.to_string())
        .bind(order.status.as_str())
        .bind(to_json(&order.address)?)
        .bind(ts(order.created_at))
        .execute(&mut *tx)
        .await
        .db()?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, name, quantity, unit_price, line_total) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid_to_blob(order.id))
            .bind(position as i64)
            .bind(uuid_to_blob(item.product_id))
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price.to_string())
            .bind(item.line_total.to_string())
            .execute(&mut *tx)
            .await
            .db()?;
        }

        if draft.from_cart {
            // Only the lines that were ordered; anything added or changed
            // since the cart was read stays in the cart.
            for line in &draft.lines {
                sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND product_id = ? AND quantity = ?")
                    .bind(uuid_to_blob(draft.user_id))
                    .bind(uuid_to_blob(line.product_id))
                    .bind(line.quantity)
                    .execute(&mut *tx)
                    .await
                    .db()?;
            }
        }

        tx.commit().await.db()?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .db()?;
        let Some(order) = row.as_ref().map(order_header).transpose()? else {
            return Ok(None);
        };
        Ok(self.with_items(vec![order]).await?.pop())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC");
        let rows = sqlx::query(&sql)
            .bind(uuid_to_blob(user_id))
            .fetch_all(&self.pool)
            .await
            .db()?;
        let orders = rows.iter().map(order_header).collect::<Result<Vec<_>>>()?;
        self.with_items(orders).await
    }

    async fn list_orders(&self, limit: i64) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT ?");
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await.db()?;
        let orders = rows.iter().map(order_header).collect::<Result<Vec<_>>>()?;
        self.with_items(orders).await
    }

    async fn transition_order(&self, id: Uuid, from: OrderStatus, to: OrderStatus) -> Result<bool> {
        let done = sqlx::query("UPDATE orders SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(uuid_to_blob(id))
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .db()?;
        Ok(done.rows_affected() > 0)
    }
}
