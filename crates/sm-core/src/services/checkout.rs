//! Cart, order placement and the order lifecycle.
//!
//! Both checkout paths (persisted cart and "buy now") go through [`place`],
//! which hands a single [`OrderDraft`] to the store so that number
//! allocation and stock decrements commit or fail together.

use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Cart, LineRequest, Order, OrderDraft, OrderStatus, User};
use crate::services::access;
use crate::traits::{Mailer, ShopRepo};

pub const ADMIN_ORDER_LIMIT: i64 = 100;

/// Merges repeated products (keeping first-seen order) and rejects
/// non-positive quantities or an empty request.
pub fn normalize_lines(lines: Vec<LineRequest>) -> Result<Vec<LineRequest>> {
    if lines.is_empty() {
        return Err(AppError::ValidationError("order has no items".into()));
    }
    let mut merged: Vec<LineRequest> = Vec::with_capacity(lines.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::ValidationError(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        match index.get(&line.product_id) {
            Some(&at) => {
                merged[at].quantity = merged[at]
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| AppError::ValidationError("quantity too large".into()))?;
            }
            None => {
                index.insert(line.product_id, merged.len());
                merged.push(line);
            }
        }
    }
    Ok(merged)
}

pub async fn get_cart(repo: &dyn ShopRepo, user: &User) -> Result<Cart> {
    Ok(Cart::from_lines(repo.get_cart(user.id).await?))
}

/// Sets the quantity of a product in the cart; zero removes it.
pub async fn set_cart_item(repo: &dyn ShopRepo, user: &User, product_id: Uuid, quantity: i64) -> Result<Cart> {
    if quantity < 0 {
        return Err(AppError::ValidationError("quantity cannot be negative".into()));
    }
    if quantity == 0 {
        repo.remove_cart_item(user.id, product_id).await?;
    } else {
        repo.get_product(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", product_id))?;
        repo.set_cart_item(user.id, product_id, quantity).await?;
    }
    get_cart(repo, user).await
}

pub async fn remove_cart_item(repo: &dyn ShopRepo, user: &User, product_id: Uuid) -> Result<Cart> {
    if !repo.remove_cart_item(user.id, product_id).await? {
        return Err(AppError::not_found("Cart item", product_id));
    }
    get_cart(repo, user).await
}

pub async fn clear_cart(repo: &dyn ShopRepo, user: &User) -> Result<()> {
    repo.clear_cart(user.id).await
}

async fn place(
    repo: &dyn ShopRepo,
    mailer: &dyn Mailer,
    user: &User,
    lines: Vec<LineRequest>,
    from_cart: bool,
) -> Result<Order> {
    let address = user.address.clone().ok_or(AppError::MissingAddress)?;
    let draft = OrderDraft {
        user_id: user.id,
        user_email: user.email.clone(),
        address,
        lines: normalize_lines(lines)?,
        from_cart,
    };

    let order = repo.place_order(&draft).await?;
    log::info!(
        "order {} placed by {} for {}",
        order.order_number,
        user.id,
        order.total_amount
    );

    if let Err(err) = mailer.send_order_confirmation(&user.email, &order).await {
        log::warn!("could not send confirmation for order {}: {err:#}", order.order_number);
    }
    Ok(order)
}

/// Turns the persisted cart into an order and empties the cart.
pub async fn checkout(repo: &dyn ShopRepo, mailer: &dyn Mailer, user: &User) -> Result<Order> {
    let lines: Vec<LineRequest> = repo
        .get_cart(user.id)
        .await?
        .into_iter()
        .map(|line| LineRequest {
            product_id: line.product_id,
            quantity: line.quantity,
        })
        .collect();
    if lines.is_empty() {
        return Err(AppError::ValidationError("cart is empty".into()));
    }
    place(repo, mailer, user, lines, true).await
}

/// Same engine as [`checkout`], for an ad-hoc list of items.
pub async fn buy_now(
    repo: &dyn ShopRepo,
    mailer: &dyn Mailer,
    user: &User,
    items: Vec<LineRequest>,
) -> Result<Order> {
    place(repo, mailer, user, items, false).await
}

pub async fn list_my_orders(repo: &dyn ShopRepo, user: &User) -> Result<Vec<Order>> {
    repo.list_orders_for_user(user.id).await
}

pub async fn list_all_orders(repo: &dyn ShopRepo) -> Result<Vec<Order>> {
    repo.list_orders(ADMIN_ORDER_LIMIT).await
}

pub async fn get_order(repo: &dyn ShopRepo, user: &User, id: Uuid) -> Result<Order> {
    let order = repo
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order", id))?;
    access::require_owner_or_admin(user, Some(order.user_id))?;
    Ok(order)
}

async fn transition(repo: &dyn ShopRepo, order: Order, next: OrderStatus) -> Result<Order> {
    let invalid = |from: OrderStatus| AppError::InvalidTransition {
        entity: "order",
        from: from.to_string(),
        to: next.to_string(),
    };
    if !order.status.can_transition_to(next) {
        return Err(invalid(order.status));
    }
    if !repo.transition_order(order.id, order.status, next).await? {
        // Someone else moved it first; report against what is stored now.
        let current = repo
            .get_order(order.id)
            .await?
            .ok_or_else(|| AppError::not_found("Order", order.id))?;
        return Err(invalid(current.status));
    }
    log::info!("order {} {} -> {}", order.order_number, order.status, next);
    Ok(Order { status: next, ..order })
}

/// Owner or admin; only from `pending` or `confirmed`. Stock is not returned.
pub async fn cancel_order(repo: &dyn ShopRepo, user: &User, id: Uuid) -> Result<Order> {
    let order = get_order(repo, user, id).await?;
    transition(repo, order, OrderStatus::Cancelled).await
}

pub async fn update_order_status(repo: &dyn ShopRepo, id: Uuid, next: OrderStatus) -> Result<Order> {
    let order = repo
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order", id))?;
    transition(repo, order, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, quantity: i64) -> LineRequest {
        LineRequest { product_id, quantity }
    }

    #[test]
    fn repeated_products_are_merged_in_order() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let merged = normalize_lines(vec![line(a, 1), line(b, 2), line(a, 3)]).unwrap();
        assert_eq!(merged, vec![line(a, 4), line(b, 2)]);
    }

    #[test]
    fn zero_or_negative_quantities_rejected() {
        let a = Uuid::now_v7();
        assert!(normalize_lines(vec![line(a, 0)]).is_err());
        assert!(normalize_lines(vec![line(a, -2)]).is_err());
    }

    #[test]
    fn empty_orders_rejected() {
        assert!(matches!(normalize_lines(vec![]), Err(AppError::ValidationError(_))));
    }
}
