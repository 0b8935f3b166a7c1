//! Product catalog, product images and ratings.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Product, ProductFilter, ProductInput, Rating, User};
use crate::traits::{MediaStore, ShopRepo};
use crate::validation;

pub const PRODUCT_PAGE_LIMIT: i64 = 100;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub async fn list_products(repo: &dyn ShopRepo, filter: &ProductFilter) -> Result<Vec<Product>> {
    let filter = ProductFilter {
        category: filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(String::from),
        search: filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
    };
    repo.list_products(&filter, PRODUCT_PAGE_LIMIT).await
}

pub async fn get_product(repo: &dyn ShopRepo, id: Uuid) -> Result<Product> {
    repo.get_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))
}

pub async fn create_product(repo: &dyn ShopRepo, input: ProductInput) -> Result<Product> {
    let input = validation::product(input)?;
    let product = Product {
        id: Uuid::now_v7(),
        name: input.name,
        price: input.price,
        description: input.description,
        category: input.category,
        stock: input.stock,
        images: input.images,
        average_rating: 0.0,
        rating_count: 0,
        created_at: Utc::now(),
    };
    repo.create_product(&product).await?;
    log::info!("created product {} ({})", product.id, product.name);
    Ok(product)
}

pub async fn update_product(repo: &dyn ShopRepo, id: Uuid, input: ProductInput) -> Result<Product> {
    let input = validation::product(input)?;
    repo.update_product(id, &input)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))
}

pub async fn delete_product(repo: &dyn ShopRepo, id: Uuid) -> Result<()> {
    if !repo.delete_product(id).await? {
        return Err(AppError::not_found("Product", id));
    }
    log::info!("deleted product {id}");
    Ok(())
}

/// Stores an image and appends its public URL to the product.
pub async fn upload_product_image(
    repo: &dyn ShopRepo,
    store: &dyn MediaStore,
    id: Uuid,
    data: Vec<u8>,
    content_type: &str,
) -> Result<Product> {
    get_product(repo, id).await?;
    if !content_type.starts_with("image/") {
        return Err(AppError::ValidationError(format!(
            "unsupported content type '{content_type}'; expected an image"
        )));
    }
    if data.is_empty() {
        return Err(AppError::ValidationError("image upload is empty".into()));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(AppError::ValidationError("image exceeds 5 MiB".into()));
    }

    let media_id = store
        .save_upload(data, content_type)
        .await
        .map_err(|err| AppError::UpstreamFailure(format!("image storage failed: {err:#}")))?;
    let url = store.get_url(&media_id).await;

    repo.add_product_image(id, &url)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))
}

/// One immutable 1–5 rating per user and product; aggregates are recomputed.
pub async fn rate_product(repo: &dyn ShopRepo, user: &User, product_id: Uuid, score: i64) -> Result<Product> {
    let score = u8::try_from(score)
        .ok()
        .filter(|s| (1..=5).contains(s))
        .ok_or_else(|| AppError::ValidationError("score must be between 1 and 5".into()))?;
    get_product(repo, product_id).await?;

    let rating = Rating {
        id: Uuid::now_v7(),
        user_id: user.id,
        product_id,
        score,
        created_at: Utc::now(),
    };
    let product = repo.add_rating(&rating).await?;
    log::info!(
        "user {} rated product {product_id} {score}; now {:.2} over {}",
        user.id,
        product.average_rating,
        product.rating_count
    );
    Ok(product)
}

pub async fn list_ratings(repo: &dyn ShopRepo, product_id: Uuid) -> Result<Vec<Rating>> {
    get_product(repo, product_id).await?;
    repo.list_ratings(product_id).await
}
