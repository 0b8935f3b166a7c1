use async_trait::async_trait;
use sm_core::error::{AppError, Result};
use sm_core::models::{Product, ProductFilter, ProductInput, Rating};
use sm_core::traits::CatalogRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    db_error, decimal_col, id_col, is_foreign_key_violation, is_unique_violation, json_col, to_json, ts, ts_col,
    uuid_to_blob, DbExt, SqliteRepo,
};

const PRODUCT_COLUMNS: &str =
    "id, name, price, description, category, stock, images, average_rating, rating_count, created_at";

pub(crate) fn product_from_row(row: &SqliteRow) -> Result<Product> {
    Ok(Product {
        id: id_col(row, "id")?,
        name: row.try_get("name").db()?,
        price: decimal_col(row, "price")?,
        description: row.try_get("description").db()?,
        category: row.try_get("category").db()?,
        stock: row.try_get("stock").db()?,
        images: json_col(row, "images")?,
        average_rating: row.try_get("average_rating").db()?,
        rating_count: row.try_get("rating_count").db()?,
        created_at: ts_col(row, "created_at")?,
    })
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl CatalogRepo for SqliteRepo {
    async fn list_products(&self, filter: &ProductFilter, limit: i64) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE (? IS NULL OR category = ? COLLATE NOCASE) \
             AND (? IS NULL OR name LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\') \
             ORDER BY created_at DESC LIMIT ?"
        );
        let search = filter.search.as_deref().map(like_pattern);
        let rows = sqlx::query(&sql)
            .bind(filter.category.as_deref())
            .bind(filter.category.as_deref())
            .bind(search.as_deref())
            .bind(search.as_deref())
            .bind(search.as_deref())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .db()?;
        rows.iter().map(product_from_row).collect()
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .db()?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn create_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, price, description, category, stock, images, average_rating, \
             rating_count, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(product.id))
        .bind(&product.name)
        .bind(product.price.to_string())
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.stock)
        .bind(to_json(&product.images)?)
        .bind(product.average_rating)
        .bind(product.rating_count)
        .bind(ts(product.created_at))
        .execute(&self.pool)
        .await
        .db()?;
        Ok(())
    }

    async fn update_product(&self, id: Uuid, input: &ProductInput) -> Result<Option<Product>> {
        let done = sqlx::query(
            "UPDATE products SET name = ?, price = ?, description = ?, category = ?, stock = ?, images = ? \
             WHERE id = ?",
        )
        .bind(&input.name)
        .bind(input.price.to_string())
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.stock)
        .bind(to_json(&input.images)?)
        .bind(uuid_to_blob(id))
        .execute(&self.pool)
        .await
        .db()?;
        if done.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_product(id).await
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(done.rows_affected() > 0)
    }

    async fn add_product_image(&self, id: Uuid, url: &str) -> Result<Option<Product>> {
        let done = sqlx::query("UPDATE products SET images = json_insert(images, '$[#]', ?) WHERE id = ?")
            .bind(url)
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .db()?;
        if done.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_product(id).await
    }

    async fn add_rating(&self, rating: &Rating) -> Result<Product> {
        let mut tx = self.pool.begin().await.db()?;

        sqlx::query("INSERT INTO ratings (id, user_id, product_id, score, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(rating.id))
            .bind(uuid_to_blob(rating.user_id))
            .bind(uuid_to_blob(rating.product_id))
            .bind(i64::from(rating.score))
            .bind(ts(rating.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::DuplicateRating
                } else if is_foreign_key_violation(&err) {
                    AppError::not_found("Product", rating.product_id)
                } else {
                    db_error(err)
                }
            })?;

        // Recomputed from the ratings table, never incremented in place.
        sqlx::query(
            "UPDATE products SET \
             average_rating = (SELECT AVG(score) FROM ratings WHERE product_id = ?), \
             rating_count = (SELECT COUNT(*) FROM ratings WHERE product_id = ?) \
             WHERE id = ?",
        )
        .bind(uuid_to_blob(rating.product_id))
        .bind(uuid_to_blob(rating.product_id))
        .bind(uuid_to_blob(rating.product_id))
        .execute(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;

        self.get_product(rating.product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", rating.product_id))
    }

    async fn list_ratings(&self, product_id: Uuid) -> Result<Vec<Rating>> {
        let rows = sqlx::query(
            "SELECT id, user_id, product_id, score, created_at FROM ratings \
             WHERE product_id = ? ORDER BY created_at DESC",
        )
        .bind(uuid_to_blob(product_id))
        .fetch_all(&self.pool)
        .await
        .db()?;
        rows.iter()
            .map(|row| {
                let score: i64 = row.try_get("score").db()?;
                Ok(Rating {
                    id: id_col(row, "id")?,
                    user_id: id_col(row, "user_id")?,
                    product_id: id_col(row, "product_id")?,
                    score: u8::try_from(score)
                        .map_err(|_| AppError::Internal(format!("rating score {score} out of range")))?,
                    created_at: ts_col(row, "created_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_repo, seed_product};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn rating(user_id: Uuid, product_id: Uuid, score: u8) -> Rating {
        Rating {
            id: Uuid::now_v7(),
            user_id,
            product_id,
            score,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn search_is_case_insensitive_over_name_and_description() {
        let repo = memory_repo().await;
        seed_product(&repo, "Copper Kettle", Decimal::new(2_500, 2), 4).await;
        seed_product(&repo, "Tea Towel", Decimal::new(500, 2), 10).await;

        let filter = ProductFilter {
            category: None,
            search: Some("KETTLE".into()),
        };
        let found = repo.list_products(&filter, 100).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Copper Kettle");

        let filter = ProductFilter {
            category: Some("kitchen".into()),
            search: None,
        };
        assert_eq!(repo.list_products(&filter, 100).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn prices_keep_their_scale() {
        let repo = memory_repo().await;
        let product = seed_product(&repo, "Mug", Decimal::new(1_050, 2), 1).await;
        let stored = repo.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.price.to_string(), "10.50");
    }

    #[tokio::test]
    async fn aggregates_follow_every_rating() {
        let repo = memory_repo().await;
        let product = seed_product(&repo, "Teapot", Decimal::new(3_000, 2), 2).await;

        let after = repo.add_rating(&rating(Uuid::now_v7(), product.id, 5)).await.unwrap();
        assert_eq!((after.average_rating, after.rating_count), (5.0, 1));

        let after = repo.add_rating(&rating(Uuid::now_v7(), product.id, 2)).await.unwrap();
        assert_eq!((after.average_rating, after.rating_count), (3.5, 2));
        assert_eq!(repo.list_ratings(product.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_rating_by_same_user_is_rejected_without_touching_aggregate() {
        let repo = memory_repo().await;
        let product = seed_product(&repo, "Saucer", Decimal::new(400, 2), 2).await;
        let user = Uuid::now_v7();

        repo.add_rating(&rating(user, product.id, 4)).await.unwrap();
        let err = repo.add_rating(&rating(user, product.id, 1)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateRating));

        let stored = repo.get_product(product.id).await.unwrap().unwrap();
        assert_eq!((stored.average_rating, stored.rating_count), (4.0, 1));
    }

    #[tokio::test]
    async fn rating_a_missing_product_is_not_found() {
        let repo = memory_repo().await;
        let err = repo.add_rating(&rating(Uuid::now_v7(), Uuid::now_v7(), 3)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn images_are_appended_in_order() {
        let repo = memory_repo().await;
        let product = seed_product(&repo, "Plate", Decimal::ONE, 1).await;
        repo.add_product_image(product.id, "/media/a.png").await.unwrap();
        let stored = repo.add_product_image(product.id, "/media/b.png").await.unwrap().unwrap();
        assert_eq!(stored.images, vec!["/media/a.png", "/media/b.png"]);
        assert!(repo.add_product_image(Uuid::now_v7(), "/media/c.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn updates_preserve_rating_aggregates() {
        let repo = memory_repo().await;
        let product = seed_product(&repo, "Bowl", Decimal::ONE, 1).await;
        repo.add_rating(&rating(Uuid::now_v7(), product.id, 3)).await.unwrap();

        let input = ProductInput {
            name: "Large Bowl".into(),
            price: Decimal::new(1_200, 2),
            description: "Bigger".into(),
            category: "Kitchen".into(),
            stock: 7,
            images: vec![],
        };
        let updated = repo.update_product(product.id, &input).await.unwrap().unwrap();
        assert_eq!(updated.name, "Large Bowl");
        assert_eq!(updated.stock, 7);
        assert_eq!(updated.rating_count, 1);
    }
}
