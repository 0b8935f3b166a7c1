//! Populates a ShopMate database with an admin, a sample customer, a small
//! catalog and FAQs. Records that already exist are left alone.
//!
//! Reads `SHOPMATE__DATABASE__URL` (default `sqlite:shopmate.db`).

use chrono::Utc;
use rust_decimal::Decimal;
use sm_core::models::{ProductFilter, ProductInput, Role, User};
use sm_core::services::{catalog, support};
use sm_core::traits::ShopRepo;
use sm_db_sqlite::SqliteRepo;
use uuid::Uuid;

struct SeedUser {
    name: &'static str,
    email: &'static str,
    password: &'static str,
    role: Role,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        name: "Admin User",
        email: "admin@shopmate.com",
        password: "admin123",
        role: Role::Admin,
    },
    SeedUser {
        name: "John Doe",
        email: "john@example.com",
        password: "password123",
        role: Role::User,
    },
];

/// name, price in cents, category, stock, description
const PRODUCTS: &[(&str, i64, &str, i64, &str)] = &[
    ("Premium Wireless Headphones", 29999, "Electronics", 25,
     "High-quality wireless headphones with noise cancellation and premium sound quality."),
    ("Smart Fitness Watch", 19999, "Electronics", 15,
     "Fitness tracker with heart rate monitoring, GPS and smart notifications."),
    ("Ergonomic Office Chair", 44999, "Furniture", 8,
     "Ergonomic office chair with lumbar support and adjustable height."),
    ("Organic Coffee Beans", 2499, "Food & Beverages", 50,
     "Organic coffee beans sourced from sustainable farms."),
    ("Modern Table Lamp", 7999, "Home & Garden", 20,
     "Table lamp with adjustable brightness and warm LED lighting."),
    ("Casual Cotton T-Shirt", 2999, "Clothing", 100,
     "Soft cotton t-shirt with a relaxed fit for everyday wear."),
    ("Yoga Mat Premium", 4999, "Sports & Outdoors", 30,
     "Yoga mat with superior grip and cushioning."),
    ("Bluetooth Speaker", 8999, "Electronics", 35,
     "Portable waterproof Bluetooth speaker with long battery life."),
];

/// question, answer, category
const FAQS: &[(&str, &str, &str)] = &[
    ("How do I track my order?",
     "Once your order ships you will receive an email update. You can also check its status under your orders.",
     "Orders"),
    ("What is your return policy?",
     "Items in original condition can be returned within 30 days. Open a support ticket to start a return.",
     "Returns"),
    ("Do you offer international shipping?",
     "Yes. Rates and delivery times vary by destination.",
     "Shipping"),
    ("How can I cancel my order?",
     "Pending and confirmed orders can be cancelled from your order page. Shipped orders cannot be cancelled.",
     "Orders"),
    ("What payment methods do you accept?",
     "All major credit cards and other secure payment methods offered at checkout.",
     "Payment"),
];

async fn seed_users(repo: &dyn ShopRepo) -> anyhow::Result<()> {
    for seed in USERS {
        if repo.find_user_by_email(seed.email).await?.is_some() {
            log::info!("user {} already exists", seed.email);
            continue;
        }
        let user = User {
            id: Uuid::now_v7(),
            name: seed.name.to_string(),
            email: seed.email.to_string(),
            password_hash: sm_auth_simple::hash_password(seed.password)?,
            role: seed.role,
            verified: true,
            pending_otp: None,
            mobile: None,
            address: None,
            created_at: Utc::now(),
        };
        repo.create_user(&user).await?;
        log::info!("created {} {} / {}", seed.role, seed.email, seed.password);
    }
    Ok(())
}

async fn seed_products(repo: &dyn ShopRepo) -> anyhow::Result<()> {
    let existing = catalog::list_products(repo, &ProductFilter::default()).await?;
    if !existing.is_empty() {
        log::info!("catalog already has {} products", existing.len());
        return Ok(());
    }
    for &(name, cents, category, stock, description) in PRODUCTS {
        catalog::create_product(
            repo,
            ProductInput {
                name: name.to_string(),
                price: Decimal::new(cents, 2),
                description: description.to_string(),
                category: category.to_string(),
                stock,
                images: Vec::new(),
            },
        )
        .await?;
    }
    log::info!("created {} products", PRODUCTS.len());
    Ok(())
}

async fn seed_faqs(repo: &dyn ShopRepo) -> anyhow::Result<()> {
    let existing = support::list_faqs(repo, None).await?;
    if !existing.is_empty() {
        log::info!("{} FAQs already exist", existing.len());
        return Ok(());
    }
    for &(question, answer, category) in FAQS {
        support::create_faq(
            repo,
            support::NewFaq {
                question: question.to_string(),
                answer: answer.to_string(),
                category: category.to_string(),
            },
        )
        .await?;
    }
    log::info!("created {} FAQs", FAQS.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let url = std::env::var("SHOPMATE__DATABASE__URL").unwrap_or_else(|_| "sqlite:shopmate.db".to_string());
    let repo = SqliteRepo::connect(&url, 1).await?;

    seed_users(&repo).await?;
    seed_products(&repo).await?;
    seed_faqs(&repo).await?;

    log::info!("seeding complete");
    Ok(())
}
