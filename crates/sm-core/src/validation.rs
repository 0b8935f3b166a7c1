//! Input checks shared by the services. Each returns the normalized value.

use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::models::{Address, ProductInput};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PRODUCT_NAME_LEN: usize = 200;
pub const MAX_NAME_LEN: usize = 100;

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::ValidationError(msg.into())
}

fn required(field: &str, raw: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn digits(field: &str, raw: &str, len: usize) -> Result<String> {
    let value = raw.trim();
    if value.len() != len || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("{field} must be exactly {len} digits")));
    }
    Ok(value.to_string())
}

/// Lower-cased, trimmed; one `@` with a dotted domain.
pub fn email(raw: &str) -> Result<String> {
    let value = raw.trim().to_lowercase();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(invalid(format!("'{}' is not a valid email address", raw.trim())));
    }
    Ok(value)
}

pub fn password(raw: &str) -> Result<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn name(raw: &str) -> Result<String> {
    let value = required("name", raw)?;
    if value.chars().count() > MAX_NAME_LEN {
        return Err(invalid(format!("name must be at most {MAX_NAME_LEN} characters")));
    }
    Ok(value)
}

pub fn mobile(raw: &str) -> Result<String> {
    digits("mobile number", raw, 10)
}

pub fn postal_code(raw: &str) -> Result<String> {
    digits("postal code", raw, 6)
}

pub fn address(raw: Address) -> Result<Address> {
    Ok(Address {
        name: required("address name", &raw.name)?,
        phone: digits("address phone", &raw.phone, 10)?,
        street: required("street", &raw.street)?,
        city: required("city", &raw.city)?,
        state: required("state", &raw.state)?,
        postal_code: postal_code(&raw.postal_code)?,
        country: required("country", &raw.country)?,
    })
}

pub fn product(raw: ProductInput) -> Result<ProductInput> {
    let name = required("product name", &raw.name)?;
    if name.chars().count() > MAX_PRODUCT_NAME_LEN {
        return Err(invalid(format!(
            "product name must be at most {MAX_PRODUCT_NAME_LEN} characters"
        )));
    }
    if raw.price < Decimal::ZERO {
        return Err(invalid("price cannot be negative"));
    }
    if raw.stock < 0 {
        return Err(invalid("stock cannot be negative"));
    }
    Ok(ProductInput {
        name,
        price: raw.price,
        description: raw.description.trim().to_string(),
        category: required("category", &raw.category)?,
        stock: raw.stock,
        images: raw.images,
    })
}

pub fn text(field: &str, raw: &str) -> Result<String> {
    required(field, raw)
}
