use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator-supplied fields for a new catalog entry. The store assigns the id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
}

/// Partial update. `None` fields keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub category: Option<String>,
}

/// Fields the catalog can be filtered on. Equality only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogField {
    Name,
    Category,
}

impl CatalogField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Category => "category",
        }
    }

    pub fn value_of<'a>(&self, product: &'a Product) -> &'a str {
        match self {
            Self::Name => &product.name,
            Self::Category => &product.category,
        }
    }
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_label("name", &self.name)?;
        validate_label("category", &self.category)?;
        validate_price(self.price)
    }

    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            ..self
        }
    }
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.stock.is_none() && self.category.is_none()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            validate_label("name", name)?;
        }
        if let Some(category) = &self.category {
            validate_label("category", category)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }

    /// Merges the patch onto `product`, last writer wins per field.
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = &self.category {
            product.category = category.trim().to_string();
        }
        product.updated_at = now;
    }
}

fn validate_label(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidProduct(format!("{field} must not be blank")));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), DomainError> {
    if price < Decimal::ZERO {
        return Err(DomainError::InvalidProduct("price must not be negative".to_string()));
    }
    Ok(())
}
