//! Line items and the product payload they are built from

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::domain::value_objects::{parse_price, Quantity, TaxRate};

/// One product/quantity pair in the cart.
///
/// Serialized with camelCase names; this is the shape written to the local slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Server row id. `None` while the line only exists locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<i64>,
    /// Catalog id, `0` for lines that never linked to the server cart.
    #[serde(default)]
    pub product_id: i64,
    pub product_slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Display-encoded price, e.g. `"₹1,299.00"`. Parsed on every read.
    #[serde(default)]
    pub unit_price: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<String>,
}

impl LineItem {
    /// Build a local line from a product, resolving the unit price once.
    pub fn from_product(product: &ProductInput, quantity: Quantity) -> Self {
        Self {
            item_id: None,
            product_id: product.id.unwrap_or(0),
            product_slug: product.slug.clone(),
            title: product.title.clone(),
            image_url: product.image_url.clone(),
            unit_price: product.resolved_price(),
            quantity: quantity.value(),
            category: product.category.clone(),
            mrp: product.mrp.clone(),
            discounted_price: product.discounted_price.clone(),
        }
    }

    pub fn unit_price_value(&self) -> Decimal { parse_price(&self.unit_price) }
    pub fn tax_rate(&self) -> TaxRate { TaxRate::for_category(self.category.as_deref()) }

    /// Price times quantity, or `None` when the product overflows a `Decimal`.
    pub fn line_subtotal(&self) -> Option<Decimal> { self.unit_price_value().checked_mul(Decimal::from(self.quantity)) }
    pub fn line_tax(&self) -> Option<Decimal> { self.line_subtotal().and_then(|amount| self.tax_rate().apply(amount)) }
}

/// Product as handed over by the storefront when adding to the cart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProductInput {
    #[serde(default)]
    pub id: Option<i64>,
    #[validate(length(min = 1, message = "product slug is required"))]
    pub slug: String,
    #[validate(length(min = 1, message = "product title is required"))]
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub mrp: Option<String>,
    #[serde(default, alias = "website_price")]
    pub discounted_price: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ProductInput {
    /// Discounted price when both MRP and a discounted price are present,
    /// the plain price otherwise.
    pub fn resolved_price(&self) -> String {
        resolve_unit_price(self.price.as_deref(), self.mrp.as_deref(), self.discounted_price.as_deref())
    }

    /// Only catalog products with a positive id can be linked to the server cart.
    pub fn remote_id(&self) -> Option<i64> { self.id.filter(|id| *id > 0) }
}

/// Shared by local adds and rows coming back from the server.
pub fn resolve_unit_price(price: Option<&str>, mrp: Option<&str>, discounted: Option<&str>) -> String {
    fn present(v: Option<&str>) -> Option<&str> { v.map(str::trim).filter(|s| !s.is_empty()) }
    match (present(mrp), present(discounted)) {
        (Some(_), Some(discounted)) => discounted.to_string(),
        _ => price.unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ProductInput {
        ProductInput { id: Some(7), slug: "argan-oil".into(), title: "Argan Oil".into(), price: Some("₹899".into()), category: Some("Hair Oil".into()), ..Default::default() }
    }

    #[test]
    fn test_price_resolution_prefers_discount_with_mrp() {
        let mut p = product();
        p.mrp = Some("₹1,199".into());
        p.discounted_price = Some("₹999".into());
        assert_eq!(p.resolved_price(), "₹999");

        p.mrp = None;
        assert_eq!(p.resolved_price(), "₹899");

        p.mrp = Some("  ".into());
        assert_eq!(p.resolved_price(), "₹899");
    }

    #[test]
    fn test_line_tax_follows_category() {
        let hair = LineItem { unit_price: "1000".into(), ..LineItem::from_product(&product(), Quantity::new(2).unwrap()) };
        assert_eq!(hair.line_subtotal(), Some(Decimal::new(2000, 0)));
        assert_eq!(hair.line_tax(), Some(Decimal::new(100, 0)));

        let mut face = hair.clone();
        face.quantity = 1;
        face.category = Some("Face Cream".into());
        assert_eq!(face.line_tax(), Some(Decimal::new(180, 0)));
    }

    #[test]
    fn test_line_overflow_has_no_subtotal() {
        let huge = LineItem { unit_price: "₹100000000000000000000".into(), quantity: u32::MAX, ..LineItem::from_product(&product(), Quantity::new(1).unwrap()) };
        assert_eq!(huge.line_subtotal(), None);
        assert_eq!(huge.line_tax(), None);
    }

    #[test]
    fn test_product_validation() {
        assert!(product().validate().is_ok());
        let blank = ProductInput { slug: String::new(), ..product() };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_local_slot_shape_is_camel_case() {
        let line = LineItem::from_product(&product(), Quantity::new(1).unwrap());
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["productSlug"], "argan-oil");
        assert_eq!(json["unitPrice"], "₹899");
        assert!(json.get("itemId").is_none());
    }
}
