//! Cart Aggregate

use rust_decimal::Decimal;
use serde::Serialize;
use crate::domain::aggregates::LineItem;
use crate::domain::loyalty::LoyaltyFormula;
use crate::domain::value_objects::Quantity;

/// In-memory cart lines. Pure state: persistence is the store's concern.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cart {
    items: Vec<LineItem>,
}

/// Totals derived from the lines on every read.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub coins_earned: u64,
    pub item_count: u64,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Zero-quantity rows are dropped; they never enter the cart.
    pub fn from_items(items: Vec<LineItem>) -> Self {
        Self { items: items.into_iter().filter(|i| i.quantity > 0).collect() }
    }

    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn get(&self, index: usize) -> Option<&LineItem> { self.items.get(index) }
    pub fn find_by_item_id(&self, item_id: i64) -> Option<&LineItem> { self.items.iter().find(|i| i.item_id == Some(item_id)) }
    pub fn line_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds to the existing line with the same slug, or appends a new one.
    pub fn merge_by_slug(&mut self, item: LineItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_slug == item.product_slug) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else if item.quantity > 0 {
            self.items.push(item);
        }
    }

    pub fn set_quantity_at(&mut self, index: usize, quantity: Quantity) -> Result<(), CartError> {
        let item = self.items.get_mut(index).ok_or(CartError::LineNotFound(index))?;
        item.quantity = quantity.value();
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<LineItem, CartError> {
        if index >= self.items.len() { return Err(CartError::LineNotFound(index)); }
        Ok(self.items.remove(index))
    }

    pub fn replace(&mut self, items: Vec<LineItem>) { *self = Self::from_items(items); }
    pub fn clear(&mut self) { self.items.clear(); }

    pub fn subtotal(&self) -> Decimal { self.totals().0 }
    pub fn tax(&self) -> Decimal { self.totals().1 }
    pub fn item_count(&self) -> u64 { self.items.iter().map(|i| u64::from(i.quantity)).sum() }

    /// Subtotal and tax, summed per line so mixed-category carts get mixed rates.
    ///
    /// A line whose amounts overflow a `Decimal`, on its own or added to the
    /// running totals, is priced like an unparseable price: it contributes
    /// nothing. `subtotal + tax` always fits.
    fn totals(&self) -> (Decimal, Decimal) {
        let mut subtotal = Decimal::ZERO;
        let mut tax = Decimal::ZERO;
        for item in &self.items {
            let next = item.line_subtotal().zip(item.line_tax()).and_then(|(line_subtotal, line_tax)| {
                let s = subtotal.checked_add(line_subtotal)?;
                let t = tax.checked_add(line_tax)?;
                s.checked_add(t).map(|_| (s, t))
            });
            match next {
                Some((s, t)) => { subtotal = s; tax = t; }
                None => tracing::warn!(slug = %item.product_slug, price = %item.unit_price, quantity = item.quantity, "Line amount out of range, priced at zero"),
            }
        }
        (subtotal, tax)
    }

    pub fn snapshot(&self, loyalty: &dyn LoyaltyFormula) -> CartSnapshot {
        let (subtotal, tax) = self.totals();
        let total = subtotal + tax;
        CartSnapshot {
            items: self.items.clone(),
            subtotal,
            tax,
            total,
            coins_earned: loyalty.coins_for(total),
            item_count: self.item_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { LineNotFound(usize) }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::LineNotFound(index) => write!(f, "No cart line at position {index}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loyalty::SpendPerCoin;

    fn line(slug: &str, price: &str, quantity: u32, category: Option<&str>) -> LineItem {
        LineItem {
            item_id: None, product_id: 0, product_slug: slug.into(), title: slug.into(), image_url: None,
            unit_price: price.into(), quantity, category: category.map(Into::into), mrp: None, discounted_price: None,
        }
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        cart.merge_by_slug(line("x", "10", 1, None));
        cart.merge_by_slug(line("x", "10", 2, None));
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        cart.merge_by_slug(line("y", "5", 1, None));
        assert_eq!(cart.item_count(), 4);

        cart.set_quantity_at(1, Quantity::new(4).unwrap()).unwrap();
        assert_eq!(cart.subtotal(), Decimal::new(50, 0));

        let removed = cart.remove_at(0).unwrap();
        assert_eq!(removed.product_slug, "x");
        assert_eq!(cart.remove_at(5), Err(CartError::LineNotFound(5)));
    }

    #[test]
    fn test_mixed_category_scenario() {
        let cart = Cart::from_items(vec![
            line("mask", "500", 1, Some("Hair Mask")),
            line("serum", "1000", 2, Some("Face Serum")),
        ]);
        let snap = cart.snapshot(&SpendPerCoin::default());
        assert_eq!(snap.subtotal, Decimal::new(2500, 0));
        assert_eq!(snap.tax, Decimal::new(385, 0));
        assert_eq!(snap.total, Decimal::new(2885, 0));
        assert_eq!(snap.total, snap.subtotal + snap.tax);
        assert_eq!(snap.coins_earned, 28);
    }

    #[test]
    fn test_unparseable_price_counts_as_zero() {
        let cart = Cart::from_items(vec![line("gift", "N/A", 3, None), line("comb", "₹1,000", 1, Some("hair tools"))]);
        assert_eq!(cart.subtotal(), Decimal::new(1000, 0));
        assert_eq!(cart.tax(), Decimal::new(50, 0));
    }

    #[test]
    fn test_overflowing_line_is_priced_at_zero() {
        let cart = Cart::from_items(vec![
            line("gold", "₹100000000000000000000", u32::MAX, None),
            line("comb", "100", 1, None),
        ]);
        let snap = cart.snapshot(&SpendPerCoin::default());
        assert_eq!(snap.subtotal, Decimal::new(100, 0));
        assert_eq!(snap.tax, Decimal::new(18, 0));
        assert_eq!(snap.total, snap.subtotal + snap.tax);
        assert_eq!(snap.items.len(), 2);
    }

    #[test]
    fn test_running_total_overflow_skips_line() {
        // Each line fits on its own; the second would push the sums past Decimal::MAX.
        let cart = Cart::from_items(vec![
            line("a", "50000000000000000000000000000", 1, Some("hair")),
            line("b", "50000000000000000000000000000", 1, Some("hair")),
        ]);
        let snap = cart.snapshot(&SpendPerCoin::default());
        assert_eq!(snap.subtotal, Decimal::new(5, 0) * Decimal::new(10_000_000_000_000, 0) * Decimal::new(1_000_000_000_000_000, 0));
        assert_eq!(snap.total, snap.subtotal + snap.tax);
        assert_eq!(snap.item_count, 2);
    }

    #[test]
    fn test_zero_quantity_rows_are_dropped() {
        let cart = Cart::from_items(vec![line("a", "1", 0, None), line("b", "1", 1, None)]);
        assert_eq!(cart.line_count(), 1);
        assert!(cart.items().iter().all(|i| i.quantity >= 1));
    }
}
