//! Common types used across the HotelRAG system

use serde::{Deserialize, Serialize};

/// Fixed-length vector produced by an embedding provider.
pub type Embedding = Vec<f32>;

/// Ordered result of a similarity query, most similar first.
pub type MatchSet = Vec<Match>;

/// Structured constraints narrowing a similarity query.
///
/// A `None` bound means unconstrained on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl Filter {
    /// Build a filter, discarding bounds that cannot constrain a price
    /// (negative or non-finite) and swapping inverted bounds.
    pub fn new(min_price: Option<f64>, max_price: Option<f64>) -> Self {
        let valid = |v: Option<f64>| v.filter(|p| p.is_finite() && *p >= 0.0);
        let (mut min_price, mut max_price) = (valid(min_price), valid(max_price));

        if let (Some(lo), Some(hi)) = (min_price, max_price) {
            if lo > hi {
                min_price = Some(hi);
                max_price = Some(lo);
            }
        }

        Self { min_price, max_price }
    }

    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.min_price.is_none() && self.max_price.is_none()
    }

    /// Whether a record with the given price satisfies this filter.
    ///
    /// Records without a price only pass an empty filter.
    pub fn accepts(&self, price: Option<f64>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(price) = price else {
            return false;
        };
        self.min_price.is_none_or(|lo| price >= lo) && self.max_price.is_none_or(|hi| price <= hi)
    }
}

/// A retrieved listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    /// Denormalized text suitable for prompt inclusion.
    pub document: String,
    /// Display/reference field, typically the listing URL.
    pub reference: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub similarity: Option<f32>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl Match {
    pub fn new(
        id: impl Into<String>,
        document: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            document: document.into(),
            reference: reference.into(),
            name: None,
            similarity: None,
            price: None,
        }
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_discards_invalid_bounds() {
        let filter = Filter::new(Some(-5.0), Some(f64::NAN));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_filter_swaps_inverted_bounds() {
        let filter = Filter::new(Some(20000.0), Some(5000.0));
        assert_eq!(filter.min_price, Some(5000.0));
        assert_eq!(filter.max_price, Some(20000.0));
    }

    #[test]
    fn test_filter_accepts() {
        let filter = Filter::new(None, Some(10000.0));
        assert!(filter.accepts(Some(9999.0)));
        assert!(!filter.accepts(Some(10001.0)));
        assert!(!filter.accepts(None));
        assert!(Filter::unconstrained().accepts(None));
    }
}
