//! Read-only service catalog
//!
//! Prices order drafts before they reach the wallet: the storefront picks a
//! service and a quantity, the catalog validates both and quotes
//! `quantity × rate`. Catalog management itself lives with the backoffice
//! collaborator; this side only reads.

use crate::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One sellable service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Stable id, e.g. "ig-followers"
    pub id: String,

    /// Display name, e.g. "Instagram Followers"
    pub name: String,

    /// Platform category, e.g. "Instagram"
    pub category: String,

    /// Price per unit
    pub rate: Decimal,

    /// Minimum orderable quantity
    pub min_quantity: u32,

    /// Maximum orderable quantity
    pub max_quantity: u32,

    /// Whether the service is currently sold
    pub active: bool,

    /// Optional description
    pub description: Option<String>,
}

impl Service {
    /// New active service
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        rate: Decimal,
        min_quantity: u32,
        max_quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            rate,
            min_quantity,
            max_quantity,
            active: true,
            description: None,
        }
    }

    /// Mark the service as not currently sold
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Read-only table of sellable services
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    services: HashMap<String, Service>,
}

impl Catalog {
    /// Catalog over the given services
    pub fn new(services: Vec<Service>) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|service| (service.id.clone(), service))
                .collect(),
        }
    }

    /// The storefront's stock catalog
    pub fn storefront() -> Self {
        Self::new(vec![
            Service::new(
                "ig-followers",
                "Instagram Followers",
                "Instagram",
                Decimal::new(25, 3),
                100,
                10_000,
            ),
            Service::new(
                "ig-likes",
                "Instagram Likes",
                "Instagram",
                Decimal::new(15, 3),
                50,
                5_000,
            ),
            Service::new(
                "yt-views",
                "YouTube Views",
                "YouTube",
                Decimal::new(3, 3),
                1_000,
                100_000,
            ),
            Service::new(
                "yt-likes",
                "YouTube Likes",
                "YouTube",
                Decimal::new(20, 3),
                50,
                2_000,
            ),
            Service::new(
                "tiktok-views",
                "TikTok Views",
                "TikTok",
                Decimal::new(35, 4),
                1_000,
                50_000,
            ),
            Service::new(
                "twitter-followers",
                "Twitter Followers",
                "Twitter",
                Decimal::new(30, 3),
                100,
                5_000,
            ),
        ])
    }

    /// Look up a service by id
    pub fn get(&self, service_id: &str) -> Option<&Service> {
        self.services.get(service_id)
    }

    /// All services, sorted by id for stable listings
    pub fn services(&self) -> Vec<&Service> {
        let mut all: Vec<&Service> = self.services.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Price a quantity of a service, validating it is orderable
    ///
    /// Quotes are rounded to cents, away from zero on the midpoint, which
    /// is what the storefront displays.
    pub fn quote(&self, service_id: &str, quantity: u32) -> Result<Decimal> {
        let service = self
            .get(service_id)
            .ok_or_else(|| Error::UnknownService(service_id.to_string()))?;

        if !service.active {
            return Err(Error::ServiceInactive(service_id.to_string()));
        }

        if quantity < service.min_quantity || quantity > service.max_quantity {
            return Err(Error::QuantityOutOfRange {
                service: service_id.to_string(),
                quantity,
                min: service.min_quantity,
                max: service.max_quantity,
            });
        }

        Ok((service.rate * Decimal::from(quantity))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storefront_quotes() {
        let catalog = Catalog::storefront();
        assert_eq!(catalog.len(), 6);

        // 1000 Instagram followers at 0.025/unit
        assert_eq!(
            catalog.quote("ig-followers", 1000).unwrap(),
            Decimal::new(2500, 2)
        );

        // 10000 TikTok views at 0.0035/unit
        assert_eq!(
            catalog.quote("tiktok-views", 10_000).unwrap(),
            Decimal::new(3500, 2)
        );
    }

    #[test]
    fn test_quote_rounds_to_cents() {
        let catalog = Catalog::storefront();
        // 55 * 0.015 = 0.825 -> 0.83
        assert_eq!(catalog.quote("ig-likes", 55).unwrap(), Decimal::new(83, 2));
    }

    #[test]
    fn test_quote_rejections() {
        let catalog = Catalog::storefront();

        assert!(matches!(
            catalog.quote("fb-likes", 100),
            Err(Error::UnknownService(_))
        ));

        assert!(matches!(
            catalog.quote("ig-followers", 50),
            Err(Error::QuantityOutOfRange { min: 100, .. })
        ));
        assert!(matches!(
            catalog.quote("ig-followers", 20_000),
            Err(Error::QuantityOutOfRange { max: 10_000, .. })
        ));

        let catalog = Catalog::new(vec![Service::new(
            "ig-followers",
            "Instagram Followers",
            "Instagram",
            Decimal::new(25, 3),
            100,
            10_000,
        )
        .deactivated()]);
        assert!(matches!(
            catalog.quote("ig-followers", 1000),
            Err(Error::ServiceInactive(_))
        ));
    }

    #[test]
    fn test_services_sorted_by_id() {
        let catalog = Catalog::storefront();
        let ids: Vec<&str> = catalog.services().iter().map(|s| s.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
