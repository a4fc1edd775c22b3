//! Subscription tiers and the static plan catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Pro,
    Unlimited,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Unlimited => "unlimited",
        }
    }

    pub fn is_paid(&self) -> bool {
        *self != Tier::Free
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchasable plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionPlan {
    /// Plan identifier, equal to the tier name
    pub id: &'static str,
    pub tier: Tier,
    pub display_name: &'static str,
    /// Price in rubles
    pub price: u32,
    pub duration_days: i64,
    /// Requests granted on activation (`-1` = unlimited)
    pub request_allotment: i64,
    /// Price in Telegram Stars
    pub stars_price: u32,
}

/// Currency code for ruble-denominated payments.
pub const CURRENCY_RUB: &str = "RUB";
/// Currency code Telegram uses for Stars.
pub const CURRENCY_STARS: &str = "XTR";

pub static PLANS: [SubscriptionPlan; 3] = [
    SubscriptionPlan {
        id: "basic",
        tier: Tier::Basic,
        display_name: "Basic",
        price: 99,
        duration_days: 7,
        request_allotment: 100,
        stars_price: 50,
    },
    SubscriptionPlan {
        id: "pro",
        tier: Tier::Pro,
        display_name: "Pro",
        price: 299,
        duration_days: 30,
        request_allotment: 1000,
        stars_price: 150,
    },
    SubscriptionPlan {
        id: "unlimited",
        tier: Tier::Unlimited,
        display_name: "Unlimited",
        price: 699,
        duration_days: 30,
        request_allotment: -1,
        stars_price: 350,
    },
];

/// Look up a plan by identifier.
pub fn find(id: &str) -> Option<&'static SubscriptionPlan> {
    PLANS.iter().find(|p| p.id == id)
}

/// Plan for a paid tier. `None` for Free.
pub fn for_tier(tier: Tier) -> Option<&'static SubscriptionPlan> {
    PLANS.iter().find(|p| p.tier == tier)
}

impl SubscriptionPlan {
    pub fn is_unlimited(&self) -> bool {
        self.request_allotment < 0
    }

    /// Amount charged in the given currency, if the plan is sold in it.
    pub fn price_in(&self, currency: &str) -> Option<u32> {
        match currency {
            CURRENCY_RUB => Some(self.price),
            CURRENCY_STARS => Some(self.stars_price),
            _ => None,
        }
    }

    /// One-line summary for chat listings.
    pub fn summary(&self) -> String {
        let requests = if self.is_unlimited() {
            "unlimited requests".to_string()
        } else {
            format!("{} requests", self.request_allotment)
        };
        format!(
            "{} ({}): {} RUB / {} days, {}",
            self.display_name, self.id, self.price, self.duration_days, requests
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_plans() {
        assert_eq!(find("basic").map(|p| p.tier), Some(Tier::Basic));
        assert_eq!(find("pro").map(|p| p.request_allotment), Some(1000));
        assert!(find("unlimited").unwrap().is_unlimited());
    }

    #[test]
    fn test_find_unknown_plan() {
        assert!(find("free").is_none());
        assert!(find("PRO").is_none());
        assert!(find("").is_none());
    }

    #[test]
    fn test_every_paid_tier_has_a_plan() {
        for tier in [Tier::Basic, Tier::Pro, Tier::Unlimited] {
            assert_eq!(for_tier(tier).map(|p| p.tier), Some(tier));
        }
        assert!(for_tier(Tier::Free).is_none());
    }

    #[test]
    fn test_price_in_currency() {
        let pro = find("pro").unwrap();
        assert_eq!(pro.price_in(CURRENCY_RUB), Some(299));
        assert_eq!(pro.price_in(CURRENCY_STARS), Some(150));
        assert_eq!(pro.price_in("USD"), None);
    }

    #[test]
    fn test_tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Unlimited).unwrap(), "\"unlimited\"");
        let tier: Tier = serde_json::from_str("\"basic\"").unwrap();
        assert_eq!(tier, Tier::Basic);
    }
}
