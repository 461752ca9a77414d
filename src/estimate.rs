use crate::models::UsageProfile;

/// Monthly GBP rate per provisioned GB for managed disk tiers.
const STORAGE_RATES_PER_GB: &[(&str, f64)] = &[
    ("Standard_LRS", 0.0418),
    ("StandardSSD_LRS", 0.0717),
    ("Premium_LRS", 0.1236),
];

pub fn monthly_cost(hourly_cost: f64, profile: UsageProfile) -> f64 {
    hourly_cost * profile.hours_per_month * profile.discount_factor
}

pub fn storage_rate_per_gb(tier: &str) -> Option<f64> {
    STORAGE_RATES_PER_GB
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tier))
        .map(|(_, rate)| *rate)
}

/// Monthly cost of a disk of `size_gb`, or `None` for a tier without a rate.
pub fn storage_monthly_cost(size_gb: u64, tier: &str) -> Option<f64> {
    storage_rate_per_gb(tier).map(|rate| size_gb as f64 * rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn monthly_cost_uses_full_month_by_default() {
        assert_eq!(monthly_cost(10.0, UsageProfile::default()), 7300.0);
    }

    #[test]
    fn monthly_cost_is_linear_in_each_argument() {
        let base = monthly_cost(0.5, UsageProfile::hours(200.0).with_discount(0.8));
        assert!(approx(
            monthly_cost(1.0, UsageProfile::hours(200.0).with_discount(0.8)),
            base * 2.0
        ));
        assert!(approx(
            monthly_cost(0.5, UsageProfile::hours(400.0).with_discount(0.8)),
            base * 2.0
        ));
        assert!(approx(
            monthly_cost(0.5, UsageProfile::hours(200.0).with_discount(0.4)),
            base / 2.0
        ));
        assert_eq!(monthly_cost(0.0, UsageProfile::default()), 0.0);
    }

    #[test]
    fn storage_cost_scales_with_size() {
        let rate = storage_rate_per_gb("Premium_LRS").expect("premium rate");
        let cost = storage_monthly_cost(128, "Premium_LRS").expect("premium cost");
        assert!(approx(cost, 128.0 * rate));
        assert!(storage_monthly_cost(64, "standardssd_lrs").is_some());
    }

    #[test]
    fn storage_cost_for_unknown_tier_is_none() {
        assert!(storage_monthly_cost(128, "UltraSSD_LRS").is_none());
        assert!(storage_monthly_cost(128, "").is_none());
    }
}
