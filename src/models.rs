use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CURRENCY: &str = "GBP";
pub const CURRENCY_SYMBOL: &str = "£";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceFamily {
    Compute,
    Storage,
    Networking,
    Databases,
}

impl ServiceFamily {
    pub fn as_filter_value(self) -> &'static str {
        match self {
            ServiceFamily::Compute => "Compute",
            ServiceFamily::Storage => "Storage",
            ServiceFamily::Networking => "Networking",
            ServiceFamily::Databases => "Databases",
        }
    }

    /// Pricing family for an ARM resource type, keyed on its provider namespace.
    pub fn for_resource_type(type_name: &str) -> Option<Self> {
        let namespace = type_name.split('/').next()?.to_ascii_lowercase();
        match namespace.as_str() {
            "microsoft.compute" => Some(ServiceFamily::Compute),
            "microsoft.storage" => Some(ServiceFamily::Storage),
            "microsoft.network" => Some(ServiceFamily::Networking),
            "microsoft.sql" | "microsoft.dbforpostgresql" | "microsoft.dbformysql"
            | "microsoft.documentdb" => Some(ServiceFamily::Databases),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceQuery {
    pub sku: String,
    pub region: String,
    pub family: ServiceFamily,
}

impl PriceQuery {
    pub fn new(sku: &str, region: &str, family: ServiceFamily) -> Self {
        Self {
            sku: sku.to_string(),
            region: region.to_string(),
            family,
        }
    }

    pub fn compute(sku: &str, region: &str) -> Self {
        Self::new(sku, region, ServiceFamily::Compute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceResult {
    pub hourly_cost: f64,
    pub currency: &'static str,
}

impl PriceResult {
    pub fn gbp(hourly_cost: f64) -> Self {
        Self {
            hourly_cost,
            currency: CURRENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageProfile {
    pub hours_per_month: f64,
    pub discount_factor: f64,
}

impl UsageProfile {
    pub const HOURS_PER_MONTH: f64 = 730.0;

    pub fn hours(hours_per_month: f64) -> Self {
        Self {
            hours_per_month,
            ..Self::default()
        }
    }

    pub fn with_discount(self, discount_factor: f64) -> Self {
        Self {
            discount_factor,
            ..self
        }
    }
}

impl Default for UsageProfile {
    fn default() -> Self {
        Self {
            hours_per_month: Self::HOURS_PER_MONTH,
            discount_factor: 1.0,
        }
    }
}

/// How a VM is expected to be used over a month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Workload {
    /// Pooled desktop hosts that are deallocated outside working hours.
    VirtualDesktop,
    AlwaysOn,
}

/// Resource type as reported by the management API, narrowed to the kinds
/// the estimator treats differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    VirtualMachine,
    Disk,
    VmExtension,
    Other(String),
}

impl ResourceKind {
    pub fn from_type(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "microsoft.compute/virtualmachines" => ResourceKind::VirtualMachine,
            "microsoft.compute/disks" => ResourceKind::Disk,
            "microsoft.compute/virtualmachines/extensions" => ResourceKind::VmExtension,
            _ => ResourceKind::Other(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub display_name: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub resource_group: String,
    pub kind: ResourceKind,
    pub type_name: String,
    pub name: String,
    pub location: String,
    pub sku: Option<String>,
    pub disk_size_gb: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub vm_size: String,
    pub power_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedDisk {
    pub id: String,
    pub tier: Option<String>,
    pub size_gb: Option<u64>,
}

/// The six monthly figures estimated for one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub nominal: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub nominal_with_savings: f64,
    pub minimum_with_savings: f64,
    pub maximum_with_savings: f64,
}

impl std::ops::AddAssign for CostBreakdown {
    fn add_assign(&mut self, rhs: Self) {
        self.nominal += rhs.nominal;
        self.minimum += rhs.minimum;
        self.maximum += rhs.maximum;
        self.nominal_with_savings += rhs.nominal_with_savings;
        self.minimum_with_savings += rhs.minimum_with_savings;
        self.maximum_with_savings += rhs.maximum_with_savings;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCost {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub vm_size: String,
    pub power_state: Option<String>,
    pub workload: Workload,
    pub hourly_cost: Option<f64>,
    pub breakdown: Option<CostBreakdown>,
}

/// A listed resource with whatever cost could be estimated for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCost {
    pub record: ResourceRecord,
    pub hourly_cost: Option<f64>,
    pub monthly_cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupListing {
    pub name: String,
    pub resources: Vec<ResourceCost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub subscription_id: String,
    pub lines: Vec<VmCost>,
    pub totals: CostBreakdown,
    pub generated_at: DateTime<Utc>,
}
