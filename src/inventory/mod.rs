use crate::error::AppError;
use crate::models::{ManagedDisk, ResourceGroup, ResourceRecord, Subscription, VirtualMachine};
use async_trait::async_trait;

pub mod azure;

/// Read-only view of a cloud account's inventory.
#[async_trait]
pub trait Inventory {
    async fn subscriptions(&self) -> Result<Vec<Subscription>, AppError>;

    async fn resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>, AppError>;

    async fn resources_in_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ResourceRecord>, AppError>;

    async fn virtual_machines(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<VirtualMachine>, AppError>;

    async fn disks(&self, subscription_id: &str) -> Result<Vec<ManagedDisk>, AppError>;
}

/// Extracts the resource group segment from an ARM resource id.
pub fn resource_group_from_id(id: &str) -> Option<&str> {
    let mut parts = id.split('/');
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case("resourceGroups") {
            return parts.next().filter(|s| !s.is_empty());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_group_from_id_finds_segment() {
        assert_eq!(
            resource_group_from_id(
                "/subscriptions/s/resourceGroups/RG-Prod/providers/Microsoft.Compute/disks/d1"
            ),
            Some("RG-Prod")
        );
        assert_eq!(
            resource_group_from_id("/subscriptions/s/resourcegroups/rg1/providers/x"),
            Some("rg1")
        );
        assert_eq!(resource_group_from_id("/subscriptions/s"), None);
    }
}
