use crate::aggregate::{build_report, vm_cost};
use crate::auth::access_token;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::estimate::{monthly_cost, storage_monthly_cost};
use crate::inventory::azure::ArmInventory;
use crate::inventory::Inventory;
use crate::models::{
    CostReport, GroupListing, ManagedDisk, PriceQuery, ResourceCost, ResourceKind,
    ResourceRecord, ServiceFamily, Subscription, UsageProfile, VirtualMachine, VmCost,
};
use crate::pricing::PriceLookup;
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, info};

pub fn http_client() -> Result<Client, AppError> {
    Ok(Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

pub struct ResourceCostReport {
    pub groups: Vec<GroupListing>,
    pub report: CostReport,
}

pub struct CostService<I> {
    inventory: I,
    prices: PriceLookup,
    desktop_marker: String,
}

impl CostService<ArmInventory> {
    /// Authenticates and builds a service against the live management and
    /// pricing endpoints named in `cfg`.
    pub async fn connect(cfg: &AppConfig) -> Result<Self, AppError> {
        let token = access_token(cfg).await?;
        let client = http_client()?;
        let inventory = ArmInventory::new(client.clone(), cfg.management_url.clone(), token.token);
        Ok(Self::new(
            inventory,
            PriceLookup::new(client, cfg.pricing_url.clone()),
            cfg.desktop_marker.clone(),
        ))
    }
}

fn sort_key(s: &str) -> String {
    s.to_lowercase()
}

fn sort_listing(groups: &mut [GroupListing]) {
    groups.sort_by_key(|g| sort_key(&g.name));
    for group in groups.iter_mut() {
        group.resources.sort_by_key(|r| {
            (
                sort_key(&r.record.type_name),
                sort_key(&r.record.name),
            )
        });
    }
}

fn unpriced(record: ResourceRecord) -> ResourceCost {
    ResourceCost {
        record,
        hourly_cost: None,
        monthly_cost: None,
    }
}

fn price_disk(mut record: ResourceRecord, disk: Option<&ManagedDisk>) -> ResourceCost {
    if let Some(disk) = disk {
        if disk.tier.is_some() {
            record.sku = disk.tier.clone();
        }
        record.disk_size_gb = disk.size_gb;
    }
    let monthly_cost = match (record.disk_size_gb, record.sku.as_deref()) {
        (Some(size), Some(tier)) => storage_monthly_cost(size, tier),
        _ => None,
    };
    ResourceCost {
        record,
        hourly_cost: None,
        monthly_cost,
    }
}

fn price_vm(mut record: ResourceRecord, line: Option<&VmCost>) -> ResourceCost {
    let Some(line) = line else {
        return unpriced(record);
    };
    record.sku = Some(line.vm_size.clone());
    ResourceCost {
        record,
        hourly_cost: line.hourly_cost,
        monthly_cost: line.breakdown.map(|b| b.nominal),
    }
}

impl<I: Inventory> CostService<I> {
    pub fn new(inventory: I, prices: PriceLookup, desktop_marker: impl Into<String>) -> Self {
        Self {
            inventory,
            prices,
            desktop_marker: desktop_marker.into(),
        }
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>, AppError> {
        self.inventory.subscriptions().await
    }

    pub async fn find_subscription(&self, id: &str) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .inventory
            .subscriptions()
            .await?
            .into_iter()
            .find(|s| s.id.eq_ignore_ascii_case(id.trim())))
    }

    /// Every resource group with its resources, sorted case-insensitively.
    pub async fn list_resources(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<GroupListing>, AppError> {
        let mut groups = Vec::new();
        for group in self.inventory.resource_groups(subscription_id).await? {
            let records = self
                .inventory
                .resources_in_group(subscription_id, &group.name)
                .await?;
            debug!(group = %group.name, count = records.len(), "listed resources");
            groups.push(GroupListing {
                name: group.name,
                resources: records.into_iter().map(unpriced).collect(),
            });
        }
        sort_listing(&mut groups);
        Ok(groups)
    }

    async fn price_vms(&mut self, vms: &[VirtualMachine]) -> Result<Vec<VmCost>, AppError> {
        let mut lines = Vec::with_capacity(vms.len());
        for vm in vms {
            let hourly = self
                .prices
                .hourly_cost(&PriceQuery::compute(&vm.vm_size, &vm.location))
                .await?;
            lines.push(vm_cost(vm, hourly, &self.desktop_marker));
        }
        Ok(lines)
    }

    async fn sorted_vms(&self, subscription_id: &str) -> Result<Vec<VirtualMachine>, AppError> {
        let mut vms = self.inventory.virtual_machines(subscription_id).await?;
        vms.sort_by_key(|vm| sort_key(&vm.name));
        info!(count = vms.len(), "pricing virtual machines");
        Ok(vms)
    }

    /// Prices every VM in the subscription and totals the scenarios.
    pub async fn vm_report(&mut self, subscription_id: &str) -> Result<CostReport, AppError> {
        let vms = self.sorted_vms(subscription_id).await?;
        let lines = self.price_vms(&vms).await?;
        Ok(build_report(subscription_id, lines))
    }

    /// Prices a resource that is neither a VM nor a disk from its SKU, using
    /// the family of its provider namespace and a full month of use.
    async fn price_other(&mut self, record: ResourceRecord) -> Result<ResourceCost, AppError> {
        let family = ServiceFamily::for_resource_type(&record.type_name);
        let (Some(family), Some(sku)) = (family, record.sku.as_deref()) else {
            return Ok(unpriced(record));
        };
        let query = PriceQuery::new(sku, &record.location, family);
        let hourly_cost = self.prices.hourly_cost(&query).await?;
        Ok(ResourceCost {
            monthly_cost: hourly_cost.map(|h| monthly_cost(h, UsageProfile::default())),
            hourly_cost,
            record,
        })
    }

    /// The resource listing with VM, disk and other SKU-bearing resource costs
    /// filled in, plus the VM scenario totals.
    pub async fn resource_costs(
        &mut self,
        subscription_id: &str,
    ) -> Result<ResourceCostReport, AppError> {
        let listing = self.list_resources(subscription_id).await?;
        let vms = self.sorted_vms(subscription_id).await?;
        let report = build_report(subscription_id, self.price_vms(&vms).await?);
        let disks = self.inventory.disks(subscription_id).await?;

        let vm_lines: HashMap<String, &VmCost> = vms
            .iter()
            .zip(&report.lines)
            .map(|(vm, line)| (vm.id.to_ascii_lowercase(), line))
            .collect();
        let disks_by_id: HashMap<String, &ManagedDisk> = disks
            .iter()
            .map(|d| (d.id.to_ascii_lowercase(), d))
            .collect();

        let mut groups = Vec::with_capacity(listing.len());
        for group in listing {
            let mut resources = Vec::with_capacity(group.resources.len());
            for rc in group.resources {
                let key = rc.record.id.to_ascii_lowercase();
                let priced = match rc.record.kind {
                    ResourceKind::VirtualMachine => {
                        price_vm(rc.record, vm_lines.get(&key).copied())
                    }
                    ResourceKind::Disk => {
                        price_disk(rc.record, disks_by_id.get(&key).copied())
                    }
                    ResourceKind::Other(_) => self.price_other(rc.record).await?,
                    ResourceKind::VmExtension => rc,
                };
                resources.push(priced);
            }
            groups.push(GroupListing {
                name: group.name,
                resources,
            });
        }

        Ok(ResourceCostReport { groups, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceGroup, Workload};
    use async_trait::async_trait;
    use mockito::Matcher;

    struct FakeInventory {
        groups: Vec<ResourceGroup>,
        resources: Vec<ResourceRecord>,
        vms: Vec<VirtualMachine>,
        disks: Vec<ManagedDisk>,
    }

    #[async_trait]
    impl Inventory for FakeInventory {
        async fn subscriptions(&self) -> Result<Vec<Subscription>, AppError> {
            Ok(vec![Subscription {
                id: "sub-1".into(),
                display_name: "Prod".into(),
                state: Some("Enabled".into()),
            }])
        }

        async fn resource_groups(&self, _: &str) -> Result<Vec<ResourceGroup>, AppError> {
            Ok(self.groups.clone())
        }

        async fn resources_in_group(
            &self,
            _: &str,
            resource_group: &str,
        ) -> Result<Vec<ResourceRecord>, AppError> {
            Ok(self
                .resources
                .iter()
                .filter(|r| r.resource_group == resource_group)
                .cloned()
                .collect())
        }

        async fn virtual_machines(&self, _: &str) -> Result<Vec<VirtualMachine>, AppError> {
            Ok(self.vms.clone())
        }

        async fn disks(&self, _: &str) -> Result<Vec<ManagedDisk>, AppError> {
            Ok(self.disks.clone())
        }
    }

    fn id(rg: &str, kind: &str, name: &str) -> String {
        format!(
            "/subscriptions/sub-1/resourceGroups/{rg}/providers/Microsoft.Compute/{kind}/{name}"
        )
    }

    fn record(rg: &str, type_name: &str, name: &str, kind: &str) -> ResourceRecord {
        ResourceRecord {
            id: id(rg, kind, name),
            resource_group: rg.into(),
            kind: ResourceKind::from_type(type_name),
            type_name: type_name.into(),
            name: name.into(),
            location: "uksouth".into(),
            sku: None,
            disk_size_gb: None,
        }
    }

    fn vm(rg: &str, name: &str, size: &str) -> VirtualMachine {
        VirtualMachine {
            id: id(rg, "virtualMachines", name),
            name: name.into(),
            resource_group: rg.into(),
            location: "uksouth".into(),
            vm_size: size.into(),
            power_state: Some("running".into()),
        }
    }

    fn fixture() -> FakeInventory {
        FakeInventory {
            groups: vec![
                ResourceGroup {
                    name: "rg-web".into(),
                },
                ResourceGroup {
                    name: "RG-Desk".into(),
                },
            ],
            resources: vec![
                record(
                    "rg-web",
                    "Microsoft.Compute/virtualMachines",
                    "web-01",
                    "virtualMachines",
                ),
                record("rg-web", "Microsoft.Compute/disks", "web-01-os", "disks"),
                record(
                    "rg-web",
                    "Microsoft.Compute/virtualMachines/extensions",
                    "web-01/AzureMonitor",
                    "virtualMachines/web-01/extensions",
                ),
                record(
                    "RG-Desk",
                    "Microsoft.Compute/virtualMachines",
                    "host-AVD-0",
                    "virtualMachines",
                ),
                ResourceRecord {
                    sku: Some("Standard".into()),
                    ..record(
                        "RG-Desk",
                        "Microsoft.Network/publicIPAddresses",
                        "desk-ip",
                        "publicIPAddresses",
                    )
                },
                record(
                    "RG-Desk",
                    "Microsoft.Network/networkInterfaces",
                    "desk-nic",
                    "networkInterfaces",
                ),
            ],
            vms: vec![
                vm("rg-web", "web-01", "Standard_B2s"),
                vm("RG-Desk", "host-AVD-0", "Standard_D4s_v5"),
            ],
            disks: vec![ManagedDisk {
                id: id("rg-web", "disks", "web-01-os"),
                tier: Some("Premium_LRS".into()),
                size_gb: Some(128),
            }],
        }
    }

    fn items(sku: &str, price: f64) -> String {
        format!(
            r#"{{"Items":[{{"armSkuName":"{sku}","armRegionName":"uksouth","retailPrice":{price}}}]}}"#
        )
    }

    async fn pricing_server() -> (mockito::ServerGuard, Vec<mockito::Mock>) {
        let mut server = mockito::Server::new_async().await;
        let b2s = server
            .mock("GET", "/prices")
            .match_query(Matcher::Regex("Standard_B2s".into()))
            .with_body(items("Standard_B2s", 0.04))
            .create_async()
            .await;
        let d4s = server
            .mock("GET", "/prices")
            .match_query(Matcher::Regex("Standard_D4s_v5".into()))
            .with_body(items("Standard_D4s_v5", 0.2))
            .create_async()
            .await;
        let public_ip = server
            .mock("GET", "/prices")
            .match_query(Matcher::UrlEncoded(
                "$filter".into(),
                crate::pricing::build_filter(&PriceQuery::new(
                    "Standard",
                    "uksouth",
                    ServiceFamily::Networking,
                )),
            ))
            .with_body(items("Standard", 0.004))
            .expect(1)
            .create_async()
            .await;
        (server, vec![b2s, d4s, public_ip])
    }

    fn service(server: &mockito::ServerGuard) -> CostService<FakeInventory> {
        CostService::new(
            fixture(),
            PriceLookup::new(Client::new(), format!("{}/prices", server.url())),
            "AVD",
        )
    }

    #[tokio::test]
    async fn list_resources_sorts_groups_and_resources() {
        let (server, _mocks) = pricing_server().await;
        let svc = service(&server);
        let groups = svc.list_resources("sub-1").await.expect("listing");

        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["RG-Desk", "rg-web"]);
        let types: Vec<_> = groups[1]
            .resources
            .iter()
            .map(|r| r.record.type_name.as_str())
            .collect();
        assert_eq!(
            types,
            vec![
                "Microsoft.Compute/disks",
                "Microsoft.Compute/virtualMachines",
                "Microsoft.Compute/virtualMachines/extensions",
            ]
        );
    }

    #[tokio::test]
    async fn vm_report_classifies_and_totals() {
        let (server, _mocks) = pricing_server().await;
        let mut svc = service(&server);
        let report = svc.vm_report("sub-1").await.expect("report");

        assert_eq!(report.lines.len(), 2);
        let desk = &report.lines[0];
        assert_eq!(desk.name, "host-AVD-0");
        assert_eq!(desk.workload, Workload::VirtualDesktop);
        let web = &report.lines[1];
        assert_eq!(web.workload, Workload::AlwaysOn);

        let expected = 0.2 * 200.0 + 0.04 * 730.0;
        assert!((report.totals.nominal - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn resource_costs_fill_vm_and_disk_rows() {
        let (server, _mocks) = pricing_server().await;
        let mut svc = service(&server);
        let costs = svc.resource_costs("sub-1").await.expect("costs");

        let web = costs
            .groups
            .iter()
            .find(|g| g.name == "rg-web")
            .expect("rg-web");
        let vm_row = web
            .resources
            .iter()
            .find(|r| r.record.kind == ResourceKind::VirtualMachine)
            .expect("vm row");
        assert_eq!(vm_row.record.sku.as_deref(), Some("Standard_B2s"));
        assert_eq!(vm_row.hourly_cost, Some(0.04));

        let disk_row = web
            .resources
            .iter()
            .find(|r| r.record.kind == ResourceKind::Disk)
            .expect("disk row");
        assert_eq!(disk_row.record.disk_size_gb, Some(128));
        assert!(disk_row.hourly_cost.is_none());
        assert_eq!(
            disk_row.monthly_cost,
            storage_monthly_cost(128, "Premium_LRS")
        );
    }

    #[tokio::test]
    async fn resource_costs_price_other_resources_by_family() {
        let (server, mocks) = pricing_server().await;
        let mut svc = service(&server);
        let costs = svc.resource_costs("sub-1").await.expect("costs");

        let desk = costs
            .groups
            .iter()
            .find(|g| g.name == "RG-Desk")
            .expect("RG-Desk");
        let ip = desk
            .resources
            .iter()
            .find(|r| r.record.name == "desk-ip")
            .expect("public ip row");
        assert_eq!(ip.hourly_cost, Some(0.004));
        let monthly = ip.monthly_cost.expect("monthly");
        assert!((monthly - 0.004 * 730.0).abs() < 1e-9);

        let nic = desk
            .resources
            .iter()
            .find(|r| r.record.name == "desk-nic")
            .expect("nic row");
        assert!(nic.hourly_cost.is_none());
        assert!(nic.monthly_cost.is_none());

        // VM totals are unaffected by the priced public IP.
        let expected = 0.2 * 200.0 + 0.04 * 730.0;
        assert!((costs.report.totals.nominal - expected).abs() < 1e-9);
        mocks[2].assert_async().await;
    }

    #[tokio::test]
    async fn find_subscription_matches_known_ids_only() {
        let (server, _mocks) = pricing_server().await;
        let svc = service(&server);
        let found = svc.find_subscription("sub-1").await.expect("lookup");
        assert!(found.is_some());
        let missing = svc.find_subscription("nope").await.expect("lookup");
        assert!(missing.is_none());
    }
}
