use crate::error::AppError;
use crate::inventory::{resource_group_from_id, Inventory};
use crate::models::{
    ManagedDisk, ResourceGroup, ResourceKind, ResourceRecord, Subscription, VirtualMachine,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const RESOURCES_API_VERSION: &str = "2021-04-01";
const COMPUTE_API_VERSION: &str = "2024-07-01";
const DISKS_API_VERSION: &str = "2023-04-02";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmSubscription {
    subscription_id: String,
    #[serde(default)]
    display_name: String,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmResourceGroup {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArmSku {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmResource {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    location: String,
    sku: Option<ArmSku>,
}

#[derive(Debug, Deserialize)]
struct ArmVm {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    properties: Option<VmProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmProperties {
    hardware_profile: Option<HardwareProfile>,
    instance_view: Option<InstanceView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardwareProfile {
    vm_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstanceView {
    #[serde(default)]
    statuses: Vec<InstanceStatus>,
}

#[derive(Debug, Deserialize)]
struct InstanceStatus {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmDisk {
    id: String,
    sku: Option<ArmSku>,
    properties: Option<DiskProperties>,
}

#[derive(Debug, Deserialize)]
struct DiskProperties {
    #[serde(rename = "diskSizeGB")]
    disk_size_gb: Option<u64>,
}

fn power_state(view: Option<&InstanceView>) -> Option<String> {
    view?
        .statuses
        .iter()
        .filter_map(|s| s.code.as_deref())
        .find_map(|code| code.strip_prefix("PowerState/"))
        .map(ToString::to_string)
}

fn api_error(status: StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| match (e.code, e.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (code, message) => message.or(code).unwrap_or_default(),
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AppError::Auth(detail);
    }
    AppError::Api {
        status: status.as_u16(),
        message: detail,
    }
}

/// Azure Resource Manager inventory client.
pub struct ArmInventory {
    client: Client,
    base_url: String,
    token: String,
}

impl ArmInventory {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn endpoint(&self, segments: &[&str], api_version: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("invalid management URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    async fn get_paged<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, AppError> {
        let mut out = Vec::new();
        let mut next = Some(url.to_string());

        while let Some(url) = next.take() {
            debug!(%url, "GET");
            let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(api_error(status, &body));
            }

            let page: Page<T> = response.json().await?;
            out.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(out)
    }
}

#[async_trait]
impl Inventory for ArmInventory {
    async fn subscriptions(&self) -> Result<Vec<Subscription>, AppError> {
        let url = self.endpoint(&["subscriptions"], SUBSCRIPTIONS_API_VERSION)?;
        let rows: Vec<ArmSubscription> = self.get_paged(url).await?;
        Ok(rows
            .into_iter()
            .map(|s| Subscription {
                id: s.subscription_id,
                display_name: s.display_name,
                state: s.state,
            })
            .collect())
    }

    async fn resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>, AppError> {
        let url = self.endpoint(
            &["subscriptions", subscription_id, "resourcegroups"],
            RESOURCES_API_VERSION,
        )?;
        let rows: Vec<ArmResourceGroup> = self.get_paged(url).await?;
        Ok(rows
            .into_iter()
            .map(|g| ResourceGroup { name: g.name })
            .collect())
    }

    async fn resources_in_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ResourceRecord>, AppError> {
        let url = self.endpoint(
            &[
                "subscriptions",
                subscription_id,
                "resourceGroups",
                resource_group,
                "resources",
            ],
            RESOURCES_API_VERSION,
        )?;
        let rows: Vec<ArmResource> = self.get_paged(url).await?;
        Ok(rows
            .into_iter()
            .map(|r| ResourceRecord {
                id: r.id,
                resource_group: resource_group.to_string(),
                kind: ResourceKind::from_type(&r.type_name),
                type_name: r.type_name,
                name: r.name,
                location: r.location,
                sku: r.sku.and_then(|s| s.name),
                disk_size_gb: None,
            })
            .collect())
    }

    async fn virtual_machines(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<VirtualMachine>, AppError> {
        let segments = [
            "subscriptions",
            subscription_id,
            "providers",
            "Microsoft.Compute",
            "virtualMachines",
        ];
        let vms: Vec<ArmVm> = self
            .get_paged(self.endpoint(&segments, COMPUTE_API_VERSION)?)
            .await?;

        let mut status_url = self.endpoint(&segments, COMPUTE_API_VERSION)?;
        status_url.query_pairs_mut().append_pair("statusOnly", "true");
        let statuses: Vec<ArmVm> = self.get_paged(status_url).await?;
        let power: HashMap<String, String> = statuses
            .iter()
            .filter_map(|vm| {
                let view = vm.properties.as_ref()?.instance_view.as_ref();
                Some((vm.id.to_ascii_lowercase(), power_state(view)?))
            })
            .collect();

        Ok(vms
            .into_iter()
            .map(|vm| {
                let vm_size = vm
                    .properties
                    .as_ref()
                    .and_then(|p| p.hardware_profile.as_ref())
                    .and_then(|h| h.vm_size.clone())
                    .unwrap_or_default();
                VirtualMachine {
                    resource_group: resource_group_from_id(&vm.id).unwrap_or_default().to_string(),
                    power_state: power.get(&vm.id.to_ascii_lowercase()).cloned(),
                    id: vm.id,
                    name: vm.name,
                    location: vm.location,
                    vm_size,
                }
            })
            .collect())
    }

    async fn disks(&self, subscription_id: &str) -> Result<Vec<ManagedDisk>, AppError> {
        let url = self.endpoint(
            &[
                "subscriptions",
                subscription_id,
                "providers",
                "Microsoft.Compute",
                "disks",
            ],
            DISKS_API_VERSION,
        )?;
        let rows: Vec<ArmDisk> = self.get_paged(url).await?;
        Ok(rows
            .into_iter()
            .map(|d| ManagedDisk {
                id: d.id,
                tier: d.sku.and_then(|s| s.name),
                size_gb: d.properties.and_then(|p| p.disk_size_gb),
            })
            .collect())
    }
}
