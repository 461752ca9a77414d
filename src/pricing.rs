use crate::error::AppError;
use crate::models::{PriceQuery, PriceResult, CURRENCY};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

pub const PRICING_API_VERSION: &str = "2023-01-01-preview";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PriceResponse {
    #[serde(default)]
    items: Vec<PriceItem>,
    error: Option<PriceError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceItem {
    #[serde(default)]
    arm_sku_name: String,
    #[serde(default)]
    arm_region_name: String,
    retail_price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PriceError {
    code: Option<String>,
    message: Option<String>,
}

/// Retail price client with a per-process memo of answered queries.
pub struct PriceLookup {
    client: Client,
    endpoint: String,
    cache: HashMap<PriceQuery, Option<PriceResult>>,
}

fn odata_literal(raw: &str) -> String {
    raw.replace('\'', "''")
}

pub fn build_filter(query: &PriceQuery) -> String {
    format!(
        "serviceFamily eq '{}' and armSkuName eq '{}' and armRegionName eq '{}' and priceType eq 'Consumption'",
        query.family.as_filter_value(),
        odata_literal(&query.sku),
        odata_literal(&query.region),
    )
}

fn cache_key(query: &PriceQuery) -> PriceQuery {
    PriceQuery {
        sku: query.sku.to_ascii_lowercase(),
        region: query.region.to_ascii_lowercase(),
        family: query.family,
    }
}

fn select_price(
    response: &PriceResponse,
    query: &PriceQuery,
) -> Result<Option<PriceResult>, AppError> {
    if let Some(err) = &response.error {
        let message = err
            .message
            .clone()
            .or_else(|| err.code.clone())
            .unwrap_or_else(|| "pricing API returned an error".into());
        return Err(AppError::RateLimited(message));
    }

    Ok(response
        .items
        .iter()
        .find(|item| {
            item.arm_sku_name.eq_ignore_ascii_case(&query.sku)
                && item.arm_region_name.eq_ignore_ascii_case(&query.region)
        })
        .map(|item| PriceResult::gbp(item.retail_price)))
}

fn log_rate_limit_headers(headers: &HeaderMap) {
    let Some(limit) = headers.get("x-ratelimit-limit") else {
        return;
    };
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("?")
            .to_string()
    };
    debug!(
        limit = limit.to_str().unwrap_or("?"),
        remaining = %text("x-ratelimit-remaining"),
        reset = %text("x-ratelimit-reset"),
        "pricing API rate limit"
    );
}

impl PriceLookup {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            cache: HashMap::new(),
        }
    }

    fn request_url(&self, query: &PriceQuery) -> Result<Url, AppError> {
        let filter = build_filter(query);
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[
                ("currencyCode", CURRENCY),
                ("api-version", PRICING_API_VERSION),
                ("$filter", filter.as_str()),
            ],
        )?)
    }

    /// Hourly retail price for `query`, or `None` when the API has no
    /// matching line item. A throttling response is returned as
    /// [`AppError::RateLimited`].
    pub async fn lookup(&mut self, query: &PriceQuery) -> Result<Option<PriceResult>, AppError> {
        let key = cache_key(query);
        if let Some(hit) = self.cache.get(&key) {
            debug!(sku = %query.sku, region = %query.region, "price cache hit");
            return Ok(*hit);
        }

        let url = self.request_url(query)?;
        debug!(%url, "querying retail prices");
        let response = self.client.get(url).send().await?;
        log_rate_limit_headers(response.headers());

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited(format!("HTTP {status}")));
        }

        let result = match serde_json::from_str::<PriceResponse>(&body) {
            Ok(parsed) => select_price(&parsed, query)?,
            Err(e) => {
                warn!(sku = %query.sku, "could not decode pricing response: {e}");
                None
            }
        };

        match result {
            Some(price) => debug!(
                sku = %query.sku,
                hourly = price.hourly_cost,
                currency = price.currency,
                "retail price found"
            ),
            None => debug!(sku = %query.sku, region = %query.region, "no retail price found"),
        }
        self.cache.insert(key, result);
        Ok(result)
    }

    pub async fn hourly_cost(&mut self, query: &PriceQuery) -> Result<Option<f64>, AppError> {
        Ok(self.lookup(query).await?.map(|p| p.hourly_cost))
    }
}
