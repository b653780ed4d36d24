//! PostgREST binding for the remote services
//!
//! Speaks Supabase REST conventions: `apikey` + bearer headers, upserts via
//! `Prefer: resolution=merge-duplicates` with an `on_conflict` key, and
//! `eq.`-style filters with url-encoded values.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::{Farm, FarmMember, NewMember, RecordId};
use crate::util::compact_text;

use super::{DataKind, DataRow, FarmDirectory, RemoteDataService};

const DATA_TABLE: &str = "farm_data";
const FARMS_TABLE: &str = "farms";
const MEMBERS_TABLE: &str = "farm_members";

/// HTTP client for a Supabase-style PostgREST backend
#[derive(Debug, Clone)]
pub struct PostgrestRemote {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl PostgrestRemote {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: reqwest::Client::builder().build()?,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/json")
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Remote(format_api_error(status, &body)))
    }

    async fn delete_where(&self, table: &str, filters: &[(&str, &str)]) -> Result<()> {
        let params: Vec<String> = filters
            .iter()
            .map(|(column, value)| eq_filter(column, value))
            .collect();
        let url = format!("{}?{}", self.table_url(table), params.join("&"));
        let response = self.authed(self.client.delete(url)).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn select_where<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        order: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut params = vec!["select=*".to_string()];
        for (column, value) in filters {
            params.push(eq_filter(column, value));
        }
        if let Some(order) = order {
            params.push(format!("order={order}"));
        }
        let url = format!("{}?{}", self.table_url(table), params.join("&"));
        let response = self.authed(self.client.get(url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteDataService for PostgrestRemote {
    async fn upsert_rows(&self, rows: &[DataRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!("{}?on_conflict=id,farm_id", self.table_url(DATA_TABLE));
        let request = self
            .client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        let response = self.authed(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn select_all(&self, farm_id: &str) -> Result<Vec<DataRow>> {
        let raw: Vec<serde_json::Value> = self
            .select_where(DATA_TABLE, &[("farm_id", farm_id)], None)
            .await?;

        // Decode row by row so one malformed row cannot wedge the pull
        let mut rows = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<DataRow>(value) {
                Ok(row) => rows.push(row),
                Err(error) => tracing::warn!(%error, "skipping undecodable remote row"),
            }
        }
        Ok(rows)
    }

    async fn delete_row(&self, id: RecordId, farm_id: &str) -> Result<()> {
        let id = id.as_str();
        self.delete_where(DATA_TABLE, &[("id", id.as_str()), ("farm_id", farm_id)])
            .await
    }

    async fn delete_by_kind(&self, farm_id: &str, kind: DataKind) -> Result<()> {
        self.delete_where(
            DATA_TABLE,
            &[("farm_id", farm_id), ("data_type", kind.as_str())],
        )
        .await
    }
}

#[async_trait]
impl FarmDirectory for PostgrestRemote {
    async fn create_farm(&self, farm: &Farm) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(FARMS_TABLE))
            .header("Prefer", "return=minimal")
            .json(&[farm]);
        let response = self.authed(request).send().await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(Error::FarmAlreadyExists(farm.id.clone()));
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn get_farm(&self, id: &str) -> Result<Option<Farm>> {
        let farms: Vec<Farm> = self.select_where(FARMS_TABLE, &[("id", id)], None).await?;
        Ok(farms.into_iter().next())
    }

    async fn upsert_member(&self, member: &NewMember) -> Result<()> {
        let url = format!(
            "{}?on_conflict=farm_id,device_id",
            self.table_url(MEMBERS_TABLE)
        );
        let request = self
            .client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[member]);
        let response = self.authed(request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_members(&self, farm_id: &str) -> Result<Vec<FarmMember>> {
        self.select_where(
            MEMBERS_TABLE,
            &[("farm_id", farm_id)],
            Some("joined_at.asc"),
        )
        .await
    }

    async fn delete_member(&self, member_id: &str) -> Result<()> {
        self.delete_where(MEMBERS_TABLE, &[("id", member_id)]).await
    }

    async fn delete_farm(&self, farm_id: &str) -> Result<()> {
        self.delete_where(FARMS_TABLE, &[("id", farm_id)]).await
    }
}

fn eq_filter(column: &str, value: &str) -> String {
    format!("{column}=eq.{}", urlencoding::encode(value))
}

fn format_api_error(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ApiErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_filter_encodes_values() {
        assert_eq!(eq_filter("farm_id", "smith-farm"), "farm_id=eq.smith-farm");
        assert_eq!(eq_filter("name", "north 40"), "name=eq.north%2040");
    }

    #[test]
    fn format_api_error_prefers_json_message() {
        let message = format_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"message": "duplicate key value"}"#,
        );
        assert_eq!(message, "duplicate key value (400)");
    }

    #[test]
    fn format_api_error_falls_back_to_body_text() {
        let message = format_api_error(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(message, "upstream unavailable (502)");

        let empty = format_api_error(StatusCode::BAD_GATEWAY, "   ");
        assert_eq!(empty, "HTTP 502");
    }

    #[test]
    fn table_urls_are_rooted_at_rest_v1() {
        let remote = PostgrestRemote::new(
            RemoteConfig::new("https://project.supabase.co/", "anon-key").unwrap(),
        )
        .unwrap();
        assert_eq!(
            remote.table_url("farm_data"),
            "https://project.supabase.co/rest/v1/farm_data"
        );
    }
}
