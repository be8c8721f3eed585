use crate::config::Config;
use crate::error::Error;
use chrono::NaiveDate;
use log::info;
use reqwest::{header::AUTHORIZATION, Client, Url};
use serde::{Deserialize, Serialize};
use std::fmt;

const CLIENT_ID_HEADER: &str = "Amazon-Advertising-API-ClientId";
const MANAGER_ACCOUNT_HEADER: &str = "Amazon-Advertising-API-Manager-Account";

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AdsApi: Send + Sync + 'static {
    /// Fetches the latest available report of every report type.
    /// # Arguments
    /// * `access_token` - The OAuth access token obtained from the refresh token.
    /// # Returns
    /// A Result containing either a vector of [`ReportDescriptor`] or an Error.
    async fn fetch_report_metadata(&self, access_token: &str)
        -> Result<Vec<ReportDescriptor>, Error>;

    /// Fetches the short-lived download link for a single report.
    /// # Arguments
    /// * `access_token` - The OAuth access token obtained from the refresh token.
    /// * `report` - The descriptor returned by the metadata listing.
    /// # Returns
    /// A Result containing either the download URL or an Error.
    async fn fetch_download_link(
        &self,
        access_token: &str,
        report: &ReportDescriptor,
    ) -> Result<String, Error>;
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Excel,
    ZipBrand,
    ZipAsin,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Excel => "EXCEL",
            ReportType::ZipBrand => "ZIP_BRAND",
            ReportType::ZipAsin => "ZIP_ASIN",
        }
    }

    /// Storage category for a report delivered in a format that needs no reshaping.
    pub fn category(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One available report as listed by the metadata endpoint.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportDescriptor {
    pub advertiser_id: String,
    pub index_date: String,
    pub obfuscated_marketplace_id: String,
    pub report_type: ReportType,
}

impl ReportDescriptor {
    /// The index date as a calendar date. The API does not always zero-pad it.
    pub fn availability_date(&self) -> Result<NaiveDate, Error> {
        parse_index_date(&self.index_date)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportsMetadata {
    reports_metadata: Vec<ReportDescriptor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadLink {
    download_link: String,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    client_id: String,
    manager_account_id: String,
    marketplace_id: String,
}

impl ApiClient {
    /// Fails with [`Error::Credentials`] when no manager account is configured.
    pub fn new(config: &Config, client_id: &str) -> Result<Self, Error> {
        let manager_account_id = config
            .manager_account_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Credentials {
                message: "set --manager-account-id".to_string(),
            })?;

        Ok(ApiClient {
            client: Client::new(),
            base_url: config.api_url.to_string(),
            client_id: client_id.to_string(),
            manager_account_id,
            marketplace_id: config.marketplace_id.to_string(),
        })
    }

    fn brand_view_url(&self, advertiser: &str, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .extend(&["insights", "brandView", "advertisers", advertiser])
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        access_token: &str,
    ) -> Result<T, Error> {
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(CLIENT_ID_HEADER, &self.client_id)
            .header(MANAGER_ACCOUNT_HEADER, &self.manager_account_id)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json::<T>().await?)
    }
}

#[async_trait::async_trait]
impl AdsApi for ApiClient {
    async fn fetch_report_metadata(
        &self,
        access_token: &str,
    ) -> Result<Vec<ReportDescriptor>, Error> {
        let url = self.brand_view_url(&self.marketplace_id, &["allReportMetadata"])?;
        let metadata: ReportsMetadata = self.get_json(url, access_token).await?;

        info!(
            "{} report(s) available for {}",
            metadata.reports_metadata.len(),
            self.marketplace_id
        );

        Ok(metadata.reports_metadata)
    }

    async fn fetch_download_link(
        &self,
        access_token: &str,
        report: &ReportDescriptor,
    ) -> Result<String, Error> {
        let url = self.brand_view_url(
            &report.obfuscated_marketplace_id,
            &[
                "reports",
                report.report_type.as_str(),
                "indexDates",
                report.index_date.as_str(),
            ],
        )?;
        let link: DownloadLink = self.get_json(url, access_token).await?;

        Ok(link.download_link)
    }
}

/// Parses a `YYYY-MM-DD` date, tolerating unpadded month and day.
pub fn parse_index_date(s: &str) -> Result<NaiveDate, Error> {
    let invalid = || Error::InvalidDate {
        date: s.to_string(),
    };

    let parts = s
        .split('-')
        .map(|part| part.trim().parse::<u16>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;

    match parts.as_slice() {
        &[year, month, day] if month <= 12 && day <= 31 => {
            NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}
