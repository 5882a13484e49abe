use crate::adapters::auth::{Authenticator, SessionCredential};
use crate::domain::model::{Report, ReportingPeriod, Unit};
use crate::domain::ports::ReportSource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://lcr.churchofjesuschrist.org";

const BETA_COOKIES: [(&str, &str); 2] = [
    ("clerk-resources-beta-terms", "4.1"),
    ("clerk-resources-beta-eula", "4.2"),
];

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// The signed-in user's own unit, used by the member-level endpoints.
    pub unit_number: u32,
    pub beta: bool,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            unit_number: 0,
            beta: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Ministering organizations the ministering endpoint can be filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinisteringOrganization {
    EldersQuorum,
    ReliefSociety,
}

impl MinisteringOrganization {
    pub fn code(&self) -> &'static str {
        match self {
            MinisteringOrganization::EldersQuorum => "EQ",
            MinisteringOrganization::ReliefSociety => "RS",
        }
    }
}

impl FromStr for MinisteringOrganization {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQ" => Ok(MinisteringOrganization::EldersQuorum),
            "RS" => Ok(MinisteringOrganization::ReliefSociety),
            other => Err(EtlError::ValidationError {
                message: format!(
                    "unknown ministering organization '{}' (expected EQ or RS)",
                    other
                ),
            }),
        }
    }
}

impl fmt::Display for MinisteringOrganization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoToken {
    token_url: String,
}

/// Authenticated client for the LCR report endpoints.
///
/// Requests are plain GETs with the session cookies attached. Non-2xx
/// responses are errors and nothing is retried.
pub struct LcrClient {
    client: Client,
    base_url: Url,
    unit_number: u32,
    beta: bool,
    session: SessionCredential,
}

impl LcrClient {
    /// Logs in through `authenticator` and builds a client around the resulting session.
    pub async fn connect<A>(settings: ClientSettings, authenticator: &A) -> Result<Self>
    where
        A: Authenticator + ?Sized,
    {
        let session = authenticator.authenticate().await?;
        Self::with_session(settings, session)
    }

    pub fn with_session(settings: ClientSettings, session: SessionCredential) -> Result<Self> {
        let base_url =
            Url::parse(&settings.base_url).map_err(|e| EtlError::InvalidConfigValueError {
                field: "source.base_url".to_string(),
                value: settings.base_url.clone(),
                reason: e.to_string(),
            })?;
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            base_url,
            unit_number: settings.unit_number,
            beta: settings.beta,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| EtlError::ConfigError {
            message: format!("cannot build URL for '{}': {}", path, e),
        })
    }

    fn cookie_header(&self) -> String {
        if self.beta {
            self.session.cookie_header(&BETA_COOKIES)
        } else {
            self.session.cookie_header(&[])
        }
    }

    async fn make_request(&self, path: &str, params: &[(&str, String)]) -> Result<Response> {
        let url = self.endpoint(path)?;
        self.send_get(url, params).await
    }

    /// GET with the session cookies attached. `url` may point off the portal host
    /// (photo CDN links) and gets the same status and sign-in page checks.
    async fn send_get(&self, url: Url, params: &[(&str, String)]) -> Result<Response> {
        tracing::debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(url.clone())
            .query(params)
            .header(COOKIE, self.cookie_header())
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(EtlError::AuthenticationError {
                message: format!("{} returned {}; the session is missing or expired", url, status),
            });
        }
        if !status.is_success() {
            return Err(EtlError::HttpStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // An expired session is answered with the HTML sign-in page instead of JSON.
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
        if is_html {
            return Err(EtlError::AuthenticationError {
                message: format!("{} returned the sign-in page; the session has expired", url),
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let body = self.make_request(path, params).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn lang() -> (&'static str, String) {
        ("lang", "eng".to_string())
    }

    pub async fn quarterly_report_for(
        &self,
        unit_number: u32,
        quarter: u8,
        year: i32,
    ) -> Result<Report> {
        tracing::info!("Getting quarterly report for {} and {}-Q{}", unit_number, year, quarter);
        self.get_json(
            "/api/report/quarterly-report",
            &[
                Self::lang(),
                ("unitNumber", unit_number.to_string()),
                ("populateLabels", "true".to_string()),
                ("quarter", quarter.to_string()),
                ("year", year.to_string()),
            ],
        )
        .await
    }

    pub async fn available_report_quarters(&self, unit: &Unit) -> Result<Vec<ReportingPeriod>> {
        let labels: Vec<String> = self
            .get_json(
                "/api/report/quarterly-report/quarters",
                &[Self::lang(), ("unitNumber", unit.number().to_string())],
            )
            .await?;
        labels.iter().map(|label| label.parse()).collect()
    }

    pub async fn birthday_list(&self, month: u32, months: u32) -> Result<serde_json::Value> {
        tracing::info!("Getting birthday list");
        self.get_json(
            "/api/report/birthday-list",
            &[
                Self::lang(),
                ("month", month.to_string()),
                ("months", months.to_string()),
            ],
        )
        .await
    }

    pub async fn members_moved_in(&self, months: u32) -> Result<serde_json::Value> {
        tracing::info!("Getting members moved in");
        let path = format!("/api/report/members-moved-in/unit/{}/{}", self.unit_number, months);
        self.get_json(&path, &[Self::lang()]).await
    }

    pub async fn members_moved_out(&self, months: u32) -> Result<serde_json::Value> {
        tracing::info!("Getting members moved out");
        let path = format!("/api/report/members-moved-out/unit/{}/{}", self.unit_number, months);
        self.get_json(&path, &[Self::lang()]).await
    }

    pub async fn member_list(&self) -> Result<serde_json::Value> {
        tracing::info!("Getting member list");
        self.get_json(
            "/api/umlu/report/member-list",
            &[Self::lang(), ("unitNumber", self.unit_number.to_string())],
        )
        .await
    }

    pub async fn callings(&self) -> Result<serde_json::Value> {
        tracing::info!("Getting callings for all organizations");
        self.get_json("/services/orgs/sub-orgs-with-callings", &[Self::lang()])
            .await
    }

    pub async fn ministering(
        &self,
        organization: Option<MinisteringOrganization>,
    ) -> Result<serde_json::Value> {
        tracing::info!("Getting ministering data");
        let mut params = vec![Self::lang(), ("unitNumber", self.unit_number.to_string())];
        if let Some(org) = organization {
            params.push(("type", org.code().to_string()));
        }
        self.get_json("/api/umlu/v1/ministering/data-full", &params).await
    }

    pub async fn access_table(&self) -> Result<serde_json::Value> {
        tracing::info!("Getting info for data access");
        self.get_json("/services/access-table", &[Self::lang()]).await
    }

    pub async fn recommend_status(&self) -> Result<serde_json::Value> {
        tracing::info!("Getting recommend status");
        self.get_json(
            "/api/recommend/recommend-status",
            &[Self::lang(), ("unitNumber", self.unit_number.to_string())],
        )
        .await
    }

    /// Photo bytes for a member. `member_id` is the portal's internal id, not the record number.
    pub async fn individual_photo(&self, member_id: u64) -> Result<Vec<u8>> {
        tracing::info!("Getting photo for {}", member_id);
        let token: PhotoToken = self
            .get_json(
                &format!("/individual-photo/{}", member_id),
                &[Self::lang(), ("status", "APPROVED".to_string())],
            )
            .await?;

        let photo_url = self.endpoint(&token.token_url)?;
        let response = self.send_get(photo_url, &[]).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ReportSource for LcrClient {
    async fn available_periods(&self, unit: &Unit) -> Result<Vec<ReportingPeriod>> {
        self.available_report_quarters(unit).await
    }

    async fn quarterly_report(&self, unit: &Unit, period: &ReportingPeriod) -> Result<Report> {
        self.quarterly_report_for(unit.number(), period.quarter(), period.year())
            .await
    }
}
