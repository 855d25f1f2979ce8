//! Client for the Copernicus Climate Data Store retrieval API.
//!
//! A retrieval is an asynchronous job: submit the request, poll the job until
//! it settles, resolve the result asset and download it.

use crate::domain::model::RetrievalRequest;
use crate::domain::ports::ReanalysisClient;
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CDS_URL: &str = "https://cds.climate.copernicus.eu/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdsCredentials {
    pub url: String,
    pub key: String,
}

impl CdsCredentials {
    /// Explicit values first, then `CDSAPI_URL`/`CDSAPI_KEY`, then `~/.cdsapirc`.
    pub fn resolve(url: Option<&str>, key: Option<&str>) -> Result<Self> {
        let rc = std::env::var_os("HOME")
            .map(|home| Path::new(&home).join(".cdsapirc"))
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|text| Self::parse_rc(&text))
            .unwrap_or_default();

        let url = url
            .map(str::to_string)
            .or_else(|| std::env::var("CDSAPI_URL").ok())
            .or(rc.0)
            .unwrap_or_else(|| DEFAULT_CDS_URL.to_string());
        let key = key
            .map(str::to_string)
            .or_else(|| std::env::var("CDSAPI_KEY").ok())
            .or(rc.1)
            .ok_or_else(|| PipelineError::missing_key("retrieval.key"))?;

        validate_url("retrieval.url", &url)?;
        Ok(Self { url, key })
    }

    /// `url:` and `key:` lines of a `.cdsapirc` file.
    pub fn parse_rc(text: &str) -> (Option<String>, Option<String>) {
        let mut url = None;
        let mut key = None;
        for line in text.lines() {
            if let Some((k, v)) = line.split_once(':') {
                match k.trim() {
                    "url" => url = Some(v.trim().to_string()),
                    "key" => key = Some(v.trim().to_string()),
                    _ => {}
                }
            }
        }
        (url, key)
    }
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    #[serde(rename = "jobID")]
    job_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct JobResults {
    asset: Asset,
}

#[derive(Debug, Deserialize)]
struct Asset {
    value: AssetValue,
}

#[derive(Debug, Deserialize)]
struct AssetValue {
    href: String,
}

#[derive(Debug, Clone)]
pub struct CdsClient {
    http: reqwest::Client,
    credentials: CdsCredentials,
    poll_interval: Duration,
    max_polls: u32,
}

impl CdsClient {
    pub fn new(credentials: CdsCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            poll_interval: Duration::from_secs(10),
            max_polls: 8640,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.credentials.url.trim_end_matches('/'), path)
    }

    /// Request body for one product and one day.
    pub fn request_body(request: &RetrievalRequest) -> serde_json::Value {
        let mut parts = request.date.splitn(3, '-');
        let year = parts.next().unwrap_or_default();
        let month = parts.next().unwrap_or_default();
        let day = parts.next().unwrap_or_default();

        let mut inputs = json!({
            "product_type": ["reanalysis"],
            "variable": request.variables,
            "year": [year],
            "month": [month],
            "day": [day],
            "time": request.times,
            "area": request.area,
            "data_format": "grib",
            "download_format": "unarchived",
        });
        if !request.levels.is_empty() {
            inputs["pressure_level"] = json!(request.levels);
        }
        json!({ "inputs": inputs })
    }

    fn unavailable(request: &RetrievalRequest, reason: impl Into<String>) -> PipelineError {
        PipelineError::DataUnavailable {
            date: request.date.clone(),
            reason: format!("{}: {}", request.dataset, reason.into()),
        }
    }

    async fn checked(
        request: &RetrievalRequest,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::unavailable(request, format!("HTTP {}: {}", status, body)))
    }

    async fn submit(&self, request: &RetrievalRequest) -> Result<JobStatus> {
        let url = self.endpoint(&format!("retrieve/v1/processes/{}/execution", request.dataset));
        let response = self
            .http
            .post(url)
            .header("PRIVATE-TOKEN", &self.credentials.key)
            .json(&Self::request_body(request))
            .send()
            .await?;
        Ok(Self::checked(request, response).await?.json().await?)
    }

    async fn wait(&self, request: &RetrievalRequest, mut job: JobStatus) -> Result<()> {
        let url = self.endpoint(&format!("retrieve/v1/jobs/{}", job.job_id));
        for _ in 0..self.max_polls {
            match job.status.as_str() {
                "successful" => return Ok(()),
                "failed" | "dismissed" | "rejected" => {
                    return Err(Self::unavailable(
                        request,
                        format!("job {} ended as {}", job.job_id, job.status),
                    ))
                }
                _ => {}
            }
            tracing::debug!(job = %job.job_id, status = %job.status, "waiting for retrieval job");
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .http
                .get(&url)
                .header("PRIVATE-TOKEN", &self.credentials.key)
                .send()
                .await?;
            job = Self::checked(request, response).await?.json().await?;
        }
        Err(Self::unavailable(
            request,
            format!("job {} did not finish after {} polls", job.job_id, self.max_polls),
        ))
    }

    async fn result_href(&self, request: &RetrievalRequest, job_id: &str) -> Result<String> {
        let url = self.endpoint(&format!("retrieve/v1/jobs/{}/results", job_id));
        let response = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.credentials.key)
            .send()
            .await?;
        let results: JobResults = Self::checked(request, response).await?.json().await?;
        Ok(results.asset.value.href)
    }
}

#[async_trait]
impl ReanalysisClient for CdsClient {
    async fn fetch(&self, request: &RetrievalRequest, target: &Path) -> Result<PathBuf> {
        let job = self.submit(request).await?;
        let job_id = job.job_id.clone();
        tracing::info!(dataset = %request.dataset, date = %request.date, job = %job_id, "retrieval job submitted");

        self.wait(request, job).await?;
        let href = self.result_href(request, &job_id).await?;

        let response = self.http.get(&href).send().await?;
        let bytes = Self::checked(request, response).await?.bytes().await?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, &bytes).await?;
        tracing::info!(file = %target.display(), bytes = bytes.len(), "retrieval downloaded");
        Ok(target.to_path_buf())
    }
}
