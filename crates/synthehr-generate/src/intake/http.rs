use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use super::{
    EHR_PATH, EhrCreated, IntakeError, IntakeService, TEMPLATE_PATH, composition_path,
};

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";
const JSON: &str = "application/json";
const XML: &str = "application/xml";
const BODY_EXCERPT_CHARS: usize = 512;

/// Connection settings for [`HttpIntake`].
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Bound on every upload and EHR creation call.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bound on the liveness check.
    pub liveness_timeout: Duration,
    /// Idle connections kept per host; match the delivery concurrency.
    pub max_idle_per_host: usize,
}

impl IntakeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            liveness_timeout: Duration::from_secs(10),
            max_idle_per_host: crate::gate::DEFAULT_CAPACITY,
        }
    }

    pub fn with_credentials(mut self, username: String, password: Option<String>) -> Self {
        self.username = Some(username);
        self.password = password;
        self
    }
}

/// `reqwest`-backed client for an openEHR-style intake service.
#[derive(Debug, Clone)]
pub struct HttpIntake {
    client: Client,
    config: IntakeConfig,
}

impl HttpIntake {
    pub fn new(config: IntakeConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Liveness check. Only a 200 counts as reachable.
    pub async fn check_connection(&self) -> Result<(), IntakeError> {
        let url = self.url(TEMPLATE_PATH);
        debug!(url = %url, "probing intake service");
        let response = self
            .authorize(self.client.get(&url))
            .timeout(self.config.liveness_timeout)
            .send()
            .await
            .map_err(classify)?;

        if response.status().as_u16() == 200 {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }

    /// Upload one operational template (ADL 1.4 OPT XML).
    pub async fn upload_template(&self, template_xml: String) -> Result<(), IntakeError> {
        let response = self
            .authorize(self.client.post(self.url(TEMPLATE_PATH)))
            .header(CONTENT_TYPE, XML)
            .header(PREFER, RETURN_REPRESENTATION)
            .body(template_xml)
            .send()
            .await
            .map_err(classify)?;
        ensure_success(response).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_deref()),
            None => request,
        }
    }
}

#[async_trait]
impl IntakeService for HttpIntake {
    async fn create_ehr(&self) -> Result<String, IntakeError> {
        let response = self
            .authorize(self.client.post(self.url(EHR_PATH)))
            .header(ACCEPT, JSON)
            .header(PREFER, RETURN_REPRESENTATION)
            .send()
            .await
            .map_err(classify)?;
        let response = ensure_success(response).await?;
        let created: EhrCreated = response
            .json()
            .await
            .map_err(|err| IntakeError::Malformed(err.to_string()))?;
        Ok(created.ehr_id.value)
    }

    async fn submit_composition(
        &self,
        ehr_id: &str,
        composition: &Value,
    ) -> Result<(), IntakeError> {
        let response = self
            .authorize(self.client.post(self.url(&composition_path(ehr_id))))
            .header(ACCEPT, JSON)
            .header(PREFER, RETURN_REPRESENTATION)
            .json(composition)
            .send()
            .await
            .map_err(classify)?;
        ensure_success(response).await.map(|_| ())
    }
}

fn classify(err: reqwest::Error) -> IntakeError {
    if err.is_timeout() {
        IntakeError::Timeout
    } else {
        IntakeError::Transport(err.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, IntakeError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(response).await)
    }
}

async fn status_error(response: Response) -> IntakeError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    IntakeError::Status {
        status,
        body: body.chars().take(BODY_EXCERPT_CHARS).collect(),
    }
}
