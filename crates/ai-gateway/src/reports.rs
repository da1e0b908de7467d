use crate::client::consts;
use crate::error::{GatewayError, error_details};
use reqwest::StatusCode;

/// Posts finished practice reports to the backend API on behalf of a signed in user.
pub struct ReportClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReportClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn submit<T: serde::Serialize + ?Sized>(
        &self,
        report: &T,
        token: &str,
    ) -> Result<(), GatewayError> {
        let url = format!("{}{}", self.base_url, consts::REPORTS_PATH);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(report)
            .send()
            .await
            .map_err(GatewayError::transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::AuthRequired {
                status: status.as_u16(),
                message: error_details(&body),
            }),
            StatusCode::TOO_MANY_REQUESTS => Err(GatewayError::RateLimited),
            _ => Err(GatewayError::Upstream {
                status: Some(status.as_u16()),
                details: error_details(&body),
            }),
        }
    }
}
