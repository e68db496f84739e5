//! Best-effort CI notification after a successful deploy.

use serde::Serialize;
use tracing::{debug, info, warn};

/// One deployed instance in the callback payload.
#[derive(Debug, Serialize)]
pub struct DeployedService {
    #[serde(rename = "RegisterId")]
    pub register_id: String,
    #[serde(rename = "Address")]
    pub address: String,
}

/// POST the deployed-instance summary to the CI endpoint.
///
/// Form-encoded body: `job=<j>&token=<t>&services=<json>`. Failures are
/// logged and swallowed; the deploy already succeeded.
pub async fn notify(url: &str, job: &str, token: &str, services: &[DeployedService]) {
    let payload = match serde_json::to_string(services) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "cannot encode callback payload");
            return;
        }
    };

    debug!(%url, job, %payload, "sending deploy callback");
    let client = reqwest::Client::new();
    let result = client
        .post(url)
        .form(&[("job", job), ("token", token), ("services", payload.as_str())])
        .send()
        .await;

    match result {
        Ok(response) => {
            info!(status = %response.status(), "deploy callback delivered");
        }
        Err(e) => {
            warn!(error = %e, "deploy callback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_upstream_field_names() {
        let services = vec![DeployedService {
            register_id: "node-1:api_c1:8080".to_string(),
            address: "10.0.0.5:32768".to_string(),
        }];
        let json = serde_json::to_string(&services).unwrap();
        assert_eq!(
            json,
            r#"[{"RegisterId":"node-1:api_c1:8080","Address":"10.0.0.5:32768"}]"#
        );
    }
}
