//! HTTP transport for CAS ticket validation.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use forms_auth::{CasEndpoints, CasServiceResponse, ValidationOutcome};

/// Largest validation body accepted; real service responses are a few KiB.
pub const MAX_CAS_BODY_BYTES: usize = 64 * 1024;

/// Failure to obtain a usable answer from the CAS server.
///
/// Every variant is an upstream error for the login flow; the browser is sent
/// back to the front-end with an error instead of retrying.
#[derive(Debug, Error)]
pub enum CasError {
    #[error("failed to build cas http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("cas request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("cas responded with status {status} and an unreadable body")]
    Status { status: reqwest::StatusCode },

    #[error("cas response is not a service response: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("cas response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Client for one CAS deployment.
///
/// Holds a pooled `reqwest::Client`; clone freely.
#[derive(Debug, Clone)]
pub struct CasClient {
    endpoints: CasEndpoints,
    http: reqwest::Client,
}

impl CasClient {
    /// `timeout` bounds the whole validation exchange (connect + body).
    ///
    /// `ca_bundle` names a PEM file of extra trusted roots. A bundle that
    /// cannot be read or parsed is logged and skipped; the client still
    /// trusts the built-in roots.
    pub fn new(
        endpoints: CasEndpoints,
        timeout: Duration,
        ca_bundle: Option<&Path>,
    ) -> Result<Self, CasError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none());

        if let Some(path) = ca_bundle {
            for cert in load_ca_bundle(path) {
                builder = builder.add_root_certificate(cert);
            }
        }

        let http = builder.build().map_err(CasError::Client)?;
        Ok(Self { endpoints, http })
    }

    pub fn endpoints(&self) -> &CasEndpoints {
        &self.endpoints
    }

    /// Redeem `ticket` against `serviceValidate`.
    ///
    /// One attempt, no retries. Dropping the returned future aborts the
    /// outbound request.
    #[tracing::instrument(skip_all)]
    pub async fn validate_ticket(&self, ticket: &str) -> Result<ValidationOutcome, CasError> {
        let response = self
            .http
            .get(self.endpoints.validate_url(ticket))
            .send()
            .await
            .map_err(CasError::Transport)?;

        let status = response.status();
        let body = read_capped(response, MAX_CAS_BODY_BYTES).await?;

        // CAS reports failures in the body, sometimes with a non-2xx status.
        match CasServiceResponse::from_slice(&body) {
            Ok(parsed) => {
                let outcome = parsed.interpret();
                tracing::debug!(%status, ?outcome, "cas ticket validated");
                Ok(outcome)
            }
            Err(_) if !status.is_success() => Err(CasError::Status { status }),
            Err(e) => Err(CasError::Parse(e)),
        }
    }
}

fn load_ca_bundle(path: &Path) -> Vec<reqwest::Certificate> {
    let pem = match std::fs::read(path) {
        Ok(pem) => pem,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read ca bundle; ignoring");
            return Vec::new();
        }
    };
    match reqwest::Certificate::from_pem_bundle(&pem) {
        Ok(certs) => {
            tracing::info!(path = %path.display(), count = certs.len(), "loaded ca bundle");
            certs
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot parse ca bundle; ignoring");
            Vec::new()
        }
    }
}

async fn read_capped(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, CasError> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(CasError::TooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(CasError::Transport)? {
        if body.len() + chunk.len() > limit {
            return Err(CasError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    use forms_core::ExternalIdentity;

    use super::*;

    const SERVICE: &str = "http://localhost:8647/api/auth/login/callback";

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    struct FakeCas {
        base_url: String,
        seen: Seen,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Drop for FakeCas {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    async fn validate(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        seen.lock().unwrap().push(params.clone());
        match params.get("ticket").map(String::as_str) {
            Some("ST-good") => (
                StatusCode::OK,
                r#"{"serviceResponse":{"authenticationSuccess":{"user":"jdoe","attributes":{"uid":["2021101001"],"Name":["Jane Doe"],"E-Mail":["jane@example.edu"]}}}}"#,
            )
                .into_response(),
            Some("ST-html") => (StatusCode::OK, "<html>maintenance</html>").into_response(),
            Some("ST-502") => (StatusCode::BAD_GATEWAY, "bad gateway").into_response(),
            Some("ST-huge") => (StatusCode::OK, "x".repeat(MAX_CAS_BODY_BYTES + 1)).into_response(),
            Some("ST-slow") => {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                (StatusCode::OK, "{}").into_response()
            }
            _ => (
                StatusCode::OK,
                r#"{"serviceResponse":{"authenticationFailure":{"code":"INVALID_TICKET","description":"not recognized"}}}"#,
            )
                .into_response(),
        }
    }

    async fn spawn_fake_cas() -> FakeCas {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/cas/serviceValidate", get(validate))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeCas {
            base_url: format!("http://{addr}/cas"),
            seen,
            handle,
        }
    }

    fn client(base_url: &str, timeout: Duration) -> CasClient {
        CasClient::new(CasEndpoints::new(base_url, SERVICE), timeout, None).unwrap()
    }

    #[tokio::test]
    async fn valid_ticket_yields_identity() {
        let cas = spawn_fake_cas().await;
        let outcome = client(&cas.base_url, Duration::from_secs(2))
            .validate_ticket("ST-good")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ValidationOutcome::Validated(ExternalIdentity {
                external_id: Some("2021101001".to_string()),
                email: Some("jane@example.edu".to_string()),
                display_name: Some("Jane Doe".to_string()),
            })
        );

        let seen = cas.seen.lock().unwrap();
        assert_eq!(seen[0].get("service").map(String::as_str), Some(SERVICE));
        assert_eq!(seen[0].get("format").map(String::as_str), Some("JSON"));
    }

    #[tokio::test]
    async fn unknown_ticket_is_invalid_ticket() {
        let cas = spawn_fake_cas().await;
        let outcome = client(&cas.base_url, Duration::from_secs(2))
            .validate_ticket("ST-unknown")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::InvalidTicket);
    }

    #[tokio::test]
    async fn non_json_body_is_parse_error() {
        let cas = spawn_fake_cas().await;
        let err = client(&cas.base_url, Duration::from_secs(2))
            .validate_ticket("ST-html")
            .await
            .unwrap_err();
        assert!(matches!(err, CasError::Parse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn error_status_without_service_response_is_status_error() {
        let cas = spawn_fake_cas().await;
        let err = client(&cas.base_url, Duration::from_secs(2))
            .validate_ticket("ST-502")
            .await
            .unwrap_err();
        assert!(
            matches!(err, CasError::Status { status } if status == reqwest::StatusCode::BAD_GATEWAY),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn slow_server_hits_timeout() {
        let cas = spawn_fake_cas().await;
        let err = client(&cas.base_url, Duration::from_millis(200))
            .validate_ticket("ST-slow")
            .await
            .unwrap_err();
        match err {
            CasError::Transport(e) => assert!(e.is_timeout(), "{e:?}"),
            other => panic!("expected transport timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}/cas"), Duration::from_secs(2))
            .validate_ticket("ST-good")
            .await
            .unwrap_err();
        assert!(matches!(err, CasError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let cas = spawn_fake_cas().await;
        let err = client(&cas.base_url, Duration::from_secs(2))
            .validate_ticket("ST-huge")
            .await
            .unwrap_err();
        assert!(
            matches!(err, CasError::TooLarge { limit } if limit == MAX_CAS_BODY_BYTES),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn unusable_ca_bundle_is_skipped() {
        let cas = spawn_fake_cas().await;
        let dir = std::env::temp_dir().join(format!("forms-ca-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let garbage = dir.join("garbage.pem");
        std::fs::write(&garbage, "not a certificate").unwrap();

        for path in [dir.join("missing.pem"), garbage] {
            let client = CasClient::new(
                CasEndpoints::new(&cas.base_url, SERVICE),
                Duration::from_secs(2),
                Some(path.as_path()),
            )
            .unwrap();
            let outcome = client.validate_ticket("ST-unknown").await.unwrap();
            assert_eq!(outcome, ValidationOutcome::InvalidTicket);
        }
    }
}
