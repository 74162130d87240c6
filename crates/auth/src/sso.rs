//! CAS single-sign-on handshake (protocol v3, JSON mode).
//!
//! Transport-agnostic: this module builds the URLs the browser and the server
//! talk to, and interprets a `serviceValidate` response. The actual HTTP call
//! lives with the infrastructure adapters.

use serde::Deserialize;

use forms_core::ExternalIdentity;

/// Failure code CAS uses for an unknown, expired or already-redeemed ticket.
pub const INVALID_TICKET: &str = "INVALID_TICKET";

/// Endpoints of one CAS deployment, bound to this application's service URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasEndpoints {
    base_url: String,
    service_url: String,
}

impl CasEndpoints {
    pub fn new(base_url: impl Into<String>, service_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            service_url: service_url.into(),
        }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// `{base}/login?service=<service>`
    pub fn login_url(&self) -> String {
        format!("{}/login?service={}", self.base_url, escape(&self.service_url))
    }

    /// `{base}/logout`
    pub fn logout_url(&self) -> String {
        format!("{}/logout", self.base_url)
    }

    /// `{base}/serviceValidate?service=<service>&ticket=<ticket>&format=JSON`
    pub fn validate_url(&self, ticket: &str) -> String {
        format!(
            "{}/serviceValidate?service={}&ticket={}&format=JSON",
            self.base_url,
            escape(&self.service_url),
            escape(ticket)
        )
    }
}

fn escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Body of a `serviceValidate` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CasServiceResponse {
    #[serde(rename = "serviceResponse")]
    pub service_response: ServiceResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceResponse {
    #[serde(rename = "authenticationSuccess", default)]
    pub success: Option<AuthenticationSuccess>,
    #[serde(rename = "authenticationFailure", default)]
    pub failure: Option<AuthenticationFailure>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthenticationSuccess {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub attributes: CasAttributes,
}

/// Released attributes. CAS sends every attribute as a list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CasAttributes {
    #[serde(rename = "uid", default)]
    pub uid: Option<Vec<String>>,
    #[serde(rename = "Name", default)]
    pub name: Option<Vec<String>>,
    #[serde(rename = "E-Mail", default)]
    pub email: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthenticationFailure {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

fn first(values: &Option<Vec<String>>) -> Option<String> {
    values.as_ref().and_then(|v| v.first()).cloned()
}

/// What a ticket validation means for the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// CAS vouched for a principal with a usable external id.
    Validated(ExternalIdentity),
    /// The ticket was rejected; the browser should restart the handshake.
    InvalidTicket,
    /// CAS answered but released no external id. Treated as a denial.
    MissingIdentity { code: Option<String> },
}

impl CasServiceResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Classify the response.
    ///
    /// Only a success form with a non-blank external id ever yields
    /// [`ValidationOutcome::Validated`].
    pub fn interpret(&self) -> ValidationOutcome {
        let response = &self.service_response;

        let failure_code = response
            .failure
            .as_ref()
            .map(|f| f.code.trim())
            .filter(|code| !code.is_empty());

        if failure_code == Some(INVALID_TICKET) {
            return ValidationOutcome::InvalidTicket;
        }

        if let Some(success) = &response.success {
            let identity = ExternalIdentity {
                external_id: first(&success.attributes.uid),
                email: first(&success.attributes.email),
                display_name: first(&success.attributes.name),
            };
            if identity.external_id().is_some() {
                return ValidationOutcome::Validated(identity);
            }
        }

        ValidationOutcome::MissingIdentity {
            code: failure_code.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> CasEndpoints {
        CasEndpoints::new(
            "https://login.example.edu/cas/",
            "http://localhost:8647/api/auth/login/callback",
        )
    }

    fn parse(json: &str) -> CasServiceResponse {
        CasServiceResponse::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn login_url_escapes_service() {
        assert_eq!(
            endpoints().login_url(),
            "https://login.example.edu/cas/login?service=http%3A%2F%2Flocalhost%3A8647%2Fapi%2Fauth%2Flogin%2Fcallback"
        );
    }

    #[test]
    fn logout_url() {
        assert_eq!(endpoints().logout_url(), "https://login.example.edu/cas/logout");
    }

    #[test]
    fn validate_url_escapes_ticket_and_requests_json() {
        let url = endpoints().validate_url("ST-1&x=y");
        assert_eq!(
            url,
            "https://login.example.edu/cas/serviceValidate?service=http%3A%2F%2Flocalhost%3A8647%2Fapi%2Fauth%2Flogin%2Fcallback&ticket=ST-1%26x%3Dy&format=JSON"
        );
    }

    #[test]
    fn success_takes_first_attribute_values() {
        let response = parse(
            r#"{"serviceResponse":{"authenticationSuccess":{"user":"jdoe","attributes":{
                "uid":["2021101001","ignored"],
                "Name":["Jane Doe"],
                "E-Mail":["jane@example.edu","alt@example.edu"]
            }}}}"#,
        );

        assert_eq!(
            response.interpret(),
            ValidationOutcome::Validated(ExternalIdentity {
                external_id: Some("2021101001".to_string()),
                email: Some("jane@example.edu".to_string()),
                display_name: Some("Jane Doe".to_string()),
            })
        );
    }

    #[test]
    fn success_without_optional_attributes_is_still_validated() {
        let response = parse(
            r#"{"serviceResponse":{"authenticationSuccess":{"attributes":{"uid":["u-1"],"Name":null}}}}"#,
        );
        let ValidationOutcome::Validated(identity) = response.interpret() else {
            panic!("expected a validated identity");
        };
        assert_eq!(identity.external_id(), Some("u-1"));
        assert_eq!(identity.email, None);
        assert_eq!(identity.display_name, None);
    }

    #[test]
    fn invalid_ticket_restarts_handshake() {
        let response = parse(
            r#"{"serviceResponse":{"authenticationFailure":{"code":"INVALID_TICKET","description":"Ticket 'ST-1' not recognized"}}}"#,
        );
        assert_eq!(response.interpret(), ValidationOutcome::InvalidTicket);
    }

    #[test]
    fn empty_external_id_is_a_denial() {
        for json in [
            r#"{"serviceResponse":{"authenticationSuccess":{"attributes":{"uid":[]}}}}"#,
            r#"{"serviceResponse":{"authenticationSuccess":{"attributes":{"uid":[""]}}}}"#,
            r#"{"serviceResponse":{"authenticationSuccess":{"attributes":{}}}}"#,
            r#"{"serviceResponse":{"authenticationSuccess":{}}}"#,
        ] {
            assert_eq!(
                parse(json).interpret(),
                ValidationOutcome::MissingIdentity { code: None },
                "{json}"
            );
        }
    }

    #[test]
    fn other_failure_codes_are_denials_with_code() {
        let response = parse(
            r#"{"serviceResponse":{"authenticationFailure":{"code":"INVALID_SERVICE","description":"bad service"}}}"#,
        );
        assert_eq!(
            response.interpret(),
            ValidationOutcome::MissingIdentity {
                code: Some("INVALID_SERVICE".to_string())
            }
        );
    }

    #[test]
    fn non_cas_json_fails_to_parse() {
        assert!(CasServiceResponse::from_slice(b"<html>oops</html>").is_err());
        assert!(CasServiceResponse::from_slice(br#"{"unexpected":true}"#).is_err());
    }
}
