use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum EndpointError {
    ParseError(url::ParseError),
    /// URLs such as `mailto:` or `data:` cannot receive a JSON-RPC call.
    CannotBeABase(String),
    RedactError(String),
}

/// A JSON-RPC endpoint URL that never prints its secrets.
///
/// Providers commonly embed API keys in the userinfo, path or query. `Display` and `Debug` only
/// ever show scheme, host and port. Serialization keeps the full URL so a config round-trips.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    full: Url,
    redacted: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::ParseError(e) => write!(f, "invalid endpoint url: {}", e),
            EndpointError::CannotBeABase(scheme) => {
                write!(f, "{}: urls cannot serve JSON-RPC", scheme)
            }
            EndpointError::RedactError(reason) => f.write_str(reason),
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(url: String) -> Result<Self, Self::Error> {
        Endpoint::parse(&url)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> String {
        endpoint.full.into()
    }
}

impl std::str::FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let full = Url::parse(url).map_err(EndpointError::ParseError)?;
        Endpoint::new(full)
    }

    fn new(full: Url) -> Result<Self, EndpointError> {
        if full.cannot_be_a_base() {
            return Err(EndpointError::CannotBeABase(full.scheme().to_string()));
        }

        let mut redacted = full.clone();
        redacted.set_path("");
        redacted.set_query(None);
        redacted.set_fragment(None);
        if redacted.has_authority() {
            redacted
                .set_username("")
                .map_err(|_| EndpointError::RedactError("Unable to redact username.".into()))?;
            redacted
                .set_password(None)
                .map_err(|_| EndpointError::RedactError("Unable to redact password.".into()))?;
        }

        Ok(Self {
            full,
            redacted: redacted.to_string(),
        })
    }

    /// The URL the endpoint was configured with, secrets included.
    pub fn full(&self) -> &Url {
        &self.full
    }

    /// The URL JSON-RPC calls are posted to: the root of the configured endpoint.
    ///
    /// Userinfo is kept so that basic-auth credentials still reach the server.
    pub fn rpc_url(&self) -> Url {
        let mut url = self.full.clone();
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}
