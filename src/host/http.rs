//! Outbound HTTP for scripts.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::Method;

use super::HostError;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
    /// Redirects followed before giving up; `Some(0)` disables following.
    pub max_redirects: Option<usize>,
}

impl HttpRequest {
    pub fn new(method: &str, url: &str) -> Self {
        HttpRequest {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            headers: vec![],
            body: None,
            timeout: None,
            max_redirects: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header values by lower-case name.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first())
            .map(String::as_str)
    }
}

/// Performs requests. Implementations block; callers run them off the loop
/// thread.
pub trait HttpClient: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HostError>;
}

/// [`HttpClient`] on top of `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    pub default_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ReqwestClient {
    fn default() -> Self {
        ReqwestClient {
            default_timeout: Some(Duration::from_secs(60)),
            user_agent: concat!("mokapi-engine/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HostError> {
        let http_error = |message: String| HostError::Http {
            url: request.url.clone(),
            message,
        };
        let policy = match request.max_redirects {
            Some(0) => Policy::none(),
            Some(n) => Policy::limited(n),
            None => Policy::default(),
        };
        let mut builder = Client::builder().redirect(policy).user_agent(self.user_agent.as_str());
        if let Some(timeout) = request.timeout.or(self.default_timeout) {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| http_error(e.to_string()))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| http_error(format!("invalid method {}", request.method)))?;
        let mut outgoing = client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            outgoing = outgoing.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            outgoing = outgoing.body(body.clone());
        }
        log::debug!("{} {}", request.method, request.url);
        let response = outgoing.send().map_err(|e| {
            if e.is_timeout() {
                HostError::Timeout {
                    url: request.url.clone(),
                }
            } else {
                http_error(e.to_string())
            }
        })?;
        let status = response.status().as_u16();
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let body = response.bytes().map_err(|e| http_error(e.to_string()))?.to_vec();
        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let r = HttpRequest::new("post", "http://localhost/x").header("Content-Type", "text/plain");
        assert_eq!(r.method, "POST");
        assert!(r.has_header("content-type"));
    }

    #[test]
    fn response_header_lookup_is_case_insensitive() {
        let mut res = HttpResponse::default();
        res.headers.insert("content-type".into(), vec!["application/json".into()]);
        assert_eq!(res.header("Content-Type"), Some("application/json"));
    }
}
