//! HTTP steps
//!
//! Issues one request built from templates and checks the response against
//! a list of expectations. Without an explicit status code expectation the
//! response must be `200`.

use anyhow::Result;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::debug;

use super::Step;
use crate::context::ExecutionContext;
use crate::error::ExpectationError;
use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// Check applied to a response
pub type Expectation = Box<dyn Fn(&HttpResponse) -> Result<()> + Send + Sync>;

const AUTHORIZATION: &str = "Authorization";

static SHARED_CLIENT: OnceCell<HttpClient> = OnceCell::const_new();

/// Step issuing an HTTP request
pub struct HttpStep {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    basic_auth: Option<(String, String)>,
    expectations: Vec<Expectation>,
    code_expectation_set: bool,
    client: Option<HttpClient>,
}

impl HttpStep {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            basic_auth: None,
            expectations: Vec::new(),
            code_expectation_set: false,
            client: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, content_type: &str, body: impl Into<String>) -> Self {
        Self::new("POST", url)
            .with_header("Content-Type", content_type)
            .with_body(body)
    }

    /// Use `client` instead of the process wide default client
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Set a header, replacing any header of the same name
    ///
    /// An `Authorization` header also replaces basic auth credentials.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case(AUTHORIZATION) {
            self.basic_auth = None;
        }
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_authorization(self, authorization: impl Into<String>) -> Self {
        self.with_header(AUTHORIZATION, authorization)
    }

    /// Send basic auth credentials, replacing any `Authorization` header
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(AUTHORIZATION));
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    /// Register a custom expectation
    pub fn expect<F>(mut self, expectation: F) -> Self
    where
        F: Fn(&HttpResponse) -> Result<()> + Send + Sync + 'static,
    {
        self.expectations.push(Box::new(expectation));
        self
    }

    /// Content type must start with `content_type`
    pub fn has_content_type(self, content_type: impl Into<String>) -> Self {
        let expected = content_type.into();
        self.expect(move |resp| {
            if !resp.content_type().starts_with(&expected) {
                return Err(ExpectationError::ContentType {
                    actual: resp.content_type().to_string(),
                    expected: expected.clone(),
                }
                .into());
            }
            Ok(())
        })
    }

    pub fn has_code(mut self, code: u16) -> Self {
        self.code_expectation_set = true;
        self.expect(move |resp| {
            if resp.status_code != code {
                return Err(ExpectationError::Status {
                    actual: resp.status_code,
                    expected: code,
                }
                .into());
            }
            Ok(())
        })
    }

    /// Status code must be within `min..=max`
    pub fn has_code_range(mut self, min: u16, max: u16) -> Self {
        self.code_expectation_set = true;
        self.expect(move |resp| {
            if !(min..=max).contains(&resp.status_code) {
                return Err(ExpectationError::StatusRange {
                    actual: resp.status_code,
                    min,
                    max,
                }
                .into());
            }
            Ok(())
        })
    }

    pub fn has_non_error_code(self) -> Self {
        self.has_code_range(200, 399)
    }

    /// Body must contain `substring`
    pub fn contains(self, substring: impl Into<String>) -> Self {
        let expected = substring.into();
        self.expect(move |resp| {
            if !resp.body_contains(&expected) {
                return Err(ExpectationError::Contains {
                    expected: expected.clone(),
                    body: resp.body.clone(),
                }
                .into());
            }
            Ok(())
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn client(&self) -> Result<HttpClient> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = SHARED_CLIENT
            .get_or_try_init(|| async { HttpClient::new() })
            .await?;
        Ok(client.clone())
    }

    fn build_request(&self, ctx: &ExecutionContext) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(&self.method, ctx.expand_vars(&self.url)?);

        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            request = request.body(ctx.expand_vars(body)?);
        }

        for (name, value) in &self.headers {
            request = request.header(name.clone(), ctx.expand_vars(value)?);
        }

        if let Some((username, password)) = &self.basic_auth {
            request = request.basic_auth(username.clone(), password.clone());
        }

        Ok(request)
    }

    async fn run(&self, ctx: &ExecutionContext) -> Result<()> {
        let request = self.build_request(ctx)?;
        let client = self.client().await?;
        let response = client.send(request).await?;

        if !self.code_expectation_set && response.status_code != 200 {
            return Err(ExpectationError::DefaultStatus {
                actual: response.status_code,
            }
            .into());
        }

        for expectation in &self.expectations {
            expectation(&response)?;
        }

        debug!(
            "{} {} passed {} expectations",
            self.method,
            self.url,
            self.expectations.len()
        );
        Ok(())
    }
}

impl Step for HttpStep {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        ctx.expand_vars_no_error(&format!("->{} {}", self.method, self.url))
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run(ctx))
    }
}
