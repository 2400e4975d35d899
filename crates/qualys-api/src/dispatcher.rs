// Request dispatcher
//
// The single call site for every endpoint. A dispatch validates the
// request against its descriptor, resolves and expands the URL, obtains
// credentials (refreshing a stale bearer token under the credential's
// lock), normalizes parameters, and then runs the send loop: rate-limit
// exhaustion sleeps and retries the identical request, everything else
// is interpreted once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::credential::Credential;
use crate::decode::{conflict_text, decode_error};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Sleeper, StdoutSink, TokioSleeper};
use crate::error::Error;
use crate::normalize::{normalize, take_xml_body};
use crate::platform::resolve;
use crate::rate_limit::RateLimitView;
use crate::registry::{BodyEncoding, EndpointDescriptor, describe};
use crate::request::{CallRequest, Params, XML_DATA_KEY};
use crate::response::CallResponse;
use crate::template::{self, placeholders};
use crate::transport::TransportConfig;

/// Header the classic API requires on every request.
const REQUESTED_WITH: &str = "X-Requested-With";
const REQUESTED_WITH_VALUE: &str = "qualys-api";

/// Rate-limit tuning. The defaults match the platform's documented window.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Wait used when the budget is exhausted but no `ToWait-Sec` header says how long.
    pub default_wait: Duration,
    /// Added to the server's `ToWait-Sec` value.
    pub wait_margin: Duration,
    /// Warn when fewer than this many calls remain.
    pub warn_below: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_secs(3601),
            wait_margin: Duration::from_secs(3),
            warn_below: 10,
        }
    }
}

impl DispatchConfig {
    /// How long to sleep before retrying an exhausted window.
    pub fn wait_for(&self, view: &RateLimitView) -> Duration {
        view.retry_after_seconds
            .map_or(self.default_wait, |secs| {
                Duration::from_secs(secs).saturating_add(self.wait_margin)
            })
    }
}

/// Sends [`CallRequest`]s on behalf of a [`Credential`].
///
/// Cheap to share: clone the `Arc` or borrow it from many tasks. The
/// dispatcher holds no per-credential state; token state lives in the
/// credential itself.
pub struct Dispatcher {
    http: reqwest::Client,
    config: DispatchConfig,
    sink: Arc<dyn DiagnosticSink>,
    sleeper: Arc<dyn Sleeper>,
}

enum Auth {
    Basic { username: String, password: String },
    Bearer(SecretString),
}

#[cfg_attr(test, derive(Debug))]
enum PreparedBody {
    Empty,
    Xml(String),
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully validated request, reusable across rate-limit retries.
#[cfg_attr(test, derive(Debug))]
struct PreparedRequest {
    method: reqwest::Method,
    url: Url,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: PreparedBody,
}

impl Dispatcher {
    /// Build a dispatcher with its own HTTP client.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?))
    }

    /// Build a dispatcher around an existing HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            config: DispatchConfig::default(),
            sink: Arc::new(StdoutSink),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The underlying HTTP client (token issue shares it).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub(crate) fn emit(&self, diagnostic: &Diagnostic) {
        self.sink.emit(diagnostic);
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Send one request and interpret the response.
    pub async fn dispatch(
        &self,
        credential: &Credential,
        request: CallRequest,
    ) -> Result<CallResponse, Error> {
        let desc = describe(&request.module, &request.endpoint)?;
        let deadline = request.deadline;
        let prepared = prepare(desc, credential, request)?;
        let auth = self.authorize(credential).await?;
        self.execute(desc, &prepared, &auth, deadline).await
    }

    /// Run the liveness probe (`auth/about`) and record the advertised
    /// rate limit on the basic credential.
    pub async fn probe(&self, credential: &Credential) -> Result<RateLimitView, Error> {
        let response = self
            .dispatch(credential, CallRequest::new("auth", "about"))
            .await?;
        let view = response.rate_limit();
        if let Credential::Basic(basic) = credential {
            basic.record_rate_limit(view.clone());
        }
        Ok(view)
    }

    async fn authorize(&self, credential: &Credential) -> Result<Auth, Error> {
        match credential {
            Credential::Basic(c) => Ok(Auth::Basic {
                username: c.username().to_owned(),
                password: c.password().to_owned(),
            }),
            Credential::Bearer(c) => {
                let (token, refreshed) = c.fresh_token(&self.http).await?;
                if refreshed {
                    self.emit(&Diagnostic::TokenRefreshed {
                        username: c.username().to_owned(),
                    });
                }
                Ok(Auth::Bearer(token))
            }
        }
    }

    async fn execute(
        &self,
        desc: &EndpointDescriptor,
        prepared: &PreparedRequest,
        auth: &Auth,
        deadline: Option<Instant>,
    ) -> Result<CallResponse, Error> {
        let endpoint = desc.qualified_name();
        let mut waited = Duration::ZERO;

        loop {
            debug!("{} {}", prepared.method, prepared.url);
            let resp = self.build(prepared, auth).send().await?;
            let status = resp.status().as_u16();
            let headers = resp.headers().clone();
            let body = resp.bytes().await?;
            let view = RateLimitView::from_headers(&headers);

            if status == 429 || view.is_exhausted() {
                let wait = self.config.wait_for(&view);
                if let Some(deadline) = deadline {
                    if Instant::now().checked_add(wait).is_none_or(|end| end > deadline) {
                        return Err(Error::Timeout {
                            waited_secs: waited.as_secs(),
                        });
                    }
                }
                self.emit(&Diagnostic::RateLimitSleep {
                    endpoint: endpoint.clone(),
                    seconds: wait.as_secs(),
                });
                self.sleeper.sleep(wait).await;
                waited = waited.saturating_add(wait);
                debug!(%endpoint, "retrying after rate-limit wait");
                continue;
            }

            if let Some(remaining) = view.remaining {
                if remaining < self.config.warn_below {
                    self.emit(&Diagnostic::RateLimitApproaching {
                        endpoint: endpoint.clone(),
                        remaining,
                    });
                }
            }

            return interpret(desc, status, headers, body);
        }
    }

    fn build(&self, prepared: &PreparedRequest, auth: &Auth) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(prepared.method.clone(), prepared.url.clone());

        if !prepared.query.is_empty() {
            builder = builder.query(&prepared.query);
        }

        builder = match auth {
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::Bearer(token) => builder.bearer_auth(token.expose_secret()),
        };

        builder = match &prepared.body {
            PreparedBody::Empty => builder,
            PreparedBody::Xml(xml) => builder
                .header(CONTENT_TYPE, "text/xml")
                .body(xml.clone()),
            PreparedBody::Json(value) => builder.json(value),
            PreparedBody::Form(pairs) => builder.form(pairs),
        };

        // Caller overrides go last so they win.
        builder.headers(prepared.headers.clone())
    }
}

fn interpret(
    desc: &EndpointDescriptor,
    status: u16,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<CallResponse, Error> {
    if status == 409 {
        if let Some(message) = conflict_text(&body) {
            warn!(endpoint = %desc.qualified_name(), "{message}");
            let mut response = CallResponse::new(status, headers, body, desc.response);
            response.conflict = Some(message);
            return Ok(response);
        }
    }

    if status == 401 {
        let decoded = decode_error(&body, desc.response);
        return Err(Error::Authentication {
            message: decoded.message,
        });
    }

    if (400..600).contains(&status) && desc.structured_errors {
        let decoded = decode_error(&body, desc.response);
        debug!(status, tag = %decoded.tag, "decoded error body");
        return Err(Error::Api {
            status,
            message: decoded.message,
            tag: decoded.tag,
        });
    }

    Ok(CallResponse::new(status, headers, body, desc.response))
}

// ── Preparation ──────────────────────────────────────────────────────

fn prepare(
    desc: &EndpointDescriptor,
    credential: &Credential,
    request: CallRequest,
) -> Result<PreparedRequest, Error> {
    let endpoint = desc.qualified_name();

    if credential.flavor() != desc.auth {
        return Err(Error::AuthFlavorMismatch {
            endpoint,
            expected: desc.auth,
            got: credential.flavor(),
        });
    }

    let method = match request.method_override {
        Some(method) if !desc.allows_method(method) => {
            return Err(Error::MethodNotAllowed {
                endpoint,
                method,
                allowed: desc.methods.to_vec(),
            });
        }
        Some(method) => method,
        None => desc.default_method(),
    };

    let CallRequest {
        mut path_params,
        mut query_params,
        mut body_fields,
        json_body,
        headers_override,
        ..
    } = request;

    validate_keys(desc, &query_params, &body_fields)?;

    let path = template::expand(
        desc.path_template,
        &mut path_params,
        &mut query_params,
        &mut body_fields,
    )?;
    if let Some(leftover) = path_params.keys().next() {
        return Err(Error::UnknownParam {
            endpoint,
            param: leftover.clone(),
        });
    }
    let url = Url::parse(&format!("{}{path}", resolve(desc.url_class, credential.platform())))?;

    let xml = take_xml_body(&mut body_fields).or_else(|| take_xml_body(&mut query_params));
    if desc.normalize {
        query_params = normalize(&query_params);
        // JSON bodies keep native types.
        if matches!(desc.body_encoding, BodyEncoding::Form) {
            body_fields = normalize(&body_fields);
        }
    }

    let body = match xml {
        Some(xml) if desc.accepts_xml_body => PreparedBody::Xml(xml),
        _ => match desc.body_encoding {
            BodyEncoding::Json => match json_body {
                Some(value) => PreparedBody::Json(value),
                None if body_fields.is_empty() => PreparedBody::Empty,
                None => PreparedBody::Json(Value::Object(
                    body_fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect::<Map<_, _>>(),
                )),
            },
            BodyEncoding::Form if body_fields.is_empty() => PreparedBody::Empty,
            BodyEncoding::Form => PreparedBody::Form(wire_pairs(&body_fields)),
        },
    };

    let mut headers = HeaderMap::new();
    headers.insert(REQUESTED_WITH, HeaderValue::from_static(REQUESTED_WITH_VALUE));
    for (name, value) in &headers_override {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(PreparedRequest {
        method: method.as_reqwest(),
        url,
        query: wire_pairs(&query_params),
        headers,
        body,
    })
}

fn wire_pairs(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_query_string()))
        .collect()
}

fn validate_keys(
    desc: &EndpointDescriptor,
    query_params: &Params,
    body_fields: &Params,
) -> Result<(), Error> {
    let template_tokens = placeholders(desc.path_template);
    let reserved = |key: &str| {
        template_tokens.contains(&key) || (desc.accepts_xml_body && key == XML_DATA_KEY)
    };

    if let Some(param) = query_params
        .keys()
        .find(|k| !desc.allows_param(k.as_str()) && !reserved(k.as_str()))
    {
        return Err(Error::UnknownParam {
            endpoint: desc.qualified_name(),
            param: param.clone(),
        });
    }
    if let Some(field) = body_fields
        .keys()
        .find(|k| !desc.allows_body_field(k.as_str()) && !reserved(k.as_str()))
    {
        return Err(Error::UnknownBodyField {
            endpoint: desc.qualified_name(),
            field: field.clone(),
        });
    }
    Ok(())
}
