// qualys-api: Async Rust client for the Qualys platform APIs
//
// One dispatcher fronts every module. The endpoint registry describes
// each call; credentials carry platform and auth state; pagination
// drivers and the details pool build on `Dispatcher::dispatch`.

pub mod credential;
pub mod decode;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod materialize;
pub mod normalize;
pub mod pagination;
pub mod platform;
pub mod pool;
pub mod qps;
pub mod rate_limit;
pub mod registry;
pub mod request;
pub mod response;
pub mod template;
pub mod transport;
pub mod xml;

pub use credential::{AuthFlavor, BasicCredential, BearerCredential, Credential, MAX_TOKEN_AGE};
pub use diagnostics::{
    Diagnostic, DiagnosticSink, MemorySink, NullSink, Sleeper, StdoutSink, TokioSleeper,
    TracingSink,
};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use error::{Error, ErrorKind, ErrorTag};
pub use materialize::{FnMaterializer, JsonListMaterializer, Materializer, XmlListMaterializer};
pub use pagination::{BaseSequence, PageOptions, paginate};
pub use platform::{Platform, PlatformProfile, UrlClass};
pub use pool::fetch_details;
pub use rate_limit::RateLimitView;
pub use registry::{EndpointDescriptor, HttpMethod, MediaType, Module, PaginationStyle, describe};
pub use request::{CallRequest, ParamValue, Params};
pub use response::CallResponse;
pub use transport::{TlsMode, TransportConfig};
