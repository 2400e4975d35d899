// Endpoint schema registry
//
// A compile-time table of every endpoint the dispatcher can reach. Each
// descriptor pins down the host class, path template, permitted methods,
// auth flavor, wire encodings, and the parameter names the backend
// accepts. The table is immutable; `describe` is the only lookup path.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::credential::AuthFlavor;
use crate::error::Error;
use crate::platform::UrlClass;

// ── Descriptor vocabulary ────────────────────────────────────────────

/// HTTP methods an endpoint may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown HTTP method '{s}'"))
    }
}

/// How `body_fields` travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BodyEncoding {
    /// `application/x-www-form-urlencoded`
    Form,
    /// `application/json`
    Json,
}

/// Media type of a successful response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    Xml,
    Json,
    /// File downloads (reports, CSV exports).
    Binary,
}

/// Where a pagination driver writes its page parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamPlacement {
    Query,
    Body,
}

/// The documented pagination style of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaginationStyle {
    /// Single response; nothing to follow.
    None,
    /// Page number + page size; stop on an empty page.
    Offset {
        page_param: &'static str,
        size_param: &'static str,
        first_page: u32,
        placement: ParamPlacement,
    },
    /// Like `Offset`, but the server signals the end with an empty body.
    EmptyBody {
        page_param: &'static str,
        size_param: &'static str,
        first_page: u32,
        placement: ParamPlacement,
    },
    /// Re-request with the last record's id as the cursor. `default_size`
    /// is sent in `size_param` when the caller does not choose a size.
    LastId {
        cursor_param: &'static str,
        size_param: Option<&'static str>,
        default_size: u32,
    },
    /// QPS `hasMoreRecords` / `lastId` envelope with an `id GREATER` criterion.
    HasMore,
    /// Follow the vendor's `WARNING/URL` next-page link.
    NextLink,
}

impl fmt::Display for PaginationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Offset { .. } => "offset",
            Self::EmptyBody { .. } => "empty-body",
            Self::LastId { .. } => "last-id",
            Self::HasMore => "has-more",
            Self::NextLink => "next-link",
        };
        f.write_str(name)
    }
}

// ── Modules ──────────────────────────────────────────────────────────

/// Top-level API module.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Auth,
    Gav,
    Vmdr,
    Tagging,
    Was,
    CloudAgent,
    Totalcloud,
    Cs,
    Pm,
    Cert,
    Users,
}

impl Module {
    /// All descriptors registered under this module.
    pub fn endpoints(self) -> &'static [EndpointDescriptor] {
        match self {
            Self::Auth => AUTH,
            Self::Gav => GAV,
            Self::Vmdr => VMDR,
            Self::Tagging => TAGGING,
            Self::Was => WAS,
            Self::CloudAgent => CLOUD_AGENT,
            Self::Totalcloud => TOTALCLOUD,
            Self::Cs => CS,
            Self::Pm => PM,
            Self::Cert => CERT,
            Self::Users => USERS,
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::iter().map(Into::into).collect()
    }
}

// ── Descriptor ───────────────────────────────────────────────────────

/// The contract of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub module: Module,
    pub name: &'static str,
    pub url_class: UrlClass,
    /// Relative path, may contain `{placeholder}` tokens.
    pub path_template: &'static str,
    /// Non-empty; the first entry is the default method.
    pub methods: &'static [HttpMethod],
    pub auth: AuthFlavor,
    pub body_encoding: BodyEncoding,
    pub params: &'static [&'static str],
    pub body_fields: &'static [&'static str],
    /// Accepts a raw XML document under the reserved `_xml_data` key.
    pub accepts_xml_body: bool,
    pub response: MediaType,
    /// Run the parameter normalizer (bools to `1`/`0`, nulls to `None`).
    pub normalize: bool,
    /// 4xx/5xx bodies are vendor error envelopes worth decoding.
    pub structured_errors: bool,
    pub pagination: PaginationStyle,
}

impl EndpointDescriptor {
    /// `module/name`, for diagnostics.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.module, self.name)
    }

    /// The method used when the caller does not override it.
    pub fn default_method(&self) -> HttpMethod {
        self.methods.first().copied().unwrap_or(HttpMethod::Get)
    }

    pub fn allows_method(&self, method: HttpMethod) -> bool {
        self.methods.contains(&method)
    }

    pub fn allows_param(&self, key: &str) -> bool {
        self.params.contains(&key)
    }

    pub fn allows_body_field(&self, key: &str) -> bool {
        self.body_fields.contains(&key)
    }

    // ── const builders (table construction only) ─────────────────

    const fn new(module: Module, name: &'static str, path_template: &'static str) -> Self {
        Self {
            module,
            name,
            url_class: UrlClass::Api,
            path_template,
            methods: &[HttpMethod::Get, HttpMethod::Post],
            auth: AuthFlavor::Basic,
            body_encoding: BodyEncoding::Form,
            params: &[],
            body_fields: &[],
            accepts_xml_body: false,
            response: MediaType::Xml,
            normalize: true,
            structured_errors: true,
            pagination: PaginationStyle::None,
        }
    }

    /// Classic `/api/2.0/fo/` and `/msp/` endpoints: basic auth, form in, XML out.
    const fn fo(module: Module, name: &'static str, path: &'static str) -> Self {
        Self::new(module, name, path)
    }

    /// QPS REST endpoints: basic auth, XML `ServiceRequest` bodies.
    const fn qps(module: Module, name: &'static str, path: &'static str) -> Self {
        let mut d = Self::new(module, name, path);
        d.methods = &[HttpMethod::Post];
        d.accepts_xml_body = true;
        d
    }

    /// Gateway JSON services: bearer token, JSON in and out.
    const fn gateway(module: Module, name: &'static str, path: &'static str) -> Self {
        let mut d = Self::new(module, name, path);
        d.url_class = UrlClass::Gateway;
        d.methods = &[HttpMethod::Get];
        d.auth = AuthFlavor::Bearer;
        d.body_encoding = BodyEncoding::Json;
        d.response = MediaType::Json;
        d
    }

    const fn methods(mut self, methods: &'static [HttpMethod]) -> Self {
        self.methods = methods;
        self
    }

    const fn params(mut self, params: &'static [&'static str]) -> Self {
        self.params = params;
        self
    }

    const fn body(mut self, fields: &'static [&'static str]) -> Self {
        self.body_fields = fields;
        self
    }

    const fn response(mut self, media: MediaType) -> Self {
        self.response = media;
        self
    }

    const fn json_response(self) -> Self {
        self.response(MediaType::Json)
    }

    const fn raw_errors(mut self) -> Self {
        self.structured_errors = false;
        self
    }

    const fn native_params(mut self) -> Self {
        self.normalize = false;
        self
    }

    const fn paginate(mut self, style: PaginationStyle) -> Self {
        self.pagination = style;
        self
    }
}

// ── Lookup ───────────────────────────────────────────────────────────

/// Look up a descriptor. Both axes match case-insensitively.
pub fn describe(module: &str, endpoint: &str) -> Result<&'static EndpointDescriptor, Error> {
    let module_key = Module::from_str(module.trim()).map_err(|_| Error::UnknownModule {
        module: module.to_owned(),
        valid: Module::names(),
    })?;

    let endpoints = module_key.endpoints();
    endpoints
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(endpoint.trim()))
        .ok_or_else(|| Error::UnknownEndpoint {
            module: module_key.to_string(),
            endpoint: endpoint.to_owned(),
            valid: endpoints.iter().map(|d| d.name).collect(),
        })
}

/// Every descriptor in the registry, grouped by module.
pub fn all() -> impl Iterator<Item = &'static EndpointDescriptor> {
    Module::iter().flat_map(|m| m.endpoints().iter())
}

// ── Table ────────────────────────────────────────────────────────────

use HttpMethod::{Delete, Get, Post};

const QPS_SEARCH: PaginationStyle = PaginationStyle::HasMore;

const fn offset(page: &'static str, size: &'static str, first: u32) -> PaginationStyle {
    PaginationStyle::Offset {
        page_param: page,
        size_param: size,
        first_page: first,
        placement: ParamPlacement::Query,
    }
}

static AUTH: &[EndpointDescriptor] = &[
    EndpointDescriptor::fo(Module::Auth, "about", "/msp/about.php").methods(&[Get]),
];

const GAV_LIST_PARAMS: &[&str] = &[
    "excludeFields",
    "includeFields",
    "lastModifiedDate",
    "lastSeenAssetId",
    "pageSize",
];

const GAV_LAST_ID: PaginationStyle = PaginationStyle::LastId {
    cursor_param: "lastSeenAssetId",
    size_param: Some("pageSize"),
    default_size: 100,
};

static GAV: &[EndpointDescriptor] = &[
    EndpointDescriptor::gateway(Module::Gav, "count_assets", "/am/v1/assets/host/count")
        .methods(&[Post])
        .params(&["filter", "lastSeenAssetId", "lastModifiedDate"]),
    EndpointDescriptor::gateway(Module::Gav, "get_asset", "/am/v1/asset/{placeholder}"),
    EndpointDescriptor::gateway(Module::Gav, "get_all_assets", "/am/v1/assets/host/list")
        .methods(&[Post])
        .params(GAV_LIST_PARAMS)
        .paginate(GAV_LAST_ID),
    EndpointDescriptor::gateway(Module::Gav, "query_assets", "/am/v1/assets/host/filter/list")
        .methods(&[Post])
        .params(GAV_LIST_PARAMS)
        .paginate(GAV_LAST_ID),
];

static VMDR: &[EndpointDescriptor] = &[
    EndpointDescriptor::fo(Module::Vmdr, "get_host_list", "/api/2.0/fo/asset/host/")
        .params(&[
            "action",
            "details",
            "ids",
            "id_min",
            "id_max",
            "truncation_limit",
            "show_tags",
            "host_metadata",
            "host_metadata_fields",
            "show_asset_id",
            "show_cloud_tags",
            "ag_ids",
            "os_pattern",
            "vm_scan_since",
            "no_vm_scan_since",
            "echo_request",
        ])
        .paginate(PaginationStyle::NextLink),
    EndpointDescriptor::fo(Module::Vmdr, "get_hld", "/api/5.0/fo/asset/host/vm/detection/")
        .params(&[
            "action",
            "ids",
            "id_min",
            "id_max",
            "truncation_limit",
            "show_asset_id",
            "show_tags",
            "host_metadata",
            "qids",
            "severities",
            "status",
            "detection_updated_since",
            "include_vuln_type",
            "output_format",
        ])
        .paginate(PaginationStyle::NextLink),
    EndpointDescriptor::fo(Module::Vmdr, "get_kb", "/api/2.0/fo/knowledge_base/vuln/")
        .params(&[
            "action",
            "details",
            "ids",
            "id_min",
            "id_max",
            "last_modified_after",
            "last_modified_before",
            "published_after",
            "is_patchable",
            "show_supported_modules_info",
            "show_pci_reasons",
            "echo_request",
        ])
        .paginate(PaginationStyle::NextLink),
    EndpointDescriptor::fo(Module::Vmdr, "get_ag_list", "/api/2.0/fo/asset/group/")
        .params(&[
            "action",
            "ids",
            "id_min",
            "id_max",
            "truncation_limit",
            "show_attributes",
            "title",
            "echo_request",
        ])
        .paginate(PaginationStyle::NextLink),
    EndpointDescriptor::fo(Module::Vmdr, "get_scan_list", "/api/2.0/fo/scan/").params(&[
        "action",
        "scan_ref",
        "state",
        "processed",
        "type",
        "target",
        "user_login",
        "launched_after_datetime",
        "launched_before_datetime",
        "show_ags",
        "show_op",
        "show_status",
        "show_last",
        "echo_request",
    ]),
    EndpointDescriptor::fo(Module::Vmdr, "launch_scan", "/api/2.0/fo/scan/")
        .methods(&[Post])
        .params(&["action"])
        .body(&[
            "action",
            "scan_title",
            "option_id",
            "option_title",
            "ip",
            "asset_group_ids",
            "asset_groups",
            "exclude_ip_per_scan",
            "iscanner_name",
            "iscanner_id",
            "default_scanner",
            "target_from",
            "tag_include_selector",
            "tag_set_by",
            "tag_set_include",
            "priority",
            "echo_request",
        ]),
    EndpointDescriptor::fo(Module::Vmdr, "get_activity_log", "/api/2.0/fo/activity_log/")
        .methods(&[Get])
        .params(&[
            "action",
            "since_datetime",
            "until_datetime",
            "user_login",
            "output_format",
            "truncation_limit",
        ])
        .response(MediaType::Binary),
    EndpointDescriptor::fo(Module::Vmdr, "fetch_report", "/api/2.0/fo/report/")
        .params(&["action", "id"])
        .response(MediaType::Binary),
];

static TAGGING: &[EndpointDescriptor] = &[
    EndpointDescriptor::qps(Module::Tagging, "count_tags", "/qps/rest/2.0/count/am/tag"),
    EndpointDescriptor::qps(Module::Tagging, "search_tags", "/qps/rest/2.0/search/am/tag")
        .paginate(QPS_SEARCH),
    EndpointDescriptor::qps(Module::Tagging, "get_tag", "/qps/rest/2.0/get/am/tag/{tagId}")
        .methods(&[Get]),
    EndpointDescriptor::qps(Module::Tagging, "create_tag", "/qps/rest/2.0/create/am/tag"),
    EndpointDescriptor::qps(
        Module::Tagging,
        "update_tag",
        "/qps/rest/2.0/update/am/tag/{tagId}",
    ),
    EndpointDescriptor::qps(
        Module::Tagging,
        "delete_tag",
        "/qps/rest/2.0/delete/am/tag/{tagId}",
    ),
];

static WAS: &[EndpointDescriptor] = &[
    EndpointDescriptor::qps(Module::Was, "count_webapps", "/qps/rest/3.0/count/was/webapp"),
    EndpointDescriptor::qps(Module::Was, "search_webapps", "/qps/rest/3.0/search/was/webapp")
        .paginate(QPS_SEARCH),
    EndpointDescriptor::qps(
        Module::Was,
        "get_webapp",
        "/qps/rest/3.0/get/was/webapp/{webappId}",
    )
    .methods(&[Get]),
    EndpointDescriptor::qps(Module::Was, "search_findings", "/qps/rest/3.0/search/was/finding")
        .paginate(QPS_SEARCH),
    EndpointDescriptor::qps(
        Module::Was,
        "get_finding",
        "/qps/rest/3.0/get/was/finding/{findingId}",
    )
    .methods(&[Get]),
    EndpointDescriptor::qps(Module::Was, "search_scans", "/qps/rest/3.0/search/was/wasscan")
        .paginate(QPS_SEARCH),
    EndpointDescriptor::qps(Module::Was, "get_scan", "/qps/rest/3.0/get/was/wasscan/{scanId}")
        .methods(&[Get]),
    EndpointDescriptor::qps(
        Module::Was,
        "get_auth_record",
        "/qps/rest/3.0/get/was/webappauthrecord/{webappAuthRecordId}",
    )
    .methods(&[Get]),
];

static CLOUD_AGENT: &[EndpointDescriptor] = &[
    EndpointDescriptor::qps(
        Module::CloudAgent,
        "count_agents",
        "/qps/rest/2.0/count/am/hostasset",
    ),
    EndpointDescriptor::qps(
        Module::CloudAgent,
        "list_agents",
        "/qps/rest/2.0/search/am/hostasset",
    )
    .paginate(QPS_SEARCH),
    EndpointDescriptor::qps(
        Module::CloudAgent,
        "launch_ods",
        "/qps/rest/1.0/ods/ca/agentasset/{placeholder}",
    )
    .params(&["scan", "overrideConfigCpu"]),
];

const CLOUDVIEW_PAGED: &[&str] = &["pageNo", "pageSize", "filter", "sort"];

static TOTALCLOUD: &[EndpointDescriptor] = &[
    EndpointDescriptor::fo(
        Module::Totalcloud,
        "list_connectors",
        "/cloudview-api/rest/v1/{cloudprovider}/connectors",
    )
    .methods(&[Get])
    .params(CLOUDVIEW_PAGED)
    .json_response()
    .paginate(offset("pageNo", "pageSize", 0)),
    EndpointDescriptor::fo(
        Module::Totalcloud,
        "get_connector",
        "/cloudview-api/rest/v1/{cloudprovider}/connectors/{connectorid}",
    )
    .methods(&[Get])
    .json_response(),
    EndpointDescriptor::fo(
        Module::Totalcloud,
        "get_control_evaluations",
        "/cloudview-api/rest/v1/{cloudprovider}/evaluations/{placeholder}/{controlid}",
    )
    .methods(&[Get])
    .params(CLOUDVIEW_PAGED)
    .json_response()
    .paginate(offset("pageNo", "pageSize", 0)),
    EndpointDescriptor::fo(
        Module::Totalcloud,
        "get_resource",
        "/cloudview-api/rest/v1/{cloudprovider}/resources/{placeholder}/{resourceid}",
    )
    .methods(&[Get])
    .json_response(),
];

const CS_PAGED: &[&str] = &["filter", "pageNumber", "pageSize", "sort"];

static CS: &[EndpointDescriptor] = &[
    EndpointDescriptor::gateway(Module::Cs, "list_images", "/csapi/v1.3/images")
        .params(CS_PAGED)
        .paginate(offset("pageNumber", "pageSize", 1)),
    EndpointDescriptor::gateway(Module::Cs, "get_image", "/csapi/v1.3/images/{placeholder}"),
    EndpointDescriptor::gateway(Module::Cs, "list_containers", "/csapi/v1.3/containers")
        .params(CS_PAGED)
        .paginate(offset("pageNumber", "pageSize", 1)),
    EndpointDescriptor::gateway(Module::Cs, "list_registries", "/csapi/v1.3/registry")
        .params(CS_PAGED)
        .paginate(offset("pageNumber", "pageSize", 1)),
    EndpointDescriptor::gateway(Module::Cs, "delete_images", "/csapi/v1.3/images")
        .methods(&[Delete])
        .body(&["imageIds"]),
];

static PM: &[EndpointDescriptor] = &[
    EndpointDescriptor::gateway(Module::Pm, "list_jobs", "/pm/v1/jobs")
        .params(&[
            "platform",
            "filter",
            "attributes",
            "coauthorJob",
            "ignoreActiveJobs",
            "pageNumber",
            "pageSize",
            "sort",
        ])
        .native_params()
        .raw_errors()
        .paginate(offset("pageNumber", "pageSize", 0)),
    EndpointDescriptor::gateway(Module::Pm, "get_job", "/pm/v1/deploymentjob/{placeholder}")
        .native_params()
        .raw_errors(),
    EndpointDescriptor::gateway(Module::Pm, "create_job", "/pm/v1/deploymentjob")
        .methods(&[Post])
        .params(&["platform"])
        .body(&[
            "name",
            "type",
            "platform",
            "description",
            "assetIds",
            "assetTagIds",
            "tagSelectionType",
            "schedule",
            "approvedPatches",
            "isDynamicPatchesQQL",
            "dynamicPatchesQQL",
            "notification",
        ])
        .native_params()
        .raw_errors(),
    EndpointDescriptor::gateway(Module::Pm, "list_assets", "/pm/v1/assets")
        .methods(&[Post])
        .body(&[
            "query",
            "havingQuery",
            "attributes",
            "pageNumber",
            "pageSize",
            "sort",
        ])
        .native_params()
        .raw_errors()
        .paginate(PaginationStyle::EmptyBody {
            page_param: "pageNumber",
            size_param: "pageSize",
            first_page: 0,
            placement: ParamPlacement::Body,
        }),
    EndpointDescriptor::gateway(Module::Pm, "delete_jobs", "/pm/v1/deploymentjobs")
        .methods(&[Delete])
        .body(&["ids"])
        .native_params()
        .raw_errors(),
];

static CERT: &[EndpointDescriptor] = &[
    EndpointDescriptor::gateway(Module::Cert, "list_certs", "/certview/v2/certificates")
        .methods(&[Post])
        .body(&["filter", "pageNumber", "pageSize", "includes"])
        .paginate(PaginationStyle::Offset {
            page_param: "pageNumber",
            size_param: "pageSize",
            first_page: 0,
            placement: ParamPlacement::Body,
        }),
    EndpointDescriptor::gateway(
        Module::Cert,
        "get_cert",
        "/certview/v1/certificates/{placeholder}",
    ),
];

static USERS: &[EndpointDescriptor] = &[
    EndpointDescriptor::qps(Module::Users, "get_user", "/qps/rest/2.0/get/am/user/{placeholder}")
        .methods(&[Get]),
    EndpointDescriptor::fo(Module::Users, "list_users", "/msp/user_list.php")
        .params(&["external_id_contains", "external_id_assigned"]),
];
