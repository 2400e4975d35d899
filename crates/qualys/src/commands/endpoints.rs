//! `endpoints`: list the registry.

use serde::Serialize;
use tabled::Tabled;

use qualys_api::{EndpointDescriptor, Module, registry};

use crate::cli::{EndpointsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct EndpointRow {
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Endpoint")]
    name: &'static str,
    #[tabled(rename = "Methods")]
    methods: String,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "Host")]
    url_class: String,
    #[tabled(rename = "Path")]
    path: &'static str,
    #[tabled(rename = "Paging")]
    pagination: String,
}

impl From<&EndpointDescriptor> for EndpointRow {
    fn from(d: &EndpointDescriptor) -> Self {
        Self {
            module: d.module.to_string(),
            name: d.name,
            methods: d
                .methods
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            auth: d.auth.to_string(),
            url_class: d.url_class.to_string(),
            path: d.path_template,
            pagination: d.pagination.to_string(),
        }
    }
}

/// Parameters and body fields ride along in structured output.
#[derive(Serialize)]
struct EndpointView<'a> {
    #[serde(flatten)]
    descriptor: &'a EndpointDescriptor,
    qualified_name: String,
}

pub fn handle(args: &EndpointsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let descriptors: Vec<&EndpointDescriptor> = match args.module {
        Some(ref name) => {
            let module: Module = name.parse().map_err(|_| CliError::Validation {
                field: "module".into(),
                reason: format!("unknown module '{name}' (valid: {})", Module::names().join(", ")),
            })?;
            module.endpoints().iter().collect()
        }
        None => registry::all().collect(),
    };

    let views: Vec<EndpointView<'_>> = descriptors
        .into_iter()
        .map(|descriptor| EndpointView {
            descriptor,
            qualified_name: descriptor.qualified_name(),
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &views,
        |v| EndpointRow::from(v.descriptor),
        |v| v.qualified_name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
