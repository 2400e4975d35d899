//! `call`: dispatch one request, or walk every page with `--all`.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use qualys_api::{
    CallRequest, CallResponse, HttpMethod, JsonListMaterializer, MediaType, PageOptions,
    XmlListMaterializer, decode, paginate, registry,
};

use crate::cli::{CallArgs, GlobalOpts, MethodArg, OutputFormat};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

use super::util::{body_value, parse_pair};

pub async fn handle(
    session: &Session,
    args: CallArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let desc = registry::describe(&args.module, &args.endpoint)?;
    let request = build_request(&args)?;
    let credential = session.credential().await?;

    if args.all {
        let options = page_options(&args);
        let records = match desc.response {
            MediaType::Json => {
                let mut materializer =
                    JsonListMaterializer::<Value>::new(args.records.clone().unwrap_or_default());
                if let Some(ref id) = args.id_field {
                    materializer = materializer.with_id_field(id.clone());
                }
                paginate(&session.dispatcher, &credential, request, &options, &materializer).await
            }
            MediaType::Xml => {
                let mut materializer =
                    XmlListMaterializer::<Value>::new(args.records.clone().unwrap_or_default());
                if let Some(ref id) = args.id_field {
                    materializer = materializer.with_id_field(id.clone());
                }
                paginate(&session.dispatcher, &credential, request, &options, &materializer).await
            }
            MediaType::Binary => {
                return Err(CliError::Validation {
                    field: "--all".into(),
                    reason: format!("{} returns a binary download", desc.qualified_name()),
                });
            }
        }
        .map_err(|e| session.auth_context(e))?;

        let out = output::render_records(&global.output, &records)?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let response = session
        .dispatcher
        .dispatch(&credential, request)
        .await
        .map_err(|e| session.auth_context(e))?
        .into_result()?;

    // Endpoints without structured errors hand back 4xx/5xx as data.
    if response.status >= 400 {
        return Err(CliError::ApiError {
            status: response.status,
            message: decode::preview(&response.text()),
        });
    }

    print_response(&response, global)
}

fn build_request(args: &CallArgs) -> Result<CallRequest, CliError> {
    let mut request = CallRequest::new(args.module.as_str(), args.endpoint.as_str());

    for raw in &args.params {
        let (key, value) = parse_pair(raw, "--param")?;
        request = request.param(key, value);
    }
    for raw in &args.body {
        let (key, value) = parse_pair(raw, "--body")?;
        request = request.body(key, body_value(&value));
    }
    for raw in &args.path {
        let (key, value) = parse_pair(raw, "--path")?;
        request = request.path(key, value);
    }
    if let Some(ref file) = args.xml_file {
        request = request.xml_body(std::fs::read_to_string(file)?);
    }
    if let Some(ref json) = args.json {
        request = request.json(serde_json::from_str(json)?);
    }
    if let Some(method) = args.method {
        request = request.method(match method {
            MethodArg::Get => HttpMethod::Get,
            MethodArg::Post => HttpMethod::Post,
            MethodArg::Put => HttpMethod::Put,
            MethodArg::Patch => HttpMethod::Patch,
            MethodArg::Delete => HttpMethod::Delete,
        });
    }
    if let Some(secs) = args.deadline {
        request = request.timeout(Duration::from_secs(secs));
    }
    Ok(request)
}

fn page_options(args: &CallArgs) -> PageOptions {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; finishing the current page");
            on_interrupt.cancel();
        }
    });

    let mut options = PageOptions::default().cancel(cancel);
    if let Some(max) = args.max_pages {
        options = options.max_pages(max);
    }
    if let Some(size) = args.page_size {
        options = options.page_size(size);
    }
    options
}

fn print_response(response: &CallResponse, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(message) = response.transient_conflict() {
        tracing::warn!("{message}");
    }

    match (response.media, &global.output) {
        (MediaType::Binary, _) | (MediaType::Xml, OutputFormat::Table | OutputFormat::Plain) => {
            if !global.quiet {
                output::print_raw(&response.body)?;
            }
            Ok(())
        }
        (MediaType::Xml, format) => {
            let view = response.xml_view()?;
            let out =
                output::render_single(format, &view, ToString::to_string, ToString::to_string)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        (MediaType::Json, format) => {
            if response.is_empty() {
                return Ok(());
            }
            let body: Value = response.json()?;
            let out = match (&body, format) {
                (Value::Array(items), OutputFormat::Table | OutputFormat::Plain) => {
                    output::render_records(format, items)?
                }
                (_, OutputFormat::Table | OutputFormat::Plain) => {
                    serde_json::to_string_pretty(&body)?
                }
                _ => {
                    output::render_single(format, &body, ToString::to_string, ToString::to_string)?
                }
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
