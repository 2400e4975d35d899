//! `about`: liveness probe for basic credentials.

use qualys_api::{Credential, RateLimitView};

use crate::cli::GlobalOpts;
use crate::config::Session;
use crate::error::CliError;
use crate::output;

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let credential = qualys_config::basic_credential(&session.profile, &session.profile_name)
        .map(Credential::from)?;
    let view = session
        .dispatcher
        .probe(&credential)
        .await
        .map_err(|e| session.auth_context(e))?;

    let out = output::render_single(
        &global.output,
        &view,
        |v| detail(credential.username(), v),
        |v| v.remaining.map(|r| r.to_string()).unwrap_or_default(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(username: &str, view: &RateLimitView) -> String {
    let show = |v: Option<u32>| v.map_or_else(|| "-".to_owned(), |n| n.to_string());
    let mut lines = vec![
        format!("User:              {username}"),
        format!("Calls remaining:   {}", show(view.remaining)),
        format!("Calls per window:  {}", show(view.limit)),
        format!("Concurrency limit: {}", show(view.concurrency_limit)),
    ];
    if let Some(wait) = view.retry_after_seconds {
        lines.push(format!("Window reopens in: {wait}s"));
    }
    lines.join("\n")
}
