//! `token`: issue a gateway bearer token.

use secrecy::ExposeSecret;
use serde::Serialize;

use crate::cli::{GlobalOpts, TokenArgs};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct TokenView {
    username: String,
    issued_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

pub async fn handle(
    session: &Session,
    args: &TokenArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let bearer = session.bearer().await?;
    let view = TokenView {
        username: bearer.username().to_owned(),
        issued_at: bearer.issued_at().await.to_rfc3339(),
        token: if args.show {
            Some(bearer.token().await.expose_secret().to_owned())
        } else {
            None
        },
    };

    let out = output::render_single(
        &global.output,
        &view,
        |v| {
            let mut text = format!("Token issued for {} at {}", v.username, v.issued_at);
            if let Some(ref token) = v.token {
                text.push('\n');
                text.push_str(token);
            }
            text
        },
        |v| v.token.clone().unwrap_or_else(|| v.issued_at.clone()),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
