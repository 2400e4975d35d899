//! Config subcommand handlers.

use std::io::BufRead;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

/// Copy of the config with plaintext passwords replaced.
fn masked(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    for profile in out.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    out
}

fn to_toml(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(cfg).map_err(|e| CliError::Validation {
        field: "config".into(),
        reason: format!("failed to serialize config: {e}"),
    })
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = masked(&config::load_config()?);
            let out = match global.output {
                OutputFormat::Table => to_toml(&cfg)?,
                ref format => output::render_single(
                    format,
                    &cfg,
                    |_| String::new(),
                    |c| {
                        let mut names: Vec<&str> = c.profiles.keys().map(String::as_str).collect();
                        names.sort_unstable();
                        names.join("\n")
                    },
                )?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let password = line.trim_end_matches(['\r', '\n']);
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "no password on stdin".into(),
                });
            }

            qualys_config::store_password(&name, password)?;
            if !global.quiet {
                eprintln!("stored password for profile '{name}' in the system keyring");
            }
            Ok(())
        }
    }
}
