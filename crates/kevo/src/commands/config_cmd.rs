//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Show view ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct ConfigView {
    path: String,
    active_profile: String,
    profile: Profile,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}

fn setting_rows(view: &ConfigView) -> Vec<SettingRow> {
    let p = &view.profile;
    vec![
        SettingRow {
            key: "config file",
            value: view.path.clone(),
        },
        SettingRow {
            key: "profile",
            value: view.active_profile.clone(),
        },
        SettingRow {
            key: "username",
            value: opt(p.username.as_deref()),
        },
        SettingRow {
            key: "password",
            value: opt(p.password.as_deref()),
        },
        SettingRow {
            key: "password_env",
            value: opt(p.password_env.as_deref()),
        },
        SettingRow {
            key: "lock_id",
            value: opt(p.lock_id.as_deref()),
        },
        SettingRow {
            key: "base_url",
            value: opt(p.base_url.as_deref()),
        },
        SettingRow {
            key: "timeout",
            value: p.timeout.map_or_else(|| "-".into(), |t| format!("{t}s")),
        },
        SettingRow {
            key: "insecure",
            value: p.insecure.unwrap_or(false).to_string(),
        },
        SettingRow {
            key: "reconnect",
            value: p.reconnect.unwrap_or(false).to_string(),
        },
    ]
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let (active_profile, mut profile) = config::effective_profile(global, &cfg)?;
            if profile.password.is_some() {
                profile.password = Some(REDACTED.into());
            }

            let view = ConfigView {
                path: config::config_path().display().to_string(),
                active_profile,
                profile,
            };
            let out = output::render_single(&global.output, &view, setting_rows, |v| {
                v.active_profile.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init(ref init) => init_profile(init, global),
    }
}

fn init_profile(init: &ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if init.user.trim().is_empty() {
        return Err(CliError::Validation {
            field: "user".into(),
            reason: "username cannot be empty".into(),
        });
    }

    let mut cfg: Config = config::load_config()?;

    let profile = Profile {
        username: Some(init.user.clone()),
        password_env: init.password_env.clone(),
        lock_id: init.lock_id.clone(),
        base_url: init.url.clone(),
        ..Profile::default()
    };
    cfg.profiles.insert(init.name.clone(), profile);

    if init.set_default || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(init.name.clone());
    }

    config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!(
            "Profile '{}' written to {}",
            init.name,
            config::config_path().display()
        );
        if init.password_env.is_none() {
            eprintln!("  Set KEVO_PASSWORD, or you will be prompted for the password.");
        }
    }
    Ok(())
}
