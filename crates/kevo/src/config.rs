//! CLI configuration -- thin wrapper around `kevo_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--username, --base-url, --timeout, --insecure) and falls back to an
//! interactive password prompt.

use std::io::IsTerminal;

use secrecy::SecretString;

use kevo_api::{ClientConfig, Credentials, LockId};
use kevo_config::ConfigError;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use kevo_config::{Config, Profile, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Pick the active profile and apply CLI flag overrides to a copy of it.
///
/// An explicitly requested profile must exist. Without one, a missing
/// default profile is treated as empty so flags and env vars alone work.
pub fn effective_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);

    let mut profile = match config.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(config),
                name,
            });
        }
        None => Profile::default(),
    };

    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(ref base_url) = global.base_url {
        profile.base_url = Some(base_url.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }

    Ok((name, profile))
}

/// Build the `ClientConfig` for the active profile, prompting for a
/// password on a terminal when none is configured.
pub fn resolve_client_config(
    global: &GlobalOpts,
    config: &Config,
) -> Result<(ClientConfig, Profile), CliError> {
    let (name, profile) = effective_profile(global, config)?;

    let username = kevo_config::resolve_username(&profile, &name)?;
    let password = match kevo_config::resolve_password(&profile, &name) {
        Ok(password) => password,
        Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
            prompt_password(&username)?
        }
        Err(e) => return Err(e.into()),
    };

    let client_config = kevo_config::build_client_config(
        &profile,
        &config.defaults,
        Credentials::new(username, password),
    )?;

    Ok((client_config, profile))
}

/// Lock id from the command argument, falling back to the profile.
pub fn resolve_lock_id(arg: Option<&str>, profile: &Profile) -> Result<LockId, CliError> {
    arg.map(LockId::from)
        .or_else(|| kevo_config::profile_lock_id(profile))
        .ok_or(CliError::MissingLockId)
}

fn prompt_password(username: &str) -> Result<SecretString, CliError> {
    let password = rpassword::prompt_password(format!("Kevo password for {username}: "))?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(password))
}

fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        return "(none)".into();
    }
    config
        .profiles
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
