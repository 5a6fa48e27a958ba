//! Lock command handlers: show, lock, unlock.

use tabled::Tabled;

use kevo_api::{KevoClient, LockDetails, LockId};

use crate::cli::{GlobalOpts, LockArgs};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DetailRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn detail_rows(lock: &LockDetails, color: bool) -> Vec<DetailRow> {
    vec![
        DetailRow {
            field: "ID",
            value: lock.id.to_string(),
        },
        DetailRow {
            field: "Name",
            value: lock.name.clone(),
        },
        DetailRow {
            field: "Bolt",
            value: output::bolt_label(lock.bolt_state, color),
        },
        DetailRow {
            field: "Brand",
            value: lock.brand.clone().unwrap_or_else(|| "-".into()),
        },
        DetailRow {
            field: "Firmware",
            value: lock.firmware_version.clone().unwrap_or_else(|| "-".into()),
        },
    ]
}

/// A 404 on a lock endpoint means the id is wrong, not that the portal is down.
fn not_found_as(id: &LockId) -> impl FnOnce(kevo_api::Error) -> CliError + '_ {
    move |err| match err.status() {
        Some(404) => CliError::NotFound {
            identifier: id.to_string(),
        },
        _ => err.into(),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn show(
    client: &KevoClient,
    args: &LockArgs,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = config::resolve_lock_id(args.lock_id.as_deref(), profile)?;
    let lock = client.get_lock(&id).await.map_err(not_found_as(&id))?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &lock,
        |l| detail_rows(l, color),
        |l| l.bolt_state.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn lock(
    client: &KevoClient,
    args: &LockArgs,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = config::resolve_lock_id(args.lock_id.as_deref(), profile)?;
    client.lock(&id).await.map_err(not_found_as(&id))?;
    tracing::info!(%id, "lock command accepted");

    if !global.quiet {
        eprintln!("Lock command sent to {id}");
    }
    Ok(())
}

pub async fn unlock(
    client: &KevoClient,
    args: &LockArgs,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = config::resolve_lock_id(args.lock_id.as_deref(), profile)?;
    client.unlock(&id).await.map_err(not_found_as(&id))?;
    tracing::info!(%id, "unlock command accepted");

    if !global.quiet {
        eprintln!("Unlock command sent to {id}");
    }
    Ok(())
}
