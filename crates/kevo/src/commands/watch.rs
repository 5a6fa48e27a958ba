//! `watch`: stream bolt-state changes from the push channel.

use chrono::Local;
use tokio::sync::mpsc;

use kevo_api::{KevoClient, PushMessage, ReconnectConfig};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Profile;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    client: &KevoClient,
    args: &WatchArgs,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PushMessage>();
    let observer = client.subscribe(move |msg| {
        // Receiver is gone only while we are shutting down.
        let _ = tx.send(msg.clone());
    });

    let reconnect = if args.reconnect {
        Some(ReconnectConfig::default())
    } else {
        kevo_config::profile_reconnect(profile)
    };

    let handle = client.connect_websocket_with(reconnect);
    let mut states = handle.state_changes();
    let color = output::should_color(&global.color);
    let limit_reached = |seen: usize| args.count.is_some_and(|n| seen >= n);
    let mut seen = 0_usize;

    if !global.quiet {
        eprintln!("Watching for lock events (Ctrl-C to stop)...");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupted, closing push channel");
                handle.shutdown();
                break;
            }
            Some(msg) = rx.recv() => {
                print_message(&msg, global, color);
                seen += 1;
                if limit_reached(seen) {
                    handle.shutdown();
                    break;
                }
            }
            _ = states.wait_for(|s| s.is_terminal()) => break,
        }
    }

    client.unsubscribe(observer);

    // Frames dispatched just before the channel ended.
    while !limit_reached(seen) {
        let Ok(msg) = rx.try_recv() else { break };
        print_message(&msg, global, color);
        seen += 1;
    }

    let result = handle.join().await;
    tracing::debug!(messages = seen, ok = result.is_ok(), "push channel finished");
    result.map_err(CliError::from)
}

fn print_message(msg: &PushMessage, global: &GlobalOpts, color: bool) {
    let line = match global.output {
        OutputFormat::Table => {
            let ts = Local::now().format("%H:%M:%S");
            match msg.bolt_state() {
                Some(state) => format!("{ts}  {}", output::bolt_label(state, color)),
                None => format!("{ts}  {}", output::render_json_compact(msg.payload())),
            }
        }
        OutputFormat::Json => output::render_json_pretty(msg.payload()),
        OutputFormat::JsonCompact => output::render_json_compact(msg.payload()),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(msg.payload())),
        OutputFormat::Plain => msg.bolt_state().map_or_else(
            || output::render_json_compact(msg.payload()),
            |state| state.to_string(),
        ),
    };
    output::print_output(&line, global.quiet);
}
