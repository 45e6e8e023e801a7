//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `mockauth_core` linkage (`ping`).
//! - Drive one scripted session against the backend (`demo`) so latency,
//!   error signals and the item feed can be observed without the Flutter host.

use clap::{Parser, Subcommand};
use log::info;
use mockauth_core::{
    default_log_level, init_stderr_logging, ActionStatus, CoreConfig, Item, MockBackend,
    SessionState,
};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "mockauth", version, about = "Mock auth backend probe")]
struct Cli {
    /// Log level for stderr output.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print health-check and version.
    Ping,
    /// Run sign-in, item edits and sign-out against the backend.
    Demo {
        #[arg(long, default_value = "user@test.com")]
        email: String,
        /// Overrides `MOCKAUTH_TIME_UNIT_MS`.
        #[arg(long)]
        time_unit_ms: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = cli
        .log_level
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_stderr_logging(&level) {
        eprintln!("logging disabled: {err}");
    }

    match cli.command.unwrap_or(Command::Ping) {
        Command::Ping => {
            println!("mockauth_core ping={}", mockauth_core::ping());
            println!("mockauth_core version={}", mockauth_core::core_version());
            ExitCode::SUCCESS
        }
        Command::Demo {
            email,
            time_unit_ms,
        } => {
            let mut config = match CoreConfig::from_env() {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("invalid configuration: {err}");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(unit) = time_unit_ms {
                config.time_unit_ms = unit;
            }
            run_demo(config, &email).await
        }
    }
}

async fn run_demo(config: CoreConfig, email: &str) -> ExitCode {
    let backend = MockBackend::new(config);
    let auth = backend.auth();
    let mut errors = auth.take_error_receiver();
    print_state(&auth.ready().await);

    if let ActionStatus::Failure(message) = auth.perform_sign_in(email).await {
        println!("sign-in failed: {message}");
        if let Some(received) = errors.as_mut().and_then(|rx| rx.try_recv()) {
            println!("error signal: {received}");
        }
        return ExitCode::FAILURE;
    }
    let mut state = auth.watch_state();
    let signed_in = match state.wait_for(|value| value.identity().is_some()).await {
        Ok(value) => value.clone(),
        Err(_) => return ExitCode::FAILURE,
    };
    print_state(&signed_in);

    let mut subscription = backend.feed().subscribe();
    let Some(items) = subscription.wait_for(|list| !list.is_empty()).await else {
        return ExitCode::FAILURE;
    };
    print_items("seeded", &items);

    if let Some(first) = items.first() {
        backend.feed().update_item(first).await;
        let edited_name = first.edited_name();
        if let Some(items) = subscription
            .wait_for(|list| list.iter().any(|item| item.name == edited_name))
            .await
        {
            print_items("edited", &items);
        }
    }
    if let Some(last) = items.last().filter(|_| items.len() > 1) {
        let remaining = items.len() - 1;
        backend.feed().delete_item(last.id).await;
        if let Some(items) = subscription.wait_for(|list| list.len() == remaining).await {
            print_items("deleted", &items);
        }
    }

    auth.perform_sign_out();
    if let Some(items) = subscription.wait_for(|list| list.is_empty()).await {
        print_items("signed out", &items);
    }
    drop(subscription);
    info!(
        "event=cli_demo module=cli status=ok phase={:?}",
        backend.feed().phase()
    );
    print_state(&auth.session_state());
    ExitCode::SUCCESS
}

fn print_state(state: &SessionState) {
    match state {
        SessionState::Loading => println!("state=loading"),
        SessionState::Unauthenticated => println!("state=unauthenticated"),
        SessionState::Authenticated { identity } => println!(
            "state=authenticated id={} email={} anonymous={}",
            identity.id, identity.email, identity.is_anonymous
        ),
    }
}

fn print_items(label: &str, items: &[Item]) {
    let rendered = items
        .iter()
        .map(|item| format!("{}:{}", item.id, item.name))
        .collect::<Vec<_>>()
        .join(", ");
    println!("items[{label}]=[{rendered}]");
}
