/**
 * Minimal harness for the activity tracker SDK.
 *
 * Point it at a collector and run:
 *
 *   cargo run -p tracker_demo -- http://localhost:8080/events 1
 *   RUST_LOG=debug cargo run -p tracker_demo -- http://localhost:8080/events 1
 *
 * The user id is kept in `./.tracker-demo`, so the first run sends
 * `first_open` and later runs send `open`.
 */
use std::process::ExitCode;
use std::time::Duration;

use activity_tracker::{FileUserIdStore, InitOptions};
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "http://localhost:8080/events";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let endpoint = args.next().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let app_id = match args.next().map(|raw| raw.parse::<i64>()) {
        None => 1,
        Some(Ok(id)) => id,
        Some(Err(e)) => {
            eprintln!("[example] app id must be an integer: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(endpoint, app_id) {
        eprintln!("[example] {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(endpoint: String, app_id: i64) -> activity_tracker::Result<()> {
    activity_tracker::initialize(InitOptions::new(
        endpoint,
        app_id,
        FileUserIdStore::in_dir(".tracker-demo"),
    ))?;
    println!(
        "[example] Initialized, user id {}",
        activity_tracker::user_id().unwrap_or_default()
    );

    activity_tracker::send_start_level_event(1, "beginner")?;
    activity_tracker::send_end_level_event(1, "beginner", true)?;
    activity_tracker::send_end_level_event(1, "beginner", false)?;
    activity_tracker::send_custom_event("DummyEvent", r#"{"key":"Hello world"}"#)?;

    for i in 0..100 {
        activity_tracker::send_custom_event("DummyEvent", &format!(r#"{{"eventNumber":{i}}}"#))?;
    }
    println!("[example] Queued 104 events");

    /*
     * Shutdown discards anything unsent, so wait for the queue first.
     */
    if !activity_tracker::flush(Duration::from_secs(60)) {
        println!("[example] Flush timed out; remaining events will be dropped");
    }
    activity_tracker::shutdown();

    println!("[example] Done.");
    Ok(())
}
