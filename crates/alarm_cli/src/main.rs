//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `alarm_core` linkage.
//! - Optionally list the alarms stored in a database file.
//! - Keep output deterministic for quick local sanity checks.

use alarm_core::{AlarmContext, CoreConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("alarm_core ping={}", alarm_core::ping());
    println!("alarm_core version={}", alarm_core::core_version());

    let Some(db_path) = std::env::args_os().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let context = match AlarmContext::open(&CoreConfig::with_db_path(db_path)) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("alarm_core open failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let stores = context.repository().query();
    println!("alarm_core alarms={}", stores.len());
    for store in stores {
        let alarm = store.read();
        println!(
            "alarm id={} time={:02}:{:02} enabled={} days={:#09b} label={:?}",
            alarm.id,
            alarm.hour,
            alarm.minute,
            alarm.is_enabled,
            alarm.days_of_week.bits(),
            alarm.label
        );
    }
    ExitCode::SUCCESS
}
