//! Terminal rendering of controller events.

use colored::Colorize;
use vd_protocol::alarm_models::AlarmSeverity;
use vd_protocol::ipc::Event;

/// Print one event as a single line.
pub fn print_event(event: &Event) {
    match event {
        Event::RunStarted { run_id } => {
            println!("{} {}", "▶ run started".bright_cyan().bold(), run_id.to_string().dimmed());
        }
        Event::StateChanged { state, message } => {
            println!("{} {}", format!("[{}]", state.label()).bright_blue().bold(), message);
        }
        Event::Log { message } => println!("  {message}"),
        Event::Alarm {
            code,
            message,
            severity,
        } => {
            let line = format!("ALARM {code} {severity:?}: {message}");
            match severity {
                AlarmSeverity::Critical => println!("{}", line.bright_red().bold()),
                _ => println!("{}", line.red()),
            }
        }
        Event::StepStarted { node_id } => println!("{}", format!("  → {node_id}").dimmed()),
        Event::StepCompleted { node_id } => println!("{}", format!("  ✓ {node_id}").green()),
        Event::ProcessCompleted { success, .. } => {
            if *success {
                println!("{}", "✔ process complete".bright_green().bold());
            } else {
                println!("{}", "✘ process did not complete".bright_red().bold());
            }
        }
    }
}
