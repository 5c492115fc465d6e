use colored::Colorize;

use neurosity_capture::{CaptureReport, SessionInfo};

fn section(title: &str) {
    println!("{}", title.bright_blue());
    println!("{}", "-----------------------".dimmed());
}

/// Print the run parameters once login has succeeded.
pub fn print_session_details(info: &SessionInfo, masked_password: &str) {
    println!();
    section("Step 1. Configure User and Device:");
    println!("Email: {}", info.email.cyan());
    println!("Device ID: {}", info.device_id.cyan());
    println!("Password: {masked_password}");
    println!();

    section("Step 2. Configure Session Duration (mins):");
    println!("Session Duration (mins): {}", info.duration_minutes);
    println!("Buffer (mins): {}", info.buffer_minutes);
    println!();

    section("Step 3. Configure Output Directory:");
    println!("Output Session Directory: {}", info.output_dir.display());
    println!();

    section("Step 4. Login to Neurosity:");
    println!("{} Successfully logged in", "OK".green());
    println!();
}

pub fn print_report(report: &CaptureReport) {
    println!();
    section("Capture Summary:");

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(summary) => {
                let note = if summary.cancelled {
                    " (stopped early)".yellow().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  {} {:<16} {:>8} events  {}{}",
                    "OK".green(),
                    summary.metric.name(),
                    summary.events_written,
                    summary.path.display().to_string().dimmed(),
                    note
                );
            }
            Err(e) => {
                println!("  {} {:<16} {}", "FAIL".red(), outcome.metric.name(), e);
            }
        }
    }

    let failed = report.failed().count();
    println!();
    if failed == 0 {
        println!(
            "{} {} events across {} metrics",
            "Done.".green(),
            report.total_events(),
            report.outcomes.len()
        );
    } else {
        println!(
            "{} {} events, {} of {} metrics failed",
            "Done with errors.".yellow(),
            report.total_events(),
            failed,
            report.outcomes.len()
        );
        if report.failed().any(|(_, e)| e.is_connection_error()) {
            println!(
                "  {}",
                "The gateway connection dropped during the run; check the network and retry."
                    .dimmed()
            );
        }
    }
}
