use crate::error::CliError;
use engine_config::report::summary::JobReport;
use std::path::Path;

fn report_json(report: &JobReport) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub async fn write_report(report: &JobReport, path: &Path) -> Result<(), CliError> {
    tokio::fs::write(path, report_json(report)?).await?;
    Ok(())
}

pub fn print_report(report: &JobReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", report_json(report)?);
    } else {
        print_report_table(report);
    }
    Ok(())
}

fn print_report_table(report: &JobReport) {
    println!("Load '{}' ({}):", report.job_name, report.run_id);
    println!("-----------------------------");
    println!("{:<16} {}", "Status", report.status);
    println!("{:<16} {}", "Processed", report.rows_processed);
    println!("{:<16} {}", "Skipped", report.rows_skipped);
    println!("{:<16} {}", "Loaded", report.rows_loaded);
    println!("{:<16} {}", "Failed", report.rows_error);
    println!("{:<16} {:.2}s", "Elapsed", report.elapsed_ms as f64 / 1000.0);
    println!("{:<16} {:.1}", "Rows/sec", report.rows_per_sec);
    if let Some(reason) = &report.abort_reason {
        println!("{:<16} {}", "Abort reason", reason);
    }
    if let Some(err) = &report.source_error {
        println!("{:<16} {}", "Source error", err);
    }
}
