//! godyl CLI entry point.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use godyl::cli::{
    self, CliError, EXIT_FAILED, EXIT_OK, ErrorEnvelope, OkEnvelope, exit_code_for, render_error,
};
use godyl::logging::{self, LogFormat};
use godyl::{Output, commands, shutdown};
use godyl_core::processor::ProcessReport;
use tokio_util::sync::CancellationToken;

fn main() {
    // Tracing may be unusable while panicking, so print directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("godyl crashed: {panic_info}");
        eprintln!("This is a bug; re-run with --level debug and report the output.");
    }));

    let cli = cli::parse();

    if let Err(e) = logging::init(LogFormat::for_output(cli.json), cli.level.into()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    std::process::exit(run_with_tokio(cli));
}

fn run_with_tokio(cli: cli::Cli) -> i32 {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("cannot start async runtime: {e}");
            return EXIT_FAILED;
        }
    };

    rt.block_on(run(cli))
}

async fn run(cli: cli::Cli) -> i32 {
    let cancel = CancellationToken::new();
    shutdown::install_signal_handlers(cancel.clone());

    let result = godyl::execute(&cli, cancel.clone()).await;
    cancel.cancel();

    match result {
        Ok(Output::Text(text)) => {
            print!("{text}");
            EXIT_OK
        }
        Ok(Output::Report(report)) => finish_report(report, cli.json),
        Err(err) => {
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    }
}

/// Print the run's results and turn failures into the exit code.
fn finish_report(report: ProcessReport, json: bool) -> i32 {
    if json {
        let outcomes = commands::outcomes(&report);
        let rendered = if report.failed() > 0 {
            serde_json::to_string(&ErrorEnvelope::new(serde_json::json!({
                "code": "failed",
                "message": format!("{} tool(s) failed", report.failed()),
                "results": outcomes,
            })))
        } else {
            serde_json::to_string(&OkEnvelope::new(outcomes))
        };
        match rendered {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Error serializing results: {e}"),
        }
        return if report.failed() > 0 { EXIT_FAILED } else { EXIT_OK };
    }

    print!("{}", commands::summary(&report));
    match report.into_result() {
        Ok(_) => EXIT_OK,
        Err(e) => {
            let err = CliError::from(e);
            render_error(&err, false);
            exit_code_for(&err)
        }
    }
}
