use pyramid_cli::{cli, logging, run};
use std::io::Write;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::command().get_matches();
    logging::init(matches.get_flag("json"));

    match run(&matches).await {
        Ok(report) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(err) = stdout.write_all(report.output.as_bytes()) {
                tracing::error!(error = %err, "writing output");
                return ExitCode::FAILURE;
            }
            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            tracing::error!("command failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
