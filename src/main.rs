use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use totp_patcher::adapters::bitwarden;
use totp_patcher::core::result::{exit_code, EXIT_FATAL_SETUP, EXIT_SUCCESS};
use totp_patcher::domain::model::Mode;
use totp_patcher::domain::ports::Storage;
use totp_patcher::utils::error::MigrationError;
use totp_patcher::utils::{logger, validation::Validate};
use totp_patcher::{CliConfig, LocalStorage, MigrationEngine, OpCli, RunOptions, RunResult};

const MIT_LICENSE: &str = "
MIT License

Copyright (c) 2025

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the \"Software\"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
";

#[tokio::main]
async fn main() -> ExitCode {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose, config.log_format);

    if config.license {
        println!("{}", MIT_LICENSE);
        return ExitCode::SUCCESS;
    }

    tracing::debug!("CLI config: {:?}", config);

    match run(config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            match e.downcast_ref::<MigrationError>() {
                Some(err) => {
                    tracing::error!(
                        "Run aborted: {} (Category: {:?}, Severity: {:?})",
                        err,
                        err.category(),
                        err.severity()
                    );
                    eprintln!("Error: {}", err.user_friendly_message());
                    eprintln!("Suggestion: {}", err.recovery_suggestion());
                }
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::from(EXIT_FATAL_SETUP)
        }
    }
}

async fn run(config: CliConfig) -> anyhow::Result<u8> {
    // 驗證配置
    config.validate()?;
    let settings = config.resolve()?;
    let (mode, simulate) = config.mode();
    let simulated = simulate || mode == Mode::DryRun;

    // 載入來源資料
    let storage = LocalStorage::default();
    let source_path = config.source_path()?;
    let data = storage.read_file(&source_path).await.map_err(|e| {
        MigrationError::fatal(format!("could not read '{}': {}", source_path, e))
    })?;
    let sources = bitwarden::parse_export(&source_path, &data)?;
    tracing::info!("Found {} source items with TOTP in {}", sources.len(), source_path);

    if !simulated && !config.yes && !confirm_live_run(mode)? {
        println!("Aborted.");
        return Ok(EXIT_SUCCESS);
    }

    let destination = OpCli::from_config(&settings);
    let options = RunOptions::new(mode, simulate).with_config(&settings);
    let engine = MigrationEngine::new(destination, options);

    let outcome = engine.run(sources).await;
    let code = exit_code(&outcome);
    let result = outcome?;
    print!("{}", result.render_summary());

    if let Some(report_path) = &config.report {
        let report_path = report_path.to_string_lossy();
        // Report failures never change the exit status
        if let Err(e) = write_report(&storage, &report_path, &result).await {
            tracing::warn!("{:#}", e);
            eprintln!("Warning: {:#}", e);
        }
    }

    if result.has_failures() {
        eprintln!("{} operation(s) failed", result.failed_count());
    }
    Ok(code)
}

async fn write_report(storage: &LocalStorage, path: &str, result: &RunResult) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(&result.to_report()).context("failed to serialize report")?;
    storage
        .write_file(path, &json)
        .await
        .with_context(|| format!("failed to write report to {}", path))?;
    tracing::info!("Report saved to: {}", path);
    Ok(())
}

fn confirm_live_run(mode: Mode) -> anyhow::Result<bool> {
    let banner = "!".repeat(60);
    println!("\n{}", banner);
    println!("WARNING: LIVE MODE ACTIVE");
    println!("{}", banner);
    println!("1. Ensure you have backed up your 1Password data before proceeding.");
    if mode == Mode::Cleanup {
        println!("2. You are running in CLEANUP mode (-c).");
        println!("   This will PERMANENTLY DELETE the 'one-time password' field");
        println!("   from matched items.");
    } else {
        println!("2. You are running in UPDATE mode.");
        println!("   This will OVERWRITE the 'one-time password' field.");
    }

    print!("\nType 'yes' to continue: ");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
