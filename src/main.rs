use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};

use agentdeck::config::PanelSettings;
use agentdeck::logging;
use agentdeck::stream::{RunEventKind, RunRequest, RunStreamClient, StreamUpdate};
use agentdeck::validation::{self, AgentConfig, ModelDescriptor, Severity, ValidationResult};

/// 代理控制面板的命令列工具。
#[derive(Parser)]
#[command(name = "agentdeck", version)]
struct Cli {
    /// 工作區根目錄，設定檔位於其下的 `config/agentdeck.toml`。
    #[arg(long, global = true, env = "AGENTDECK_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// 日誌等級（覆寫設定檔中的值）。
    #[arg(long, global = true, env = "AGENTDECK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 驗證代理設定與模型能力是否一致。
    Validate(ValidateArgs),
    /// 執行代理並即時輸出回應內容。
    Run(RunArgs),
}

#[derive(Args)]
struct ValidateArgs {
    /// 模型 ID，例如 `gpt-4o`。
    #[arg(long)]
    model: String,
    #[arg(long, default_value = "openai")]
    provider: String,
    #[arg(long)]
    temperature: Option<f64>,
    /// 代理設定檔（.json、.toml、.yaml）。未指定時視為空設定。
    #[arg(long)]
    config: Option<PathBuf>,
    /// 附加的工具 ID，可重複指定。
    #[arg(long = "tool")]
    tools: Vec<String>,
    /// 以 JSON 輸出驗證結果。
    #[arg(long)]
    json: bool,
    /// 套用所有帶有建議值的建議，並輸出修改後的模型與設定。
    #[arg(long)]
    apply: bool,
}

#[derive(Args)]
struct RunArgs {
    /// 代理 ID。
    #[arg(long)]
    agent: String,
    /// 要送給代理的訊息。
    #[arg(long)]
    message: String,
    /// 延續既有的對話。
    #[arg(long)]
    session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = PanelSettings::load(&cli.workspace)?;
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    logging::init(&settings.logging)?;
    debug!("Workspace: {}", cli.workspace.display());

    match cli.command {
        Command::Validate(args) => validate(args),
        Command::Run(args) => run(&settings, args).await,
    }
}

fn validate(args: ValidateArgs) -> Result<ExitCode> {
    let mut model = ModelDescriptor::new(args.provider, args.model);
    model.temperature = args.temperature;
    let mut config = match &args.config {
        Some(path) => AgentConfig::from_path(path)?,
        None => AgentConfig::default(),
    };

    let result = validation::validate_config(&model, &config, &args.tools);

    // 套用建議後重新驗證，結束碼反映修改後的設定。
    let outcome = if args.apply {
        for issue in result
            .suggestions()
            .iter()
            .filter(|issue| issue.suggested_value.is_some())
        {
            validation::apply_suggestion(&mut model, &mut config, issue)?;
            info!("Applied suggestion for {}", issue.field);
        }
        let revalidated = validation::validate_config(&model, &config, &args.tools);
        let patched = serde_json::json!({
            "model": model,
            "config": config,
            "result": revalidated,
        });
        println!("{}", serde_json::to_string_pretty(&patched)?);
        revalidated
    } else {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_report(&result);
        }
        result
    };

    Ok(exit_code(&outcome))
}

fn exit_code(result: &ValidationResult) -> ExitCode {
    if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn print_report(result: &ValidationResult) {
    for (severity, issue) in result.issues() {
        let label = match severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Suggestion => "suggestion",
        };
        println!("{label:<10} {}: {}", issue.field, issue.message);
        if let Some(value) = &issue.suggested_value {
            println!("{:<10} suggested value: {value}", "");
        }
    }
    println!(
        "{} errors, {} warnings, {} suggestions",
        result.errors().len(),
        result.warnings().len(),
        result.suggestions().len()
    );
}

async fn run(settings: &PanelSettings, args: RunArgs) -> Result<ExitCode> {
    let client = RunStreamClient::new(&settings.runtime)?;
    let mut request = RunRequest::new(args.agent, args.message);
    request.session_id = args.session;
    request.user_id = settings.runtime.user_id.clone();

    info!("Running agent {}", request.agent_id);
    let mut updates = client.spawn(request);
    let mut stdout = std::io::stdout();
    let mut failed = false;

    while let Some(update) = updates.recv().await {
        match update {
            StreamUpdate::Event(event) => match &event.event {
                RunEventKind::RunResponseContent => {
                    print!("{}", event.content_text());
                    stdout.flush().context("寫入標準輸出失敗")?;
                }
                RunEventKind::RunError => {
                    eprintln!("\nrun error: {}", event.content_text());
                    failed = true;
                }
                other => debug!("{other} event at {}", event.created_at),
            },
            StreamUpdate::Completed => {
                println!();
                break;
            }
            StreamUpdate::Error(message) => {
                eprintln!("error: {message}");
                return Ok(ExitCode::from(1));
            }
        }
    }

    Ok(if failed { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(config: PathBuf, apply: bool) -> ValidateArgs {
        ValidateArgs {
            model: "gpt-4o".into(),
            provider: "openai".into(),
            temperature: None,
            config: Some(config),
            tools: Vec::new(),
            json: true,
            apply,
        }
    }

    #[test]
    fn apply_exit_status_reflects_patched_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, r#"{"memory": {"enabled": true, "table_name": "memories"}}"#)
            .unwrap();

        assert_eq!(validate(args_for(path.clone(), false)).unwrap(), ExitCode::from(1));
        assert_eq!(validate(args_for(path, true)).unwrap(), ExitCode::SUCCESS);
    }
}
