// ==========================================
// 诊所账单报表导入系统 - 命令行入口
// ==========================================
// 用法:
//   clinic-billing-import import <file>...   解析并落库，输出导入响应 JSON
//   clinic-billing-import parse <file>       仅解析，输出 ParseResult JSON
//   clinic-billing-import history <cnpj>     查询导入历史
//   clinic-billing-import status             服务状态
// 环境变量: CLINIC_IMPORT_DB_PATH / CLINIC_IMPORT_LOG_FORMAT / RUST_LOG
// 退出码: 任一响应为 error 时返回 1
// ==========================================

use anyhow::{bail, Context};
use clinic_billing_import::api::ImportApi;
use clinic_billing_import::config::AppConfig;
use clinic_billing_import::logging;
use serde::Serialize;
use std::process::ExitCode;

const USAGE: &str = "用法: clinic-billing-import <import <file>... | parse <file> | history <cnpj> | status>";

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: &str, args: &[String]) -> anyhow::Result<bool> {
    let config = AppConfig::from_env();
    tracing::info!(version = clinic_billing_import::VERSION, db_path = %config.db_path, "{}", clinic_billing_import::APP_NAME);

    let api = ImportApi::new(config).context("初始化 ImportApi 失败")?;

    match command {
        "import" => {
            if args.is_empty() {
                bail!("import 需要至少一个文件\n{}", USAGE);
            }
            let responses = if args.len() == 1 {
                vec![api.import_file(&args[0]).await]
            } else {
                api.import_files(args).await
            };
            let all_ok = responses.iter().all(|r| r.is_ok());
            if let [single] = responses.as_slice() {
                print_json(single)?;
            } else {
                print_json(&responses)?;
            }
            Ok(all_ok)
        }
        "parse" => {
            let [file] = args else {
                bail!("parse 需要一个文件\n{}", USAGE);
            };
            let parsed = api.parse_only(file)?;
            print_json(&parsed)?;
            Ok(true)
        }
        "history" => {
            let [cnpj] = args else {
                bail!("history 需要一个 CNPJ\n{}", USAGE);
            };
            let history = api.history(cnpj).await?;
            print_json(&history)?;
            Ok(true)
        }
        "status" => {
            print_json(&api.status())?;
            Ok(true)
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_with_format(AppConfig::from_env().log_format);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };

    match run(command, rest).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "命令执行失败");
            let response = clinic_billing_import::ImportApiResponse::Error {
                detail: format!("{:#}", e),
            };
            if let Ok(json) = serde_json::to_string_pretty(&response) {
                println!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}
