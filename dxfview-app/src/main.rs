use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dxfview_config::{AppConfig, ConfigError};
use dxfview_engine::{LodPolicy, to_geometry_with, to_layer_geometry_with};
use dxfview_io::{CancelToken, ErrorCode, FileLimits, ParseError, ParseResult};
use dxfview_worker::{ExecutionPlan, ParseRequest, WorkerOutcome};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod loader;
mod report;

use cli::Cli;
use loader::LoadOutcome;
use report::{GeometrySummary, render_summary};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);
    info!("启动 DXF 解析工具");

    match run(&cli, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "执行失败");
            eprintln!("错误：{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// 返回值表示解析是否成功；I/O 与配置问题以 `Err` 返回。
async fn run(cli: &Cli, config: &AppConfig) -> Result<bool> {
    let limits = FileLimits {
        max_size: config.limits.max_size_bytes,
        warning_size: config.limits.warning_size_bytes,
    };
    let lod = &config.lod;
    let policy = LodPolicy::new(
        lod.high_quality_segments,
        lod.medium_quality_segments,
        lod.low_quality_segments,
        lod.high_quality_threshold,
        lod.medium_quality_threshold,
    )
    .context("LOD 配置无效")?;

    let loaded = match loader::load(&cli.file, &limits)? {
        LoadOutcome::Loaded(loaded) => loaded,
        LoadOutcome::Rejected(error) => {
            warn!(code = %error.code, "文件未通过校验");
            report_failure(cli, error)?;
            return Ok(false);
        }
    };

    let plan = ExecutionPlan::for_size(
        loaded.source.file_size,
        config.limits.worker_threshold_bytes,
    );
    let request = ParseRequest::new(loaded.text, loaded.source, cli.parse_options(&config.parse));

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let outcome = dxfview_worker::run(request, plan, cancel, |stage, percent| {
        debug!(stage = stage.as_str(), percent, "解析进度");
    })
    .await;

    match outcome {
        WorkerOutcome::Success(payload) => {
            let warnings = payload.warnings.clone();
            let data = payload.into_data();
            if cli.json {
                let result = ParseResult::succeeded(
                    data.clone(),
                    warnings,
                    data.metadata.parse_time_ms,
                );
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let geometry = if cli.per_layer {
                    GeometrySummary::PerLayer(to_layer_geometry_with(&data, &policy, cli.segments))
                } else {
                    GeometrySummary::Merged(to_geometry_with(&data, &policy, cli.segments))
                };
                print!("{}", render_summary(&data, &warnings, &geometry));
            }
            Ok(true)
        }
        WorkerOutcome::Failure(failure) => {
            report_failure(cli, ParseError::new(failure.code, failure.message))?;
            Ok(false)
        }
        WorkerOutcome::Cancelled => {
            warn!("解析已取消");
            eprintln!("解析已取消");
            Ok(false)
        }
    }
}

fn report_failure(cli: &Cli, error: ParseError) -> Result<()> {
    if cli.json {
        let result = ParseResult::failed(error, 0.0);
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        eprintln!("解析失败：{error}");
        if error.code == ErrorCode::WorkerError {
            eprintln!("后台解析通道出现故障，可以重试。");
        }
    }
    Ok(())
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Invalid(_) | ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
