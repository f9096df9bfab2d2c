mod demo;

use anyhow::Context;
use rust_behat::config::{RunnerConfig, load_config_from_file};
use rust_behat::engine::{EngineEvent, run_suite, validate_suites};
use rust_behat::scenario::load_suites_from_glob;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 스위트 파일 glob 패턴과 선택적 설정 파일 경로를 받아 예제 등록소로 실행한다.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let pattern = args.next().unwrap_or_else(|| "demos/suites/*.yaml".to_string());
    let config = match args.next() {
        Some(path) => load_config_from_file(Path::new(&path))
            .with_context(|| format!("설정 파일을 읽을 수 없습니다: {path}"))?,
        None => RunnerConfig::default(),
    };
    let registry = Arc::new(demo::registry()?);
    let config = Arc::new(config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("중단 요청을 받았습니다. 진행 중인 Step 이후 정리합니다.");
            interrupt.cancel();
        }
    });

    let (sender, receiver) = unbounded_channel();
    let printer = tokio::spawn(print_events(receiver));

    let suites = load_suites_from_glob(&pattern)?;
    validate_suites(suites.iter().map(|(_, suite)| suite), &registry, &config)?;

    let mut exit_code = 0;
    for (path, suite) in &suites {
        info!(path = %path.display(), suite = %suite.name, "스위트 실행");
        let outcome = run_suite(
            suite,
            registry.clone(),
            config.clone(),
            sender.clone(),
            cancel.clone(),
        )
        .await?;
        exit_code = exit_code.max(outcome.exit_code());
        if outcome.cancelled {
            break;
        }
    }
    drop(sender);
    printer.await?;
    std::process::exit(exit_code);
}

/// 실행 결과를 한 줄씩 출력한다.
async fn print_events(mut receiver: UnboundedReceiver<EngineEvent>) {
    while let Some(event) = receiver.recv().await {
        match event {
            EngineEvent::FeatureStarted { feature } => println!("Feature: {feature}"),
            EngineEvent::ScenarioStarted { scenario } => println!("  Scenario: {}", scenario.name),
            EngineEvent::StepFinished { result, .. } => {
                println!("    [{:>7}] {}", result.status, result.text);
                if let Some(error) = result.error {
                    println!("              {error}");
                }
            }
            EngineEvent::ScenarioFinished { outcome } => {
                if let Some(error) = &outcome.setup_error {
                    println!("    {error}");
                }
                println!("  => {}", outcome.status);
            }
            EngineEvent::SuiteFinished { suite, status } => println!("{suite}: {status}"),
            _ => {}
        }
    }
}
