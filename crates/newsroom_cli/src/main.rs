//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load engine configuration from an optional TOML path.
//! - Open the configured store and print per-stage queue sizes.

use log::info;
use newsroom_core::{Engine, EngineConfig, LogEventSink, StoryStage};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match EngineConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("newsroom: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = newsroom_core::init_from_settings(&config.logging) {
        eprintln!("newsroom: {err}");
        return ExitCode::FAILURE;
    }

    println!("newsroom_core ping={}", newsroom_core::ping());
    println!("newsroom_core version={}", newsroom_core::core_version());

    let engine = match Engine::from_config(&config, Arc::new(LogEventSink)) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("newsroom: {err}");
            return ExitCode::FAILURE;
        }
    };
    let queues = match engine.stage_queues() {
        Ok(queues) => queues,
        Err(err) => {
            eprintln!("newsroom: {err}");
            return ExitCode::FAILURE;
        }
    };

    for stage in StoryStage::ALL {
        let size = queues.get(&stage).map_or(0, Vec::len);
        println!("stage={stage} stories={size}");
    }
    info!(
        "event=cli_report module=cli status=ok stages={}",
        StoryStage::ALL.len()
    );
    ExitCode::SUCCESS
}
