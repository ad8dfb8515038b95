use clap::Parser;
use tracing::info;

use cardlens::cli::{self, Cli};
use cardlens::config::{self, Config};
use cardlens::error::Error;
use cardlens::generate::GeminiClient;
use cardlens::pipeline::Pipeline;
use cardlens::platform::AdoClient;
use cardlens::prompts::PromptEngine;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    info!("cardlens starting");

    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    info!(?config, "config loaded");

    let (mode, id) = match cli.target() {
        Some(target) => target,
        None => {
            let mut stdin = std::io::stdin().lock();
            let mut stderr = std::io::stderr();
            match cli::prompt_target(&mut stdin, &mut stderr) {
                Ok(target) => target,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
    };

    let pat = match config::resolve_secret(&config.pat_env, "personal access token") {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let api_key = match config::resolve_secret(&config.api_key_env, "generation service key") {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let platform = AdoClient::new(&config.org_url, &pat);
    let generator = GeminiClient::new(api_key, config.model.clone());
    let prompts = PromptEngine::new(config.prompt_dir.clone());

    let pipeline = Pipeline::new(platform, generator, prompts, config);

    match pipeline.run(mode, id) {
        Ok(summary) => {
            info!(
                work_item_id = summary.work_item_id,
                fragments = summary.fragment_count,
                "done"
            );
        }
        Err(e @ Error::Update(_)) => {
            eprintln!("error: the report was composed but could not be written back: {e}");
            eprintln!("the analysis itself succeeded; re-run to retry the write");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: resolution failed: {e}");
            std::process::exit(1);
        }
    }
}
