use anyhow::Result;
use load_forecast::{config, runner, telemetry};
use config::Config;
use telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    if cfg.training.finetune && !cfg.training.weights_dir.is_dir() {
        warn!(
            dir = %cfg.training.weights_dir.display(),
            "finetuning requested but the weights directory does not exist"
        );
    }

    info!(
        models = ?cfg.training.models,
        epochs = cfg.training.epochs,
        days = cfg.simulation.days,
        "starting load forecast experiment"
    );

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let mut experiment =
        tokio::task::spawn_blocking(move || runner::run_experiment(&cfg, &run_cancel));

    let joined = tokio::select! {
        joined = &mut experiment => joined,
        _ = telemetry::shutdown_signal() => {
            warn!("cancelling experiment, waiting for the current epoch to finish");
            cancel.cancel();
            experiment.await
        }
    };

    match joined? {
        Ok(summary) => {
            for report in &summary.reports {
                info!(
                    model = %report.model,
                    test_loss = report.test.loss,
                    test_smape = report.test.smape,
                    "final test metrics"
                );
            }
        }
        Err(e) if cancel.is_cancelled() => {
            warn!(error = %e, "experiment interrupted before completion");
        }
        Err(e) => return Err(e),
    }

    warn!("shutdown complete");
    Ok(())
}
