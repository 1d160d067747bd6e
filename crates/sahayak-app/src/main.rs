//! Demo consumer of the sahayak library crates: transcript in, per-program
//! eligibility verdicts and dashboard metrics out. The transcript comes from
//! the first CLI argument or stdin — the same manual-entry fallback path the
//! form layer uses when voice capture is unavailable.

use std::io::Read;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use sahayak_analysis::controller::AnalysisController;
use sahayak_analysis::evaluate::InferenceEvaluator;
use sahayak_common::catalog::Catalog;
use sahayak_common::config::InferenceConfig;
use sahayak_common::inference::InferenceClient;
use sahayak_voice::extract::ProfileExtractor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = InferenceConfig::from_env();
    info!(
        base_url = %config.base_url,
        timeout_ms = config.default_timeout.as_millis(),
        extraction_model = %config.extraction_model,
        eligibility_model = %config.eligibility_model,
        "inference client configured"
    );

    let catalog = Arc::new(Catalog::load()?);
    info!(programs = catalog.len(), "program catalog loaded");

    let client = Arc::new(InferenceClient::new(config.clone())?);
    let extractor = ProfileExtractor::new(Arc::clone(&client), config.extraction_model.clone());
    let evaluator = InferenceEvaluator::new(
        Arc::clone(&client),
        Arc::clone(&catalog),
        config.eligibility_model.clone(),
    );
    let controller = AnalysisController::new(evaluator, catalog);

    let transcript = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let transcript = transcript.trim();
    anyhow::ensure!(!transcript.is_empty(), "no transcript provided");

    let partial = extractor.extract_profile(transcript).await;
    let profile = controller.merge_profile(partial).await;
    info!(?profile, "profile after merge");

    let results = controller.run_analysis().await?;
    let metrics = controller.metrics().await;

    let report = serde_json::json!({
        "profile": &profile,
        "results": &results,
        "metrics": &metrics,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if std::env::var("SPEAK_SUMMARY").is_ok() {
        let summary = format!(
            "You appear eligible for {} of {} schemes.",
            metrics.eligible_count, metrics.schemes_analyzed
        );
        match client.synthesize_speech(&summary).await {
            Ok(audio) => info!(
                base64_len = audio.audio.len(),
                mime = audio.mime_type.as_deref().unwrap_or("unknown"),
                "spoken summary synthesized"
            ),
            Err(e) => tracing::warn!(error = %e, "speech synthesis failed"),
        }
    }
    Ok(())
}
