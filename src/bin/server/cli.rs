//! CLI mode for digit prediction.

use crate::config::DigitConfig;
use crate::digit::{AppError, DigitEngine, PredictResponse, download_bytes};
use digit_recognizer::domain::Prediction;
use digit_recognizer::utils::read_image_bytes;
use std::path::Path;
use std::time::Instant;
use tracing::info;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Predict the digit in an image fetched from a URL
pub async fn process_url(url: &str, config: &DigitConfig, output_format: &str) -> CliResult {
    let start = Instant::now();

    info!("Downloading image from URL...");
    let bytes = download_bytes(url).await?;
    info!(
        "Downloaded {} bytes in {:.2}ms",
        bytes.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    process_bytes(&bytes, config, output_format)
}

/// Predict the digit in a local image file
pub fn process_file(path: &Path, config: &DigitConfig, output_format: &str) -> CliResult {
    let start = Instant::now();

    info!("Loading image from file...");
    let bytes = read_image_bytes(path)?;
    info!(
        "Loaded {} bytes in {:.2}ms",
        bytes.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    process_bytes(&bytes, config, output_format)
}

fn process_bytes(bytes: &[u8], config: &DigitConfig, output_format: &str) -> CliResult {
    info!("Initializing digit engine...");
    let init_start = Instant::now();
    let engine = DigitEngine::new(config)?;
    info!(
        "Engine initialized in {:.2}ms",
        init_start.elapsed().as_secs_f64() * 1000.0
    );

    let predict_start = Instant::now();
    let prediction = engine.predict(bytes).map_err(AppError::from)?;
    let processing_time = predict_start.elapsed();
    info!(
        "Prediction completed in {:.2}ms",
        processing_time.as_secs_f64() * 1000.0
    );

    output_result(
        &prediction,
        output_format,
        processing_time.as_secs_f64() * 1000.0,
    )?;
    Ok(())
}

/// Output the prediction in the specified format
fn output_result(
    prediction: &Prediction,
    format: &str,
    processing_time_ms: f64,
) -> Result<(), serde_json::Error> {
    match format {
        "json" => {
            let response = PredictResponse::from_prediction(prediction, None, processing_time_ms);
            println!("{}", serde_json::to_string(&response)?);
        }
        "text" => {
            println!("{}", prediction.digit);
        }
        _ => {
            println!("\n=== Digit Prediction ===");
            println!("Processing time: {:.2}ms", processing_time_ms);
            println!(
                "Predicted digit: {} ({}% confidence)",
                prediction.digit, prediction.confidence
            );
            println!();

            println!("--- Top 3 ---");
            for (rank, class) in prediction.top_k(3).iter().enumerate() {
                println!(
                    "[{}] {} ({:.1}%)",
                    rank + 1,
                    class.label,
                    class.score * 100.0
                );
            }
            println!();

            println!("--- Distribution ---");
            for (digit, p) in prediction.probabilities.as_slice().iter().enumerate() {
                let bar = "#".repeat((p * 40.0).round() as usize);
                println!("{} {:>6.2}% {}", digit, p * 100.0, bar);
            }
        }
    }

    Ok(())
}
