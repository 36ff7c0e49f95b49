//! Backend and tool availability check command.

use std::time::Duration;

use console::style;

use doctriage::catalog::{self, ModelSpec};
use doctriage::{Config, Provider};
use doctriage_analysis::render::{PageRasterizer, PdftoppmRasterizer};
use doctriage_analysis::vision;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

fn status_line(name: &str, ready: bool, hint: &str) {
    let status = if ready {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<22} {}", name, status);
    if !hint.is_empty() {
        println!("  {:<22} {}", "", style(hint).dim());
    }
}

/// Report whether one classifying model can be used.
fn check_vision(config: &Config, spec: &ModelSpec) -> bool {
    match vision::vision_backend(spec, &config.providers, CHECK_TIMEOUT) {
        Ok(backend) => {
            let ready = backend.is_available();
            status_line(spec.name, ready, &backend.availability_hint());
            ready
        }
        Err(e) => {
            status_line(spec.name, false, &e.to_string());
            false
        }
    }
}

/// Check credentials and tools needed to classify with a model.
pub fn cmd_check(config: &Config, model: Option<&str>) -> anyhow::Result<()> {
    let name = model.unwrap_or(&config.classifier.model);
    let spec = catalog::lookup(name)
        .ok_or_else(|| doctriage::ConfigError::UnknownModel(name.to_string()))?;

    println!("\n{}", style("doctriage Status").bold());
    println!("{}", "-".repeat(50));

    println!("\n{}", style("Credentials:").cyan());
    let credentials = config.providers.check_credentials(spec);
    match credentials {
        Ok(()) => status_line(spec.provider.as_str(), true, ""),
        Err(ref e) => status_line(spec.provider.as_str(), false, &e.to_string()),
    }

    println!("\n{}", style("Backends:").cyan());
    let backend_ready = if spec.provider == Provider::Mistral {
        let ocr_ready = match vision::ocr_backend(spec, &config.providers, CHECK_TIMEOUT) {
            Ok(ocr) => {
                let ready = ocr.is_available();
                status_line(spec.name, ready, &ocr.availability_hint());
                ready
            }
            Err(e) => {
                status_line(spec.name, false, &e.to_string());
                false
            }
        };
        let classifier_ready = match vision::text_classifier(spec) {
            Some(classifier) => check_vision(config, classifier),
            None => {
                status_line("text classifier", false, "no text classifier configured");
                false
            }
        };
        ocr_ready && classifier_ready
    } else {
        check_vision(config, spec)
    };

    println!("\n{}", style("Tools:").cyan());
    let rasterizer = PdftoppmRasterizer::new();
    let needs_rasterizer = spec.vision && !config.classifier.text_mode;
    let rasterizer_ready = rasterizer.is_available();
    status_line(rasterizer.name(), rasterizer_ready, &rasterizer.availability_hint());

    let ready = credentials.is_ok() && backend_ready && (rasterizer_ready || !needs_rasterizer);
    println!();
    if ready {
        println!("  {} Ready to classify with {}", style("→").green(), spec.name);
        Ok(())
    } else {
        anyhow::bail!("Not ready to classify with {}", spec.name)
    }
}
