//! Supported model listing.

use console::style;

use doctriage::catalog::{DEFAULT_MODEL, MODELS};
use doctriage::pricing::Pricing;

pub fn cmd_models() {
    println!("\n{}", style("Supported Models").bold());
    println!("{}", "-".repeat(72));
    for model in MODELS {
        let price = match model.pricing {
            Pricing::Tokens {
                input_per_1k,
                output_per_1k,
            } => format!("${} in / ${} out per 1K tokens", input_per_1k, output_per_1k),
            Pricing::Pages { per_page } => format!("${} per page", per_page),
        };
        let marker = if model.name == DEFAULT_MODEL {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {:<24} {:<8} {}",
            marker,
            model.name,
            model.provider.as_str(),
            price
        );
        if let Some(classifier) = model.text_classifier {
            println!("  {}", style(format!("OCR text classified by {}", classifier)).dim());
        }
    }
    println!("\n  {} default model", style("*").green());
}
