//! Standalone validator for slot catalog seed files.
//!
//! Checks every slot for a display name, a Telegram link and a positive
//! show limit, and flags links that point at the same channel twice.

use std::process::ExitCode;

use clap::Parser;

use mellstar_backend::config::CatalogConfig;

/// Slot catalog validator.
#[derive(Parser, Debug)]
#[command(name = "validate_catalog")]
#[command(about = "Validates slot catalog seed files for the MellStar backend")]
#[command(version)]
struct Args {
    /// Path to the JSON catalog file to validate.
    #[arg(short, long, default_value = "catalog.json")]
    file: String,

    /// Generate an example catalog file at the specified path.
    #[arg(long)]
    generate_example: Option<String>,

    /// Show detailed information for each slot.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(output_path) = args.generate_example {
        return generate_example(&output_path);
    }

    validate_catalog(&args.file, args.verbose)
}

fn generate_example(output_path: &str) -> ExitCode {
    let example = CatalogConfig::example();

    match example.save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example catalog written to: {output_path}");
            println!("\nThe file contains {} example slots.", example.len());
            println!("Set 'category' to \"vip\" or \"premium\" to show a slot before standard ones.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_catalog(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let config = match CatalogConfig::load_from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("✗ Failed to load catalog: {e}");
            return ExitCode::FAILURE;
        }
    };

    if config.is_empty() {
        println!("✗ Validation failed: no slots configured");
        return ExitCode::FAILURE;
    }

    let mut errors = 0;
    for (slot, result) in config.slots.iter().zip(config.validate_all()) {
        if verbose {
            let shows = slot
                .required_shows
                .map_or_else(|| "unlimited".to_owned(), |n| format!("{n} shows"));
            println!(
                "[{}] \"{}\" -> {} ({})",
                slot.category.as_str(),
                truncate(&slot.display_name, 40),
                slot.link,
                shows
            );
        }

        match result {
            Ok(()) => {
                if verbose {
                    println!("  ✓ OK");
                }
            }
            Err(e) => {
                errors += 1;
                println!("  ✗ Error: {e}");
            }
        }
    }

    println!();

    let total = config.len();
    if errors == 0 {
        println!("✓ All {total} slots are valid!");
        println!(
            "  Priority (vip/premium): {}, standard: {}",
            config.priority_count(),
            total - config.priority_count()
        );
        ExitCode::SUCCESS
    } else {
        println!("✗ Validation failed: {errors} error(s) in {total} slots");
        println!("  Valid: {}/{total}", total - errors);
        ExitCode::FAILURE
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}
