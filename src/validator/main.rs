//! Standalone validator for reply configuration files.
//!
//! Checks a replies JSON file for empty texts, an oversized reaction and
//! an unusable quote bank.

use std::process::ExitCode;

use clap::Parser;

use wa_autoreply_bot::config::{MAX_REACTION_CHARS, ReplyConfig};

/// Reply configuration validator.
#[derive(Parser, Debug)]
#[command(name = "validate_replies")]
#[command(about = "Validates reply configuration files for the WhatsApp auto-reply bot")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file to validate.
    #[arg(short, long, default_value = "replies.json")]
    file: String,

    /// Generate an example configuration file at the specified path.
    #[arg(long)]
    generate_example: Option<String>,

    /// Show every text and quote.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(output_path) = args.generate_example {
        return generate_example(&output_path);
    }

    validate_config(&args.file, args.verbose)
}

fn generate_example(output_path: &str) -> ExitCode {
    let example = ReplyConfig::example();

    match example.save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example configuration written to: {output_path}");
            println!("\nThe file contains {} example quotes.", example.quotes.len());
            println!("Use {{version}} in the info text to show the bot version.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_config(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let config = match ReplyConfig::load_from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("✗ Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if verbose {
        for (field, text) in config.texts() {
            println!("[{field}] \"{}\"", truncate(text, 40));
        }
        for (i, quote) in config.quotes.as_slice().iter().enumerate() {
            println!("[quote {i}] \"{}\"", truncate(quote, 40));
        }
        println!();
    }

    let errors: Vec<_> = config
        .validate_all()
        .into_iter()
        .filter_map(Result::err)
        .collect();

    for e in &errors {
        println!("  ✗ Error: {e}");
    }

    if errors.is_empty() {
        println!(
            "✓ Configuration is valid ({} texts, {} quotes)",
            config.texts().len(),
            config.quotes.len()
        );
        println!("  Reaction: {} (max {MAX_REACTION_CHARS} chars)", config.reaction);
        ExitCode::SUCCESS
    } else {
        println!("\n✗ Validation failed: {} error(s)", errors.len());
        ExitCode::FAILURE
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
