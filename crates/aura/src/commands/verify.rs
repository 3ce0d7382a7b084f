//! Verify command: answer a question through draft, plan, verify and revise.

use std::time::Duration;

use anyhow::Result;
use aura_sdk::VerificationReport;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::{print_json, Globals};
use crate::cli::VerifyArgs;

pub async fn execute(args: VerifyArgs, g: &Globals<'_>) -> Result<()> {
    let spinner = (!g.json).then(thinking_spinner);

    let outcome = match args.project.as_deref() {
        Some(project) => {
            g.aura
                .generate_grounded(project, g.user, &args.query, args.max_tokens)
                .await
        }
        None => g.aura.verification().run(&args.query).await,
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = outcome?;

    if g.json {
        return print_json(&report);
    }
    print_report(&report, args.verbose);
    Ok(())
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message("verifying...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_report(report: &VerificationReport, verbose: bool) {
    if verbose {
        println!("{}\n{}\n", "Draft".bold(), report.draft.dimmed());
        if report.skipped {
            println!("{}\n", "No verification questions; draft returned as is.".yellow());
        } else {
            println!("{}", "Findings".bold());
            for finding in &report.findings {
                println!("  {} {}", "Q:".cyan(), finding.question);
                println!("  {} {}", "A:".cyan(), finding.answer.dimmed());
            }
            println!();
        }
        println!("{}", "Answer".bold());
    }
    println!("{}", report.answer);
}
