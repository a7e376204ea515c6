use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use std::time::Instant;

use heiya::cli::Args;
use heiya::dispatch::{plan_batch, run_batch, BatchSummary, FileStatus, ProgressEvent};
use heiya::json_output::JsonMessage;
use heiya::utils::{
    create_progress_bar, display_name, format_duration, validate_inputs, verbose_println,
    warn_println,
};
use heiya::ConversionEngine;

fn print_summary(summary: &BatchSummary, args: &Args, total_time: std::time::Duration) {
    let header = if args.dry_run {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    if args.dry_run {
        println!(
            "  Would be converted: {}",
            style(summary.dry_run).bold().green()
        );
    } else {
        println!(
            "  Successfully converted: {}",
            style(summary.converted).bold().green()
        );
    }
    if !summary.failed.is_empty() {
        println!("  Failed: {}", style(summary.failed.len()).bold().red());
    }
    if summary.skipped > 0 {
        println!(
            "  Skipped (already exist): {}",
            style(summary.skipped).bold().yellow()
        );
    }
    if !summary.ignored.is_empty() {
        println!(
            "  Ignored inputs: {}",
            style(summary.ignored.len()).bold().yellow()
        );
    }

    println!();
    println!("{}", style("Performance:").bold().blue());
    println!(
        "  Total time: {}",
        style(format_duration(total_time)).bold()
    );
    if summary.total > 0 {
        println!(
            "  Average time per file: {}",
            style(format_duration(summary.duration / summary.total as u32)).dim()
        );
    }

    if !summary.ignored.is_empty() {
        println!();
        println!("{}", style("Ignored inputs:").bold().yellow());
        for (i, ignored) in summary.ignored.iter().enumerate() {
            println!(
                "  {}: {} - {}",
                style(format!("#{}", i + 1)).dim(),
                style(ignored.path.display()).bold().yellow(),
                ignored.reason
            );
        }
    }

    if !summary.failed.is_empty() {
        println!();
        println!("{}", style("Errors encountered:").bold().red());
        for (i, (path, error)) in summary.failed.iter().enumerate() {
            println!(
                "  {}: {} - {}",
                style(format!("#{}", i + 1)).dim(),
                style(display_name(path)).bold().red(),
                error
            );
        }
        println!();
        println!("  Check the files and try again with --verbose for more details");
    }

    if summary.skipped > 0 {
        println!();
        println!(
            "{}",
            style(format!(
                "ℹ {} files skipped because the output already exists",
                summary.skipped
            ))
            .bold()
            .blue()
        );
        println!("  Use --force to convert them again");
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    args.load_and_merge_config()?;
    let json = args.json_progress;

    if !json {
        println!("{}", style("Heiya - Batch Media Converter").bold().blue());
        println!("{}", style("AVIF / HEIC / H.265").dim());
        println!();
    }

    validate_inputs(&args)?;

    let config = args.conversion_config();

    if config.verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Targets: {:?}", args.targets());
        println!("  Directory extensions: {}", args.extensions().to_extension_list());
        match &config.output_dir {
            Some(dir) => println!("  Output directory: {}", dir.display()),
            None => println!("  Output directory: next to each source file"),
        }
        println!("  Parallel jobs: {}", config.parallel_jobs);
        println!("  AVIF/HEIC quality: {}", config.avif_quality);
        println!("  AVIF speed: {}", config.avif_speed);
        println!("  H.265 CRF: {} (preset {})", config.h265_crf, config.h265_preset);
        if config.dry_run {
            println!("  Dry run mode: enabled (simulation only - no files will be created)");
        }
        println!();
    }

    let engine = ConversionEngine::new(config);

    if !json {
        if args.heic && engine.encoder().heic_tool().is_none() {
            warn_println("heif-enc and ImageMagick not found, HEIC conversions will fail");
        }
        if args.h265 && !engine.encoder().ffmpeg_available() {
            warn_println("ffmpeg not found, H.265 conversions will fail");
        }
    }

    let plan = plan_batch(&engine, &args.input_paths, args.targets(), &args.extensions());
    let total = plan.total_units();

    verbose_println(
        engine.config().verbose,
        &format!(
            "Planned {} conversions in {} steps",
            total,
            plan.steps.len()
        ),
    );

    let progress_bar = if json || total == 0 {
        ProgressBar::hidden()
    } else {
        create_progress_bar(total as u64)
    };
    progress_bar.set_message("Converting");

    let summary = run_batch(&engine, &plan, |event| {
        if json {
            JsonMessage::emit_event(&event);
            return;
        }

        if let ProgressEvent::FileDone { input, status, .. } = event {
            progress_bar.inc(1);
            progress_bar.set_message(display_name(&input));
            if let FileStatus::Failed(error) = status {
                progress_bar.println(format!(
                    "{} {} - {}",
                    style("[ERROR]").red().bold(),
                    display_name(&input),
                    error
                ));
            }
        }
    });

    progress_bar.finish_with_message("✓ Conversion complete!");

    if !json {
        println!();
        if total == 0 {
            println!(
                "{}",
                style("Nothing to convert with the selected formats").red()
            );
        }
        print_summary(&summary, &args, start_time.elapsed());
    }

    if summary.has_failures() {
        return Err(anyhow::anyhow!(
            "{} file(s) failed to convert",
            summary.failed.len()
        ));
    }

    Ok(())
}
