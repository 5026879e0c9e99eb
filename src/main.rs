use barsync::config;
use barsync::game::autoplay::run_autoplay;
use barsync::game::gameplay::NullSink;
use barsync::game::parsing::chart_text::load_chart_file;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "barsync")]
#[command(author, version, about = "Autoplays a bar chart and reports the result", long_about = None)]
struct Args {
    /// Chart text file (`#BBB:CL:SEQUENCE;` lines)
    chart: PathBuf,

    /// Tempo in beats per minute
    bpm: u32,

    /// Config file to load instead of barsync.ini
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let args = Args::parse();
    match &args.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    }
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());

    let parsed = match load_chart_file(&args.chart, args.bpm) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::error!("Failed to load chart: {e}");
            return Err(e.into());
        }
    };
    for e in &parsed.errors {
        log::warn!("Skipped chart line: {e}");
    }

    let summary = run_autoplay(
        &parsed.chart,
        cfg.session_config(),
        cfg.autoplay_settings(),
        NullSink,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Score:     {:>7} ({})", summary.final_score, summary.rank.label());
        println!("EX score:  {:>7}", summary.ex_score);
        println!("Max combo: {:>7} / {}", summary.max_combo, summary.total_notes);
        println!("Gauge:     {:>7.2}%", summary.gauge_percent);
        println!(
            "Perfect {}  Master {}  Ideal {}  Kind {}  Uhm {} (miss {})",
            summary.counts.perfect,
            summary.counts.master,
            summary.counts.ideal,
            summary.counts.kind,
            summary.counts.uhm,
            summary.misses
        );
        println!(
            "Offset:    mean {:+.2}ms, stddev {:.2}ms, max |{:.2}|ms",
            summary.timing.mean_ms, summary.timing.stddev_ms, summary.timing.max_abs_ms
        );
    }
    Ok(())
}
