use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{Cli, Commands};
use phish_probe::concurrent::ConcurrentExtractor;
use phish_probe::output::{write_csv, write_jsonl};
use phish_probe::{EngineConfig, ExtractionReport, FeatureEngine};

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Keep external crates (reqwest/hyper/hickory) quiet unless something is wrong.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug { "debug" } else if cli.verbose { "info" } else { "warn" };
    let filter_str = format!(
        "phish_probe={crate},reqwest=info,hyper=info,h2=info,\
         hickory_proto=warn,hickory_resolver=warn,rustls=warn",
        crate = crate_level
    );
    let env_filter =
        EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = build_config(&cli)?;
    tracing::info!(
        reputation = config.reputation_enabled,
        verify_tls = config.verify_tls,
        workers = config.workers,
        cache_ttl = config.cache_ttl_secs,
        "Starting engine"
    );
    let engine = Arc::new(FeatureEngine::live(&config)?);

    match cli.command {
        Commands::Extract { url, json } => {
            let report = engine.extract(&url).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Batch { input, out, concurrency } => {
            run_batch(engine, PathBuf::from(input), PathBuf::from(out), concurrency).await?;
        }
    }
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(&PathBuf::from(path))?,
        None => EngineConfig::default(),
    };
    if cli.no_reputation {
        config.reputation_enabled = false;
    }
    if cli.insecure {
        config.verify_tls = false;
    }
    if let Some(ttl) = cli.cache_ttl {
        config.cache_ttl_secs = ttl;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(path) = &cli.blocklist {
        config.blocklist_path = Some(PathBuf::from(path));
    }
    config.validate()?;
    Ok(config)
}

fn print_report(report: &ExtractionReport) {
    if let Some(err) = &report.error {
        println!("[!] {}: {}", report.url, err);
    }
    for (feature, value) in report.features.iter() {
        println!("{:<28} = {:>2}", feature.name(), value.as_i8());
    }
    for probe in &report.probes {
        match &probe.failure {
            None => println!("[+] {:<18} ok       {}ms", probe.kind, probe.elapsed_ms),
            Some(f) => println!("[-] {:<18} {}  ({}ms)", probe.kind, f, probe.elapsed_ms),
        }
    }
}

async fn run_batch(
    engine: Arc<FeatureEngine>,
    input: PathBuf,
    out: PathBuf,
    concurrency: usize,
) -> anyhow::Result<()> {
    let urls = phish_probe::utils::read_url_list(&input)?;
    phish_probe::utils::ensure_dir(&out)?;
    tracing::info!(
        input = %input.display(),
        out = %out.display(),
        urls = urls.len(),
        concurrency,
        "Starting batch"
    );

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let extractor = ConcurrentExtractor::new(engine, concurrency);
    let reports = extractor
        .extract_all(urls, |r| {
            pb.set_message(r.url.clone());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    let refs: Vec<&ExtractionReport> = reports.iter().collect();
    let csv_path = out.join("features.csv");
    let jsonl_path = out.join("reports.jsonl");
    write_csv(&csv_path, &refs)?;
    write_jsonl(&jsonl_path, &refs)?;

    let (completed, failed) = extractor.get_stats();
    println!("[+] {} URLs analyzed, {} unparsable", completed, failed);
    println!("[+] Features: {}", csv_path.display());
    println!("[+] Reports:  {}", jsonl_path.display());
    Ok(())
}
