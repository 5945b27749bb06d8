use pkgrisk::analysis::Analyzer;
use pkgrisk::cli::{Cli, Commands, ConfigAction};
use pkgrisk::config::{Config, ConfigValidator};
use pkgrisk::explain::JustificationExplainer;
use pkgrisk::metrics::RawMetricsBundle;
use pkgrisk::models::CompositeScore;
use pkgrisk::publish::Publisher;
use pkgrisk::resolve::{
    DependencyResolver, ParsedDependency, RegistryCache, Resolution, StaticRegistry,
};
use pkgrisk::storage::{
    chunk_for, chunk_rel_path, fnv1a_32, format_size, verify_chunk_set, ChunkReader, DataLayout,
    LookupOutcome,
};
use pkgrisk::{PkgriskError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config_exists = config_path.exists();
    let config = Config::load_or_default(&config_path)?;

    init_logging(cli.verbose, &config.logging.default_filter);
    if !config_exists {
        tracing::warn!(
            "Config file not found at {}, using defaults. Run 'pkgrisk config init' to create one.",
            config_path.display()
        );
    }

    match cli.command {
        Commands::Score { bundle, json } => cmd_score(&config, &bundle, json)?,
        Commands::Explain { bundle } => cmd_explain(&config, &bundle)?,
        Commands::Publish {
            ecosystem,
            input,
            output,
        } => cmd_publish(&config, &ecosystem, &input, output)?,
        Commands::Lookup {
            ecosystem,
            name,
            json,
        } => cmd_lookup(&config, &ecosystem, &name, json)?,
        Commands::Chunk { name, ecosystem } => cmd_chunk(&name, ecosystem.as_deref()),
        Commands::Verify { ecosystem } => cmd_verify(&config, &ecosystem)?,
        Commands::Check {
            deps,
            registry,
            json,
        } => cmd_check(&config, &deps, registry, json)?,
        Commands::Config { action } => cmd_config(config, &config_path, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool, default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = if verbose {
        "pkgrisk=debug"
    } else {
        default_filter
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn analyzer(config: &Config) -> Result<Analyzer> {
    Analyzer::new(config.load_policy()?)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PkgriskError::Io {
            source: e,
            context: "Failed to create tokio runtime".to_string(),
        })
}

fn read_bundle(path: &Path) -> Result<RawMetricsBundle> {
    let content = std::fs::read_to_string(path).map_err(|e| PkgriskError::Io {
        source: e,
        context: format!("Failed to read bundle: {}", path.display()),
    })?;
    RawMetricsBundle::from_json(&content)
}

fn to_pretty_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| PkgriskError::Json {
        source: e,
        context: format!("Failed to serialize {}", what),
    })
}

fn print_score(score: &CompositeScore) {
    println!(
        "  Overall:    {:.1} ({})",
        score.overall, score.grade
    );
    if let Some(percentile) = score.percentile {
        println!("  Percentile: {:.1}", percentile);
    }
    println!("  Risk tier:  {}", score.risk_tier);
    println!("  Urgency:    {}", score.update_urgency);
    println!("  Confidence: {}", score.confidence);
    if let Some(band) = score.project_age_band {
        println!("  Age band:   {}", band);
    }
    if let Some(supply) = &score.supply_chain {
        println!("  Supply chain: {} ({})", supply.level, supply.score);
        for factor in &supply.factors {
            println!("    - {}", factor);
        }
    }
    println!("\n  Components:");
    for (kind, component) in score.components.iter() {
        println!(
            "    {:<14} {:>5.1}  (weight {}%)",
            kind.label(),
            component.score,
            component.weight
        );
    }
}

fn cmd_score(config: &Config, path: &Path, json: bool) -> Result<()> {
    let bundle = read_bundle(path)?;
    let score = analyzer(config)?.analyze(&bundle)?;

    if json {
        println!("{}", to_pretty_json(&score, "composite score")?);
        return Ok(());
    }

    println!("{}/{}", bundle.ecosystem, bundle.name);
    print_score(&score);
    Ok(())
}

fn cmd_explain(config: &Config, path: &Path) -> Result<()> {
    let bundle = read_bundle(path)?;
    let analyzer = analyzer(config)?;
    let score = analyzer.analyze(&bundle)?;
    let explanation =
        JustificationExplainer::new(analyzer.calculator().clone()).explain(&bundle, &score)?;

    println!(
        "{}/{}: {:.1} ({}), {}",
        bundle.ecosystem, bundle.name, explanation.overall, explanation.grade, score.risk_tier
    );
    for factor in &explanation.factors {
        println!("  {}", factor);
    }
    for warning in &explanation.warnings {
        println!("⚠ Warning: {}", warning);
    }
    Ok(())
}

fn cmd_publish(
    config: &Config,
    ecosystem: &str,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let data_dir = match output {
        Some(dir) => dir,
        None => config.data_dir()?,
    };
    let publisher = Publisher::new(
        analyzer(config)?,
        DataLayout::new(&data_dir),
        config.storage.pretty_json,
    );
    let report = publisher.publish_dir(ecosystem, input)?;

    println!("✓ Published {} packages for {}", report.package_count, ecosystem);
    println!("  Run:      {}", report.run_id);
    println!("  Output:   {}", data_dir.display());
    println!(
        "  Chunks:   {} written, {} non-empty, largest {} packages (imbalance {:.2})",
        report.chunks.chunks_written,
        report.chunks.non_empty_chunks,
        report.chunks.max_chunk_packages,
        report.chunks.imbalance()
    );
    println!("  Size:     {}", format_size(report.chunks.total_bytes));
    if let (Some(mean), Some(median)) = (report.stats.mean_overall, report.stats.median_overall) {
        println!("  Overall:  mean {:.1}, median {:.1}", mean, median);
    }
    println!("  Duration: {}ms", report.duration_ms);
    Ok(())
}

fn cmd_lookup(config: &Config, ecosystem: &str, name: &str, json: bool) -> Result<()> {
    let reader = ChunkReader::from_dir(config.reader_dir()?);
    let outcome = runtime()?.block_on(reader.lookup(ecosystem, name))?;

    match outcome {
        LookupOutcome::Found(record) => {
            if json {
                println!("{}", to_pretty_json(&record, "package record")?);
            } else {
                println!("{}/{} {}", record.ecosystem, record.name, record.version);
                if !record.description.is_empty() {
                    println!("  {}", record.description);
                }
                if let Some(repo) = &record.repository_ref {
                    println!("  Repository: {}", repo.url());
                }
                println!(
                    "  Analyzed:   {}",
                    record.analyzed_at.format("%Y-%m-%d %H:%M:%S")
                );
                print_score(&record.composite_score);
            }
        }
        LookupOutcome::NotFound => {
            println!("{}/{} has not been analyzed", ecosystem, name);
        }
        LookupOutcome::Unavailable { reason } => {
            println!("⚠ Lookup unavailable, try again later: {}", reason);
        }
    }
    Ok(())
}

fn cmd_chunk(name: &str, ecosystem: Option<&str>) {
    let id = chunk_for(name);
    println!("Name:  {}", name);
    println!("Hash:  0x{:08x}", fnv1a_32(name.as_bytes()));
    println!("Chunk: {}", id);
    if let Some(ecosystem) = ecosystem {
        println!("Path:  {}", chunk_rel_path(ecosystem, id));
    }
}

fn cmd_verify(config: &Config, ecosystem: &str) -> Result<()> {
    let layout = DataLayout::new(config.reader_dir()?);
    let report = verify_chunk_set(&layout, ecosystem)?;
    println!("✓ Chunk set for {} is consistent", report.ecosystem);
    println!("  Run:      {}", report.run_id);
    println!("  Chunks:   {}", report.chunks_checked);
    println!("  Packages: {}", report.package_count);
    Ok(())
}

fn cmd_check(
    config: &Config,
    deps_path: &Path,
    registry: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(deps_path).map_err(|e| PkgriskError::Io {
        source: e,
        context: format!("Failed to read dependency list: {}", deps_path.display()),
    })?;
    let dependencies: Vec<ParsedDependency> =
        serde_json::from_str(&content).map_err(|e| PkgriskError::Json {
            source: e,
            context: format!("Failed to parse dependency list: {}", deps_path.display()),
        })?;

    let registry = match registry {
        Some(path) => Some(RegistryCache::new(Arc::new(StaticRegistry::load(&path)?))),
        None => None,
    };
    let reader = Arc::new(ChunkReader::from_dir(config.reader_dir()?));
    let resolver = Arc::new(DependencyResolver::new(reader, registry));
    let resolved = runtime()?.block_on(resolver.resolve_all(dependencies))?;

    if json {
        println!("{}", to_pretty_json(&resolved, "resolutions")?);
        return Ok(());
    }

    for entry in &resolved {
        let dep = &entry.dependency;
        let dev = if dep.is_dev { " (dev)" } else { "" };
        let version = dep.version.as_deref().unwrap_or("*");
        match &entry.resolution {
            Resolution::Analyzed { record } => {
                let score = &record.composite_score;
                println!(
                    "  {} {}{}: {:.1} ({}), {}, urgency {}",
                    dep.name, version, dev, score.overall, score.grade, score.risk_tier,
                    score.update_urgency
                );
            }
            Resolution::Unanalyzed { metadata } => match metadata {
                Some(meta) => println!(
                    "  {} {}{}: not analyzed (latest {}, license {})",
                    dep.name,
                    version,
                    dev,
                    meta.version,
                    meta.license.as_deref().unwrap_or("unknown")
                ),
                None => println!("  {} {}{}: not analyzed", dep.name, version, dev),
            },
            Resolution::Unavailable { reason } => {
                println!("  {} {}{}: unavailable ({})", dep.name, version, dev, reason)
            }
        }
    }
    Ok(())
}

fn cmd_config(config: Config, path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", to_pretty_json(&config, "config")?);
        }
        ConfigAction::Validate { file } => {
            let path = file.unwrap_or_else(|| path.to_path_buf());
            let config = Config::load(&path)?;
            ConfigValidator::validate(&config)?;
            config.load_policy()?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            match &config.scoring.policy_file {
                Some(policy) => println!("  Policy: {}", policy.display()),
                None => println!("  Policy: built-in defaults"),
            }
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Policy => {
            println!("{}", config.load_policy()?.to_toml()?);
        }
    }

    Ok(())
}
