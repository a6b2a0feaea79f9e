use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod data;
mod numbering;
mod report;
mod scenario;
mod serz;
mod session;
mod taillamp;
mod transform;
mod walker;

use catalog::Catalog;
use config::{C56Policy, C86Headcode, Config, Families, ReportMode};
use scenario::Document;
use serz::Serz;
use session::Session;

#[derive(Parser, Debug)]
#[command(name = "stockswap", version, about = "Rolling stock swap tool for Train Simulator scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Swap the rolling stock of a scenario in place
    Swap(SwapArgs),
    /// Show or change the saved configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
struct SwapArgs {
    /// Scenario file to process (.bin or .xml)
    scenario: PathBuf,

    /// RailWorks folder, overriding the saved configuration
    #[arg(long)]
    railworks: Option<PathBuf>,

    /// Directory holding the replacement tables
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Seed for the livery/weathering randomization; same seed, same output
    #[arg(long)]
    seed: Option<u64>,

    /// Report to write next to the scenario: none, processed or full
    #[arg(long)]
    report: Option<String>,

    /// Enable a family for this run (repeatable)
    #[arg(long, value_name = "FAMILY")]
    enable: Vec<String>,

    /// Disable a family for this run (repeatable)
    #[arg(long, value_name = "FAMILY")]
    disable: Vec<String>,

    /// Alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Set the RailWorks folder
    #[arg(long)]
    railworks: Option<PathBuf>,

    /// Set the replacement tables directory
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Set the default report mode: none, processed or full
    #[arg(long)]
    report: Option<String>,

    /// Class 56 policy: nearest_numbered or retain_unless_matching
    #[arg(long, value_name = "POLICY")]
    c56_policy: Option<String>,

    /// Class 86 headcode handling: blinds, plated_box or skip
    #[arg(long, value_name = "MODE")]
    c86_headcode: Option<String>,

    /// Enable a family by default (repeatable)
    #[arg(long, value_name = "FAMILY")]
    enable: Vec<String>,

    /// Disable a family by default (repeatable)
    #[arg(long, value_name = "FAMILY")]
    disable: Vec<String>,

    /// Print the effective configuration
    #[arg(long)]
    show: bool,

    /// Alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "stockswap=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Swap(args) => cmd_swap(args),
        Commands::Config(args) => cmd_config(args),
    }
}

fn config_path(explicit: &Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.clone()),
        None => Config::default_path(),
    }
}

fn cmd_swap(args: SwapArgs) -> Result<()> {
    let mut config = Config::load(&config_path(&args.config)?)?;
    if let Some(railworks) = args.railworks {
        config.railworks_path = railworks;
    }
    if let Some(tables) = args.tables {
        config.tables_dir = tables;
    }
    if let Some(report) = &args.report {
        config.report = parse_report_mode(report)?;
    }
    apply_family_toggles(&mut config.families, &args.enable, &args.disable)?;

    let scenario = args.scenario;
    if !scenario.is_file() {
        return Err(anyhow!("scenario file {} not found", scenario.display()));
    }
    let is_bin = scenario
        .extension()
        .map(|e| e.eq_ignore_ascii_case("bin"))
        .unwrap_or(false);

    // A .bin scenario goes through serz both ways; locate it before touching
    // anything so a missing converter aborts cleanly.
    let converter = if is_bin {
        Some(Serz::locate(&config.railworks_path)?)
    } else {
        None
    };
    let xml_path = scenario.with_extension("xml");
    if let Some(serz) = &converter {
        serz.bin_to_xml(&scenario, &xml_path)?;
    }

    let text = fs::read_to_string(&xml_path)
        .with_context(|| format!("cannot read scenario {}", xml_path.display()))?;
    let mut doc = Document::parse(&text)
        .with_context(|| format!("{} could not be parsed; is it definitely a scenario?", xml_path.display()))?;

    let catalog = Catalog::load(&config.tables_dir, &config.railworks_path)?;
    let chain = transform::build_chain(&config);
    let mut session = Session::new(args.seed);
    let summary = walker::process_document(&mut doc, &chain, &catalog, &mut session)?;

    // Keep the original next to the rewrite, tagged with the swap time.
    let backup = backup_path(&scenario)?;
    fs::rename(&scenario, &backup)
        .with_context(|| format!("cannot back up {}", scenario.display()))?;

    let serialized = doc.to_xml_string()?;
    fs::write(&xml_path, &serialized)
        .with_context(|| format!("cannot write {}", xml_path.display()))?;
    if let Some(serz) = &converter {
        serz.xml_to_bin(&xml_path, &scenario)?;
        fs::remove_file(&xml_path)
            .with_context(|| format!("cannot remove intermediate {}", xml_path.display()))?;
    }

    if config.report != ReportMode::None {
        let report_path = scenario.with_extension("html");
        let properties = scenario.parent().and_then(report::read_properties);
        report::write_report(&report_path, &catalog, &session, config.report, properties.as_ref())?;
        println!("Report written to {}", report_path.display());
    }

    println!(
        "{} consists, {} vehicles processed: {} swapped, {} renumbered.",
        summary.consists, summary.vehicles, summary.swapped, summary.renumbered
    );
    println!("Original saved as {}", backup.display());
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> Result<()> {
    let path = config_path(&args.config)?;
    let mut config = Config::load(&path)?;
    let mut changed = false;

    if let Some(railworks) = args.railworks {
        config.railworks_path = railworks;
        changed = true;
    }
    if let Some(tables) = args.tables {
        config.tables_dir = tables;
        changed = true;
    }
    if let Some(report) = &args.report {
        config.report = parse_report_mode(report)?;
        changed = true;
    }
    if let Some(policy) = &args.c56_policy {
        config.c56_policy = match policy.as_str() {
            "nearest_numbered" => C56Policy::NearestNumbered,
            "retain_unless_matching" => C56Policy::RetainUnlessMatching,
            other => return Err(anyhow!("unknown Class 56 policy '{other}'")),
        };
        changed = true;
    }
    if let Some(mode) = &args.c86_headcode {
        config.c86_headcode = match mode.as_str() {
            "blinds" => C86Headcode::Blinds,
            "plated_box" => C86Headcode::PlatedBox,
            "skip" => C86Headcode::Skip,
            other => return Err(anyhow!("unknown Class 86 headcode mode '{other}'")),
        };
        changed = true;
    }
    if !args.enable.is_empty() || !args.disable.is_empty() {
        apply_family_toggles(&mut config.families, &args.enable, &args.disable)?;
        changed = true;
    }

    if changed {
        config.save(&path)?;
        println!("Configuration saved to {}", path.display());
    }
    if args.show || !changed {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}

fn parse_report_mode(mode: &str) -> Result<ReportMode> {
    Ok(match mode {
        "none" => ReportMode::None,
        "processed" => ReportMode::Processed,
        "full" => ReportMode::Full,
        other => return Err(anyhow!("unknown report mode '{other}'")),
    })
}

fn apply_family_toggles(families: &mut Families, enable: &[String], disable: &[String]) -> Result<()> {
    for name in enable {
        *family_flag(families, name)? = true;
    }
    for name in disable {
        *family_flag(families, name)? = false;
    }
    Ok(())
}

fn family_flag<'a>(families: &'a mut Families, name: &str) -> Result<&'a mut bool> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "mk1" => &mut families.mk1,
        "mk2ac" => &mut families.mk2ac,
        "mk2df" => &mut families.mk2df,
        "fsa" | "fta" => &mut families.fsa,
        "haa" => &mut families.haa,
        "hto" => &mut families.hto,
        "htv" => &mut families.htv,
        "vda" => &mut families.vda,
        "ihh" => &mut families.ihh,
        "black5" => &mut families.black5,
        "maunsell" => &mut families.maunsell,
        "c31" => &mut families.c31,
        "c37" => &mut families.c37,
        "c40" => &mut families.c40,
        "c47" => &mut families.c47,
        "c50" => &mut families.c50,
        "c56" => &mut families.c56,
        "c66" => &mut families.c66,
        "c67" => &mut families.c67,
        "c68" => &mut families.c68,
        "c86" => &mut families.c86,
        "hst" => &mut families.hst,
        "c91" => &mut families.c91,
        "c101" => &mut families.c101,
        "c156" => &mut families.c156,
        "c158" => &mut families.c158,
        "c465" => &mut families.c465,
        "user" => &mut families.user,
        other => return Err(anyhow!("unknown family '{other}'")),
    })
}

fn backup_path(scenario: &Path) -> Result<PathBuf> {
    let stem = scenario
        .file_stem()
        .and_then(|s| s.to_str())
        .context("scenario file has no name")?;
    let ext = scenario
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("bak");
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Ok(scenario.with_file_name(format!("{stem}-{stamp}.{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_toggles_resolve_names() {
        let mut families = Families::default();
        apply_family_toggles(
            &mut families,
            &["c158".to_string(), "ihh".to_string()],
            &["mk1".to_string(), "FSA".to_string()],
        )
        .unwrap();
        assert!(families.c158);
        assert!(families.ihh);
        assert!(!families.mk1);
        assert!(!families.fsa);
        assert!(apply_family_toggles(&mut families, &["c999".to_string()], &[]).is_err());
    }

    #[test]
    fn backup_keeps_extension_and_directory() {
        let backup = backup_path(Path::new("/tmp/route/Scenario.bin")).unwrap();
        assert_eq!(backup.parent(), Some(Path::new("/tmp/route")));
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("Scenario-"));
        assert!(name.ends_with(".bin"));
    }

    #[test]
    fn report_mode_parsing() {
        assert_eq!(parse_report_mode("processed").unwrap(), ReportMode::Processed);
        assert!(parse_report_mode("verbose").is_err());
    }
}
