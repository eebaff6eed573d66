use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cvm_pay::analysis::{
    attainment, composition, evolution, governance_report, individual_range, peer_comparison, project, ranking,
    sector_statistics, CalcMode, Exportable, Filters, PeerGroup, ProjectionRequest, ProjectionResult, YearRange,
    DEFAULT_RANKING_LIMIT,
};
use cvm_pay::api::{CvmClient, DirectorySource, FilingSource};
use cvm_pay::data_collector::{read_manifest, save_raw_snapshot, DataCollector};
use cvm_pay::merger::merge_tables;
use cvm_pay::merger::normalize::EXECUTIVE_BOARD;
use cvm_pay::models::{parse_companies, parse_years, Component, Config};
use cvm_pay::storage::{read_merged, write_merged, MergedTable};
use cvm_pay::utils::{format_brl_int, format_multiple, format_percent, year_label, CompanyIndex};

/// Executive compensation disclosed in CVM reference forms (FRE)
#[derive(Parser)]
#[command(name = "cvm-pay")]
#[command(version)]
#[command(about = "Fetch, merge and analyse executive compensation disclosed to CVM")]
#[command(long_about = "
Downloads FRE compensation tables (items 8.2, 8.3 and 8.15) and the company registry from the
CVM open-data portal or a local directory, merges them into one flat CSV and answers
composition, ranking, statistics, benchmark and governance queries over it.

Examples:
  cvm-pay refresh --years 2021-2024
  cvm-pay refresh --source-dir ./downloads
  cvm-pay rank --metric HIGHEST_INDIVIDUAL --year 2023
  cvm-pay benchmark --company 'petrobras' --adjust 8 --projection-year 2026
  cvm-pay view
")]
struct Cli {
    /// Env file read before the process environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for raw snapshots, the merged file and the refresh manifest
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the raw tables and save them under <data-dir>/raw
    Fetch(SourceArgs),
    /// Merge the raw snapshot in <data-dir>/raw into the merged file
    Merge,
    /// Fetch and merge in one step, replacing the merged file only on success
    Refresh {
        #[command(flatten)]
        source: SourceArgs,
        /// Also keep the raw tables under <data-dir>/raw
        #[arg(long)]
        save_raw: bool,
    },
    /// Quartile statistics of a metric by sector
    Stats(QueryArgs),
    /// Companies with the highest value of a metric
    Rank {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value_t = DEFAULT_RANKING_LIMIT)]
        limit: usize,
    },
    /// Project a company's pay mix one year ahead and compare it with peers
    Benchmark(BenchmarkArgs),
    /// CEO pay slice, board balance and termination payments
    Governance(QueryArgs),
    /// Write a report as CSV
    Export {
        #[arg(value_enum)]
        report: ExportReport,
        #[arg(long, short = 'o')]
        output: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Interactive dashboard
    View(FilterArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Years to fetch, e.g. 2021-2024 or 2022,2024
    #[arg(long)]
    years: Option<String>,
    /// CNPJs to keep, comma separated
    #[arg(long)]
    companies: Option<String>,
    /// Read already downloaded tables from this directory instead of the portal
    #[arg(long)]
    source_dir: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct FilterArgs {
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    sector: Option<String>,
    #[arg(long)]
    control: Option<String>,
    /// Year window, e.g. 2020-2023
    #[arg(long)]
    years: Option<String>,
}

#[derive(Args, Clone)]
struct QueryArgs {
    #[command(flatten)]
    filters: FilterArgs,
    /// Company CNPJ or (partial) name
    #[arg(long)]
    company: Option<String>,
    /// Reference year; defaults to the latest year in the data
    #[arg(long)]
    year: Option<i32>,
    #[arg(long, default_value = EXECUTIVE_BOARD)]
    body: String,
    /// Component code, e.g. SALARY, BONUS, HIGHEST_INDIVIDUAL
    #[arg(long, default_value = "HIGHEST_INDIVIDUAL", value_parser = parse_component)]
    metric: Component,
    /// Divide amounts by the number of members
    #[arg(long)]
    per_member: bool,
}

#[derive(Args)]
struct BenchmarkArgs {
    #[command(flatten)]
    query: QueryArgs,
    /// Peer companies (CNPJ or name), comma separated; defaults to the company's sector
    #[arg(long)]
    peers: Option<String>,
    /// Market adjustment applied to peers for the projection year, in percent
    #[arg(long, default_value_t = 5.0, allow_hyphen_values = true)]
    adjust: f64,
    /// Year to project; defaults to the year after the last year with data
    #[arg(long)]
    projection_year: Option<i32>,
    /// Override a last-year value, e.g. SALARY=1200000
    #[arg(long = "set-last", value_parser = parse_override)]
    set_last: Vec<(Component, f64)>,
    /// Override a projected value, e.g. BONUS=500000
    #[arg(long = "set-projection", value_parser = parse_override)]
    set_projection: Vec<(Component, f64)>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportReport {
    Composition,
    Evolution,
    Ranking,
    Attainment,
    Individual,
    Stats,
    Peers,
    Benchmark,
    Governance,
}

fn parse_component(value: &str) -> Result<Component, String> {
    Component::from_code(value).ok_or_else(|| {
        let codes: Vec<&str> = Component::ALL.iter().map(|c| c.code()).collect();
        format!("unknown component '{}', expected one of {}", value, codes.join(", "))
    })
}

fn parse_override(value: &str) -> Result<(Component, f64), String> {
    let (code, amount) = value
        .split_once('=')
        .ok_or_else(|| format!("expected COMPONENT=VALUE, got '{}'", value))?;
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("invalid amount in '{}'", value))?;
    Ok((parse_component(code)?, amount))
}

fn init_logging(verbose: bool, tui: bool) {
    let filter = if tui {
        EnvFilter::new("cvm_pay=error")
    } else {
        let default = if verbose { "cvm_pay=debug" } else { "cvm_pay=info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, matches!(cli.command, Command::View(_)));

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.config {
        dotenvy::from_path(path).with_context(|| format!("loading {}", path.display()))?;
    }
    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(dir) = &cli.data_dir {
        if std::env::var("CVM_MERGED_FILE").is_err() {
            config.merged_file = dir.join(file_name(&config.merged_file));
        }
        config.data_dir = dir.clone();
    }

    match cli.command {
        Command::Fetch(args) => {
            let config = apply_source_args(config, &args)?;
            let source = make_source(&config, &args)?;
            let tables = DataCollector::new(source, config.clone()).collect().await?;
            save_raw_snapshot(&config.raw_dir(), &tables, config.delimiter)?;
            println!("✅ Saved {} tables to {}", tables.len(), config.raw_dir().display());
        }
        Command::Merge => {
            let source = DirectorySource::new(config.raw_dir(), config.delimiter);
            let tables = DataCollector::new(Arc::new(source), config.clone()).collect().await?;
            let outcome = merge_tables(&tables)?;
            write_merged(&config.merged_file, &outcome.table)?;
            print_report(cli.json, &outcome.report, || {
                println!(
                    "✅ Merged {} rows into {} ({} duplicates removed, {} rows skipped)",
                    outcome.report.emitted_rows,
                    config.merged_file.display(),
                    outcome.report.duplicates_removed,
                    outcome.report.skipped_rows
                )
            })?;
        }
        Command::Refresh { source, save_raw } => {
            let config = apply_source_args(config, &source)?;
            let filing_source = make_source(&config, &source)?;
            let report = DataCollector::new(filing_source, config.clone()).refresh(save_raw).await?;
            print_report(cli.json, &report, || {
                println!(
                    "✅ {} rows for {} companies written to {}",
                    report.emitted_rows,
                    report.companies,
                    config.merged_file.display()
                );
                for table in &report.tables {
                    println!("   {:<40} {:>8} rows", table.name, table.rows);
                }
            })?;
        }
        Command::Stats(query) => {
            let (table, filters) = load(&config, &query.filters)?;
            let year = reference_year(&table, query.year)?;
            let stats = sector_statistics(&table, &filters, year, &query.body, query.metric, mode(&query));
            print_report(cli.json, &stats, || {
                println!(
                    "{} - {} {} ({})",
                    stats.metric.label(),
                    stats.body,
                    stats.year,
                    stats.mode.label()
                );
                println!(
                    "{:<32} {:>4} {:>16} {:>16} {:>16} {:>16} {:>16}",
                    "Setor", "N", "Média", "1º Quartil", "Mediana", "3º Quartil", "Máximo"
                );
                let rows = stats.sectors.iter().map(|s| (s.sector.as_str(), &s.summary));
                for (sector, s) in rows.chain(stats.overall.iter().map(|s| ("AMOSTRA TOTAL", s))) {
                    println!(
                        "{:<32.32} {:>4} {:>16} {:>16} {:>16} {:>16} {:>16}",
                        sector,
                        s.count,
                        format_brl_int(s.mean),
                        format_brl_int(s.q1),
                        format_brl_int(s.median),
                        format_brl_int(s.q3),
                        format_brl_int(s.max)
                    );
                }
                if stats.overall.is_none() {
                    println!("Sem dados para os filtros selecionados.");
                }
            })?;
        }
        Command::Rank { query, limit } => {
            let (table, filters) = load(&config, &query.filters)?;
            let year = reference_year(&table, query.year)?;
            let entries = ranking(&table, &filters, year, &query.body, query.metric, mode(&query), limit);
            print_report(cli.json, &entries, || {
                println!("{} - {} {}", query.metric.label(), query.body, year);
                for entry in &entries {
                    println!(
                        "{:>3}. {:<45.45} {:<24.24} {:>16}",
                        entry.position,
                        entry.company_name,
                        entry.sector,
                        format_brl_int(entry.value)
                    );
                }
                if entries.is_empty() {
                    println!("Sem dados para os filtros selecionados.");
                }
            })?;
        }
        Command::Benchmark(args) => {
            let (table, filters) = load(&config, &args.query.filters)?;
            let result = run_benchmark(&table, &filters, &args)?;
            print_report(cli.json, &result, || print_projection(&result))?;
        }
        Command::Governance(query) => {
            let (table, filters) = load(&config, &query.filters)?;
            let year = reference_year(&table, query.year)?;
            let report = governance_report(&table, &filters, year);
            print_report(cli.json, &report, || {
                println!("CEO pay slice {} ({} empresas)", year, report.pay_slice.companies.len());
                if let (Some(mean), Some(median), Some(max)) = (
                    report.pay_slice.market_mean,
                    report.pay_slice.market_median,
                    report.pay_slice.market_max,
                ) {
                    println!(
                        "   média {}  mediana {}  máximo {}",
                        format_multiple(mean),
                        format_multiple(median),
                        format_multiple(max)
                    );
                }
                for slice in report.pay_slice.companies.iter().take(DEFAULT_RANKING_LIMIT) {
                    println!("   {:<45.45} {:>8}", slice.company_name, format_multiple(slice.multiple));
                }
                println!("Diretoria / Conselho");
                for balance in report.board_balance.iter().take(DEFAULT_RANKING_LIMIT) {
                    println!("   {:<45.45} {:>8}", balance.company_name, format_multiple(balance.ratio));
                }
                println!("Rescisões e pós-emprego acima de 1% do total");
                for flag in &report.terminations {
                    println!(
                        "   {:<45.45} {:<26.26} {:>8}",
                        flag.company_name,
                        flag.body,
                        format_percent(flag.share_pct)
                    );
                }
            })?;
        }
        Command::Export { report, output, query } => {
            let (table, filters) = load(&config, &query.filters)?;
            let export = match report {
                ExportReport::Composition => {
                    let company = require_company(&table, &query)?;
                    composition(&table, &filters, &company, reference_year(&table, query.year)?).to_export()
                }
                ExportReport::Evolution => {
                    let company = require_company(&table, &query)?;
                    evolution(&table, &filters, &company, &query.body, mode(&query)).to_export()
                }
                ExportReport::Ranking => {
                    let year = reference_year(&table, query.year)?;
                    ranking(&table, &filters, year, &query.body, query.metric, mode(&query), usize::MAX).to_export()
                }
                ExportReport::Attainment => {
                    let company = require_company(&table, &query)?;
                    attainment(&table, &filters, &company, &query.body).to_export()
                }
                ExportReport::Individual => {
                    let company = require_company(&table, &query)?;
                    individual_range(&table, &filters, &company, &query.body).to_export()
                }
                ExportReport::Stats => {
                    let year = reference_year(&table, query.year)?;
                    sector_statistics(&table, &filters, year, &query.body, query.metric, mode(&query)).to_export()
                }
                ExportReport::Peers => {
                    let company = require_company(&table, &query)?;
                    let year = reference_year(&table, query.year)?;
                    let peers = sector_peers(&table, &company)?;
                    peer_comparison(&table, &filters, &peers, year, &query.body, query.metric, mode(&query)).to_export()
                }
                ExportReport::Benchmark => {
                    let args = BenchmarkArgs {
                        query: query.clone(),
                        peers: None,
                        adjust: 5.0,
                        projection_year: None,
                        set_last: Vec::new(),
                        set_projection: Vec::new(),
                    };
                    run_benchmark(&table, &filters, &args)?.to_export()
                }
                ExportReport::Governance => {
                    governance_report(&table, &filters, reference_year(&table, query.year)?).to_export()
                }
            };
            export.write_file(&output)?;
            info!("💾 Wrote {} rows to {}", export.rows.len(), output.display());
            println!("✅ {} rows written to {}", export.rows.len(), output.display());
        }
        Command::View(filter_args) => {
            let (table, filters) = load(&config, &filter_args)?;
            cvm_pay::ui::run_app(table, filters, Some(config.merged_file.clone()))?;
        }
    }

    Ok(())
}

fn file_name(path: &std::path::Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("dados_cvm_mesclados.csv"))
}

fn apply_source_args(mut config: Config, args: &SourceArgs) -> Result<Config> {
    if let Some(years) = &args.years {
        config.years = parse_years(years)?;
    }
    if let Some(companies) = &args.companies {
        config.companies = parse_companies(companies);
    }
    Ok(config)
}

fn make_source(config: &Config, args: &SourceArgs) -> Result<Arc<dyn FilingSource>> {
    Ok(match &args.source_dir {
        Some(dir) => Arc::new(DirectorySource::new(dir.clone(), config.delimiter)),
        None => Arc::new(CvmClient::new(config)?),
    })
}

/// Read the merged file and build the global filters
fn load(config: &Config, args: &FilterArgs) -> Result<(MergedTable, Filters)> {
    let table = read_merged(&config.merged_file).with_context(|| {
        format!(
            "reading {}; run `cvm-pay refresh` first",
            config.merged_file.display()
        )
    })?;
    if let Ok(Some(manifest)) = read_manifest(&config.data_dir) {
        info!(
            "📋 Data refreshed at {} from {} ({} rows)",
            manifest.refreshed_at, manifest.source, manifest.emitted_rows
        );
    }

    let mut filters = Filters::default();
    if let Some(state) = &args.state {
        filters = filters.with_state(state);
    }
    if let Some(sector) = &args.sector {
        filters = filters.with_sector(sector);
    }
    if let Some(control) = &args.control {
        filters = filters.with_control(control);
    }
    if let Some(years) = &args.years {
        let years = parse_years(years)?;
        if let (Some(first), Some(last)) = (years.first(), years.last()) {
            filters = filters.with_years(YearRange::new(*first, *last));
        }
    }
    Ok((table, filters))
}

fn mode(query: &QueryArgs) -> CalcMode {
    if query.per_member {
        CalcMode::PerMember
    } else {
        CalcMode::Total
    }
}

fn reference_year(table: &MergedTable, year: Option<i32>) -> Result<i32> {
    year.or_else(|| table.years().last().copied())
        .ok_or_else(|| anyhow!("the merged file has no rows"))
}

fn require_company(table: &MergedTable, query: &QueryArgs) -> Result<String> {
    let Some(name) = &query.company else {
        bail!("this report needs --company");
    };
    CompanyIndex::new(table)
        .resolve(name)
        .ok_or_else(|| anyhow!("no company matches '{}'", name))
}

fn sector_peers(table: &MergedTable, company_id: &str) -> Result<PeerGroup> {
    let sector = table
        .records()
        .iter()
        .find(|r| r.company_id == company_id)
        .map(|r| r.sector.clone())
        .ok_or_else(|| anyhow!("company {} has no rows", company_id))?;
    Ok(PeerGroup::from_sector(table, &sector))
}

fn run_benchmark(table: &MergedTable, filters: &Filters, args: &BenchmarkArgs) -> Result<ProjectionResult> {
    let company = require_company(table, &args.query)?;
    let peers = match &args.peers {
        Some(list) => {
            let index = CompanyIndex::new(table);
            let mut ids = Vec::new();
            for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                ids.push(
                    index
                        .resolve(name)
                        .ok_or_else(|| anyhow!("no company matches peer '{}'", name))?,
                );
            }
            PeerGroup::manual("Pares selecionados", ids)
        }
        None => sector_peers(table, &company)?,
    };

    let mut request = ProjectionRequest::new(company, args.query.body.clone());
    request.projection_year = args.projection_year;
    request.last_year_overrides = args.set_last.iter().copied().collect();
    request.projection_overrides = args.set_projection.iter().copied().collect();
    request.peers = Some(peers);
    request.market_adjustment_pct = args.adjust;
    request.window = filters.years;
    request.mode = mode(&args.query);
    Ok(project(table, filters, &request)?)
}

fn print_projection(result: &ProjectionResult) {
    if result.is_empty() {
        println!("Sem histórico para a empresa e o órgão selecionados.");
        return;
    }
    println!("{} - projeção {}", result.base.label, result.projection_year);
    println!("{:<16} {:>18} {:>18}", "Ano", "Empresa", "Média dos pares");
    for year in result.years() {
        let peers = result
            .peer_average
            .as_ref()
            .map(|average| format_brl_int(average.year_total(year)))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:>18} {:>18}",
            year_label(year, Some(result.projection_year)),
            format_brl_int(result.base.year_total(year)),
            peers
        );
    }
}

/// JSON when requested, otherwise the plain-text rendering
fn print_report<T: Serialize>(json: bool, report: &T, text: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        text();
    }
    Ok(())
}
