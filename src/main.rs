use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};

use orgpulse_activity::age::{first_activity_ages, DomainAge};
use orgpulse_activity::aggregate::{aggregate_activity, ActivityTable};
use orgpulse_activity::report::{EngagementReport, ReportOptions};
use orgpulse_core::{
    CommitRecord, Granularity, Label, OrgpulseConfig, OutputFormat, Role, Weighting,
};
use orgpulse_gitlog::mining::{mine_records, MiningOptions};
use orgpulse_gitlog::parser::{parse_log, LOG_FORMAT};
use orgpulse_identity::classify::{classify_emails, DomainClassifier, EmailIdentity};
use orgpulse_identity::graph::{build_clusters, GraphExport, NodeKind};
use orgpulse_identity::labeler::{label_clusters, MembershipRow};

#[derive(Parser)]
#[command(
    name = "orgpulse",
    version,
    about = "Commit-log identity resolution and organizational engagement metrics",
    long_about = "Orgpulse merges the many name/email aliases contributors use in a commit log,\n\
                   classifies each alias's domain (Org, Personal, Edu, Other, Local), and\n\
                   aggregates activity over calendar windows to show how an organization's\n\
                   share of contributors changes over time.\n\n\
                   Examples:\n  \
                     orgpulse init                          Create a .orgpulse.toml config file\n  \
                     orgpulse report --repo .               Full report for a local repository\n  \
                     git log --date=short --pretty=format:'%ad|%an|%ae|%cd|%cn|%ce|%h' | orgpulse activity --log -\n  \
                     orgpulse clusters --role author        Author identity clusters\n  \
                     orgpulse graph --format json           Name/email graph for visualization"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .orgpulse.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Log debug output to stderr
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,
}

/// Where commit records come from.
#[derive(Args, Clone)]
struct InputArgs {
    /// Read delimited `git log` output from a file ('-' for stdin)
    #[arg(
        long,
        conflicts_with = "repo",
        long_help = "Read delimited `git log` output from a file, or '-' for stdin.\n\n\
                     Produce it with:\n  git log --date=short --pretty=format:%ad|%an|%ae|%cd|%cn|%ce|%h"
    )]
    log: Option<PathBuf>,

    /// Mine a local git repository (default: current directory)
    #[arg(long)]
    repo: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Classify every distinct email by domain
    #[command(long_about = "Classify every distinct email by domain.\n\n\
        Splits each email at its last '@', extracts the registered domain with the\n\
        public suffix list, and applies the label precedence Local > Org > Personal > Edu > Other.\n\n\
        Examples:\n  orgpulse classify --repo .\n  orgpulse classify --log commits.txt --role committer")]
    Classify {
        #[command(flatten)]
        input: InputArgs,

        /// Only this role (default: both)
        #[arg(long)]
        role: Option<Role>,
    },
    /// Resolve aliases into identity clusters
    #[command(long_about = "Resolve aliases into identity clusters.\n\n\
        Emails that share a name (directly or transitively) are merged into one cluster,\n\
        separately per role. Each cluster is labeled Org if any member is Org, otherwise\n\
        by majority.\n\n\
        Examples:\n  orgpulse clusters --repo .\n  orgpulse clusters --role author --format json")]
    Clusters {
        #[command(flatten)]
        input: InputArgs,

        /// Only this role (default: both)
        #[arg(long)]
        role: Option<Role>,
    },
    /// Per-bucket share of active clusters by label
    #[command(long_about = "Per-bucket share of active clusters by label.\n\n\
        Buckets commits into calendar windows and reports, for each label, how many\n\
        distinct clusters were active and what share of the bucket they make up.\n\n\
        Examples:\n  orgpulse activity --repo .\n  orgpulse activity --granularity quarter --weighting commits")]
    Activity {
        #[command(flatten)]
        input: InputArgs,

        /// Bucket width: week, month, quarter, half-year, year
        #[arg(long)]
        granularity: Option<Granularity>,

        /// Share to show: clusters or commits
        #[arg(long)]
        weighting: Option<Weighting>,

        /// Role whose clusters are counted
        #[arg(long)]
        role: Option<Role>,
    },
    /// Days each domain has been active as of the cutoff date
    #[command(long_about = "Days each registered domain has been active as of the cutoff date.\n\n\
        The cutoff comes from [cutoff] in the config file or --cutoff; it is never\n\
        the current date, so reruns over the same log give the same numbers.\n\n\
        Examples:\n  orgpulse ages --repo . --cutoff 2024-01-01\n  orgpulse ages --role committer")]
    Ages {
        #[command(flatten)]
        input: InputArgs,

        /// Only this role (default: both)
        #[arg(long)]
        role: Option<Role>,

        /// Cutoff date (YYYY-MM-DD) for every selected role
        #[arg(long)]
        cutoff: Option<NaiveDate>,
    },
    /// Export the name/email graph
    #[command(long_about = "Export the name/email graph for visualization.\n\n\
        Nodes are emails and names tagged with their cluster id; edges link a name to an\n\
        email and carry the number of supporting commits. Markdown output is JSON.\n\n\
        Examples:\n  orgpulse graph --format json > graph.json")]
    Graph {
        #[command(flatten)]
        input: InputArgs,

        /// Only this role (default: both)
        #[arg(long)]
        role: Option<Role>,
    },
    /// Every table in one report
    #[command(long_about = "Every table in one report.\n\n\
        Runs classification, clustering, labeling, aggregation and first-activity age\n\
        for both roles.\n\n\
        Examples:\n  orgpulse report --repo . --format markdown")]
    Report {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Create a default .orgpulse.toml configuration file
    #[command(long_about = "Create a default .orgpulse.toml configuration file.\n\n\
        Writes a commented template with the required allowlists.\n\
        Fails if .orgpulse.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("orgpulse v{version} - who is behind the commits\n");

    println!("Quick start:");
    println!("  orgpulse init                 Create a .orgpulse.toml config file");
    println!("  orgpulse report --repo .      Full engagement report for a repository\n");

    println!("All commands:");
    println!("  classify   Domain label of every email");
    println!("  clusters   Identity clusters and their labels");
    println!("  activity   Per-bucket share of active clusters by label");
    println!("  ages       First-activity age per domain");
    println!("  graph      Name/email graph export");
    println!("  report     Every table in one report");
    println!("  init       Create default configuration\n");

    println!("Run 'orgpulse <command> --help' for details.");
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("ORGPULSE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| miette::miette!("failed to initialize tracing subscriber: {e}"))
}

fn load_config(path: Option<&Path>) -> Result<OrgpulseConfig> {
    match path {
        Some(path) => OrgpulseConfig::from_file(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("loading {}", path.display())),
        None => {
            let default_path = Path::new(".orgpulse.toml");
            if default_path.exists() {
                OrgpulseConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err("loading .orgpulse.toml")
            } else {
                Ok(OrgpulseConfig::default())
            }
        }
    }
}

fn classifier(config: &OrgpulseConfig) -> Result<DomainClassifier> {
    DomainClassifier::from_config(&config.classify).map_err(|e| {
        miette::miette!(
            help = "Run `orgpulse init` to create a .orgpulse.toml with personal_domains and org_domains, or pass --config",
            "{e}"
        )
    })
}

fn read_log(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .into_diagnostic()
            .wrap_err("reading stdin")?;
        return Ok(input);
    }
    if !path.exists() {
        miette::bail!(miette::miette!(
            help = format!("Produce a log with: {LOG_FORMAT} > commits.txt"),
            "Log file not found: {}",
            path.display()
        ));
    }
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err(format!("reading {}", path.display()))
}

fn load_records(input: &InputArgs, config: &OrgpulseConfig) -> Result<Vec<CommitRecord>> {
    if let Some(path) = &input.log {
        let text = read_log(path)?;
        let parsed = parse_log(&text, config.input.delimiter);
        if !parsed.skipped.is_empty() {
            eprintln!(
                "Skipped {} malformed line(s) of {}.",
                parsed.skipped.len(),
                path.display()
            );
        }
        return Ok(parsed.records);
    }

    let path = input.repo.clone().unwrap_or_else(|| PathBuf::from("."));
    eprintln!("Mining git history at {} ...", path.display());
    let records = mine_records(&path, &MiningOptions::from(&config.mining)).map_err(|e| {
        miette::miette!(
            help = "Run orgpulse from inside a git repository, pass --repo, or use --log",
            "{e}: {}",
            path.display()
        )
    })?;
    eprintln!("Read {} commits.", records.len());
    Ok(records)
}

fn selected_roles(role: Option<Role>) -> Vec<Role> {
    match role {
        Some(role) => vec![role],
        None => Role::ALL.to_vec(),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_classification(rows: &[&EmailIdentity], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(rows)?,
        OutputFormat::Markdown => {
            println!("# Email Classification\n");
            println!("| Email | Role | Domain | Suffix | Label |");
            println!("|-------|------|--------|--------|-------|");
            for e in rows {
                println!(
                    "| `{}` | {} | {} | {} | {} |",
                    e.email,
                    e.role,
                    e.registered_domain.as_deref().unwrap_or("-"),
                    e.suffix.as_deref().unwrap_or("-"),
                    e.label
                );
            }
        }
        OutputFormat::Text => {
            println!("{:<40} {:<10} {:<28} Label", "Email", "Role", "Domain");
            println!("{}", "-".repeat(86));
            for e in rows {
                println!(
                    "{:<40} {:<10} {:<28} {}",
                    e.email,
                    e.role.to_string(),
                    e.registered_domain.as_deref().unwrap_or("-"),
                    e.label
                );
            }
            println!("\n{} emails classified.", rows.len());
        }
    }
    Ok(())
}

fn print_membership(rows: &[MembershipRow], clusters: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(rows)?,
        OutputFormat::Markdown => {
            println!("# Identity Clusters\n");
            println!("| Cluster | Role | Email | Email Label | Cluster Label | Representative |");
            println!("|---------|------|-------|-------------|---------------|----------------|");
            for m in rows {
                println!(
                    "| {} | {} | `{}` | {} | {} | {} <{}> |",
                    m.cluster_id,
                    m.role,
                    m.email,
                    m.email_label,
                    m.cluster_label,
                    m.representative_name,
                    m.representative_email
                );
            }
        }
        OutputFormat::Text => {
            println!(
                "{:>7} {:<10} {:<40} {:<9} {:<9} Representative",
                "Cluster", "Role", "Email", "Email", "Cluster"
            );
            println!("{}", "-".repeat(100));
            for m in rows {
                println!(
                    "{:>7} {:<10} {:<40} {:<9} {:<9} {} <{}>",
                    m.cluster_id,
                    m.role.to_string(),
                    m.email,
                    m.email_label.to_string(),
                    m.cluster_label.to_string(),
                    m.representative_name,
                    m.representative_email
                );
            }
            println!("\n{} emails in {} clusters.", rows.len(), clusters);
        }
    }
    Ok(())
}

fn print_activity(table: &ActivityTable, weighting: Weighting, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(table)?,
        OutputFormat::Markdown => {
            println!(
                "# Activity ({} clusters, {}, {})\n",
                table.role, table.granularity, weighting
            );
            println!("| Bucket | Label | Clusters | Commits | Share |");
            println!("|--------|-------|----------|---------|-------|");
            for row in &table.rows {
                println!(
                    "| {} | {} | {} | {} | {:.4} |",
                    row.bucket_start,
                    row.label,
                    row.cluster_count,
                    row.commit_count,
                    row.share(weighting)
                );
            }
        }
        OutputFormat::Text => {
            println!(
                "Activity of {} clusters per {} ({} share)\n",
                table.role, table.granularity, weighting
            );
            if table.totals.is_empty() {
                println!("No activity.");
                return Ok(());
            }
            print!("{:<12} {:>8} {:>8}", "Bucket", "Clusters", "Commits");
            for label in Label::ALL {
                print!(" {:>9}", label.to_string());
            }
            println!();
            println!("{}", "-".repeat(30 + 10 * Label::ALL.len()));
            for total in &table.totals {
                print!(
                    "{:<12} {:>8} {:>8}",
                    total.bucket_start.to_string(),
                    total.clusters,
                    total.commits
                );
                for label in Label::ALL {
                    let share = table.percentage_for(total.bucket_start, label, weighting);
                    print!(" {share:>9.4}");
                }
                println!();
            }
        }
    }
    Ok(())
}

fn print_ages(ages: &[(Role, NaiveDate, Vec<DomainAge>)], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<&DomainAge> = ages.iter().flat_map(|(_, _, a)| a).collect();
            print_json(&rows)?;
        }
        OutputFormat::Markdown => {
            for (role, cutoff, rows) in ages {
                println!("# First Activity ({role}, cutoff {cutoff})\n");
                println!("| Domain | Label | First | Commits | Age (days) |");
                println!("|--------|-------|-------|---------|------------|");
                for a in rows {
                    println!(
                        "| `{}` | {} | {} | {} | {} |",
                        a.domain, a.label, a.first_date, a.commit_count, a.age_days
                    );
                }
                println!();
            }
        }
        OutputFormat::Text => {
            for (role, cutoff, rows) in ages {
                println!("First activity of {role} domains (cutoff {cutoff})\n");
                println!(
                    "{:<32} {:<9} {:<10} {:>7} {:>8}",
                    "Domain", "Label", "First", "Commits", "Age"
                );
                println!("{}", "-".repeat(70));
                for a in rows {
                    println!(
                        "{:<32} {:<9} {:<10} {:>7} {:>8}",
                        a.domain,
                        a.label.to_string(),
                        a.first_date.to_string(),
                        a.commit_count,
                        a.age_days
                    );
                }
                println!();
            }
        }
    }
    Ok(())
}

fn print_graphs(graphs: &[GraphExport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Markdown => print_json(graphs)?,
        OutputFormat::Text => {
            for graph in graphs {
                let emails = graph.nodes.iter().filter(|n| n.kind == NodeKind::Email).count();
                println!(
                    "{} graph: {} emails, {} names, {} edges",
                    graph.role,
                    emails,
                    graph.nodes.len() - emails,
                    graph.edges.len()
                );
                for edge in &graph.edges {
                    let source = &graph.nodes[edge.source];
                    let target = &graph.nodes[edge.target];
                    println!(
                        "  [{}] {} -- {} ({})",
                        source.cluster_id, source.label, target.label, edge.weight
                    );
                }
                println!();
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Orgpulse Configuration
# See: https://github.com/Meru143/orgpulse

[classify]
# Personal email hosting providers (required, may be empty)
personal_domains = [
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "icloud.com",
    "me.com",
    "protonmail.com",
    "users.noreply.github.com",
]
# Domains owned by the organization under study (required, may be empty)
org_domains = []
# Hosting platform whose committer signatures count as Org
# platform_noreply_domain = "github.com"

[activity]
# granularity = "month"      # week | month | quarter | half-year | year
# week_start = "monday"
# role = "committer"         # role whose clusters drive aggregation
# weighting = "clusters"     # clusters | commits

[cutoff]
# Fixed reference dates for first-activity age (quoted YYYY-MM-DD)
# author = "2024-01-01"
# committer = "2024-01-01"

[input]
# delimiter = "|"

[mining]
# branch = "main"
# max_commits = 100000
"#;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, "configuration loaded");

    match cli.command {
        None => {
            print_welcome();
        }
        Some(Command::Classify { ref input, role }) => {
            let classifier = classifier(&config)?;
            let records = load_records(input, &config)?;
            let tables: Vec<_> = selected_roles(role)
                .into_iter()
                .map(|role| classify_emails(&records, role, &classifier))
                .collect();
            let rows: Vec<&EmailIdentity> = tables.iter().flat_map(|t| t.iter()).collect();
            print_classification(&rows, cli.format)?;
        }
        Some(Command::Clusters { ref input, role }) => {
            let classifier = classifier(&config)?;
            let records = load_records(input, &config)?;
            let mut rows = Vec::new();
            let mut clusters = 0;
            for role in selected_roles(role) {
                let labeled = label_clusters(
                    &build_clusters(&records, role),
                    &classify_emails(&records, role, &classifier),
                );
                clusters += labeled.len();
                rows.extend(labeled.membership_rows());
            }
            print_membership(&rows, clusters, cli.format)?;
        }
        Some(Command::Activity {
            ref input,
            granularity,
            weighting,
            role,
        }) => {
            let classifier = classifier(&config)?;
            let options = ReportOptions::from_config(&config).into_diagnostic()?;
            let records = load_records(input, &config)?;

            let role = role.unwrap_or(options.activity_role);
            let clusters = label_clusters(
                &build_clusters(&records, role),
                &classify_emails(&records, role, &classifier),
            );
            let table = aggregate_activity(
                &records,
                &clusters,
                granularity.unwrap_or(options.granularity),
                options.week_start,
            );
            print_activity(&table, weighting.unwrap_or(options.weighting), cli.format)?;
        }
        Some(Command::Ages {
            ref input,
            role,
            cutoff,
        }) => {
            let classifier = classifier(&config)?;
            let roles = selected_roles(role);
            let cutoffs: Vec<(Role, NaiveDate)> = roles
                .iter()
                .filter_map(|&role| cutoff.or(config.cutoff.for_role(role)).map(|c| (role, c)))
                .collect();
            if cutoffs.is_empty() {
                miette::bail!(miette::miette!(
                    help = "Set [cutoff] author/committer in .orgpulse.toml or pass --cutoff YYYY-MM-DD",
                    "No cutoff date configured for {}",
                    roles.iter().map(Role::to_string).collect::<Vec<_>>().join(" or ")
                ));
            }
            for role in roles.iter().filter(|r| !cutoffs.iter().any(|(c, _)| c == *r)) {
                tracing::warn!(%role, "no cutoff configured, skipping first-activity ages");
            }

            let records = load_records(input, &config)?;
            let ages: Vec<_> = cutoffs
                .into_iter()
                .map(|(role, cutoff)| {
                    let table = classify_emails(&records, role, &classifier);
                    (role, cutoff, first_activity_ages(&records, &table, cutoff))
                })
                .collect();
            print_ages(&ages, cli.format)?;
        }
        Some(Command::Graph { ref input, role }) => {
            let records = load_records(input, &config)?;
            let graphs: Vec<GraphExport> = selected_roles(role)
                .into_iter()
                .map(|role| build_clusters(&records, role).export_graph())
                .collect();
            print_graphs(&graphs, cli.format)?;
        }
        Some(Command::Report { ref input }) => {
            let classifier = classifier(&config)?;
            let options = ReportOptions::from_config(&config).into_diagnostic()?;
            let records = load_records(input, &config)?;
            let report = EngagementReport::build(&records, &options, &classifier);
            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Markdown => print!("{}", report.to_markdown()),
                OutputFormat::Text => print!("{report}"),
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".orgpulse.toml");
            if path.exists() {
                miette::bail!(".orgpulse.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .orgpulse.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "orgpulse", &mut std::io::stdout());
        }
    }

    Ok(())
}
