//! pagelens - session analytics for page-view event streams
//!
//! Imports JSONL page-view logs into the local event store and reports
//! archetypes, traffic curves, cohort retention and engagement metrics.

mod render;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pagelens_core::analytics::{self, JourneyAnchors};
use pagelens_core::{import_jsonl, new_session_id, Config, Database, EventFilter};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "pagelens")]
#[command(about = "Session analytics for page-view event streams")]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    /// Event store to use instead of the configured one
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Query range shared by every report.
#[derive(Args, Debug, Clone, Default)]
struct RangeArgs {
    /// Range start, YYYY-MM-DD (default: end minus the configured span)
    #[arg(long)]
    from: Option<String>,

    /// Range end, YYYY-MM-DD (default: now)
    #[arg(long)]
    to: Option<String>,

    /// Restrict to one site
    #[arg(long)]
    site: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import page views from a JSONL file ("-" reads stdin)
    Import { file: PathBuf },

    /// Split sessions into visitor archetypes
    Archetypes {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Distinct sessions and events in equal-width intervals
    Histogram {
        #[command(flatten)]
        range: RangeArgs,

        /// Number of intervals (default from config)
        #[arg(short, long)]
        intervals: Option<u32>,
    },

    /// Average sessions per weekday
    ByDay {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Average sessions per hour of day
    ByHour {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Weekly cohort retention
    Cohorts {
        #[command(flatten)]
        range: RangeArgs,

        /// Number of retention weeks (default from config)
        #[arg(short, long)]
        weeks: Option<u32>,
    },

    /// Average dwell time per session
    Dwell {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Share of single-page sessions
    Bounce {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Visitors, bounce rate and dwell time
    Summary {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Distinct sessions in range
    Visitors {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Distinct sessions per page
    Pages {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Pages viewed in range
    UniquePages {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Sites with recorded traffic
    Sites,

    /// Sessions active in the last few minutes
    Active {
        /// Restrict to one site
        #[arg(long)]
        site: Option<String>,

        /// Window in minutes (default from config)
        #[arg(short, long)]
        minutes: Option<u32>,
    },

    /// Visitor locations
    Locations {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Page views of one session in order
    Journey { session_id: String },

    /// Page-transition graph across sessions
    Paths {
        #[command(flatten)]
        range: RangeArgs,

        /// Start each path at the session's first visit to this page
        #[arg(long)]
        start_page: Option<String>,

        /// Cut each path at the first later visit to this page
        #[arg(long)]
        end_page: Option<String>,
    },

    /// Print a fresh session id
    NewSessionId,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        pagelens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    if let Command::NewSessionId = cli.command {
        println!("{}", new_session_id());
        return Ok(());
    }

    // Open database
    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    db.migrate().context("failed to run database migrations")?;

    tracing::info!(command = ?cli.command, db = %db_path.display(), "Running command");
    run(&cli, &config, &db)
}

fn run(cli: &Cli, config: &Config, db: &Database) -> Result<()> {
    let settings = &config.analytics;
    let now = Utc::now();
    let default_span = Duration::hours(settings.default_range_hours as i64);
    let format = cli.format;

    match &cli.command {
        Command::Import { file } => {
            let result = if file.as_os_str() == "-" {
                import_jsonl(db, io::stdin().lock())
            } else {
                let f = File::open(file)
                    .with_context(|| format!("failed to open {}", file.display()))?;
                import_jsonl(db, BufReader::new(f))
            }
            .context("import failed")?;
            render::import(&result, format)?;
        }
        Command::Archetypes { range } => {
            let filter = range.filter(now, default_span)?;
            let shares = analytics::generate_archetypes(db, &filter)
                .context("failed to classify sessions")?;
            emit(format, &shares, || render::archetypes(&shares))?;
        }
        Command::Histogram { range, intervals } => {
            let filter = range.filter(now, default_span)?;
            let intervals = intervals.unwrap_or(settings.default_intervals);
            let buckets = analytics::interval_histogram(db, &filter, intervals)
                .context("failed to build histogram")?;
            emit(format, &buckets, || render::histogram(&buckets))?;
        }
        Command::ByDay { range } => {
            let filter = range.filter(now, default_span)?;
            let days = analytics::traffic_by_day_of_week(db, &filter)
                .context("failed to compute weekday traffic")?;
            emit(format, &days, || {
                render::series(days.iter().map(|d| (d.day.to_string(), d.count)))
            })?;
        }
        Command::ByHour { range } => {
            let filter = range.filter(now, default_span)?;
            let hours = analytics::traffic_by_hour_of_day(db, &filter)
                .context("failed to compute hourly traffic")?;
            emit(format, &hours, || {
                render::series(hours.iter().map(|h| (format!("{:02}:00", h.hour), h.count)))
            })?;
        }
        Command::Cohorts { range, weeks } => {
            let weeks = weeks.unwrap_or(settings.default_cohort_weeks);
            let filter = range.filter(now, Duration::weeks(weeks as i64))?;
            let cohorts = analytics::cohort_analysis(db, &filter, weeks)
                .context("failed to compute cohorts")?;
            emit(format, &cohorts, || render::cohorts(&cohorts))?;
        }
        Command::Dwell { range } => {
            let filter = range.filter(now, default_span)?;
            let threshold = Duration::minutes(settings.dwell_threshold_minutes as i64);
            let minutes = analytics::average_dwell_minutes(db, &filter, threshold)
                .context("failed to compute dwell time")?;
            emit(format, &minutes, || {
                println!("Average dwell time: {:.2} min", minutes)
            })?;
        }
        Command::Bounce { range } => {
            let filter = range.filter(now, default_span)?;
            let stats =
                analytics::bounce_rate(db, &filter).context("failed to compute bounce rate")?;
            emit(format, &stats, || render::bounce(&stats))?;
        }
        Command::Summary { range } => {
            let filter = range.filter(now, default_span)?;
            let summary = analytics::generate_summary(db, &filter, settings)
                .context("failed to build summary")?;
            emit(format, &summary, || render::summary(&summary))?;
        }
        Command::Visitors { range } => {
            let filter = range.filter(now, default_span)?;
            let visitors = analytics::traffic::unique_visitors(db, &filter)
                .context("failed to count visitors")?;
            emit(format, &visitors, || println!("Unique visitors: {}", visitors))?;
        }
        Command::Pages { range } => {
            let filter = range.filter(now, default_span)?;
            let pages =
                analytics::sessions_by_page(db, &filter).context("failed to list pages")?;
            emit(format, &pages, || {
                render::counts(pages.iter().map(|p| (p.page.as_str(), p.sessions)))
            })?;
        }
        Command::UniquePages { range } => {
            let filter = range.filter(now, default_span)?;
            let pages =
                analytics::traffic::unique_pages(db, &filter).context("failed to list pages")?;
            emit(format, &pages, || render::lines(&pages))?;
        }
        Command::Sites => {
            let sites = analytics::traffic::sites(db).context("failed to list sites")?;
            emit(format, &sites, || render::lines(&sites))?;
        }
        Command::Active { site, minutes } => {
            let minutes = minutes.unwrap_or(settings.active_window_minutes);
            let active = analytics::active_sessions(
                db,
                now,
                Duration::minutes(minutes as i64),
                site.as_deref(),
            )
            .context("failed to count active sessions")?;
            emit(format, &active, || {
                println!("Active sessions (last {} min): {}", minutes, active)
            })?;
        }
        Command::Locations { range } => {
            let filter = range.filter(now, default_span)?;
            let locations =
                analytics::locations(db, &filter).context("failed to list locations")?;
            emit(format, &locations, || render::locations(&locations))?;
        }
        Command::Journey { session_id } => {
            let steps = analytics::user_journey(db, session_id)
                .with_context(|| format!("failed to load journey for {}", session_id))?;
            emit(format, &steps, || render::journey(&steps))?;
        }
        Command::Paths {
            range,
            start_page,
            end_page,
        } => {
            let filter = range.filter(now, default_span)?;
            let anchors = JourneyAnchors {
                start_page: start_page.clone(),
                end_page: end_page.clone(),
            };
            let graph = analytics::average_journey(db, &filter, &anchors)
                .context("failed to build journey graph")?;
            emit(format, &graph, || render::graph(&graph))?;
        }
        Command::NewSessionId => println!("{}", new_session_id()),
    }

    Ok(())
}

impl RangeArgs {
    fn filter(&self, now: chrono::DateTime<Utc>, default_span: Duration) -> Result<EventFilter> {
        let filter =
            EventFilter::from_dates(self.from.as_deref(), self.to.as_deref(), now, default_span)
                .context("invalid date range")?;
        Ok(filter.with_site(self.site.as_deref()))
    }
}

/// Print `value` as JSON, or run the text renderer.
fn emit<T: Serialize>(format: Format, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(value).context("failed to encode JSON")?;
            println!("{}", json);
        }
        Format::Text => text(),
    }
    Ok(())
}
