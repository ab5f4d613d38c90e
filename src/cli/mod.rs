//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `verity login | register | logout | whoami`: session management
//! - `verity predict`: analyze one statement
//! - `verity history | stats | timeline | hierarchy | heatmap`: history views
//! - `verity admin performance | delete`: admin-only endpoints
//! - `verity watch`: periodic history refresh
//! - `verity activity`: local activity log
//! - `verity health`: API reachability and local state
//! - `verity web`: local dashboard
//! - `verity config show|init|set|reset`: configuration management

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result};
use colored::Colorize;

use crate::analytics::activity::{Action, ActivityEntry, ActivityLog};
use crate::analytics::aggregate::AggregateSummary;
use crate::analytics::cache::{DerivedCache, HistorySnapshot};
use crate::analytics::charts::{
    Band, DAY_NAMES, LabelFilter, RiskFilter, RiskHierarchy, ROOT_LABEL, TemporalMatrix,
    TimelineView, prediction_view,
};
use crate::analytics::feed::HistoryFeed;
use crate::api::ApiClient;
use crate::api::types::{
    HistoryRecord, Label, ModelPerformance, PredictionRequest, PredictionResponse, RiskLevel,
};
use crate::config::{self, VerityConfig};
use crate::error::ClientResult;
use crate::session::storage::{FileStore, KeyValueStore};
use crate::session::{SessionStore, validation};
use crate::web::{self, Dashboard};

/// Output format for data commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// Command context
// ---------------------------------------------------------------------------

/// Everything a command needs: resolved config, API client, persisted
/// session and the activity log.
pub struct Context {
    pub config: VerityConfig,
    pub api: ApiClient,
    pub session: SessionStore<FileStore>,
    pub activity: ActivityLog,
}

impl Context {
    pub fn load(config: VerityConfig) -> Result<Self> {
        let session_file = config
            .storage
            .session_file()
            .context("could not determine the storage directory")?;
        let session = SessionStore::init(FileStore::open(session_file));
        if let Some(reason) = session.invalidated() {
            eprintln!(
                "{} stored session was reset ({reason:?}), please log in again",
                "note:".yellow().bold()
            );
        }

        Ok(Self {
            api: ApiClient::from_config(&config.api),
            activity: ActivityLog::from_config(&config),
            session,
            config,
        })
    }

    fn username(&self) -> Option<String> {
        self.session.user().map(|u| u.username.clone())
    }

    /// Fetch the current history.
    fn fetch_history(&mut self) -> Result<HistorySnapshot> {
        let token = self.session.require_token()?.to_string();
        let mut feed = HistoryFeed::new();
        let result = feed.refresh(&self.api, &token).cloned();
        drop_rejected_session(&mut self.session, result)
    }
}

/// Pass a server result through, dropping the local session if the server
/// rejected the stored token.
fn drop_rejected_session<S: KeyValueStore, T>(
    session: &mut SessionStore<S>,
    result: ClientResult<T>,
) -> Result<T> {
    match result {
        Err(e) if e.is_auth() => {
            session.clear_local();
            Err(e).context("the stored session is no longer valid, run `verity login`")
        }
        other => Ok(other?),
    }
}

// ---------------------------------------------------------------------------
// verity login | register | logout | whoami
// ---------------------------------------------------------------------------

pub fn run_login(ctx: &mut Context, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };

    let result = ctx
        .session
        .login(&ctx.api, username, &password)
        .map(|s| s.user.clone());
    ctx.activity
        .record_result(Action::Login, Some(username), &result);
    let user = result?;

    println!(
        "{} Logged in as {}{}",
        "✓".green().bold(),
        user.username.bold(),
        if user.is_admin { " (admin)" } else { "" }
    );
    Ok(())
}

pub fn run_register(
    ctx: &mut Context,
    username: &str,
    password: Option<String>,
    confirm: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    let confirm = match confirm {
        Some(c) => c,
        None => prompt("Confirm password: ")?,
    };

    let result = ctx
        .session
        .register(&ctx.api, username, &password, &confirm)
        .map(|s| s.user.clone());
    ctx.activity
        .record_result(Action::Register, Some(username.trim()), &result);
    let user = result?;

    println!(
        "{} Account created, logged in as {}",
        "✓".green().bold(),
        user.username.bold()
    );
    Ok(())
}

pub fn run_logout(ctx: &mut Context) -> Result<()> {
    let Some(username) = ctx.username() else {
        println!("{}", "Not logged in.".yellow());
        return Ok(());
    };
    ctx.session.logout(&ctx.api);
    ctx.activity
        .record(Action::Logout, Some(&username), true, None);
    println!("{} Logged out {}", "✓".green().bold(), username);
    Ok(())
}

pub fn run_whoami(ctx: &Context, format: OutputFormat) -> Result<()> {
    let Some(user) = ctx.session.user() else {
        println!("{}", "Not logged in.".yellow());
        return Ok(());
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(user)?),
        OutputFormat::Csv => {
            println!("username,id,is_admin");
            println!("{},{},{}", csv_field(&user.username), user.id, user.is_admin);
        }
        OutputFormat::Table => {
            println!("  {} {}", "User: ".bold(), user.username);
            println!("  {} {}", "ID:   ".bold(), user.id);
            println!(
                "  {} {}",
                "Role: ".bold(),
                if user.is_admin { "admin".cyan() } else { "user".normal() }
            );
            println!("  {} {}", "API:  ".bold(), ctx.api.base_url().dimmed());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// verity predict
// ---------------------------------------------------------------------------

pub fn run_predict(ctx: &mut Context, request: &PredictionRequest, format: OutputFormat) -> Result<()> {
    validation::validate_prediction(request)?;

    let result = ctx.api.predict(ctx.session.token(), request);
    let detail = result
        .as_ref()
        .map(|p| format!("{} {:.1}%", p.prediction, p.confidence * 100.0))
        .map_err(|e| e.to_string());
    ctx.activity.record(
        Action::Predict,
        ctx.session.user().map(|u| u.username.as_str()),
        detail.is_ok(),
        Some(detail.unwrap_or_else(|e| e)),
    );
    let prediction = drop_rejected_session(&mut ctx.session, result)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prediction)?),
        OutputFormat::Csv => {
            println!("prediction,confidence,real,fake,risk_level,num_sources,has_official_source");
            println!(
                "{},{:.4},{:.4},{:.4},{},{},{}",
                prediction.prediction,
                prediction.confidence,
                prediction.probabilities.real,
                prediction.probabilities.fake,
                prediction.trust_indicators.risk_level,
                prediction.details.num_sources,
                prediction.details.has_official_source,
            );
        }
        OutputFormat::Table => print_prediction_table(&prediction),
    }
    Ok(())
}

fn print_prediction_table(prediction: &PredictionResponse) {
    let view = prediction_view(prediction);

    println!("{}", "Analysis Result".bold().cyan());
    println!("{}", "=".repeat(50));
    println!(
        "  {} {}",
        "Verdict:   ".bold(),
        colorize_label(view.label).bold()
    );
    println!(
        "  {} {} {:.1}%",
        "Confidence:".bold(),
        colorize_band(&bar(view.confidence_pct, 30), view.band),
        view.confidence_pct
    );
    println!(
        "  {} {}",
        "Risk:      ".bold(),
        colorize_risk(prediction.trust_indicators.risk_level)
    );
    println!();

    println!("{}", "Probabilities".bold().cyan());
    println!("  Real {} {:>5.1}%", bar(view.real_pct, 30).green(), view.real_pct);
    println!("  Fake {} {:>5.1}%", bar(view.fake_pct, 30).red(), view.fake_pct);
    if !view.probabilities_normalized {
        println!("  {}", "probabilities do not sum to 100%".yellow());
    }
    println!();

    println!("{}", "Sources".bold().cyan());
    println!("  {} {}", "Count:   ".bold(), prediction.details.num_sources);
    println!(
        "  {} {}",
        "Official:".bold(),
        if prediction.details.has_official_source {
            "yes".green()
        } else {
            "no".yellow()
        }
    );

    let explain = &prediction.explainability;
    println!(
        "  {} {:.0}%",
        "Input completeness:".bold(),
        explain.input_completeness
    );
    if !explain.key_factors.is_empty() {
        println!();
        println!("{}", "Key factors".bold().cyan());
        for factor in &explain.key_factors {
            println!("  · {factor}");
        }
    }
    if !explain.warnings.is_empty() {
        println!();
        println!("{}", "Warnings".bold().yellow());
        for warning in &explain.warnings {
            println!("  ! {}", warning.yellow());
        }
    }
}

// ---------------------------------------------------------------------------
// verity history
// ---------------------------------------------------------------------------

pub fn run_history(ctx: &mut Context, limit: usize, format: OutputFormat) -> Result<()> {
    let snapshot = ctx.fetch_history()?;
    let records: Vec<&HistoryRecord> = snapshot.records().iter().take(limit).collect();

    if records.is_empty() && format == OutputFormat::Table {
        println!("{}", "No predictions yet. Run `verity predict` first.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Csv => {
            println!("id,timestamp,prediction,confidence,risk_level,num_sources,has_official_source,statement");
            for r in &records {
                println!(
                    "{},{},{},{:.4},{},{},{},{}",
                    r.id,
                    r.timestamp,
                    r.prediction,
                    r.confidence,
                    r.risk_level,
                    r.num_sources,
                    r.has_official_source,
                    csv_field(&r.statement),
                );
            }
        }
        OutputFormat::Table => {
            println!(
                "{} ({} of {})",
                "Prediction History".bold().cyan(),
                records.len(),
                snapshot.len()
            );
            println!(
                "  {:>6} {:<19} {:<5} {:>6} {:<12} Statement",
                "ID", "Time", "Label", "Conf", "Risk"
            );
            println!("  {}", "-".repeat(90));
            for (i, r) in records.iter().enumerate() {
                let line = format!(
                    "  {:>6} {:<19} {:<5} {:>5.1}% {:<12} {}",
                    r.id,
                    truncate(&r.timestamp, 19),
                    r.prediction.as_str(),
                    r.confidence * 100.0,
                    r.risk_level.as_str(),
                    truncate(&r.statement, 40),
                );
                if i % 2 == 0 {
                    println!("{line}");
                } else {
                    println!("{}", line.dimmed());
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// verity stats
// ---------------------------------------------------------------------------

pub fn run_stats(ctx: &mut Context, format: OutputFormat) -> Result<()> {
    let snapshot = ctx.fetch_history()?;
    let summary = DerivedCache::new().summary(&snapshot);

    if summary.total_records == 0 && format == OutputFormat::Table {
        println!(
            "{}",
            "No data yet. Analyze some statements to see stats.".yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_stats_json(&summary)?,
        OutputFormat::Csv => print_stats_csv(&summary),
        OutputFormat::Table => print_stats_table(&summary),
    }
    Ok(())
}

fn print_stats_table(s: &AggregateSummary) {
    println!("{}", "Prediction Summary".bold().cyan());
    println!("{}", "=".repeat(60));
    println!();
    println!("  {} {}", "Total predictions:  ".bold(), format_number(s.total_records));
    println!(
        "  {} {} ({:.0}%)",
        "Real:               ".bold(),
        s.real_count.to_string().green(),
        s.pct(s.real_count)
    );
    println!(
        "  {} {} ({:.0}%)",
        "Fake:               ".bold(),
        s.fake_count.to_string().red(),
        s.pct(s.fake_count)
    );
    println!(
        "  {} {:.1}%",
        "Avg confidence:     ".bold(),
        s.avg_confidence * 100.0
    );
    println!(
        "  {} {} ({:.0}%)",
        "High confidence:    ".bold(),
        s.high_confidence_count,
        s.pct(s.high_confidence_count)
    );
    println!(
        "  {} {} ({:.0}%)",
        "Official sources:   ".bold(),
        s.with_official_source_count,
        s.pct(s.with_official_source_count)
    );
    println!(
        "  {} {:.0}%",
        "Avg completeness:   ".bold(),
        s.avg_input_completeness
    );
    println!();

    let risk = &s.risk_distribution;
    println!("{}", "Risk Distribution".bold().cyan());
    println!(
        "  Low: {} ({:.0}%)  Medium: {} ({:.0}%)  High: {} ({:.0}%)",
        risk.low_risk.to_string().green(),
        s.pct(risk.low_risk),
        risk.medium_risk.to_string().yellow(),
        s.pct(risk.medium_risk),
        risk.high_risk.to_string().red(),
        s.pct(risk.high_risk),
    );
    let unrated = s.total_records - risk.rated();
    if unrated > 0 {
        println!("  {}", format!("{unrated} unrated").dimmed());
    }
}

fn print_stats_json(s: &AggregateSummary) -> Result<()> {
    let value = serde_json::json!({
        "total_records": s.total_records,
        "real_count": s.real_count,
        "fake_count": s.fake_count,
        "avg_confidence": s.avg_confidence,
        "high_confidence_count": s.high_confidence_count,
        "with_official_source_count": s.with_official_source_count,
        "avg_input_completeness": s.avg_input_completeness,
        "risk_distribution": s.risk_distribution,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_stats_csv(s: &AggregateSummary) {
    println!("metric,value");
    println!("total_records,{}", s.total_records);
    println!("real_count,{}", s.real_count);
    println!("fake_count,{}", s.fake_count);
    println!("avg_confidence,{:.4}", s.avg_confidence);
    println!("high_confidence_count,{}", s.high_confidence_count);
    println!("with_official_source_count,{}", s.with_official_source_count);
    println!("avg_input_completeness,{:.2}", s.avg_input_completeness);
    println!("low_risk,{}", s.risk_distribution.low_risk);
    println!("medium_risk,{}", s.risk_distribution.medium_risk);
    println!("high_risk,{}", s.risk_distribution.high_risk);
}

// ---------------------------------------------------------------------------
// verity timeline
// ---------------------------------------------------------------------------

pub fn run_timeline(
    ctx: &mut Context,
    label: LabelFilter,
    risk: RiskFilter,
    max_points: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let cap = max_points.unwrap_or(ctx.config.dashboard.timeline_max_points);
    let snapshot = ctx.fetch_history()?;
    let view = DerivedCache::new().timeline(&snapshot, label, risk, cap);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*view)?),
        OutputFormat::Csv => {
            println!("id,timestamp,prediction,risk_level,confidence_pct");
            for p in &view.points {
                println!(
                    "{},{},{},{},{:.2}",
                    p.id, p.timestamp, p.label, p.risk_level, p.confidence_pct
                );
            }
        }
        OutputFormat::Table => print_timeline_table(&view, label, risk),
    }
    Ok(())
}

fn print_timeline_table(view: &TimelineView, label: LabelFilter, risk: RiskFilter) {
    println!(
        "{} (label: {label}, risk: {risk})",
        "Confidence Timeline".bold().cyan()
    );
    println!(
        "  Showing {} of {} matching ({} total)",
        view.points.len(),
        view.filtered_len,
        view.total_len
    );
    if view.sampled() {
        println!(
            "  {}",
            format!("every {}th point shown", view.step).dimmed()
        );
    }
    if view.points.is_empty() {
        println!("{}", "  No predictions match these filters.".yellow());
        return;
    }
    println!();

    for p in &view.points {
        println!(
            "  {:<19} {:<5} {} {:>5.1}%",
            truncate(&p.timestamp, 19),
            p.label.as_str(),
            colorize_label_text(&bar(p.confidence_pct, 25), p.label),
            p.confidence_pct
        );
    }

    let stats = &view.stats;
    println!();
    println!(
        "  {} real {} · fake {} · avg {:.1}%",
        "Shown:".bold(),
        stats.real.to_string().green(),
        stats.fake.to_string().red(),
        stats.avg_confidence_pct
    );
}

// ---------------------------------------------------------------------------
// verity hierarchy
// ---------------------------------------------------------------------------

pub fn run_hierarchy(ctx: &mut Context, format: OutputFormat) -> Result<()> {
    let snapshot = ctx.fetch_history()?;
    let tree = DerivedCache::new().hierarchy(&snapshot);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*tree)?),
        OutputFormat::Csv => {
            println!("label,parent,value");
            for node in &tree.nodes {
                println!(
                    "{},{},{}",
                    csv_field(&node.label),
                    csv_field(&node.parent),
                    node.value
                );
            }
        }
        OutputFormat::Table => print_hierarchy_tree(&tree),
    }
    Ok(())
}

fn print_hierarchy_tree(tree: &RiskHierarchy) {
    println!("{}", "Risk Hierarchy".bold().cyan());
    let Some(root) = tree.root() else {
        return;
    };
    println!("  {} {}", root.label.bold(), root.value);
    print_children(tree, ROOT_LABEL, 2);
}

fn print_children(tree: &RiskHierarchy, parent: &str, depth: usize) {
    for node in tree.children(parent) {
        println!(
            "{}└─ {:<28} {:>6} {}",
            " ".repeat(depth * 2),
            node.label,
            node.value,
            format!("({:.1}%)", tree.pct_of_root(node)).dimmed()
        );
        print_children(tree, &node.label, depth + 1);
    }
}

// ---------------------------------------------------------------------------
// verity heatmap
// ---------------------------------------------------------------------------

pub fn run_heatmap(ctx: &mut Context, utc: bool, format: OutputFormat) -> Result<()> {
    let snapshot = ctx.fetch_history()?;
    let matrix = DerivedCache::new().temporal_matrix(&snapshot, utc);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*matrix)?),
        OutputFormat::Csv => {
            println!("day,hour,count,mean_confidence_pct");
            for (d, day) in DAY_NAMES.iter().enumerate() {
                for hour in 0..24 {
                    if let Some(mean) = matrix.get(d, hour) {
                        println!("{day},{hour},{},{mean:.2}", matrix.counts[d][hour]);
                    }
                }
            }
        }
        OutputFormat::Table => print_heatmap(&matrix, utc),
    }
    Ok(())
}

fn print_heatmap(matrix: &TemporalMatrix, utc: bool) {
    println!(
        "{} ({})",
        "Mean Confidence by Day and Hour".bold().cyan(),
        if utc { "UTC" } else { "local time" }
    );
    println!("       {}", "0         1         2   ".dimmed());
    println!("       {}", "012345678901234567890123".dimmed());
    for (d, day) in DAY_NAMES.iter().enumerate() {
        let row: String = (0..24).map(|h| heat_cell(matrix.get(d, h))).collect();
        println!("  {:<4} {row}", &day[..3]);
    }
    println!();
    println!(
        "  {} ≥85%  {} 70–85%  {} <70%  {} none",
        "█".green(),
        "█".yellow(),
        "█".red(),
        "·".dimmed()
    );
    if let Some((d, h, mean)) = matrix.peak() {
        println!(
            "  {} {} {:02}:00 ({mean:.1}%)",
            "Peak:".bold(),
            DAY_NAMES[d],
            h
        );
    }
    if matrix.skipped > 0 {
        println!(
            "  {}",
            format!("{} records with unreadable timestamps skipped", matrix.skipped).dimmed()
        );
    }
}

fn heat_cell(mean: Option<f64>) -> String {
    match mean {
        Some(pct) => colorize_band("█", Band::for_pct(pct)).to_string(),
        None => "·".dimmed().to_string(),
    }
}

// ---------------------------------------------------------------------------
// verity admin performance | delete
// ---------------------------------------------------------------------------

pub fn run_admin_performance(ctx: &mut Context, format: OutputFormat) -> Result<()> {
    let token = ctx.session.require_admin()?;
    let result = ctx.api.model_performance(token);
    let perf = drop_rejected_session(&mut ctx.session, result)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&perf)?),
        OutputFormat::Csv => {
            println!("section,key,value");
            println!("total,predictions,{}", perf.total_predictions);
            println!("total,avg_confidence,{:.4}", perf.avg_confidence);
            for (section, map) in [
                ("prediction", &perf.prediction_distribution),
                ("confidence", &perf.confidence_distribution),
                ("risk", &perf.risk_distribution),
            ] {
                for (k, v) in map {
                    println!("{section},{},{v}", csv_field(k));
                }
            }
        }
        OutputFormat::Table => print_performance_table(&perf),
    }
    Ok(())
}

fn print_performance_table(perf: &ModelPerformance) {
    println!("{}", "Model Performance".bold().cyan());
    println!("{}", "=".repeat(60));
    println!(
        "  {} {}",
        "Total predictions:".bold(),
        format_number(perf.total_predictions as usize)
    );
    println!(
        "  {} {:.1}%",
        "Avg confidence:   ".bold(),
        perf.avg_confidence * 100.0
    );
    println!();

    for (title, map) in [
        ("Predictions", &perf.prediction_distribution),
        ("Confidence", &perf.confidence_distribution),
        ("Risk", &perf.risk_distribution),
    ] {
        if map.is_empty() {
            continue;
        }
        println!("{}", title.bold().cyan());
        for (k, v) in map {
            println!("  {:<20} {:>8}", k, v);
        }
        println!();
    }

    let src = &perf.source_metrics;
    println!("{}", "Sources".bold().cyan());
    println!("  {:<20} {:>8.2}", "Avg sources", src.avg_sources);
    println!("  {:<20} {:>8}", "Official", src.official_source_count);
    println!("  {:<20} {:>7.0}%", "Avg completeness", src.avg_completeness);

    if !perf.recent_predictions.is_empty() {
        println!();
        println!("{}", "Recent Predictions".bold().cyan());
        for r in perf.recent_predictions.iter().take(10) {
            println!(
                "  {:>6} {:<5} {:>5.1}% {}",
                r.id,
                r.prediction,
                r.confidence * 100.0,
                truncate(&r.statement, 50)
            );
        }
    }
}

pub fn run_admin_delete(ctx: &mut Context, id: i64, yes: bool) -> Result<()> {
    let token = ctx.session.require_admin()?;

    if !yes {
        let answer = prompt(&format!("Delete history record {id}? [y/N] "))?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            println!("{}", "Aborted.".yellow());
            return Ok(());
        }
    }

    let result = ctx.api.delete_history(token, id);
    ctx.activity.record(
        Action::Delete,
        ctx.session.user().map(|u| u.username.as_str()),
        result.is_ok(),
        Some(match &result {
            Ok(()) => format!("record {id}"),
            Err(e) => e.to_string(),
        }),
    );
    drop_rejected_session(&mut ctx.session, result)?;

    println!("{} Deleted record {id}", "✓".green().bold());
    Ok(())
}

// ---------------------------------------------------------------------------
// verity watch
// ---------------------------------------------------------------------------

/// Refresh history on an interval and print a one-line summary each time.
///
/// Failed refreshes are reported and the previous data is kept. Stops after
/// `iterations` refreshes when given, otherwise runs until interrupted.
pub fn run_watch(ctx: &mut Context, interval: Option<u64>, iterations: Option<usize>) -> Result<()> {
    let token = ctx.session.require_token()?.to_string();
    let secs = interval
        .unwrap_or(ctx.config.dashboard.refresh_interval_secs)
        .max(1);

    println!(
        "Watching history every {secs}s. Press Ctrl+C to stop.\n"
    );

    let mut feed = HistoryFeed::new();
    let mut cache = DerivedCache::new();
    let mut round = 0usize;

    loop {
        let now = chrono::Local::now().format("%H:%M:%S");
        match feed.refresh(&ctx.api, &token) {
            Ok(snapshot) => {
                let s = cache.summary(snapshot);
                println!(
                    "{} {:>6} total  {} real  {} fake  avg {:.1}%  high-risk {}",
                    now.to_string().dimmed(),
                    s.total_records,
                    s.real_count.to_string().green(),
                    s.fake_count.to_string().red(),
                    s.avg_confidence * 100.0,
                    s.risk_distribution.high_risk
                );
            }
            Err(e) if e.is_auth() => {
                return drop_rejected_session(&mut ctx.session, Err(e));
            }
            Err(e) => {
                println!(
                    "{} {} {}",
                    now.to_string().dimmed(),
                    "refresh failed:".red(),
                    e
                );
                if !feed.snapshot().is_empty() {
                    println!(
                        "{}",
                        format!("         keeping previous data ({} records)", feed.snapshot().len())
                            .dimmed()
                    );
                }
            }
        }

        round += 1;
        if iterations.is_some_and(|n| round >= n) {
            return Ok(());
        }
        thread::sleep(Duration::from_secs(secs));
    }
}

// ---------------------------------------------------------------------------
// verity activity
// ---------------------------------------------------------------------------

pub fn run_activity(ctx: &Context, limit: usize, format: OutputFormat) -> Result<()> {
    if !ctx.activity.is_enabled() {
        println!(
            "{}",
            "Activity logging is disabled (logging.activity_log = false).".yellow()
        );
        return Ok(());
    }

    let entries = ctx.activity.read_recent(limit);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Csv => {
            println!("timestamp,action,user,success,detail");
            for e in &entries {
                println!(
                    "{},{},{},{},{}",
                    e.timestamp,
                    action_name(e),
                    csv_field(e.user.as_deref().unwrap_or("")),
                    e.success,
                    csv_field(e.detail.as_deref().unwrap_or(""))
                );
            }
        }
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("{}", "No activity recorded yet.".yellow());
                return Ok(());
            }
            println!("{}", "Recent Activity".bold().cyan());
            for e in &entries {
                let status = if e.success { "✓".green() } else { "✗".red() };
                println!(
                    "  {} {:<25} {:<9} {:<15} {}",
                    status,
                    truncate(&e.timestamp, 25),
                    action_name(e),
                    e.user.as_deref().unwrap_or("-"),
                    e.detail.as_deref().unwrap_or("").dimmed()
                );
            }
        }
    }
    Ok(())
}

fn action_name(entry: &ActivityEntry) -> String {
    serde_json::to_value(entry.action)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// verity health
// ---------------------------------------------------------------------------

pub fn run_health(ctx: &Context) -> Result<()> {
    println!("{}", "verity Health Check".bold().cyan());
    println!("{}", "=".repeat(50));

    let reachable = ctx.api.is_reachable();
    print_health_item(
        "API",
        reachable,
        &if reachable {
            format!("reachable at {}", ctx.api.base_url())
        } else {
            format!("unreachable at {}", ctx.api.base_url())
        },
    );

    let config_exists = config::global_config_file().is_some_and(|p| p.exists());
    print_health_item(
        "Config file",
        config_exists,
        if config_exists {
            "~/.verity/config.toml"
        } else {
            "using defaults (run `verity config init`)"
        },
    );

    let session_detail = match ctx.session.user() {
        Some(user) if user.is_admin => format!("logged in as {} (admin)", user.username),
        Some(user) => format!("logged in as {}", user.username),
        None => "not logged in".to_string(),
    };
    print_health_item("Session", ctx.session.is_authenticated(), &session_detail);
    print_health_item(
        "Session storage",
        true,
        &ctx.session.storage().path().display().to_string(),
    );

    let entries = ctx.activity.read_recent(usize::MAX).len();
    print_health_item(
        "Activity log",
        ctx.activity.is_enabled(),
        &if ctx.activity.is_enabled() {
            format!("{entries} entries")
        } else {
            "disabled".to_string()
        },
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// verity web
// ---------------------------------------------------------------------------

/// Serve the local dashboard until interrupted.
pub fn run_web(ctx: Context, addr: Option<String>, open: bool) -> Result<()> {
    let addr = addr.unwrap_or_else(|| ctx.config.dashboard.bind.clone());
    if !ctx.session.is_authenticated() {
        println!(
            "{}",
            "Not logged in: the dashboard will show no data until you run `verity login`.".yellow()
        );
    }

    let dashboard = Dashboard::new(
        ctx.api.clone(),
        ctx.api.base_url(),
        ctx.session,
        ctx.config.dashboard.timeline_max_points,
    )
    .with_refresh_interval(ctx.config.dashboard.refresh_interval_secs)
    .with_activity(ctx.activity);

    web::serve(&addr, dashboard, open)
}

// ---------------------------------------------------------------------------
// verity config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective verity Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    let project_exists = config::project_config_file().is_some_and(|p| p.exists());
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.verity/config.toml", global_exists);
    print_source(".verity.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "VERITY_* environment variables".dimmed()
    );
    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Read one line from stdin after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Format a number with comma separators for readability.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Truncate to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Horizontal bar of `width` cells filled to `pct` percent.
fn bar(pct: f64, width: usize) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn colorize_label(label: Label) -> colored::ColoredString {
    colorize_label_text(label.as_str(), label)
}

fn colorize_label_text(text: &str, label: Label) -> colored::ColoredString {
    match label {
        Label::Real => text.green(),
        Label::Fake => text.red(),
    }
}

fn colorize_risk(risk: RiskLevel) -> colored::ColoredString {
    colorize_band(risk.as_str(), Band::for_risk(risk))
}

fn colorize_band(text: &str, band: Band) -> colored::ColoredString {
    match band {
        Band::Green => text.green(),
        Band::Amber => text.yellow(),
        Band::Red => text.red(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
