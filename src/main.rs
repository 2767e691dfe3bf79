pub use self::error::{Error, Result};

use std::rc::Rc;

use chrono::{Local, Utc};
use clap::Parser;

mod api;
mod attributes;
mod cli;
mod colors;
mod config;
mod dates;
mod error;
mod jira;
mod logging;
mod models;
mod session;
mod storage;
mod summary;
mod timerecords;

use api::{ApiClient, HttpTransport};
use attributes::RecordAttributeStore;
use cli::{AttributeCommands, Cli, Commands, ConfigArgs, JiraCommands, RecordCommands, WindowArgs};
use config::AppConfig;
use dates::DateWindow;
use jira::{JiraStore, SyncStatus};
use models::{JiraConnectionPatch, NewJiraConnection, RecordAttribute, TimeRecord};
use session::SessionManager;
use storage::FileStore;
use timerecords::TimeRecordCache;

fn main() {
    if let Err(err) = run() {
        log::error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();
    let _logger = logging::init(&config.log_level)?;

    if let Commands::Config(args) = &cli.command {
        return configure(&mut config, args);
    }

    if let Some(api_url) = &cli.api_url {
        config.api_base = api_url.clone();
    }
    let dark_mode = cli.dark || config.dark_mode;
    log::debug!("Using backend {}", config.api_base);

    let session = SessionManager::new(Box::new(FileStore::durable()?))
        .with_session_store(Box::new(FileStore::session()?))
        .with_logout_hook(Box::new(|| eprintln!("Signed out.")));
    let api = Rc::new(ApiClient::new(
        Box::new(HttpTransport::new(&config.api_base)),
        session,
    ));

    match cli.command {
        Commands::Login(credentials) => {
            api.login(&credentials.username, &credentials.password)?;
            println!("Signed in as {}.", credentials.username);
        }
        Commands::Register(credentials) => {
            let message = api.register(&credentials.username, &credentials.password)?;
            println!("{message}");
        }
        Commands::Logout => api.logout(),
        Commands::Status => {
            let cache = record_cache(&api)?;
            let signed_in = if api.session().is_logged_in() {
                "signed in"
            } else {
                "signed out"
            };
            println!("Backend: {}", config.api_base);
            println!("Session: {signed_in}");
            println!("Window:  {}", cache.display_window().label());
            println!("Stored:  {}", FileStore::session()?.path().display());
        }
        Commands::Records(command) => {
            require_session(&api)?;
            record_command(&api, command, dark_mode)?;
        }
        Commands::Attributes(command) => {
            require_session(&api)?;
            attribute_command(&api, command, dark_mode)?;
        }
        Commands::Report(args) => {
            require_session(&api)?;
            print_report(&api, args.include_open, args.daily, dark_mode)?;
        }
        Commands::Jira(command) => {
            require_session(&api)?;
            jira_command(&api, command)?;
        }
        Commands::Config(_) => {}
    }

    Ok(())
}

fn configure(config: &mut AppConfig, args: &ConfigArgs) -> Result<()> {
    let mut changed = false;
    if let Some(api_url) = &args.set_api_url {
        config.api_base = api_url.clone();
        changed = true;
    }
    if let Some(level) = &args.set_log_level {
        config.log_level = level.clone();
        changed = true;
    }
    if let Some(dark_mode) = args.set_dark_mode {
        config.dark_mode = dark_mode;
        changed = true;
    }
    if changed {
        config.save()?;
    }
    println!("api_base:  {}", config.api_base);
    println!("log_level: {}", config.log_level);
    println!("dark_mode: {}", config.dark_mode);
    Ok(())
}

fn require_session(api: &ApiClient) -> Result<()> {
    if api.session().is_logged_in() || api.session().refresh_token().is_some() {
        return Ok(());
    }
    Err(Error::Custom(
        "Not signed in. Run `timecard login` first.".to_string(),
    ))
}

fn record_cache(api: &Rc<ApiClient>) -> Result<TimeRecordCache> {
    Ok(TimeRecordCache::new(
        Rc::clone(api),
        Box::new(FileStore::session()?),
        Local::now(),
    ))
}

fn record_command(api: &Rc<ApiClient>, command: RecordCommands, dark_mode: bool) -> Result<()> {
    let mut cache = record_cache(api)?;

    match command {
        RecordCommands::List { window, force } => {
            match requested_window(&window, cache.display_window())? {
                Some(window) => cache.set_display_window(window.start, window.end)?,
                None => {
                    cache.fetch(force, None, None)?;
                }
            }
            let mut attributes = RecordAttributeStore::new(Rc::clone(api));
            attributes.fetch()?;
            print_records(&cache, &attributes, dark_mode);
        }
        RecordCommands::Add {
            domain,
            category,
            title,
            time_in,
            time_out,
            notes,
            link,
            jira,
        } => {
            let time_in = match time_in {
                Some(value) => dates::parse_local_datetime(&value)?,
                None => Utc::now(),
            };
            let mut record = TimeRecord::new(domain.into(), category.into(), title.into(), time_in);
            record.time_out = time_out
                .map(|value| dates::parse_local_datetime(&value))
                .transpose()?;
            record.notes = notes;
            record.external_link = link;
            if let Some(key) = &jira {
                jira::validate_issue_key(key)?;
            }
            record.jira_issue_key = jira;
            check_order(&record)?;

            cache.save(&record);
            match record.time_out {
                Some(time_out) => println!(
                    "Submitted {} record.",
                    dates::show_time_difference(record.time_in, time_out)
                ),
                None => println!(
                    "Clocked in at {}.",
                    dates::to_local_datetime_string(record.time_in)
                ),
            }
        }
        RecordCommands::Edit {
            id,
            time_in,
            time_out,
            notes,
            link,
            jira,
        } => {
            cache.fetch(false, None, None)?;
            let mut record = find_record(&cache, id)?;
            if let Some(value) = time_in {
                record.time_in = dates::parse_local_datetime(&value)?;
            }
            if let Some(value) = time_out {
                record.time_out = Some(dates::parse_local_datetime(&value)?);
            }
            if notes.is_some() {
                record.notes = notes;
            }
            if link.is_some() {
                record.external_link = link;
            }
            if let Some(key) = jira {
                jira::validate_issue_key(&key)?;
                record.jira_issue_key = Some(key);
            }
            check_order(&record)?;
            cache.update(&record);
            println!("Updated record {id}.");
        }
        RecordCommands::Stop => {
            cache.fetch(false, None, None)?;
            let Some(mut record) = cache.open_record().cloned() else {
                println!("Nothing is running.");
                return Ok(());
            };
            let now = Utc::now();
            record.time_out = Some(now);
            cache.update(&record);
            println!(
                "Clocked out after {}.",
                dates::show_time_difference(record.time_in, now)
            );
        }
        RecordCommands::Delete { id } => {
            cache.fetch(false, None, None)?;
            let record = find_record(&cache, id)?;
            cache.delete(&record)?;
            println!("Deleted record {id}.");
        }
    }
    Ok(())
}

// No dates: keep the remembered window. One date: the other side comes from
// the remembered window.
fn requested_window(window: &WindowArgs, current: DateWindow) -> Result<Option<DateWindow>> {
    if window.start.is_none() && window.end.is_none() {
        return Ok(None);
    }
    let start = match &window.start {
        Some(value) => dates::parse_date(value)?,
        None => current.start.with_timezone(&Local).date_naive(),
    };
    let end = match &window.end {
        Some(value) => dates::parse_date(value)?,
        None => current.end.with_timezone(&Local).date_naive(),
    };
    Ok(Some(DateWindow::from_dates(start, end)?))
}

fn find_record(cache: &TimeRecordCache, id: i64) -> Result<TimeRecord> {
    cache.find(id).cloned().ok_or_else(|| {
        Error::Custom(format!(
            "Record {id} is not in the window {}.",
            cache.cache_window().label()
        ))
    })
}

fn check_order(record: &TimeRecord) -> Result<()> {
    match record.duration_seconds() {
        Some(seconds) if seconds <= 0 => Err(Error::Custom(
            "Clock-out must be after clock-in.".to_string(),
        )),
        _ => Ok(()),
    }
}

fn print_records(cache: &TimeRecordCache, attributes: &RecordAttributeStore, dark_mode: bool) {
    let records = cache.filtered_records();
    println!(
        "{} ({} of {} cached records)",
        cache.display_window().label(),
        records.len(),
        cache.records().len()
    );

    let now = Utc::now();
    for record in records {
        let duration = match record.time_out {
            Some(time_out) => dates::show_time_difference(record.time_in, time_out),
            None => format!(
                "running {}",
                dates::elapsed_clock((now - record.time_in).num_seconds())
            ),
        };
        let label = attributes.label_for(record);
        let label = match attributes.color_of(&record.domain_id) {
            Some(color) => paint(&label, color, dark_mode),
            None => label,
        };
        let synced = if record.is_synced() { " [synced]" } else { "" };
        println!(
            "{:>6}  {}  {:<14} {}{}",
            record.id.map(|id| id.to_string()).unwrap_or_default(),
            dates::to_local_datetime_string(record.time_in),
            duration,
            label,
            synced
        );
        if let Some(notes) = record.notes.as_deref().filter(|notes| !notes.is_empty()) {
            println!("        {notes}");
        }
    }
}

fn paint(text: &str, color: &str, dark_mode: bool) -> String {
    let Some((red, green, blue)) = colors::default_secondary_color(color, dark_mode)
        .as_deref()
        .and_then(colors::parse_hex)
    else {
        return text.to_string();
    };
    format!("\x1b[48;2;{red};{green};{blue}m{text}\x1b[0m")
}

fn attribute_command(api: &Rc<ApiClient>, command: AttributeCommands, dark_mode: bool) -> Result<()> {
    let mut store = RecordAttributeStore::new(Rc::clone(api));
    store.fetch()?;

    match command {
        AttributeCommands::List => {
            if store.attributes().is_empty() {
                println!("No attributes.");
            }
            for root in store.roots() {
                print_attribute(&store, root, 0, dark_mode);
            }
        }
        AttributeCommands::Check => {
            let violations = store.level_violations();
            if violations.is_empty() {
                println!("Hierarchy is consistent.");
            }
            for violation in violations {
                println!("{violation}");
            }
        }
        AttributeCommands::Color { id, color } => {
            if colors::parse_hex(&color).is_none() {
                return Err(Error::Custom(format!("Invalid color {color}, use #rrggbb.")));
            }
            let Some(attribute) = store.find(id).cloned() else {
                return Err(Error::Custom(format!("Unknown attribute {id}.")));
            };
            store.update(RecordAttribute {
                color: Some(color),
                ..attribute
            });
            println!("Updated attribute {id}.");
        }
    }
    Ok(())
}

fn print_attribute(store: &RecordAttributeStore, attribute: &RecordAttribute, depth: usize, dark_mode: bool) {
    let name = match attribute.color.as_deref() {
        Some(color) => paint(&attribute.name, color, dark_mode),
        None => attribute.name.clone(),
    };
    let id = attribute.id.map(|id| id.to_string()).unwrap_or_default();
    println!("{}{name} ({id})", "  ".repeat(depth));
    if let Some(parent_id) = attribute.id {
        for child in store.children_of(parent_id) {
            print_attribute(store, child, depth + 1, dark_mode);
        }
    }
}

fn print_report(api: &Rc<ApiClient>, include_open: bool, daily: bool, dark_mode: bool) -> Result<()> {
    let mut cache = record_cache(api)?;
    cache.fetch(false, None, None)?;
    let mut attributes = RecordAttributeStore::new(Rc::clone(api));
    attributes.fetch()?;

    let now = include_open.then(Utc::now);
    let records = cache.filtered_records();
    println!("{}", cache.display_window().label());
    for domain in summary::summarize(&records, &attributes, now) {
        let name = match domain.color.as_deref() {
            Some(color) => paint(&domain.name, color, dark_mode),
            None => domain.name.clone(),
        };
        println!("{name}  {:.2}h", domain.total_hours);
        for category in domain.categories {
            println!("  {:<24} {:.2}h", category.name, category.total_hours);
        }
    }

    if daily {
        println!();
        for day in summary::daily_totals(&records, now) {
            println!("{}  {}", day.date.format("%Y-%m-%d"), dates::elapsed_clock(day.seconds));
        }
    }
    Ok(())
}

fn jira_command(api: &Rc<ApiClient>, command: JiraCommands) -> Result<()> {
    let mut store = JiraStore::new(Rc::clone(api));

    match command {
        JiraCommands::Connections => {
            store.load_connections()?;
            if store.connections().is_empty() {
                println!("No JIRA connection.");
            } else if !store.has_active_connection() {
                println!("No active JIRA connection.");
            }
            let active_id = store.active_connection().map(|connection| connection.id);
            for connection in store.connections() {
                let marker = if Some(connection.id) == active_id { "*" } else { " " };
                let state = if connection.is_active { "active" } else { "inactive" };
                println!(
                    "{marker}{:>4}  {}  {}  {state}",
                    connection.id,
                    connection.jira_url,
                    connection.email.as_deref().unwrap_or("-")
                );
            }
        }
        JiraCommands::Connect { url, email, token } => {
            let connection = store.create_connection(&NewJiraConnection {
                jira_url: url,
                email,
                api_token: token,
            })?;
            println!("Connected to {} ({}).", connection.jira_url, connection.id);
        }
        JiraCommands::UpdateConnection {
            id,
            url,
            email,
            token,
            active,
        } => {
            let patch = JiraConnectionPatch {
                jira_url: url,
                email,
                api_token: token,
                is_active: active,
            };
            store.update_connection(id, &patch)?;
            println!("Updated connection {id}.");
        }
        JiraCommands::Disconnect { id } => {
            store.delete_connection(id)?;
            println!("Deleted connection {id}.");
        }
        JiraCommands::Test { id } => {
            let result = store.test_connection(id);
            if result.success {
                println!("Connection {id} works.");
            } else {
                println!(
                    "Connection {id} failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        JiraCommands::Search { query } => {
            let issues = store.search_issues(&query);
            report_jira_error(&store);
            for issue in issues {
                println!("{:<12} {}", issue.key, issue.summary);
            }
        }
        JiraCommands::Issue { key } => {
            jira::validate_issue_key(&key)?;
            match store.issue(&key) {
                Some(issue) => {
                    println!("{} {}", issue.key, issue.summary);
                    if let Some(status) = issue.status {
                        println!("Status:   {status}");
                    }
                    if let Some(assignee) = issue.assignee {
                        println!("Assignee: {assignee}");
                    }
                    if let Some(description) = issue.description {
                        println!("\n{description}");
                    }
                }
                None => report_jira_error(&store),
            }
        }
        JiraCommands::Assigned => {
            let issues = store.assigned_issues();
            report_jira_error(&store);
            for issue in issues {
                println!(
                    "{:<12} {:<14} {}",
                    issue.key,
                    issue.status.as_deref().unwrap_or("-"),
                    issue.summary
                );
            }
        }
        JiraCommands::Sync { record_id } => {
            let mut cache = record_cache(api)?;
            cache.fetch(false, None, None)?;
            if let Some(record) = cache.find(record_id) {
                jira::validate_record_for_sync(record)?;
            }
            let result = store.sync_record(record_id);
            if result.success {
                println!(
                    "{} (worklog {})",
                    result.message.as_deref().unwrap_or("Synced."),
                    result.worklog_id.as_deref().unwrap_or("-")
                );
            } else {
                println!(
                    "Sync failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        JiraCommands::BulkSync { record_ids } => {
            let result = store.bulk_sync(&record_ids)?;
            println!(
                "{} of {} synced, {} failed.",
                result.succeeded, result.total, result.failed
            );
            for failure in result.errors {
                println!("  record {}: {}", failure.record_id, failure.error);
            }
        }
        JiraCommands::History {
            failed,
            succeeded,
            limit,
            record,
        } => {
            let status = match (failed, succeeded) {
                (true, false) => Some(SyncStatus::Failed),
                (false, true) => Some(SyncStatus::Success),
                _ => None,
            };
            let history = store.sync_history(status, limit, record);
            report_jira_error(&store);
            for entry in history {
                println!(
                    "{:>6}  {:<12} {:<8} {}",
                    entry.time_record_id,
                    entry.jira_issue_key,
                    entry.sync_status,
                    entry
                        .sync_error
                        .as_deref()
                        .or(entry.synced_at.as_deref())
                        .unwrap_or("")
                );
            }
        }
        JiraCommands::Unsync { record_id } => {
            if store.delete_worklog(record_id) {
                println!("Removed worklog for record {record_id}.");
            } else {
                report_jira_error(&store);
            }
        }
    }
    Ok(())
}

fn report_jira_error(store: &JiraStore) {
    if let Some(message) = store.last_error() {
        eprintln!("JIRA: {message}");
    }
}
