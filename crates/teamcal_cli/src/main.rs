//! Terminal month view over the planner core.
//!
//! Usage: `teamcal_cli [MONTH] [YEAR]`. Without arguments the current local
//! month is shown.
//!
//! Environment (a `.env` file is honoured):
//! - `TEAMCAL_DB_PATH`: database file; required for absence rows.
//! - `TEAMCAL_USER`: username whose all-teams calendar is printed.
//! - `TEAMCAL_LOG_DIR` / `TEAMCAL_LOG_LEVEL`: enable rolling file logs.
//! - `TEAMCAL_MAX_ABSENCE_DAYS` / `TEAMCAL_NAVIGATION`: core tunables.

use log::info;
use std::env;
use std::error::Error;
use std::process::ExitCode;
use teamcal_core::db::open_db;
use teamcal_core::{
    build_grid, default_log_level, init_logging, AllTeamsCalendarView, CalendarGrid,
    CalendarQuery, CalendarService, CoreConfig, SqliteAbsenceRepository,
    SqliteRelationshipRepository, SqliteTeamRepository, SqliteUserRepository, UserRepository,
};

const ENV_DB_PATH: &str = "TEAMCAL_DB_PATH";
const ENV_USER: &str = "TEAMCAL_USER";
const ENV_LOG_DIR: &str = "TEAMCAL_LOG_DIR";
const ENV_LOG_LEVEL: &str = "TEAMCAL_LOG_LEVEL";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("teamcal: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    // Missing .env is fine.
    dotenv::dotenv().ok();

    if let Ok(dir) = env::var(ENV_LOG_DIR) {
        let level = env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| default_log_level().to_string());
        init_logging(&level, &dir)?;
    }

    let config = CoreConfig::from_env()?;
    let query = parse_args(env::args().skip(1))?;
    println!(
        "teamcal_core ping={} version={}",
        teamcal_core::ping(),
        teamcal_core::core_version()
    );

    let (Ok(db_path), Ok(username)) = (env::var(ENV_DB_PATH), env::var(ENV_USER)) else {
        let grid = build_grid(&query, config.navigation)?;
        print!("{}", render_header(&grid));
        return Ok(());
    };

    let conn = open_db(&db_path)?;
    let users = SqliteUserRepository::try_new(&conn)?;
    let user = users
        .find_user_by_username(&username)?
        .ok_or_else(|| format!("no user named `{username}`"))?;
    let service = CalendarService::new(
        users,
        SqliteTeamRepository::try_new(&conn)?,
        SqliteRelationshipRepository::try_new(&conn)?,
        SqliteAbsenceRepository::try_new(&conn)?,
        config,
    );

    let view = service.all_teams_calendar(user.uuid, &query)?;
    info!(
        "event=cli_render module=cli status=ok user_id={} rows={}",
        user.uuid,
        view.absence_dates.len()
    );
    print!("{}", render_view(&view));
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CalendarQuery, String> {
    let Some(month) = args.next() else {
        return Ok(CalendarQuery::today());
    };
    let year = match args.next() {
        Some(raw) => raw
            .parse::<i32>()
            .map_err(|_| format!("invalid year `{raw}`"))?,
        None => CalendarQuery::today().year,
    };
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument `{extra}`"));
    }
    Ok(CalendarQuery::new(month, year))
}

fn render_header(grid: &CalendarGrid) -> String {
    let mut out = format!(
        "{} {}  (< {} {} | {} {} >)\n",
        grid.month,
        grid.year,
        grid.previous_month,
        grid.previous_year,
        grid.next_month,
        grid.next_year
    );
    out.push_str(&format!("{:<16}", ""));
    for name in &grid.day_names {
        out.push_str(&format!("{name:>3}"));
    }
    out.push('\n');
    out.push_str(&format!("{:<16}", ""));
    for day in &grid.day_range {
        out.push_str(&format!("{day:>3}"));
    }
    out.push('\n');
    out
}

fn render_view(view: &AllTeamsCalendarView) -> String {
    let mut out = render_header(&view.grid);
    for row in &view.absence_dates {
        out.push_str(&format!("{:<16}", truncate(&row.subject.username, 15)));
        for absent in row.month_cells(&view.grid) {
            out.push_str(if absent { "  x" } else { "  ." });
        }
        out.push('\n');
    }
    out
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
