use chrono::NaiveDate;
use rusqlite::Connection;
use teamcal_core::db::open_db_in_memory;
use teamcal_core::{
    aggregate_absences, Absence, AbsenceRepository, CalendarError, CalendarQuery,
    CalendarService, CalendarServiceError, CoreConfig, MembershipService, Relationship, Role,
    SqliteAbsenceRepository, SqliteRelationshipRepository, SqliteTeamRepository,
    SqliteUserRepository, Team, User, UserRepository,
};
use uuid::Uuid;

type Calendar<'conn> = CalendarService<
    SqliteUserRepository<'conn>,
    SqliteTeamRepository<'conn>,
    SqliteRelationshipRepository<'conn>,
    SqliteAbsenceRepository<'conn>,
>;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn calendar(conn: &Connection, config: CoreConfig) -> Calendar<'_> {
    CalendarService::new(
        SqliteUserRepository::try_new(conn).unwrap(),
        SqliteTeamRepository::try_new(conn).unwrap(),
        SqliteRelationshipRepository::try_new(conn).unwrap(),
        SqliteAbsenceRepository::try_new(conn).unwrap(),
        config,
    )
}

fn register(conn: &Connection, username: &str) -> User {
    let user = User::new(username);
    SqliteUserRepository::try_new(conn)
        .unwrap()
        .create_user(&user)
        .unwrap();
    user
}

fn store_absence(conn: &Connection, owner: &User, start: NaiveDate, end: NaiveDate) -> Absence {
    let absence = Absence::new(owner.uuid, start, end);
    SqliteAbsenceRepository::try_new(conn)
        .unwrap()
        .create_absence(&absence)
        .unwrap();
    absence
}

fn create_team(conn: &Connection, owner: &User, name: &str, private: bool) -> (Team, Relationship) {
    membership(conn).create_team(owner.uuid, name, private).unwrap()
}

fn join(conn: &Connection, user: &User, team: &Team) -> Relationship {
    membership(conn)
        .request_to_join(user.uuid, team.uuid, Role::Member)
        .unwrap()
}

fn membership(
    conn: &Connection,
) -> MembershipService<
    SqliteUserRepository<'_>,
    SqliteTeamRepository<'_>,
    SqliteRelationshipRepository<'_>,
> {
    MembershipService::new(
        SqliteUserRepository::try_new(conn).unwrap(),
        SqliteTeamRepository::try_new(conn).unwrap(),
        SqliteRelationshipRepository::try_new(conn).unwrap(),
    )
}

#[test]
fn absence_expands_to_every_covered_day() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "bob");
    store_absence(&conn, &ada, day(2024, 3, 10), day(2024, 3, 12));

    let repo = SqliteAbsenceRepository::try_new(&conn).unwrap();
    let aggregated = aggregate_absences(&repo, &[ada.clone(), bob.clone()], None).unwrap();

    assert_eq!(aggregated.len(), 2);
    assert_eq!(aggregated[0].subject, ada);
    assert_eq!(
        aggregated[0].dates,
        vec![day(2024, 3, 10), day(2024, 3, 11), day(2024, 3, 12)]
    );
    assert_eq!(aggregated[1].subject, bob);
    assert!(aggregated[1].absences.is_empty());
    assert!(aggregated[1].dates.is_empty());
}

#[test]
fn aggregation_is_repeatable() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    store_absence(&conn, &ada, day(2024, 3, 10), day(2024, 3, 12));
    store_absence(&conn, &ada, day(2024, 4, 1), day(2024, 4, 1));

    let repo = SqliteAbsenceRepository::try_new(&conn).unwrap();
    let subjects = [ada.uuid];
    let first = aggregate_absences(&repo, &subjects, None).unwrap();
    let second = aggregate_absences(&repo, &subjects, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].dates.len(), 4);
    assert_eq!(repo.list_absences_by_owner(ada.uuid).unwrap().len(), 2);
}

#[test]
fn cross_month_absence_marks_only_visible_days() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let (eng, _) = create_team(&conn, &ada, "Eng", false);
    store_absence(&conn, &ada, day(2024, 1, 30), day(2024, 2, 1));

    let view = calendar(&conn, CoreConfig::default())
        .team_calendar(ada.uuid, eng.uuid, &CalendarQuery::new("February", 2024))
        .unwrap();

    let row = &view.absence_dates[0];
    assert_eq!(
        row.dates,
        vec![day(2024, 1, 30), day(2024, 1, 31), day(2024, 2, 1)]
    );
    let cells = row.month_cells(&view.grid);
    assert_eq!(cells.len(), 29);
    assert!(cells[0]);
    assert!(cells[1..].iter().all(|absent| !absent));
}

#[test]
fn team_calendar_lists_active_members_and_context() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "bob");
    let cleo = register(&conn, "cleo");
    let dan = register(&conn, "dan");
    let (ops, ada_rel) = create_team(&conn, &ada, "Ops", true);
    let bob_rel = join(&conn, &bob, &ops);
    membership(&conn)
        .review_request(ada.uuid, bob_rel.uuid, "accepted".parse().unwrap())
        .unwrap();
    // Cleo stays pending.
    join(&conn, &cleo, &ops);
    store_absence(&conn, &bob, day(2024, 3, 4), day(2024, 3, 5));

    let view = calendar(&conn, CoreConfig::default())
        .team_calendar(ada.uuid, ops.uuid, &CalendarQuery::new("march", 2024))
        .unwrap();

    assert_eq!(view.grid.month, "March");
    assert_eq!(view.grid.month_num, 3);
    assert_eq!(view.grid.day_range.len(), 31);
    assert_eq!(view.grid.previous_month, "February");
    assert_eq!(view.grid.next_month, "April");

    let members: Vec<Uuid> = view
        .absence_dates
        .iter()
        .map(|row| row.subject.user)
        .collect();
    assert_eq!(members, vec![ada.uuid, bob.uuid]);
    assert!(view.absence_dates[1].is_absent_on(day(2024, 3, 5)));
    assert!(!view.absence_dates[1].is_absent_on(day(2024, 3, 6)));

    let context = view.team.expect("team context");
    assert_eq!(context.team, ops);
    assert_eq!(context.team_count, 2);
    assert_eq!(context.current_user, ada_rel);
    assert_eq!(context.all_users, vec![dan]);
}

#[test]
fn pending_requester_may_view_team_calendar() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "bob");
    let (ops, _) = create_team(&conn, &ada, "Ops", true);
    let pending = join(&conn, &bob, &ops);

    let view = calendar(&conn, CoreConfig::default())
        .team_calendar(bob.uuid, ops.uuid, &CalendarQuery::new("March", 2024))
        .unwrap();
    assert_eq!(view.absence_dates.len(), 1);
    assert_eq!(view.team.map(|context| context.current_user), Some(pending));
}

#[test]
fn team_calendar_rejects_unknown_team_and_strangers() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "bob");
    let (eng, _) = create_team(&conn, &ada, "Eng", false);
    let calendar = calendar(&conn, CoreConfig::default());
    let query = CalendarQuery::new("March", 2024);

    let missing = Uuid::new_v4();
    let err = calendar.team_calendar(ada.uuid, missing, &query).unwrap_err();
    assert!(matches!(err, CalendarServiceError::TeamNotFound(id) if id == missing));

    let err = calendar.team_calendar(bob.uuid, eng.uuid, &query).unwrap_err();
    assert!(matches!(
        err,
        CalendarServiceError::MembershipNotFound { user, team }
            if user == bob.uuid && team == eng.uuid
    ));
}

#[test]
fn unknown_month_name_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let err = calendar(&conn, CoreConfig::default())
        .all_teams_calendar(ada.uuid, &CalendarQuery::new("Smarch", 2024))
        .unwrap_err();
    assert!(matches!(
        err,
        CalendarServiceError::Calendar(CalendarError::UnknownMonth(name)) if name == "Smarch"
    ));
}

#[test]
fn all_teams_calendar_merges_colleagues_once() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "bob");
    let cleo = register(&conn, "cleo");
    let dan = register(&conn, "dan");
    let eve = register(&conn, "eve");

    let (alpha, _) = create_team(&conn, &bob, "Alpha", false);
    join(&conn, &ada, &alpha);
    join(&conn, &cleo, &alpha);
    let (beta, _) = create_team(&conn, &cleo, "Beta", false);
    join(&conn, &ada, &beta);
    join(&conn, &dan, &beta);
    // Eve shares no team with ada.
    create_team(&conn, &eve, "Gamma", false);

    let view = calendar(&conn, CoreConfig::default())
        .all_teams_calendar(ada.uuid, &CalendarQuery::new("March", 2024))
        .unwrap();

    let names: Vec<&str> = view
        .absence_dates
        .iter()
        .map(|row| row.subject.username.as_str())
        .collect();
    assert_eq!(names, vec!["ada", "bob", "cleo", "dan"]);
    assert!(view.team.is_none());
}

#[test]
fn all_teams_calendar_for_loner_has_single_row() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    store_absence(&conn, &ada, day(2024, 12, 30), day(2025, 1, 2));

    let view = calendar(&conn, CoreConfig::default())
        .all_teams_calendar(ada.uuid, &CalendarQuery::new("December", 2024))
        .unwrap();
    assert_eq!(view.absence_dates.len(), 1);
    assert_eq!(view.absence_dates[0].dates.len(), 4);
    assert_eq!(view.grid.next_month, "January");
    assert_eq!(view.grid.next_year, 2025);
}

#[test]
fn over_long_stored_absence_fails_aggregation() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    store_absence(&conn, &ada, day(2020, 1, 1), day(2024, 1, 1));
    let config = CoreConfig {
        max_absence_span_days: Some(366),
        ..CoreConfig::default()
    };

    let err = calendar(&conn, config)
        .all_teams_calendar(ada.uuid, &CalendarQuery::new("January", 2024))
        .unwrap_err();
    assert!(matches!(
        err,
        CalendarServiceError::Calendar(CalendarError::AbsenceSpanExceeded { max_days: 366, .. })
    ));
}

#[test]
fn team_view_serializes_flat_keys() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let (eng, _) = create_team(&conn, &ada, "Eng", false);
    store_absence(&conn, &ada, day(2024, 3, 10), day(2024, 3, 12));

    let view = calendar(&conn, CoreConfig::default())
        .team_calendar(ada.uuid, eng.uuid, &CalendarQuery::new("March", 2024))
        .unwrap();
    let json = serde_json::to_value(&view).unwrap();
    let object = json.as_object().unwrap();

    for key in [
        "day_range",
        "day_names",
        "month",
        "year",
        "month_num",
        "previous_month",
        "previous_year",
        "next_month",
        "next_year",
        "absence_dates",
        "team",
        "all_users",
        "team_count",
        "current_user",
    ] {
        assert!(object.contains_key(key), "missing key {key}");
    }
    assert_eq!(json["month"], "March");
    assert_eq!(json["team_count"], 1);
    assert_eq!(json["absence_dates"][0]["dates"][0], "2024-03-10");
}

#[test]
fn all_teams_view_omits_team_keys() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let view = calendar(&conn, CoreConfig::default())
        .all_teams_calendar(ada.uuid, &CalendarQuery::new("March", 2024))
        .unwrap();
    let json = serde_json::to_value(&view).unwrap();

    assert!(json.get("absence_dates").is_some());
    assert!(json.get("team_count").is_none());
    assert!(json.get("all_users").is_none());
}
