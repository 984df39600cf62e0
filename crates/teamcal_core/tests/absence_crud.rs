use chrono::NaiveDate;
use rusqlite::Connection;
use teamcal_core::db::open_db_in_memory;
use teamcal_core::{
    AbsenceError, AbsenceRepository, AbsenceService, AbsenceValidationError, CoreConfig,
    SqliteAbsenceRepository, SqliteUserRepository, User, UserRepository,
};
use uuid::Uuid;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn service(
    conn: &Connection,
    config: CoreConfig,
) -> AbsenceService<SqliteUserRepository<'_>, SqliteAbsenceRepository<'_>> {
    AbsenceService::new(
        SqliteUserRepository::try_new(conn).unwrap(),
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

#[test]
fn added_absences_are_listed_in_start_order() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let service = service(&conn, CoreConfig::default());

    let later = service
        .add_absence(ada.uuid, day(2024, 5, 1), day(2024, 5, 3))
        .unwrap();
    let earlier = service
        .add_absence(ada.uuid, day(2024, 3, 10), day(2024, 3, 12))
        .unwrap();
    assert!(!earlier.request_accepted);

    let listed = service.list_absences(ada.uuid).unwrap();
    assert_eq!(listed, vec![earlier, later]);
}

#[test]
fn single_day_absence_is_accepted() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let absence = service(&conn, CoreConfig::default())
        .add_absence(ada.uuid, day(2024, 2, 29), day(2024, 2, 29))
        .unwrap();
    assert_eq!(absence.span_days(), 1);
}

#[test]
fn end_before_start_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let service = service(&conn, CoreConfig::default());

    let err = service
        .add_absence(ada.uuid, day(2024, 3, 12), day(2024, 3, 10))
        .unwrap_err();
    assert!(matches!(
        err,
        AbsenceError::Validation(AbsenceValidationError::EndBeforeStart { .. })
    ));
    assert!(service.list_absences(ada.uuid).unwrap().is_empty());
}

#[test]
fn span_guard_applies_on_write() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let config = CoreConfig {
        max_absence_span_days: Some(10),
        ..CoreConfig::default()
    };
    let service = service(&conn, config);

    service
        .add_absence(ada.uuid, day(2024, 1, 1), day(2024, 1, 10))
        .unwrap();
    let err = service
        .add_absence(ada.uuid, day(2024, 1, 1), day(2024, 1, 11))
        .unwrap_err();
    assert!(matches!(
        err,
        AbsenceError::Validation(AbsenceValidationError::SpanTooLong {
            days: 11,
            max_days: 10
        })
    ));
}

#[test]
fn unknown_owner_cannot_add_absence() {
    let conn = open_db_in_memory().unwrap();
    let ghost = Uuid::new_v4();
    let err = service(&conn, CoreConfig::default())
        .add_absence(ghost, day(2024, 1, 1), day(2024, 1, 2))
        .unwrap_err();
    assert!(matches!(err, AbsenceError::UserNotFound(id) if id == ghost));
}

#[test]
fn whitelisted_editor_may_edit_but_not_delete() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "Bob");
    let service = service(&conn, CoreConfig::default());

    let absence = service
        .add_absence(ada.uuid, day(2024, 3, 10), day(2024, 3, 12))
        .unwrap();

    let err = service
        .edit_absence(bob.uuid, absence.uuid, day(2024, 3, 11), day(2024, 3, 13))
        .unwrap_err();
    assert!(matches!(err, AbsenceError::PermissionDenied { action: "edit", .. }));

    let shared = service
        .grant_edit_access(ada.uuid, absence.uuid, "bob")
        .unwrap();
    assert!(shared.editors.contains(&bob.uuid));

    let edited = service
        .edit_absence(bob.uuid, absence.uuid, day(2024, 3, 11), day(2024, 3, 13))
        .unwrap();
    assert_eq!(edited.start, day(2024, 3, 11));
    assert_eq!(edited.end, day(2024, 3, 13));

    let stored = SqliteAbsenceRepository::try_new(&conn)
        .unwrap()
        .get_absence(absence.uuid)
        .unwrap()
        .unwrap();
    assert_eq!(stored, edited);

    let err = service.delete_absence(bob.uuid, absence.uuid).unwrap_err();
    assert!(matches!(err, AbsenceError::PermissionDenied { action: "delete", .. }));

    service.delete_absence(ada.uuid, absence.uuid).unwrap();
    assert!(service.list_absences(ada.uuid).unwrap().is_empty());
}

#[test]
fn edit_keeps_the_end_after_start_rule() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let service = service(&conn, CoreConfig::default());
    let absence = service
        .add_absence(ada.uuid, day(2024, 3, 10), day(2024, 3, 12))
        .unwrap();

    let err = service
        .edit_absence(ada.uuid, absence.uuid, day(2024, 3, 12), day(2024, 3, 1))
        .unwrap_err();
    assert!(matches!(err, AbsenceError::Validation(_)));
    assert_eq!(service.list_absences(ada.uuid).unwrap(), vec![absence]);
}

#[test]
fn sharing_requires_owner_and_known_username() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "bob");
    let service = service(&conn, CoreConfig::default());
    let absence = service
        .add_absence(ada.uuid, day(2024, 3, 10), day(2024, 3, 12))
        .unwrap();

    let err = service
        .grant_edit_access(ada.uuid, absence.uuid, "nobody")
        .unwrap_err();
    assert!(matches!(err, AbsenceError::UsernameNotFound(name) if name == "nobody"));

    let err = service
        .grant_edit_access(bob.uuid, absence.uuid, "bob")
        .unwrap_err();
    assert!(matches!(err, AbsenceError::PermissionDenied { action: "share", .. }));

    let unchanged = service
        .grant_edit_access(ada.uuid, absence.uuid, "ada")
        .unwrap();
    assert!(unchanged.editors.is_empty());
}

#[test]
fn granting_twice_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let bob = register(&conn, "bob");
    let service = service(&conn, CoreConfig::default());
    let absence = service
        .add_absence(ada.uuid, day(2024, 3, 10), day(2024, 3, 12))
        .unwrap();

    service.grant_edit_access(ada.uuid, absence.uuid, "bob").unwrap();
    let shared = service.grant_edit_access(ada.uuid, absence.uuid, "bob").unwrap();
    assert_eq!(shared.editors.len(), 1);
    assert!(shared.can_edit(bob.uuid));
}

#[test]
fn missing_absence_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let ada = register(&conn, "ada");
    let missing = Uuid::new_v4();
    let err = service(&conn, CoreConfig::default())
        .delete_absence(ada.uuid, missing)
        .unwrap_err();
    assert!(matches!(err, AbsenceError::AbsenceNotFound(id) if id == missing));
}
