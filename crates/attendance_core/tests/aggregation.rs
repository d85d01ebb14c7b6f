use attendance_core::db::open_db_in_memory;
use attendance_core::{
    AggregationMode, AggregationQuery, AggregationService, CourseService, DateWindow, Faculty,
    PresenceInput, QueryContext, RosterService, SessionDate, SessionService,
    SqliteCourseRepository, SqliteRosterRepository, SqliteSessionRepository, Student,
    UpsertSessionRequest,
};
use rusqlite::Connection;

fn student(enrollment: &str, name: &str) -> Student {
    Student {
        enrollment_number: enrollment.to_string(),
        name: name.to_string(),
        email: format!("{}@uni.example.edu", enrollment.to_ascii_lowercase()),
        department: "CSE".to_string(),
        batch: "2024".to_string(),
    }
}

fn courses(conn: &Connection) -> CourseService<SqliteCourseRepository<'_>, SqliteRosterRepository<'_>> {
    CourseService::new(
        SqliteCourseRepository::try_new(conn).unwrap(),
        SqliteRosterRepository::try_new(conn).unwrap(),
    )
}

fn aggregation(
    conn: &Connection,
) -> AggregationService<SqliteCourseRepository<'_>, SqliteSessionRepository<'_>> {
    AggregationService::new(
        SqliteCourseRepository::try_new(conn).unwrap(),
        SqliteSessionRepository::try_new(conn).unwrap(),
    )
}

fn mark(conn: &Connection, course: &str, date: &str, duration: i64, presences: &[(&str, i64)]) {
    SessionService::new(SqliteSessionRepository::try_new(conn).unwrap())
        .upsert_session(&UpsertSessionRequest {
            course_code: course.to_string(),
            date: date.to_string(),
            class_duration_units: duration,
            presences: presences
                .iter()
                .map(|(enrollment, units)| PresenceInput::new(*enrollment, "", *units))
                .collect(),
        })
        .unwrap();
}

/// CS101 with roster E1, E2, E3 registered in the roster store.
fn ledger() -> Connection {
    let conn = open_db_in_memory().unwrap();
    let roster = RosterService::new(SqliteRosterRepository::try_new(&conn).unwrap());
    for (enrollment, name) in [("E1", "Asha"), ("E2", "Ravi"), ("E3", "Meena")] {
        roster.register_student(&student(enrollment, name)).unwrap();
    }
    let courses = courses(&conn);
    courses.create_course("CS101", "Intro to Computing").unwrap();
    courses
        .select_students("CS101", &["E1".to_string(), "E2".to_string(), "E3".to_string()])
        .unwrap();
    conn
}

#[test]
fn sessions_without_entry_do_not_count() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-11-01", 1, &[("E1", 1)]);
    mark(&conn, "CS101", "2024-11-02", 2, &[("E1", 1)]);
    mark(&conn, "CS101", "2024-11-03", 2, &[("E2", 2)]);

    let summary = aggregation(&conn)
        .compute_student_summary("CS101", "E1", &DateWindow::all())
        .unwrap();
    assert_eq!(summary.sessions_counted, 2);
    assert_eq!(summary.units_attended, 2);
    assert_eq!(summary.units_possible, 3);
    assert_eq!(summary.percentage, Some(67));
    assert_eq!(summary.name.as_deref(), Some("Asha"));
}

#[test]
fn marked_scenario_summarizes_second_student() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 2), ("E2", 1)]);

    let summary = aggregation(&conn)
        .compute_student_summary("CS101", "E2", &DateWindow::all())
        .unwrap();
    assert_eq!(
        (summary.units_attended, summary.units_possible, summary.percentage),
        (1, 2, Some(50))
    );
}

#[test]
fn student_without_entries_has_no_percentage() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 2)]);

    let summary = aggregation(&conn)
        .compute_student_summary("CS101", "E3", &DateWindow::all())
        .unwrap();
    assert_eq!(summary.sessions_counted, 0);
    assert_eq!(summary.percentage, None);
    assert_eq!(serde_json::to_value(&summary).unwrap()["percentage"], serde_json::Value::Null);
}

#[test]
fn course_summary_modes_differ_on_former_students() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 2), ("E2", 1), ("E3", 0)]);
    courses(&conn)
        .select_students("CS101", &["E1".to_string(), "E2".to_string()])
        .unwrap();

    let service = aggregation(&conn);
    let historical = service
        .compute_course_summary("CS101", &AggregationQuery::default())
        .unwrap();
    assert_eq!(historical.sessions_held, 1);
    assert_eq!(historical.units_offered, 2);
    let enrollments: Vec<&str> = historical
        .students
        .iter()
        .map(|summary| summary.enrollment_number.as_str())
        .collect();
    assert_eq!(enrollments, vec!["E1", "E2", "E3"]);
    assert!(!historical.students[2].on_roster);
    assert_eq!(historical.students[2].percentage, Some(0));

    let current = service
        .compute_course_summary(
            "CS101",
            &AggregationQuery {
                mode: AggregationMode::CurrentRoster,
                ..AggregationQuery::default()
            },
        )
        .unwrap();
    assert_eq!(current.students.len(), 2);
    assert!(current.students.iter().all(|summary| summary.on_roster));
}

#[test]
fn min_percentage_and_ranking() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 1), ("E2", 2), ("E3", 1)]);
    mark(&conn, "CS101", "2024-11-02", 1, &[("E1", 1), ("E2", 1)]);

    let service = aggregation(&conn);
    let summary = service
        .compute_course_summary("CS101", &AggregationQuery::default())
        .unwrap();
    let ranked: Vec<&str> = summary
        .ranked()
        .into_iter()
        .map(|student| student.enrollment_number.as_str())
        .collect();
    assert_eq!(ranked, vec!["E2", "E1", "E3"]);

    let filtered = service
        .compute_course_summary(
            "CS101",
            &AggregationQuery {
                min_percentage: Some(67),
                ..AggregationQuery::default()
            },
        )
        .unwrap();
    let kept: Vec<&str> = filtered
        .students
        .iter()
        .map(|student| student.enrollment_number.as_str())
        .collect();
    assert_eq!(kept, vec!["E1", "E2"]);
}

#[test]
fn date_window_restricts_summary_and_records() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-10-30", 2, &[("E1", 0)]);
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 2)]);
    mark(&conn, "CS101", "2024-11-04", 1, &[("E1", 1)]);

    let window = DateWindow::between(
        SessionDate::parse("2024-11-01").unwrap(),
        SessionDate::parse("2024-11-30").unwrap(),
    );
    let service = aggregation(&conn);
    let summary = service
        .compute_student_summary("CS101", "E1", &window)
        .unwrap();
    assert_eq!(summary.percentage, Some(100));

    let records = service.student_records("CS101", "E1", &window).unwrap();
    assert_eq!(records.len(), 2);
    let value = serde_json::to_value(&records).unwrap();
    assert_eq!(value[0]["date"], "2024-11-01");
    assert_eq!(value[0]["classDuration"], 2);
    assert_eq!(value[0]["totalPresents"], 2);
    assert_eq!(value[1]["date"], "2024-11-04");

    let inverted = DateWindow::between(
        SessionDate::parse("2024-11-30").unwrap(),
        SessionDate::parse("2024-11-01").unwrap(),
    );
    let err = service
        .compute_student_summary("CS101", "E1", &inverted)
        .unwrap_err();
    assert_eq!(err.reason(), "invalid_date_window");
}

#[test]
fn unknown_course_summary_is_not_found() {
    let conn = ledger();
    let err = aggregation(&conn)
        .compute_course_summary("NOPE", &AggregationQuery::default())
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn student_rollup_covers_roster_and_history() {
    let conn = ledger();
    let admin = courses(&conn);
    admin.create_course("MA201", "Linear Algebra").unwrap();
    admin.create_course("PH101", "Physics").unwrap();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 1)]);
    // E1 was never on the MA201 roster but holds an entry there.
    mark(&conn, "MA201", "2024-11-01", 1, &[("E1", 1)]);

    let rollup = aggregation(&conn)
        .student_rollup("E1", &DateWindow::all())
        .unwrap();
    let codes: Vec<&str> = rollup.iter().map(|item| item.course_code.as_str()).collect();
    assert_eq!(codes, vec!["CS101", "MA201"]);
    assert_eq!(rollup[0].summary.percentage, Some(50));
    assert_eq!(rollup[1].summary.percentage, Some(100));
    assert!(!rollup[1].summary.on_roster);
}

#[test]
fn faculty_rollup_and_query_context() {
    let conn = ledger();
    let roster = RosterService::new(SqliteRosterRepository::try_new(&conn).unwrap());
    let faculty = Faculty::new("Dr. Rao", "rao@uni.example.edu", "CSE");
    roster.register_faculty(&faculty).unwrap();
    let admin = courses(&conn);
    admin.assign_faculty("CS101", faculty.id).unwrap();
    admin.create_course("MA201", "Linear Algebra").unwrap();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 2), ("E2", 1)]);

    let summaries = aggregation(&conn)
        .faculty_rollup(faculty.id, &AggregationQuery::default())
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].course_code, "CS101");

    let context = QueryContext::for_faculty(&faculty, "who is below 75%?", summaries);
    let value: serde_json::Value =
        serde_json::from_str(&context.to_json_pretty().unwrap()).unwrap();
    assert_eq!(value["context"]["role"], "faculty");
    assert_eq!(value["query"], "who is below 75%?");
    assert_eq!(value["courses"][0]["students"][1]["unitsPossible"], 2);
    assert_eq!(value["courses"][0]["students"][1]["percentage"], 50);
}

#[test]
fn student_query_context_only_carries_own_figures() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 2), ("E2", 1)]);
    let me = RosterService::new(SqliteRosterRepository::try_new(&conn).unwrap())
        .get_student("E2")
        .unwrap();

    let rollup = aggregation(&conn)
        .student_rollup(&me.enrollment_number, &DateWindow::all())
        .unwrap();
    let context = QueryContext::for_student(&me, "am I safe?", &rollup);
    assert_eq!(context.courses.len(), 1);
    assert_eq!(context.courses[0].students.len(), 1);
    assert_eq!(context.courses[0].students[0].enrollment_number, "E2");
    assert_eq!(context.context.department, "CSE");
}

#[test]
fn student_rollup_reports_course_totals_beside_own_counts() {
    let conn = ledger();
    mark(&conn, "CS101", "2024-11-01", 2, &[("E1", 2), ("E2", 1)]);
    mark(&conn, "CS101", "2024-11-02", 3, &[("E1", 3)]);

    let rollup = aggregation(&conn)
        .student_rollup("E2", &DateWindow::all())
        .unwrap();
    assert_eq!(rollup[0].sessions_held, 2);
    assert_eq!(rollup[0].units_offered, 5);
    assert_eq!(rollup[0].summary.sessions_counted, 1);
    assert_eq!(rollup[0].summary.units_possible, 2);

    let me = RosterService::new(SqliteRosterRepository::try_new(&conn).unwrap())
        .get_student("E2")
        .unwrap();
    let context = QueryContext::for_student(&me, "how many classes did I miss?", &rollup);
    assert_eq!(context.courses[0].sessions_held, 2);
    assert_eq!(context.courses[0].units_offered, 5);
}
