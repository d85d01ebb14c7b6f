use attendance_core::db::open_db;
use attendance_core::{
    Course, CourseRepository, PresenceInput, SessionService, SqliteCourseRepository,
    SqliteSessionRepository, UpsertSessionRequest,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: usize = 8;

fn prepare(dir: &Path) -> PathBuf {
    let path = dir.join("ledger.sqlite3");
    let conn = open_db(&path).unwrap();
    SqliteCourseRepository::try_new(&conn)
        .unwrap()
        .create_course(&Course::new("CS101", "Intro to Computing"))
        .unwrap();
    path
}

fn write(path: &Path, date: &str, enrollment: &str, units: i64) {
    let conn = open_db(path).unwrap();
    SessionService::new(SqliteSessionRepository::try_new(&conn).unwrap())
        .upsert_session(&UpsertSessionRequest {
            course_code: "CS101".to_string(),
            date: date.to_string(),
            class_duration_units: 2,
            presences: vec![PresenceInput::new(enrollment, "", units)],
        })
        .unwrap();
}

fn run_writers<F>(job: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|index| {
            let job = Arc::clone(&job);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                job(index);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn writers_on_different_dates_do_not_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let path = prepare(dir.path());

    let shared = path.clone();
    run_writers(move |index| {
        write(&shared, &format!("2024-11-{:02}", index + 1), "E1", 1);
    });

    let conn = open_db(&path).unwrap();
    let sessions = SessionService::new(SqliteSessionRepository::try_new(&conn).unwrap())
        .list_sessions("CS101")
        .unwrap();
    assert_eq!(sessions.len(), WRITERS);
    assert!(sessions.iter().all(|session| session.entries.len() == 1));
}

#[test]
fn writers_on_disjoint_students_of_same_date_all_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = prepare(dir.path());

    let shared = path.clone();
    run_writers(move |index| {
        write(&shared, "2024-11-01", &format!("E{index}"), (index % 3) as i64);
    });

    let conn = open_db(&path).unwrap();
    let session = SessionService::new(SqliteSessionRepository::try_new(&conn).unwrap())
        .get_session("CS101", "2024-11-01")
        .unwrap()
        .unwrap();
    assert_eq!(session.entries.len(), WRITERS);
    for index in 0..WRITERS {
        let entry = session.entry(&format!("E{index}")).unwrap();
        assert_eq!(entry.present_units, (index % 3) as u32);
    }
}
