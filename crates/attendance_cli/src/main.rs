//! Command-line front end for the attendance ledger.
//!
//! # Responsibility
//! - Map subcommands onto `attendance_core` services.
//! - Print one JSON envelope per invocation:
//!   `{"ok":true,"data":...}` or `{"ok":false,"status":...,"reason":...,"message":...}`.
//!
//! # Invariants
//! - Exit code is non-zero whenever `ok` is false.

use attendance_core::{
    init_logging, open_db_with_options, AggregationMode, AggregationQuery, AggregationService,
    ConfigError, CourseService, DateWindow, DbError, Faculty, LedgerConfig, LedgerError,
    LoggingError, PresenceInput, PresencePolicy, QueryContext, RepoError, RosterService,
    SessionDate, SessionService, SqliteCourseRepository, SqliteRosterRepository,
    SqliteSessionRepository, Student, UpsertSessionRequest,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "attendance", version, about = "Attendance ledger")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path (overrides the config file).
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Reject out-of-range presence counts instead of clamping them.
    #[arg(long, global = true)]
    strict_presence: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a course.
    CourseAdd { code: String, name: String },
    /// List all courses.
    Courses,
    /// Show one course with its roster.
    Course { code: String },
    /// Change a course's code and name; sessions and roster follow.
    CourseUpdate {
        code: String,
        new_code: String,
        new_name: String,
    },
    /// Delete a course and all of its sessions.
    CourseDelete { code: String },
    /// Register or update a student.
    StudentAdd {
        enrollment: String,
        name: String,
        email: String,
        department: String,
        batch: String,
    },
    /// Register a faculty member.
    FacultyAdd {
        name: String,
        email: String,
        department: String,
    },
    /// Delete a faculty member; their courses become unassigned.
    FacultyDelete { email: String },
    /// List the faculty of one department.
    Faculties {
        #[arg(long)]
        department: String,
    },
    /// Assign a course to the faculty member with this email.
    AssignFaculty { course: String, faculty_email: String },
    /// Replace a course roster with the given students.
    SelectStudents {
        course: String,
        #[arg(required = true)]
        enrollments: Vec<String>,
    },
    /// Record attendance: `ENROLLMENT=UNITS` pairs.
    Mark {
        course: String,
        date: String,
        #[arg(allow_negative_numbers = true)]
        duration: i64,
        #[arg(value_parser = parse_presence)]
        presences: Vec<PresenceInput>,
    },
    /// Show the session held on a date.
    Show { course: String, date: String },
    /// List all sessions of a course.
    Sessions { course: String },
    /// Delete the session held on a date.
    Delete { course: String, date: String },
    /// Course summary, or one student's summary with `--student`.
    Summary {
        course: String,
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        current_roster: bool,
        #[arg(long)]
        min_percentage: Option<u32>,
        #[arg(long)]
        ranked: bool,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Per-session records for one student.
    Records {
        course: String,
        student: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Summaries across every course of one student.
    StudentRollup {
        student: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Build the query-adapter payload for a student or faculty member.
    Context {
        query: String,
        #[arg(long, conflicts_with = "faculty_email", required_unless_present = "faculty_email")]
        student: Option<String>,
        #[arg(long)]
        faculty_email: Option<String>,
    },
}

#[derive(Debug, Args)]
struct WindowArgs {
    /// First date included (`YYYY-MM-DD`).
    #[arg(long)]
    from: Option<String>,
    /// Last date included (`YYYY-MM-DD`).
    #[arg(long)]
    to: Option<String>,
}

impl WindowArgs {
    fn to_window(&self) -> Result<DateWindow, LedgerError> {
        let window = DateWindow {
            from: self.from.as_deref().map(SessionDate::parse).transpose()?,
            to: self.to.as_deref().map(SessionDate::parse).transpose()?,
        };
        window.validate()?;
        Ok(window)
    }
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Config(ConfigError),
    Db(DbError),
    Logging(LoggingError),
    Ledger(LedgerError),
    Output(serde_json::Error),
}

impl CliError {
    fn status(&self) -> u16 {
        match self {
            Self::Usage(_) | Self::Config(_) | Self::Logging(_) => 400,
            Self::Ledger(err) => err.status_code(),
            Self::Db(_) | Self::Output(_) => 500,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            Self::Config(_) => "invalid_config",
            Self::Logging(_) => "logging_unavailable",
            Self::Db(_) => "storage_failure",
            Self::Ledger(err) => err.reason(),
            Self::Output(_) => "output_failure",
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "{err}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<LedgerError> for CliError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Ledger(value.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(data) => {
            println!("{}", json!({ "ok": true, "data": data }));
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!(
                "{}",
                json!({
                    "ok": false,
                    "status": err.status(),
                    "reason": err.reason(),
                    "message": err.to_string(),
                })
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Value, CliError> {
    let config = resolve_config(cli)?;
    if let Some(dir) = &config.logging.dir {
        init_logging(config.log_level(), dir)?;
    }

    let started_at = Instant::now();
    let conn = open_db_with_options(&config.database_path, &config.db_options())?;
    let data = dispatch(&conn, &cli.command, config.presence_policy)?;
    info!(
        "event=cli_command module=cli status=ok command={} duration_ms={}",
        command_name(&cli.command),
        started_at.elapsed().as_millis()
    );
    Ok(data)
}

fn resolve_config(cli: &Cli) -> Result<LedgerConfig, CliError> {
    let mut config = match (&cli.config, &cli.db) {
        (Some(path), _) => LedgerConfig::load(path)?,
        (None, Some(db)) => LedgerConfig::new(db.clone()),
        (None, None) => {
            return Err(CliError::Usage(
                "either --config or --db is required".to_string(),
            ))
        }
    };

    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = Some(level.clone());
    }
    if cli.strict_presence {
        config.presence_policy = PresencePolicy::Reject;
    }
    config.validate()?;
    Ok(config)
}

fn dispatch(conn: &Connection, command: &Command, policy: PresencePolicy) -> Result<Value, CliError> {
    let roster = || -> Result<_, CliError> {
        Ok(RosterService::new(SqliteRosterRepository::try_new(conn)?))
    };
    let courses = || -> Result<_, CliError> {
        Ok(CourseService::new(
            SqliteCourseRepository::try_new(conn)?,
            SqliteRosterRepository::try_new(conn)?,
        ))
    };
    let sessions = || -> Result<_, CliError> {
        Ok(SessionService::with_policy(
            SqliteSessionRepository::try_new(conn)?,
            policy,
        ))
    };
    let aggregation = || -> Result<_, CliError> {
        Ok(AggregationService::new(
            SqliteCourseRepository::try_new(conn)?,
            SqliteSessionRepository::try_new(conn)?,
        ))
    };

    match command {
        Command::CourseAdd { code, name } => to_json(&courses()?.create_course(code, name)?),
        Command::Courses => to_json(&courses()?.list_courses()?),
        Command::Course { code } => to_json(&courses()?.get_course(code)?),
        Command::CourseUpdate {
            code,
            new_code,
            new_name,
        } => to_json(&courses()?.update_course(code, new_code, new_name)?),
        Command::CourseDelete { code } => {
            courses()?.delete_course(code)?;
            Ok(json!({ "deleted": code }))
        }
        Command::StudentAdd {
            enrollment,
            name,
            email,
            department,
            batch,
        } => {
            let student = Student {
                enrollment_number: enrollment.trim().to_string(),
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                department: department.trim().to_string(),
                batch: batch.trim().to_string(),
            };
            roster()?.register_student(&student)?;
            to_json(&student)
        }
        Command::FacultyAdd {
            name,
            email,
            department,
        } => {
            let faculty = Faculty::new(name.as_str(), email.as_str(), department.as_str());
            roster()?.register_faculty(&faculty)?;
            to_json(&faculty)
        }
        Command::FacultyDelete { email } => to_json(&roster()?.delete_faculty(email)?),
        Command::Faculties { department } => {
            to_json(&roster()?.find_faculty_by_department(department)?)
        }
        Command::AssignFaculty {
            course,
            faculty_email,
        } => {
            let faculty = roster()?.get_faculty_by_email(faculty_email)?;
            to_json(&courses()?.assign_faculty(course, faculty.id)?)
        }
        Command::SelectStudents {
            course,
            enrollments,
        } => to_json(&courses()?.select_students(course, enrollments)?),
        Command::Mark {
            course,
            date,
            duration,
            presences,
        } => to_json(&sessions()?.upsert_session(&UpsertSessionRequest {
            course_code: course.clone(),
            date: date.clone(),
            class_duration_units: *duration,
            presences: presences.clone(),
        })?),
        Command::Show { course, date } => to_json(&sessions()?.get_session(course, date)?),
        Command::Sessions { course } => to_json(&sessions()?.list_sessions(course)?),
        Command::Delete { course, date } => {
            sessions()?.delete_session(course, date)?;
            Ok(json!({ "deleted": { "courseCode": course, "date": date } }))
        }
        Command::Summary {
            course,
            student,
            current_roster,
            min_percentage,
            ranked,
            window,
        } => {
            let window = window.to_window()?;
            if let Some(student) = student {
                return to_json(&aggregation()?.compute_student_summary(course, student, &window)?);
            }
            let query = AggregationQuery {
                mode: if *current_roster {
                    AggregationMode::CurrentRoster
                } else {
                    AggregationMode::AllHistorical
                },
                window,
                min_percentage: *min_percentage,
            };
            let mut summary = aggregation()?.compute_course_summary(course, &query)?;
            if *ranked {
                summary.students = summary.ranked().into_iter().cloned().collect();
            }
            to_json(&summary)
        }
        Command::Records {
            course,
            student,
            window,
        } => to_json(&aggregation()?.student_records(course, student, &window.to_window()?)?),
        Command::StudentRollup { student, window } => {
            to_json(&aggregation()?.student_rollup(student, &window.to_window()?)?)
        }
        Command::Context {
            query,
            student,
            faculty_email,
        } => {
            let context = match (student, faculty_email) {
                (Some(enrollment), _) => {
                    let student = roster()?.get_student(enrollment)?;
                    let rollup = aggregation()?
                        .student_rollup(&student.enrollment_number, &DateWindow::all())?;
                    QueryContext::for_student(&student, query.as_str(), &rollup)
                }
                (None, Some(email)) => {
                    let faculty = roster()?.get_faculty_by_email(email)?;
                    let summaries =
                        aggregation()?.faculty_rollup(faculty.id, &AggregationQuery::default())?;
                    QueryContext::for_faculty(&faculty, query.as_str(), summaries)
                }
                (None, None) => {
                    return Err(CliError::Usage(
                        "either --student or --faculty-email is required".to_string(),
                    ))
                }
            };
            to_json(&context)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    Ok(serde_json::to_value(value)?)
}

/// Parses `ENROLLMENT=UNITS`.
fn parse_presence(raw: &str) -> Result<PresenceInput, String> {
    let (enrollment, units) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ENROLLMENT=UNITS, got `{raw}`"))?;
    let units = units
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("invalid unit count in `{raw}`: {err}"))?;
    Ok(PresenceInput::new(enrollment.trim(), "", units))
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::CourseAdd { .. } => "course_add",
        Command::Courses => "courses",
        Command::Course { .. } => "course",
        Command::CourseUpdate { .. } => "course_update",
        Command::CourseDelete { .. } => "course_delete",
        Command::StudentAdd { .. } => "student_add",
        Command::FacultyAdd { .. } => "faculty_add",
        Command::FacultyDelete { .. } => "faculty_delete",
        Command::Faculties { .. } => "faculties",
        Command::AssignFaculty { .. } => "assign_faculty",
        Command::SelectStudents { .. } => "select_students",
        Command::Mark { .. } => "mark",
        Command::Show { .. } => "show",
        Command::Sessions { .. } => "sessions",
        Command::Delete { .. } => "delete",
        Command::Summary { .. } => "summary",
        Command::Records { .. } => "records",
        Command::StudentRollup { .. } => "student_rollup",
        Command::Context { .. } => "context",
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_presence, Cli, Command};
    use clap::Parser;

    #[test]
    fn presence_pairs_parse() {
        let presence = parse_presence(" E1 = 2").unwrap();
        assert_eq!(presence.enrollment_number, "E1");
        assert_eq!(presence.present_units, 2);
        assert!(parse_presence("E1").is_err());
        assert!(parse_presence("E1=two").is_err());
    }

    #[test]
    fn mark_command_collects_presence_pairs() {
        let cli = Cli::try_parse_from([
            "attendance",
            "--db",
            "/tmp/ledger.sqlite3",
            "mark",
            "CS101",
            "2024-11-01",
            "2",
            "E1=2",
            "E2=1",
        ])
        .unwrap();
        assert!(cli.db.is_some());
    }

    #[test]
    fn mark_accepts_negative_duration_as_value() {
        let cli = Cli::try_parse_from([
            "attendance",
            "--db",
            "/tmp/ledger.sqlite3",
            "mark",
            "CS101",
            "2024-11-01",
            "-1",
            "E1=1",
        ])
        .unwrap();
        match cli.command {
            Command::Mark {
                duration,
                presences,
                ..
            } => {
                assert_eq!(duration, -1);
                assert_eq!(presences.len(), 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn course_update_and_faculty_commands_parse() {
        let cli = Cli::try_parse_from([
            "attendance",
            "--db",
            "/tmp/ledger.sqlite3",
            "course-update",
            "CS101",
            "CS102",
            "Intro to Programming",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::CourseUpdate { ref new_code, .. } if new_code == "CS102"));

        let cli = Cli::try_parse_from([
            "attendance",
            "--db",
            "/tmp/ledger.sqlite3",
            "faculties",
            "--department",
            "CSE",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Faculties { ref department } if department == "CSE"));
    }
}
