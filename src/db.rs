use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            credit INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            credit INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    // Older workspaces predate outcome categories on subjects.
    ensure_subjects_type(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_subject ON courses(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'enrolled',
            completed INTEGER NOT NULL DEFAULT 0,
            final_grade REAL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            UNIQUE(student_id, course_id)
        )",
        [],
    )?;
    ensure_enrollments_updated_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores(
            id TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL,
            score_type TEXT NOT NULL,
            score REAL NOT NULL,
            teacher_id TEXT,
            updated_at TEXT,
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            UNIQUE(enrollment_id, score_type)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_enrollment ON scores(enrollment_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS modifications(
            key TEXT PRIMARY KEY,
            value REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_outcomes(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_learning_outcomes(
            subject_id TEXT NOT NULL,
            learning_outcome_id TEXT NOT NULL,
            level TEXT NOT NULL,
            PRIMARY KEY(subject_id, learning_outcome_id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(learning_outcome_id) REFERENCES learning_outcomes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_learning_outcomes_outcome ON subject_learning_outcomes(learning_outcome_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_outcome_scores(
            id TEXT PRIMARY KEY,
            learning_outcome_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            highest_level TEXT,
            score REAL,
            FOREIGN KEY(learning_outcome_id) REFERENCES learning_outcomes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(learning_outcome_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_learning_outcome_scores_student ON learning_outcome_scores(student_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_subjects_type(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "subjects", "subject_type")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE subjects ADD COLUMN subject_type TEXT NOT NULL DEFAULT 'core'",
        [],
    )?;
    Ok(())
}

fn ensure_enrollments_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
