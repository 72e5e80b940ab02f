use crate::error::GradeError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub status: String,
    pub completed: bool,
    pub final_grade: Option<f64>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreValue {
    pub score_type: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub id: String,
    pub name: String,
    pub credit: i64,
    pub subject_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRef {
    pub id: String,
    pub name: String,
    pub teacher_id: Option<String>,
    pub subject: SubjectRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentScores {
    #[serde(flatten)]
    pub enrollment: EnrollmentRecord,
    pub scores: Vec<ScoreValue>,
    pub course: CourseRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseScores {
    pub course_id: String,
    pub teacher_id: Option<String>,
    pub scores: Vec<ScoreValue>,
}

fn enrollment_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<EnrollmentRecord> {
    Ok(EnrollmentRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        course_id: r.get(2)?,
        status: r.get(3)?,
        completed: r.get::<_, i64>(4)? != 0,
        final_grade: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

/// Scores keyed by enrollment id, in progress/midterm/final order.
fn scores_for_enrollments(
    conn: &Connection,
    enrollment_ids: &[String],
) -> Result<HashMap<String, Vec<ScoreValue>>, GradeError> {
    let mut out: HashMap<String, Vec<ScoreValue>> = HashMap::new();
    if enrollment_ids.is_empty() {
        return Ok(out);
    }

    let placeholders = std::iter::repeat_n("?", enrollment_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT enrollment_id, score_type, score FROM scores
         WHERE enrollment_id IN ({})
         ORDER BY enrollment_id,
           CASE score_type WHEN 'progress' THEN 0 WHEN 'midterm' THEN 1 WHEN 'final' THEN 2 ELSE 3 END",
        placeholders
    );
    let bind_values: Vec<Value> = enrollment_ids
        .iter()
        .map(|id| Value::Text(id.clone()))
        .collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind_values), |r| {
            Ok((
                r.get::<_, String>(0)?,
                ScoreValue {
                    score_type: r.get(1)?,
                    score: r.get(2)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (enrollment_id, score) in rows {
        out.entry(enrollment_id).or_default().push(score);
    }
    Ok(out)
}

/// Every enrollment of the student with its scores and course/subject,
/// optionally restricted to one subject.
pub fn get_score(
    conn: &Connection,
    student_id: &str,
    subject_id: Option<&str>,
) -> Result<Vec<EnrollmentScores>, GradeError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.student_id, e.course_id, e.status, e.completed, e.final_grade, e.updated_at,
                c.name, c.teacher_id, s.id, s.name, s.credit, s.subject_type
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         JOIN subjects s ON s.id = c.subject_id
         WHERE e.student_id = ?1 AND (?2 IS NULL OR s.id = ?2)
         ORDER BY e.rowid",
    )?;
    let rows = stmt
        .query_map((student_id, subject_id), |r| {
            let enrollment = enrollment_from_row(r)?;
            let course = CourseRef {
                id: enrollment.course_id.clone(),
                name: r.get(7)?,
                teacher_id: r.get(8)?,
                subject: SubjectRef {
                    id: r.get(9)?,
                    name: r.get(10)?,
                    credit: r.get(11)?,
                    subject_type: r.get(12)?,
                },
            };
            Ok((enrollment, course))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<String> = rows.iter().map(|(e, _)| e.id.clone()).collect();
    let mut scores = scores_for_enrollments(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|(enrollment, course)| EnrollmentScores {
            scores: scores.remove(&enrollment.id).unwrap_or_default(),
            enrollment,
            course,
        })
        .collect())
}

/// Raw enrollment rows of the student, optionally for one course.
pub fn get_student_score(
    conn: &Connection,
    student_id: &str,
    course_id: Option<&str>,
) -> Result<Vec<EnrollmentRecord>, GradeError> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, course_id, status, completed, final_grade, updated_at
         FROM enrollments
         WHERE student_id = ?1 AND (?2 IS NULL OR course_id = ?2)
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map((student_id, course_id), enrollment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Per-course score sheet of an existing student. The course, when given,
/// must exist as well.
pub fn get_student_score_by_id(
    conn: &Connection,
    student_id: &str,
    course_id: Option<&str>,
) -> Result<Vec<CourseScores>, GradeError> {
    let student_exists = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !student_exists {
        return Err(GradeError::NotFound("student not found".to_string()));
    }
    if let Some(course_id) = course_id {
        let course_exists = conn
            .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if !course_exists {
            return Err(GradeError::NotFound("course not found".to_string()));
        }
    }

    let mut stmt = conn.prepare(
        "SELECT e.id, e.course_id, c.teacher_id
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         WHERE e.student_id = ?1 AND (?2 IS NULL OR e.course_id = ?2)
         ORDER BY e.rowid",
    )?;
    let rows = stmt
        .query_map((student_id, course_id), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<String> = rows.iter().map(|(id, _, _)| id.clone()).collect();
    let mut scores = scores_for_enrollments(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|(enrollment_id, course_id, teacher_id)| CourseScores {
            course_id,
            teacher_id,
            scores: scores.remove(&enrollment_id).unwrap_or_default(),
        })
        .collect())
}
