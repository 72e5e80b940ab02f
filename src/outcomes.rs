use crate::error::GradeError;
use crate::grading::{compare_level, weighted_average, OutcomeFactors};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;

/// Raises the student's highest level for every learning outcome linked to
/// the subject. Returns how many outcome rows were written.
pub fn track_outcomes(
    conn: &Connection,
    subject_id: &str,
    student_id: &str,
) -> Result<usize, GradeError> {
    let mut stmt = conn.prepare(
        "SELECT learning_outcome_id, level FROM subject_learning_outcomes
         WHERE subject_id = ?
         ORDER BY learning_outcome_id",
    )?;
    let links = stmt
        .query_map([subject_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if links.is_empty() {
        tracing::info!(subject_id, "no learning outcome linked to subject");
        return Ok(0);
    }

    for (outcome_id, level) in &links {
        let highest: Option<String> = conn
            .query_row(
                "SELECT highest_level FROM learning_outcome_scores
                 WHERE learning_outcome_id = ? AND student_id = ?",
                (outcome_id, student_id),
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                GradeError::NotFound(format!(
                    "learning outcome score not found for outcome {} and student {}",
                    outcome_id, student_id
                ))
            })?;

        let next = match highest.as_deref() {
            None | Some("") => level.clone(),
            Some(h) => compare_level(level, h)?,
        };

        conn.execute(
            "UPDATE learning_outcome_scores SET highest_level = ?
             WHERE learning_outcome_id = ? AND student_id = ?",
            (&next, outcome_id, student_id),
        )?;
        tracing::debug!(
            learning_outcome_id = outcome_id.as_str(),
            student_id,
            highest_level = next.as_str(),
            "outcome level updated"
        );
    }

    Ok(links.len())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeLevel {
    pub learning_outcome_id: String,
    pub code: String,
    pub name: String,
    pub highest_level: Option<String>,
    pub score: Option<f64>,
}

pub fn outcome_levels(conn: &Connection, student_id: &str) -> Result<Vec<OutcomeLevel>, GradeError> {
    let mut stmt = conn.prepare(
        "SELECT los.learning_outcome_id, lo.code, lo.name, los.highest_level, los.score
         FROM learning_outcome_scores los
         JOIN learning_outcomes lo ON lo.id = los.learning_outcome_id
         WHERE los.student_id = ?
         ORDER BY lo.code, los.learning_outcome_id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(OutcomeLevel {
                learning_outcome_id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                highest_level: r.get(3)?,
                score: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeAverage {
    pub learning_outcome_id: String,
    pub average: f64,
    pub factor_sum: f64,
    pub course_count: usize,
}

pub fn load_outcome_factors(conn: &Connection) -> Result<OutcomeFactors, GradeError> {
    let mut stmt =
        conn.prepare("SELECT key, value FROM modifications WHERE key IN ('major', 'core')")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    OutcomeFactors::from_factors(rows)
}

/// Final grades of completed enrollments averaged per learning outcome,
/// weighted by the subject-type factor. Subjects whose type has no factor
/// are skipped.
pub fn outcome_averages(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<OutcomeAverage>, GradeError> {
    let factors = load_outcome_factors(conn)?;

    let mut stmt = conn.prepare(
        "SELECT slo.learning_outcome_id, e.final_grade, s.subject_type
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         JOIN subjects s ON s.id = c.subject_id
         JOIN subject_learning_outcomes slo ON slo.subject_id = s.id
         WHERE e.student_id = ? AND e.completed = 1 AND e.final_grade IS NOT NULL",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, f64>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut samples: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for (outcome_id, grade, subject_type) in rows {
        let Some(factor) = factors.factor(&subject_type) else {
            continue;
        };
        samples.entry(outcome_id).or_default().push((grade, factor));
    }

    Ok(samples
        .into_iter()
        .filter_map(|(learning_outcome_id, s)| {
            weighted_average(&s).map(|average| OutcomeAverage {
                learning_outcome_id,
                average,
                factor_sum: s.iter().map(|&(_, f)| f).sum(),
                course_count: s.len(),
            })
        })
        .collect())
}
