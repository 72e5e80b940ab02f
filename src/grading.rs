use crate::error::GradeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;
pub const MAX_ENTRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreType {
    Progress,
    Midterm,
    Final,
}

impl ScoreType {
    pub const ALL: [ScoreType; 3] = [ScoreType::Progress, ScoreType::Midterm, ScoreType::Final];

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreType::Progress => "progress",
            ScoreType::Midterm => "midterm",
            ScoreType::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "progress" => Some(ScoreType::Progress),
            "midterm" => Some(ScoreType::Midterm),
            "final" => Some(ScoreType::Final),
            _ => None,
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEntry {
    pub score_type: ScoreType,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeSubmission {
    pub student_id: String,
    pub course_id: String,
    pub teacher_id: String,
    /// Submission order is kept; a repeated type overwrites on upsert.
    pub entries: Vec<ScoreEntry>,
}

/// Reads an identifier that may arrive as a JSON string or integer.
pub fn id_param(params: &serde_json::Value, key: &str) -> Option<String> {
    match params.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => n.as_i64().map(|v| v.to_string()),
        _ => None,
    }
}

/// Structural validation of a `scores.grade` payload. Entity checks happen
/// later against the database.
pub fn parse_submission(
    params: &serde_json::Value,
    reject_duplicate_types: bool,
) -> Result<GradeSubmission, GradeError> {
    let (Some(student_id), Some(course_id), Some(teacher_id)) = (
        id_param(params, "studentId"),
        id_param(params, "courseId"),
        id_param(params, "teacherId"),
    ) else {
        return Err(GradeError::InvalidInput(
            "missing required fields: courseId, teacherId, or studentId".to_string(),
        ));
    };

    let raw = match params.get("score").and_then(|v| v.as_array()) {
        Some(arr) if (1..=MAX_ENTRIES).contains(&arr.len()) => arr,
        _ => {
            return Err(GradeError::InvalidInput(
                "score must be an array with 1-3 elements".to_string(),
            ))
        }
    };

    let mut entries = Vec::with_capacity(raw.len());
    let mut seen: HashMap<ScoreType, usize> = HashMap::new();
    for (i, item) in raw.iter().enumerate() {
        let score_type = item.get("scoreType").and_then(|v| v.as_str());
        let value = item.get("score").and_then(|v| v.as_f64());
        let (Some(score_type), Some(value)) = (score_type, value) else {
            return Err(GradeError::InvalidInput(format!(
                "invalid score data at index {}",
                i
            )));
        };
        if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(GradeError::OutOfRange(format!(
                "score must be between 0 and 10 at index {}",
                i
            )));
        }
        let Some(score_type) = ScoreType::parse(score_type) else {
            return Err(GradeError::InvalidInput(format!(
                "invalid score type at index {}. Must be one of: progress, midterm, final",
                i
            )));
        };
        if let Some(first) = seen.insert(score_type, i) {
            if reject_duplicate_types {
                return Err(GradeError::InvalidInput(format!(
                    "duplicate score type '{}' at index {} (first at index {})",
                    score_type, i, first
                )));
            }
        }
        entries.push(ScoreEntry { score_type, value });
    }

    Ok(GradeSubmission {
        student_id,
        course_id,
        teacher_id,
        entries,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeWeights {
    pub progress: f64,
    pub midterm: f64,
    #[serde(rename = "final")]
    pub final_exam: f64,
}

impl GradeWeights {
    /// Builds weights from `modifications` rows already restricted to the
    /// three grade keys.
    pub fn from_factors<I>(rows: I) -> Result<Self, GradeError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut by_type: HashMap<ScoreType, f64> = HashMap::new();
        for (key, value) in rows {
            let Some(t) = ScoreType::parse(&key) else {
                continue;
            };
            if !value.is_finite() || value < 0.0 {
                return Err(GradeError::ConfigMissing(format!(
                    "weight factor '{}' must be a non-negative number",
                    key
                )));
            }
            by_type.insert(t, value);
        }
        match (
            by_type.get(&ScoreType::Progress),
            by_type.get(&ScoreType::Midterm),
            by_type.get(&ScoreType::Final),
        ) {
            (Some(&progress), Some(&midterm), Some(&final_exam)) => Ok(GradeWeights {
                progress,
                midterm,
                final_exam,
            }),
            _ => Err(GradeError::ConfigMissing(
                "factors not found: progress, midterm and final weights are required".to_string(),
            )),
        }
    }

    pub fn weight(&self, t: ScoreType) -> f64 {
        match t {
            ScoreType::Progress => self.progress,
            ScoreType::Midterm => self.midterm,
            ScoreType::Final => self.final_exam,
        }
    }

    pub fn final_grade(&self, scores: &[(ScoreType, f64)]) -> f64 {
        scores
            .iter()
            .fold(0.0, |acc, &(t, v)| acc + v * self.weight(t))
    }
}

/// Proficiency level such as `NT3`: an alphabetic prefix and a rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub prefix: String,
    pub rank: u32,
}

impl FromStr for Level {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (prefix, digits) = s.split_at(split);
        if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GradeError::InvalidInput(format!("malformed level '{}'", s)));
        }
        let rank = digits
            .parse::<u32>()
            .map_err(|_| GradeError::InvalidInput(format!("malformed level '{}'", s)))?;
        Ok(Level {
            prefix: prefix.to_string(),
            rank,
        })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.rank)
    }
}

/// Dominant level of `current` and `highest`. The prefix of `current` wins;
/// both are expected to share it.
pub fn compare_level(current: &str, highest: &str) -> Result<String, GradeError> {
    let current: Level = current.parse()?;
    let highest: Level = highest.parse()?;
    Ok(Level {
        rank: current.rank.max(highest.rank),
        prefix: current.prefix,
    }
    .to_string())
}

/// Outcome-category factors keyed by subject type (`major`, `core`).
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeFactors(HashMap<String, f64>);

impl OutcomeFactors {
    pub const KEYS: [&'static str; 2] = ["major", "core"];

    pub fn from_factors<I>(rows: I) -> Result<Self, GradeError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut map: HashMap<String, f64> = HashMap::new();
        for (key, value) in rows {
            if !Self::KEYS.iter().any(|k| *k == key.as_str()) {
                continue;
            }
            if !value.is_finite() || value < 0.0 {
                return Err(GradeError::ConfigMissing(format!(
                    "outcome factor '{}' must be a non-negative number",
                    key
                )));
            }
            map.insert(key, value);
        }
        if map.len() != Self::KEYS.len() {
            return Err(GradeError::ConfigMissing(
                "learning outcome score factor not found: major and core are required".to_string(),
            ));
        }
        Ok(OutcomeFactors(map))
    }

    pub fn factor(&self, subject_type: &str) -> Option<f64> {
        self.0.get(subject_type).copied()
    }
}

/// `Σ grade·factor / Σ factor`; `None` when there is nothing to weigh.
pub fn weighted_average(samples: &[(f64, f64)]) -> Option<f64> {
    let factor_sum: f64 = samples.iter().map(|&(_, f)| f).sum();
    if samples.is_empty() || factor_sum <= 0.0 {
        return None;
    }
    let weighted: f64 = samples.iter().map(|&(g, f)| g * f).sum();
    Some(weighted / factor_sum)
}
