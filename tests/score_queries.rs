mod test_support;

use rusqlite::Connection;
use serde_json::json;
use std::io::BufReader;
use std::path::Path;
use std::process::{ChildStdin, ChildStdout};
use test_support::{db_path, request, request_ok, spawn_sidecar, temp_dir};

fn seed_school(workspace: &Path) {
    let conn = Connection::open(db_path(workspace)).expect("open db");
    conn.execute_batch(
        "INSERT INTO students(id, full_name, status, credit) VALUES('s1', 'Student One', 'active', 0);
         INSERT INTO students(id, full_name, status, credit) VALUES('s2', 'Student Two', 'active', 0);
         INSERT INTO teachers(id, full_name, status) VALUES('t1', 'Teacher One', 'active');
         INSERT INTO teachers(id, full_name, status) VALUES('t2', 'Teacher Two', 'active');
         INSERT INTO subjects(id, name, credit, subject_type, active) VALUES('sub1', 'Algebra', 3, 'major', 1);
         INSERT INTO subjects(id, name, credit, subject_type, active) VALUES('sub2', 'Writing', 2, 'core', 1);
         INSERT INTO courses(id, name, subject_id, teacher_id, active) VALUES('c1', 'Algebra A', 'sub1', 't1', 1);
         INSERT INTO courses(id, name, subject_id, teacher_id, active) VALUES('c2', 'Writing A', 'sub2', 't2', 1);
         INSERT INTO enrollments(id, student_id, course_id, status, completed) VALUES('e1', 's1', 'c1', 'enrolled', 0);
         INSERT INTO enrollments(id, student_id, course_id, status, completed) VALUES('e2', 's1', 'c2', 'enrolled', 0);
         INSERT INTO enrollments(id, student_id, course_id, status, completed) VALUES('e3', 's2', 'c1', 'enrolled', 0);
         INSERT INTO modifications(key, value) VALUES('progress', 0.2), ('midterm', 0.3), ('final', 0.5);",
    )
    .expect("seed school");
}

fn grade(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student_id: &str,
    course_id: &str,
    teacher_id: &str,
    score: serde_json::Value,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "scores.grade",
        json!({
            "studentId": student_id,
            "courseId": course_id,
            "teacherId": teacher_id,
            "score": score
        }),
    );
}

#[test]
fn score_projections_join_and_filter_without_mutation() {
    let workspace = temp_dir("gradebook-queries");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_school(&workspace);

    grade(
        &mut stdin,
        &mut reader,
        "2",
        "s1",
        "c1",
        "t1",
        json!([
            { "scoreType": "final", "score": 9 },
            { "scoreType": "progress", "score": 8 }
        ]),
    );
    grade(
        &mut stdin,
        &mut reader,
        "3",
        "s1",
        "c2",
        "t2",
        json!([{ "scoreType": "midterm", "score": 6.5 }]),
    );
    grade(
        &mut stdin,
        &mut reader,
        "4",
        "s2",
        "c1",
        "t1",
        json!([{ "scoreType": "midterm", "score": 3 }]),
    );

    let all = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "scores.get",
        json!({ "studentId": "s1" }),
    );
    let enrollments = all["enrollments"].as_array().cloned().unwrap_or_default();
    assert_eq!(enrollments.len(), 2);
    assert_eq!(enrollments[0]["id"], "e1");
    assert_eq!(enrollments[0]["course"]["subject"]["name"], "Algebra");
    let e1_scores = enrollments[0]["scores"].as_array().cloned().unwrap_or_default();
    assert_eq!(e1_scores.len(), 2);
    assert_eq!(e1_scores[0]["scoreType"], "progress");
    assert_eq!(e1_scores[1]["scoreType"], "final");
    assert_eq!(e1_scores[1]["score"].as_f64(), Some(9.0));

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "scores.get",
        json!({ "studentId": "s1", "subjectId": "sub2" }),
    );
    let enrollments = filtered["enrollments"].as_array().cloned().unwrap_or_default();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0]["courseId"], "c2");
    assert_eq!(enrollments[0]["completed"].as_bool(), Some(false));

    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "scores.studentScores",
        json!({ "studentId": "s1", "courseId": "c1" }),
    );
    let rows = rows["rows"].as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "e1");
    assert!(rows[0]["finalGrade"].is_null());

    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "scores.studentScores",
        json!({ "studentId": "s2" }),
    );
    assert_eq!(rows["rows"].as_array().map(|a| a.len()), Some(1));

    let missing = request(
        &mut stdin,
        &mut reader,
        "9",
        "scores.studentScores",
        json!({}),
    );
    assert_eq!(missing["error"]["code"], "invalid_input");

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "scores.studentScoreById",
        json!({ "studentId": "s1", "courseId": "c2" }),
    );
    assert_eq!(sheet["enrollment"]["courseId"], "c2");
    assert_eq!(sheet["enrollment"]["teacherId"], "t2");
    assert_eq!(sheet["enrollment"]["scores"][0]["score"].as_f64(), Some(6.5));

    let sheets = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "scores.studentScoreById",
        json!({ "studentId": "s1" }),
    );
    assert_eq!(sheets["enrollments"].as_array().map(|a| a.len()), Some(2));

    let unknown = request(
        &mut stdin,
        &mut reader,
        "12",
        "scores.studentScoreById",
        json!({ "studentId": "s9" }),
    );
    assert_eq!(unknown["error"]["code"], "not_found");

    let unknown_course = request(
        &mut stdin,
        &mut reader,
        "13",
        "scores.studentScoreById",
        json!({ "studentId": "s1", "courseId": "c9" }),
    );
    assert_eq!(unknown_course["error"]["code"], "not_found");

    let conn = Connection::open(db_path(&workspace)).expect("open db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM scores", [], |r| r.get(0))
        .expect("count");
    assert_eq!(count, 4);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
