mod common;

use std::fs;

use assert_cmd::Command;
use common::{GRAD_SURVEY, TestWorkspace, fixture_path};
use predicates::{prelude::PredicateBooleanExt, str::contains};
use survey_profiler::schema::{ColumnRole, SurveySchema};

fn profiler() -> Command {
    Command::cargo_bin("survey-profiler").expect("binary exists")
}

fn fixture() -> String {
    fixture_path(GRAD_SURVEY).to_string_lossy().into_owned()
}

#[test]
fn classify_writes_schema_and_prints_diagnostics() {
    let workspace = TestWorkspace::new();
    let schema_path = workspace.path().join("survey.schema.yml");
    profiler()
        .args(["classify", "-i", &fixture(), "-o", schema_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Survey Version"))
        .stdout(contains("header contains 'version'"))
        .stdout(contains("grad_type (degree values)"))
        .stdout(contains("multi-select categorical"));

    let schema = SurveySchema::load(&schema_path).expect("load schema");
    assert_eq!(schema.identifiers.get(ColumnRole::GradType), Some("Degree program"));
    assert_eq!(schema.useful_columns.len(), 3);
}

#[test]
fn classify_print_emits_yaml() {
    profiler()
        .args(["classify", "-i", &fixture(), "--print"])
        .assert()
        .success()
        .stdout(contains("useful_columns:"))
        .stdout(contains("question: Tools you use"));
}

#[test]
fn tally_multi_select_as_json() {
    let output = profiler()
        .args([
            "tally",
            "-i",
            &fixture(),
            "-t",
            "Tools you use",
            "-b",
            "Degree program",
            "--input-type",
            "multi-select",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(value["valid_count"], 11);
    assert_eq!(value["input_type"], "multi-select");
    assert_eq!(value["overall"][0][0], "Python");
    assert_eq!(value["overall"][0][1], 9);
    assert_eq!(value["by_group"]["MS"][1][1], 3);
    assert_eq!(value["group_sizes"]["PhD"], 6);
}

#[test]
fn tally_single_select_renders_table() {
    profiler()
        .args(["tally", "-i", &fixture(), "-t", "Satisfaction"])
        .assert()
        .success()
        .stdout(contains("\"Satisfaction\" [single-select]"))
        .stdout(contains("Valid responses = 12"))
        .stdout(contains("41.67%"));
}

#[test]
fn tally_rejects_unknown_input_type() {
    profiler()
        .args([
            "tally",
            "-i",
            &fixture(),
            "-t",
            "Satisfaction",
            "--input-type",
            "ranked",
        ])
        .assert()
        .failure()
        .stderr(contains("unknown input type 'ranked'"));
}

#[test]
fn tally_reports_missing_column() {
    profiler()
        .args(["tally", "-i", &fixture(), "-t", "Campus"])
        .assert()
        .failure()
        .stderr(contains("column 'Campus' not found in table"));
}

#[test]
fn report_groups_by_grad_type_by_default() {
    profiler()
        .args(["report", "-i", &fixture()])
        .assert()
        .success()
        .stdout(contains("\"Tools you use\" by \"Degree program\" [multi-select]"))
        .stdout(contains("\"Hours of sleep\" by \"Degree program\" [numeric, bar]"))
        .stdout(contains("\"Satisfaction\" by \"Degree program\" [single-select]"));
}

#[test]
fn report_uses_saved_schema_and_line_summaries() {
    let workspace = TestWorkspace::new();
    let schema_path = workspace.write(
        "schema.yml",
        "identifiers:\n  grad_type: Degree program\n\
         useful_columns:\n  - question: Hours of sleep\n    input_type: single-select\n    value_type: numeric\n",
    );
    profiler()
        .args([
            "report",
            "-i",
            &fixture(),
            "-s",
            schema_path.to_str().unwrap(),
            "--numeric-kind",
            "line",
        ])
        .assert()
        .success()
        .stdout(contains("[numeric, line]"))
        .stdout(contains("std_dev"))
        .stdout(contains("Satisfaction").not());
}

#[test]
fn report_rejects_schema_naming_absent_column() {
    let workspace = TestWorkspace::new();
    let schema_path = workspace.write(
        "schema.yml",
        "useful_columns:\n  - question: Campus\n    input_type: single-select\n    value_type: categorical\n",
    );
    profiler()
        .args([
            "report",
            "-i",
            &fixture(),
            "-s",
            schema_path.to_str().unwrap(),
            "-b",
            "Degree program",
        ])
        .assert()
        .failure()
        .stderr(contains("Question 'Campus' is not a column of the survey"));
}

#[test]
fn population_shows_identifier_distribution() {
    profiler()
        .args(["population", "-i", &fixture()])
        .assert()
        .success()
        .stdout(contains("Population distribution"))
        .stdout(contains("is_undergrad"))
        .stdout(contains("\"Year in program\" by \"Degree program\""));
}

#[test]
fn semicolon_survey_is_read_from_stdin() {
    let csv = fs::read_to_string(fixture_path(GRAD_SURVEY))
        .expect("read fixture")
        .replace("\"['Python', 'R']\"", "['Python'|'R']")
        .replace("\"['Python', 'SQL']\"", "['Python'|'SQL']")
        .replace(',', ";")
        .replace('|', ",");
    profiler()
        .args([
            "tally",
            "-i",
            "-",
            "--delimiter",
            ";",
            "-t",
            "Tools you use",
            "--input-type",
            "multi",
        ])
        .write_stdin(csv)
        .assert()
        .success()
        .stdout(contains("Valid responses = 11"));
}

#[test]
fn classify_saves_schema_for_repeated_headers() {
    let workspace = TestWorkspace::new();
    let csv_path = workspace.write(
        "repeated.csv",
        "Q,Q\nyes,red\nyes,red\nno,red\nyes,blue\nyes,red\n",
    );
    let schema_path = workspace.path().join("repeated.schema.yml");
    profiler()
        .args([
            "classify",
            "-i",
            csv_path.to_str().unwrap(),
            "-o",
            schema_path.to_str().unwrap(),
        ])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(contains("Duplicate header 'Q' renamed to 'Q.1'"));

    let schema = SurveySchema::load(&schema_path).expect("load schema");
    assert!(schema.question("Q.1").is_some());
}
