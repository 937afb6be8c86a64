use assert_cmd::Command;
use predicates::str::contains;
use serde_json::{json, Value};
use std::fs;

/// Run allochart with a DSL string and data on stdin, returning the parsed chart
fn run_allochart(args: &[&str], input: &str) -> Value {
    let output = Command::cargo_bin("allochart")
        .unwrap()
        .args(args)
        .write_stdin(input)
        .output()
        .expect("Failed to run allochart");
    assert!(
        output.status.success(),
        "Failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("Output is not valid JSON")
}

fn patients_csv() -> String {
    fs::read_to_string("test/patients.csv").expect("Failed to read test CSV")
}

fn series_named<'a>(chart: &'a Value, name: &str) -> &'a Value {
    chart["series"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .unwrap_or_else(|| panic!("no series named {}", name))
}

#[test]
fn test_end_to_end_cumulative_chart() {
    let chart = run_allochart(&["cumulative(x: Year)"], &patients_csv());
    assert_eq!(chart["title"], "Distribution et cumul des effectifs");
    assert_eq!(chart["width"], 1500);

    let bars = &chart["series"][0];
    assert_eq!(bars["kind"], "bar");
    assert_eq!(bars["x"], json!(["2020", "2021", "2022"]));
    assert_eq!(bars["y"], json!([2.0, 3.0, 3.0]));

    let line = &chart["series"][1];
    assert_eq!(line["kind"], "line");
    assert_eq!(line["y_axis"], "y2");
    assert_eq!(line["y"], json!([2.0, 5.0, 8.0]));
    assert_eq!(chart["y2_axis"]["title"], "Effectif cumulé");
}

#[test]
fn test_end_to_end_normalized_stacked_chart() {
    let chart = run_allochart(
        &[r#"stacked(x: "Age Group", stack: Sex, normalize: true) | labs(title: "Sexe par âge")"#],
        &patients_csv(),
    );
    assert_eq!(chart["title"], "Sexe par âge");
    assert_eq!(chart["grouping"], "stack");
    assert_eq!(chart["y_axis"]["range"], json!([0.0, 100.0]));

    let female = series_named(&chart, "F");
    assert_eq!(female["x"], json!(["0-18", "19-40", "41-60", "61+"]));
    assert_eq!(female["y"], json!([0.0, 100.0, 50.0, 50.0]));
    assert_eq!(female["text"], json!(["", "100.0% (2)", "50.0% (1)", "50.0% (1)"]));
    assert_eq!(chart["warnings"][0]["kind"], "missing_values");
}

#[test]
fn test_missing_values_are_reported_on_stderr() {
    Command::cargo_bin("allochart")
        .unwrap()
        .arg(r#"stacked(x: "Age Group", stack: Sex)"#)
        .write_stdin(patients_csv())
        .assert()
        .success()
        .stderr(contains("Warning: 1 record(s) with a missing 'Age Group' value were skipped"));
}

#[test]
fn test_end_to_end_boxplot() {
    let chart = run_allochart(
        &[r#"boxplot(x: "Main Diagnosis", y: "Age At Diagnosis", zero: true)"#],
        &patients_csv(),
    );
    let names: Vec<&str> = chart["series"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "Acute lymphoblastic leukemia",
            "Acute myeloid leukemia",
            "Myelodysplastic syndrome"
        ]
    );
    let aml = series_named(&chart, "Acute myeloid leukemia");
    assert_eq!(aml["kind"], "box");
    assert_eq!(aml["y"], json!([38.0, 49.0, 70.0]));
    assert_eq!(chart["y_axis"]["range"][0], 0.0);
}

#[test]
fn test_end_to_end_yes_no_chart() {
    let chart = run_allochart(&[r#"yesno(columns: ["TBI"])"#], &patients_csv());
    let yes = series_named(&chart, "Oui");
    assert_eq!(yes["text"], json!(["37.5% (3)"]));
    // The blank TBI cell counts as "Non"
    let no = series_named(&chart, "Non");
    assert_eq!(no["text"], json!(["62.5% (5)"]));

    let chart = run_allochart(&[r#"yesno(columns: ["TBI"], missing_as_no: false)"#], &patients_csv());
    assert_eq!(series_named(&chart, "Oui")["text"], json!(["42.9% (3)"]));
}

#[test]
fn test_json_input() {
    let input = fs::read_to_string("test/patients.json").expect("Failed to read test JSON");
    let chart = run_allochart(
        &["--input", "json", r#"stacked(x: "Age Group", stack: "Main Diagnosis", normalize: true)"#],
        &input,
    );
    let aml = series_named(&chart, "AML");
    assert_eq!(aml["y"], json!([50.0, 100.0]));
    assert_eq!(aml["text"], json!(["50.0% (1)", "100.0% (1)"]));
}

#[test]
fn test_cli_size_and_compact_output() {
    let output = Command::cargo_bin("allochart")
        .unwrap()
        .args(["--width", "640", "--compact", "count(x: Sex) | size(width: 1000, height: 300)"])
        .write_stdin(patients_csv())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim_end().lines().count(), 1);
    let chart: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(chart["width"], 640);
    assert_eq!(chart["height"], 300);
}

#[test]
fn test_empty_input_gives_empty_chart() {
    let input = fs::read_to_string("test/empty.json").unwrap();
    Command::cargo_bin("allochart")
        .unwrap()
        .args(["--input", "json", "bar(x: Center, y: Transplants)"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(contains("\"series\": []"))
        .stderr(contains("Warning: dataset is empty"));
}

#[test]
fn test_missing_column_fails() {
    Command::cargo_bin("allochart")
        .unwrap()
        .arg("count(x: Center)")
        .write_stdin(patients_csv())
        .assert()
        .failure()
        .stderr(contains("Column 'Center' not found"));
}

#[test]
fn test_missing_value_fails() {
    let input = fs::read_to_string("test/centers.csv").unwrap();
    Command::cargo_bin("allochart")
        .unwrap()
        .arg("bar(x: Center, y: Transplants)")
        .write_stdin(input)
        .assert()
        .failure()
        .stderr(contains("Column 'Transplants' row 2: value is missing"));
}

#[test]
fn test_non_numeric_value_fails() {
    let input = fs::read_to_string("test/centers_text.csv").unwrap();
    Command::cargo_bin("allochart")
        .unwrap()
        .arg("bar(x: Center, y: Transplants)")
        .write_stdin(input)
        .assert()
        .failure()
        .stderr(contains("cannot use 'n/a' as a number"));
}

#[test]
fn test_end_to_end_duration_histogram() {
    let input = fs::read_to_string("test/aplasia.csv").unwrap();
    let chart = run_allochart(
        &[r#"filter(column: Year, values: [2021, 2022]) | histogram(start: "Treatment Date", end: "Date Anc Recovery", only: "Anc Recovery", equals: Oui, bin: 2, limit: false)"#],
        &input,
    );
    let bars = chart["series"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["kind"] == "bar")
        .unwrap();
    assert_eq!(bars["x"], json!(["15", "17", "19", "21"]));
    assert_eq!(bars["y"], json!([2.0, 1.0, 0.0, 1.0]));
    assert_eq!(chart["x_axis"]["title"], "Jours");
}

#[test]
fn test_end_to_end_prophylaxis_chart() {
    let input = fs::read_to_string("test/aplasia.csv").unwrap();
    let chart = run_allochart(&[r#"prophylaxis(columns: ["ATG", "Ciclosporine"])"#], &input);
    let bars = &chart["series"][0];
    assert_eq!(bars["x"], json!(["Ciclosporine", "ATG"]));
    assert_eq!(bars["text"], json!(["83.3% (5)", "40.0% (2)"]));
}

#[test]
fn test_parse_error_fails() {
    Command::cargo_bin("allochart")
        .unwrap()
        .arg("pie(x: Year)")
        .write_stdin(patients_csv())
        .assert()
        .failure()
        .stderr(contains("Unknown command 'pie'"));
}

#[test]
fn test_unknown_input_format_fails() {
    Command::cargo_bin("allochart")
        .unwrap()
        .args(["--input", "xml", "count(x: Year)"])
        .write_stdin(patients_csv())
        .assert()
        .failure();
}
