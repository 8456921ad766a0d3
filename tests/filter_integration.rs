use std::path::Path;
use std::process::Command;

const AREAS_FIXTURE: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        { "type": "Feature",
          "geometry": { "type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]] },
          "properties": { "name": "small" } },
        { "type": "Feature",
          "geometry": { "type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]] },
          "properties": { "name": "big" } },
        { "type": "Feature",
          "geometry": { "type": "Polygon", "coordinates": [[[0,0],[3,0],[3,3],[0,3],[0,0]]] },
          "properties": { "name": "medium" } }
    ]
}"#;

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("areas.geojson");
    std::fs::write(&path, AREAS_FIXTURE).unwrap();
    path
}

fn read_features(path: &Path) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed["type"], "FeatureCollection");
    parsed["features"].as_array().unwrap().clone()
}

#[test]
fn filters_by_area_preserving_order_and_keys() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("filtered.geojson");

    let status = Command::new(env!("CARGO_BIN_EXE_geotable"))
        .arg("filter")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--query")
        .arg("area(geometry) < 15")
        .arg("--verbose")
        .status()
        .expect("failed to execute process");
    assert!(status.success());

    let features = read_features(&output);
    assert_eq!(features.len(), 2);
    // Original row order and row keys retained
    assert_eq!(features[0]["id"], "Row0");
    assert_eq!(features[0]["properties"]["name"], "small");
    assert_eq!(features[1]["id"], "Row2");
    assert_eq!(features[1]["properties"]["name"], "medium");
}

#[test]
fn substitutes_workflow_variables_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("filtered.geojson");
    let variables = dir.path().join("vars.yaml");
    std::fs::write(&variables, "variables:\n  limit: \"15\"\n").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_geotable"))
        .arg("filter")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--query")
        .arg("area(geometry) < ${limit}")
        .arg("--variables")
        .arg(&variables)
        .status()
        .expect("failed to execute process");
    assert!(status.success());

    assert_eq!(read_features(&output).len(), 2);
}

#[test]
fn malformed_query_fails_before_writing_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("filtered.geojson");

    let status = Command::new(env!("CARGO_BIN_EXE_geotable"))
        .arg("filter")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--query")
        .arg("area(geometry) <")
        .status()
        .expect("failed to execute process");
    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn string_predicates_select_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("filtered.geojson");

    let status = Command::new(env!("CARGO_BIN_EXE_geotable"))
        .arg("filter")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--query")
        .arg("name = 'big' OR name LIKE 'med%'")
        .status()
        .expect("failed to execute process");
    assert!(status.success());

    let features = read_features(&output);
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["properties"]["name"], "big");
    assert_eq!(features[1]["properties"]["name"], "medium");
}
