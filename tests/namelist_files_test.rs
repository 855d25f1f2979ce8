mod common;

use common::template;
use tempfile::TempDir;
use wrf_runner::core::namelist::{patch_file, NamelistDocument};
use wrf_runner::core::nesting::align_domains;
use wrf_runner::core::propagator::propagate;
use wrf_runner::core::synthesizer::{synthesize, DEFAULT_GEOG_DATA_RES};
use wrf_runner::domain::model::{DomainCenter, NestingSpec, OuterDomainSpec, RunPeriod};

fn outer() -> OuterDomainSpec {
    OuterDomainSpec {
        dx: 9000.0,
        dy: 9000.0,
        e_we: vec![60, 60, 60],
        e_sn: vec![45, 45, 45],
    }
}

#[test]
fn test_patched_templates_keep_unrelated_lines() {
    let dir = TempDir::new().unwrap();
    let period = RunPeriod::parse("2023-07-10 06", "2023-07-11 18").unwrap();
    let center = DomainCenter::new("Oslo", 59.91, 10.75).unwrap();
    let nesting = NestingSpec {
        max_dom: 3,
        parent_grid_ratio: vec![1, 3, 3],
    };
    let layouts = align_domains(&outer(), &nesting).unwrap();
    let store = synthesize(&period, &center, &nesting, &layouts, DEFAULT_GEOG_DATA_RES).unwrap();

    let wps_path = dir.path().join("namelist.wps");
    let replaced = patch_file(&template("namelist.wps"), &wps_path, &store).unwrap();
    assert_eq!(replaced, store.len());

    let original = std::fs::read_to_string(template("namelist.wps")).unwrap();
    let patched = std::fs::read_to_string(&wps_path).unwrap();
    assert_eq!(original.lines().count(), patched.lines().count());
    assert!(patched.contains(" wrf_core = 'ARW',\n"));
    assert!(patched.contains(" interval_seconds = 21600\n"));
    assert!(patched.contains("&geogrid\n"));
    assert!(patched.contains(" max_dom = 3,\n"));
    assert!(patched.contains(" map_proj = \"lambert\",\n"));
    assert!(patched.contains(" truelat1 = 59.91,\n"));
    assert!(patched.contains(" stand_lon = 10.75,\n"));
    assert!(patched.contains(" parent_id = 1, 1, 2,\n"));
    assert!(patched.contains(
        " start_date = \"2023-07-10_06:00:00\", \"2023-07-10_06:00:00\", \"2023-07-10_06:00:00\",\n"
    ));

    // Reading the patched file back yields exactly what was written.
    let reread = NamelistDocument::load(&wps_path).unwrap().store();
    for (key, value) in store.iter() {
        assert_eq!(reread.get(key), Some(value), "key {}", key);
    }
}

#[test]
fn test_model_namelist_follows_preprocessing_namelist() {
    let dir = TempDir::new().unwrap();
    let period = RunPeriod::parse("2023-07-10 06", "2023-07-11 18").unwrap();
    let center = DomainCenter::new("Lima", -12.05, -77.04).unwrap();
    let nesting = NestingSpec {
        max_dom: 2,
        parent_grid_ratio: vec![1, 3, 3],
    };
    let layouts = align_domains(&outer(), &nesting).unwrap();
    let store = synthesize(&period, &center, &nesting, &layouts, DEFAULT_GEOG_DATA_RES).unwrap();

    let wps_path = dir.path().join("namelist.wps");
    patch_file(&template("namelist.wps"), &wps_path, &store).unwrap();
    let wps = NamelistDocument::load(&wps_path).unwrap().store();
    assert_eq!(wps.get("map_proj"), Some("\"mercator\""));

    let mut input = NamelistDocument::load(&template("namelist.input")).unwrap();
    let original = input.store();
    let merged = propagate(&wps, &original).unwrap();
    input.apply(&merged.changed_since(&original)).unwrap();
    let input_path = dir.path().join("namelist.input");
    input.save(&input_path).unwrap();

    let text = std::fs::read_to_string(&input_path).unwrap();
    assert!(text.contains(" run_days = 1,\n"));
    assert!(text.contains(" run_hours = 12,\n"));
    assert!(text.contains(" start_hour = 6, 6,\n"));
    assert!(text.contains(" time_step = 54,\n"));
    assert!(text.contains(" dx = 9000.0, 3000.0,\n"));
    assert!(text.contains(" max_dom = 2,\n"));
    assert!(text.contains(" restart                             = .false.,\n"));

    let written = NamelistDocument::load(&input_path).unwrap().store();
    assert_eq!(written.get("e_we"), wps.get("e_we"));
    assert_eq!(written.get("i_parent_start"), wps.get("i_parent_start"));
    assert_eq!(written.get("parent_grid_ratio"), Some("1, 3"));
    assert_eq!(written.get("restart"), Some(".false."));
}
