//! End-to-end: JSON tile description in, verified binary tile out.

use navtile::formats::header;
use navtile::{compile_tile, CompileConfig};

use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn fixture() -> serde_json::Value {
    json!({
        "roads": [
            {
                "id": 100, "class": 3, "speed": 5, "oneway": true,
                "label_offset": 64,
                "points": [
                    {"lat": 50.000, "lon": 4.000, "node_id": 1},
                    {"lat": 50.000, "lon": 4.005},
                    {"lat": 50.000, "lon": 4.010, "node_id": 2}
                ]
            },
            {
                "id": 101, "class": 0, "speed": 3,
                "points": [
                    {"lat": 50.000, "lon": 4.010, "node_id": 2},
                    {"lat": 50.010, "lon": 4.010, "node_id": 3, "boundary": true}
                ]
            }
        ],
        "restrictions": [
            {"from_node": 1, "to_node": 3, "via_node": 2},
            {"from_node": 1, "to_node": 99, "via_node": 2}
        ],
        "through_routes": [
            {"node": 2, "road_a": 100, "road_b": 101}
        ]
    })
}

#[test]
fn compile_produces_verifiable_tile() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("tile.json");
    let output = dir.path().join("tile.bin");
    fs::write(&input, fixture().to_string()).unwrap();

    let summary = compile_tile(&CompileConfig {
        input,
        output: output.clone(),
        drive_on_left: true,
        enable_restrictions: true,
    })
    .unwrap();

    assert_eq!(summary.roads, 2);
    assert_eq!(summary.nodes, 3);
    assert_eq!(summary.arcs, 4);
    assert_eq!(summary.centers, 1);
    assert_eq!(summary.restrictions_attached, 1);
    assert_eq!(summary.restrictions_dropped, 1);
    assert_eq!(summary.through_routes_attached, 1);

    // header::read verifies the CRC-64 footer before parsing.
    let h = header::read(&output).unwrap();
    assert!(h.drive_on_left);
    assert!(h.restrictions_enabled);
    assert_eq!(h.nodes_pos, header::LONG_HEADER_LEN as u32);
    assert_eq!(h.roads_pos, h.nodes_pos + h.nodes_size);
    assert_eq!(h.roads_size, 2 * 12);
    // One boundary node.
    assert_eq!(h.bounds_size, 9);

    let high = h.high_bounds.unwrap();
    assert_eq!(high.pos % 0x200, 0);
    // The boundary node sits on a default-class road; no high-class entry.
    assert_eq!(high.size, 0);

    let file_size = fs::metadata(&output).unwrap().len() as usize;
    assert_eq!(file_size, summary.file_size);
}

#[test]
fn compile_without_restrictions_clears_flag() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("tile.json");
    let output = dir.path().join("tile.bin");
    fs::write(&input, fixture().to_string()).unwrap();

    let summary = compile_tile(&CompileConfig {
        input,
        output: output.clone(),
        drive_on_left: false,
        enable_restrictions: false,
    })
    .unwrap();
    assert_eq!(summary.restrictions_attached, 0);
    // Through-routes are independent of the restrictions flag.
    assert_eq!(summary.through_routes_attached, 1);

    let h = header::read(&output).unwrap();
    assert!(!h.restrictions_enabled);
    assert!(!h.drive_on_left);
}

#[test]
fn corrupted_file_fails_checksum() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("tile.json");
    let output = dir.path().join("tile.bin");
    fs::write(&input, fixture().to_string()).unwrap();

    compile_tile(&CompileConfig {
        input,
        output: output.clone(),
        drive_on_left: false,
        enable_restrictions: true,
    })
    .unwrap();

    let mut data = fs::read(&output).unwrap();
    let mid = data.len() / 2;
    data[mid] ^= 0xFF;
    fs::write(&output, &data).unwrap();

    let err = header::read(&output).unwrap_err();
    assert!(err.to_string().contains("CRC"));
}
