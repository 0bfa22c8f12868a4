
use std::f64::consts::TAU;
use std::fs;
use std::path::PathBuf;

use dxfview_core::document::{EntityKind, Units};
use dxfview_core::geometry::Point3;
use dxfview_io::{
    CancelToken, Cancelled, DxfFacade, ErrorCode, ParseOptions, ParseResult, ParseStage,
    SourceInfo, parse,
};
use golden::assert_golden;

fn fixture(name: &str) -> (String, SourceInfo) {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    let text = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("读取测试数据 {} 失败: {err}", path.display()));
    let source = SourceInfo::new(name, text.len() as u64);
    (text, source)
}

fn dxf(records: &[(i32, &str)]) -> String {
    records
        .iter()
        .map(|(code, value)| format!("{code}\n{value}\n"))
        .collect()
}

fn entities(body: &[(i32, &str)]) -> String {
    let mut records = vec![(0, "SECTION"), (2, "ENTITIES")];
    records.extend_from_slice(body);
    records.extend_from_slice(&[(0, "ENDSEC"), (0, "EOF")]);
    dxf(&records)
}

fn line_and_circle() -> String {
    entities(&[
        (0, "LINE"),
        (8, "WALLS"),
        (10, "0"),
        (20, "0"),
        (30, "0"),
        (11, "10"),
        (21, "0"),
        (31, "0"),
        (0, "CIRCLE"),
        (8, "0"),
        (10, "20"),
        (20, "0"),
        (30, "0"),
        (40, "5"),
    ])
}

fn source() -> SourceInfo {
    SourceInfo::new("scene.dxf", 256)
}

fn error_code(result: &ParseResult) -> Option<ErrorCode> {
    result.first_error().map(|error| error.code)
}

#[test]
fn load_floor_plan_matches_golden() {
    let (text, source) = fixture("floor_plan.dxf");
    let result = parse(&text, &source, &ParseOptions::default());
    assert!(result.success, "解析失败: {:?}", result.errors);
    let data = result.data.as_ref().expect("缺少解析数据");
    assert_golden("floor_plan", data, &result.warnings);

    assert_eq!(data.metadata.file_name, "floor_plan.dxf");
    assert_eq!(data.metadata.entity_count, 5);
    assert!(data.metadata.parse_time_ms >= 0.0);
    match &data.entities[2].kind {
        EntityKind::Arc(arc) => {
            assert!((arc.start_angle - 90.0).abs() < 1e-9);
            assert!((arc.end_angle - 180.0).abs() < 1e-9);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn load_classic_polyline_matches_golden() {
    let (text, source) = fixture("classic_polyline.dxf");
    let result = parse(&text, &source, &ParseOptions::default());
    assert!(result.success, "解析失败: {:?}", result.errors);
    let data = result.data.as_ref().expect("缺少解析数据");
    assert_golden("classic_polyline", data, &result.warnings);

    assert_eq!(data.units, Units::Inch);
    match &data.entities[0].kind {
        EntityKind::Polyline(polyline) => {
            assert!(polyline.closed);
            assert!(!polyline.lightweight);
            assert!((polyline.vertices[1].bulge - 1.0).abs() < 1e-9);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
    match &data.entities[1].kind {
        EntityKind::Ellipse(ellipse) => {
            assert!((ellipse.major_axis.length() - 20.0).abs() < 1e-9);
            assert!((ellipse.end_parameter - TAU).abs() < 1e-9);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn line_and_circle_end_to_end() {
    let result = parse(&line_and_circle(), &source(), &ParseOptions::default());
    assert!(result.success);
    assert!(result.errors.is_empty());
    let data = result.data.expect("缺少解析数据");
    assert_eq!(data.entities.len(), 2);

    let walls = data.layer("WALLS").expect("缺少 WALLS 图层");
    let zero = data.layer("0").expect("缺少 0 图层");
    assert_eq!(walls.entity_count, 1);
    assert_eq!(zero.entity_count, 1);

    // 圆的包络决定了 X/Y 的最大值，且 Y 方向向下延伸到 -5
    assert_eq!(data.bounds.min(), Point3::new(0.0, -5.0, 0.0));
    assert_eq!(data.bounds.max(), Point3::new(25.0, 5.0, 0.0));
}

#[test]
fn parsing_is_idempotent() {
    let (text, source) = fixture("floor_plan.dxf");
    let options = ParseOptions::default();
    let mut first = parse(&text, &source, &options).data.expect("第一次解析失败");
    let mut second = parse(&text, &source, &options).data.expect("第二次解析失败");
    first.metadata.parse_time_ms = 0.0;
    second.metadata.parse_time_ms = 0.0;
    assert_eq!(first, second);
}

#[test]
fn unknown_entity_is_tolerated() {
    let text = entities(&[
        (0, "INSERT"),
        (2, "DOOR"),
        (10, "1"),
        (20, "1"),
        (0, "LINE"),
        (10, "0"),
        (11, "1"),
    ]);
    let result = parse(&text, &source(), &ParseOptions::default());
    assert!(result.success);
    assert_eq!(result.data.as_ref().map(|d| d.entities.len()), Some(1));
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn document_without_entities_is_empty_file() {
    let result = parse("0\nSECTION\n2\nENTITIES\n0\nENDSEC\n0\nEOF\n", &source(), &ParseOptions::default());
    assert!(!result.success);
    assert!(result.data.is_none());
    assert_eq!(error_code(&result), Some(ErrorCode::EmptyFile));

    let result = parse("", &source(), &ParseOptions::default());
    assert_eq!(error_code(&result), Some(ErrorCode::EmptyFile));
}

#[test]
fn garbled_input_is_parse_error_with_line() {
    let text = "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\n1.0\n???\n2.0\n0\nENDSEC\n0\nEOF\n";
    let result = parse(text, &source(), &ParseOptions::default());
    assert!(!result.success);
    let error = result.first_error().expect("缺少错误信息");
    assert_eq!(error.code, ErrorCode::ParseError);
    assert_eq!(error.line, Some(9));
}

#[test]
fn layer_filter_and_entity_limit() {
    let options = ParseOptions {
        layer_filter: vec!["WALLS".to_string()],
        ..ParseOptions::default()
    };
    let data = parse(&line_and_circle(), &source(), &options)
        .into_result()
        .expect("过滤后解析失败");
    assert_eq!(data.entities.len(), 1);
    assert_eq!(data.entities[0].layer, "WALLS");
    assert_eq!(data.bounds.max(), Point3::new(10.0, 0.0, 0.0));

    let options = ParseOptions {
        max_entities: Some(1),
        ..ParseOptions::default()
    };
    let result = parse(&line_and_circle(), &source(), &options);
    assert_eq!(result.data.as_ref().map(|d| d.entities.len()), Some(1));
    assert_eq!(result.warnings.len(), 1);

    let options = ParseOptions {
        layer_filter: vec!["MISSING".to_string()],
        ..ParseOptions::default()
    };
    let result = parse(&line_and_circle(), &source(), &options);
    assert_eq!(error_code(&result), Some(ErrorCode::EmptyFile));
}

#[test]
fn progress_stages_are_reported_in_order() {
    let mut stages = Vec::new();
    let mut sink = |stage: ParseStage| stages.push(stage);
    let result = DxfFacade::new()
        .parse_with(&line_and_circle(), &source(), &ParseOptions::default(), &mut sink, None)
        .expect("未取消的解析不应返回 Cancelled");
    assert!(result.success);
    assert_eq!(
        stages,
        vec![
            ParseStage::Read,
            ParseStage::Scan,
            ParseStage::ExtractLines,
            ParseStage::ExtractCurves,
            ParseStage::ExtractPolylines,
            ParseStage::LayerResolution,
            ParseStage::Done,
        ]
    );
}

#[test]
fn cancellation_mid_parse_returns_no_data() {
    let token = CancelToken::new();
    let trigger = token.clone();
    let mut seen = Vec::new();
    let mut sink = |stage: ParseStage| {
        seen.push(stage);
        if stage == ParseStage::ExtractLines {
            trigger.cancel();
        }
    };
    let outcome = DxfFacade::new().parse_with(
        &line_and_circle(),
        &source(),
        &ParseOptions::default(),
        &mut sink,
        Some(&token),
    );
    assert_eq!(outcome, Err(Cancelled));
    assert!(!seen.contains(&ParseStage::Done));
}

#[test]
fn result_serializes_with_camel_case_fields() {
    let result = parse(&line_and_circle(), &source(), &ParseOptions::default());
    let json = serde_json::to_value(&result).expect("序列化结果失败");
    assert_eq!(json["success"], true);
    assert!(json.get("errors").is_none());
    assert!(json["parseTimeMs"].is_number());
    assert_eq!(json["data"]["metadata"]["fileName"], "scene.dxf");
    assert_eq!(json["data"]["metadata"]["entityCount"], 2);
    assert_eq!(json["data"]["layers"][0]["entityCount"], 1);
    assert_eq!(json["data"]["entities"][1]["type"], "CIRCLE");
    assert_eq!(json["data"]["entities"][1]["id"], "entity_1");

    let failed = parse("0\nEOF\n", &source(), &ParseOptions::default());
    let json = serde_json::to_value(&failed).expect("序列化结果失败");
    assert_eq!(json["success"], false);
    assert!(json.get("data").is_none());
    assert_eq!(json["errors"][0]["code"], "EMPTY_FILE");
}
