use std::fmt::Write;

use dxfview_core::document::CadData;
use dxfview_engine::{DEFAULT_FOV_DEGREES, LayerGeometry, VertexBuffer, ViewFit};
use dxfview_io::format_file_size;

/// 终端输出用的几何统计。
pub enum GeometrySummary {
    Merged(VertexBuffer),
    PerLayer(Vec<LayerGeometry>),
}

/// 生成解析结果的文本概览。
pub fn render_summary(data: &CadData, warnings: &[String], geometry: &GeometrySummary) -> String {
    let mut out = String::new();
    let metadata = &data.metadata;
    let _ = writeln!(
        out,
        "文件：{} ({})",
        metadata.file_name,
        format_file_size(metadata.file_size)
    );
    let _ = writeln!(
        out,
        "单位={} 实体={} 图层={} 耗时={:.2} ms",
        data.units.as_str(),
        metadata.entity_count,
        data.layers.len(),
        metadata.parse_time_ms
    );

    let (min, max) = (data.bounds.min(), data.bounds.max());
    let _ = writeln!(
        out,
        "范围：({:.2}, {:.2}, {:.2}) - ({:.2}, {:.2}, {:.2})",
        min.x(),
        min.y(),
        min.z(),
        max.x(),
        max.y(),
        max.z()
    );
    let fit = ViewFit::from_bounds(&data.bounds, DEFAULT_FOV_DEGREES);
    let _ = writeln!(
        out,
        "视图中心=({:.2}, {:.2}, {:.2}), 相机距离={:.2}",
        fit.center.x(),
        fit.center.y(),
        fit.center.z(),
        fit.distance
    );

    let _ = writeln!(out, "图层：");
    for layer in &data.layers {
        let _ = writeln!(
            out,
            "  - {} {} (可见: {}, 实体: {})",
            layer.name, layer.color, layer.visible, layer.entity_count
        );
    }

    match geometry {
        GeometrySummary::Merged(buffer) => {
            let _ = writeln!(
                out,
                "几何：线段 {}，点 {}",
                buffer.segment_count(),
                buffer.points.len()
            );
        }
        GeometrySummary::PerLayer(layers) => {
            let _ = writeln!(out, "分图层几何：");
            for layer in layers {
                let _ = writeln!(
                    out,
                    "  - {}：线段 {}，点 {}",
                    layer.layer,
                    layer.buffer.segment_count(),
                    layer.buffer.points.len()
                );
            }
        }
    }

    for warning in warnings {
        let _ = writeln!(out, "警告：{warning}");
    }
    out
}
