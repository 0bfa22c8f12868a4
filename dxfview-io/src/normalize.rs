//! 把解析得到的文档整理为 [`CadData`]：分配编号、补全图层、计算范围。

use std::collections::HashMap;
use std::time::Instant;

use dxfview_core::color::{DEFAULT_LAYER_COLOR, resolve_layer_color};
use dxfview_core::document::{
    CadData, CadEntity, CadMetadata, EntityId, EntityKind, LayerInfo, Units,
};
use dxfview_core::geometry::BoundingBox;
use tracing::{debug, warn};

use crate::error::{DxfError, ErrorCode};
use crate::parser::{DxfDocument, LayerEntry};
use crate::progress::{Control, ParseStage};
use crate::{ParseOptions, SourceInfo};

/// 实体未指定图层时使用的图层名。
pub const DEFAULT_LAYER: &str = "0";

const MAX_PRECISION: u32 = 15;

/// 规范化结果，附带不影响成功状态的警告。
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub data: CadData,
    pub warnings: Vec<String>,
}

/// 实体按类别分批处理，每批对应一个进度阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Lines,
    Curves,
    Polylines,
}

impl Pass {
    fn of(kind: &EntityKind) -> Self {
        match kind {
            EntityKind::Line(_) | EntityKind::Point(_) | EntityKind::Text(_) => Pass::Lines,
            EntityKind::Circle(_)
            | EntityKind::Arc(_)
            | EntityKind::Ellipse(_)
            | EntityKind::Spline(_) => Pass::Curves,
            EntityKind::Polyline(_) => Pass::Polylines,
        }
    }

    fn stage(self) -> ParseStage {
        match self {
            Pass::Lines => ParseStage::ExtractLines,
            Pass::Curves => ParseStage::ExtractCurves,
            Pass::Polylines => ParseStage::ExtractPolylines,
        }
    }
}

/// 不带进度回调的规范化，`parse_time_ms` 只统计本步骤耗时。
pub fn normalize(
    document: DxfDocument,
    source: &SourceInfo,
    options: &ParseOptions,
) -> Result<Normalized, DxfError> {
    let started = Instant::now();
    let mut sink = |_: ParseStage| {};
    let mut control = Control::new(&mut sink, None);
    let mut normalized = normalize_with(document, source, options, &mut control)?;
    normalized.data.metadata.parse_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    Ok(normalized)
}

pub(crate) fn normalize_with(
    document: DxfDocument,
    source: &SourceInfo,
    options: &ParseOptions,
    control: &mut Control<'_, '_>,
) -> Result<Normalized, DxfError> {
    let source_units = document.units();
    let DxfDocument {
        layers: table,
        entities: raw,
        skipped,
        ..
    } = document;

    let mut warnings = Vec::new();
    for (name, count) in &skipped {
        warn!(entity = name.as_str(), count, "跳过不支持的实体");
        warnings.push(format!("已跳过 {count} 个不支持的实体：{name}"));
    }

    if raw.is_empty() {
        return Err(DxfError::Empty(
            ErrorCode::EmptyFile.default_message().to_string(),
        ));
    }

    let mut entities: Vec<CadEntity> = raw
        .into_iter()
        .enumerate()
        .map(|(index, entity)| CadEntity {
            id: EntityId::new(index as u64),
            layer: entity
                .layer
                .filter(|layer| !layer.is_empty())
                .unwrap_or_else(|| DEFAULT_LAYER.to_string()),
            color: entity.color,
            kind: entity.kind,
        })
        .collect();

    if !options.layer_filter.is_empty() {
        entities.retain(|entity| options.layer_filter.iter().any(|layer| *layer == entity.layer));
        debug!(remaining = entities.len(), filter = ?options.layer_filter, "应用图层过滤");
    }
    if let Some(max) = options.max_entities {
        if entities.len() > max {
            let dropped = entities.len() - max;
            entities.truncate(max);
            warnings.push(format!("实体数量超过上限 {max}，已截断 {dropped} 个实体"));
        }
    }
    if entities.is_empty() {
        return Err(DxfError::Empty("按选项过滤后没有剩余实体".to_string()));
    }

    let (units, scale) = match options.scale_to_unit {
        Some(target) if target != source_units => {
            (target, Some(source_units.millimetres() / target.millimetres()))
        }
        Some(target) => (target, None),
        None => (source_units, None),
    };

    for pass in [Pass::Lines, Pass::Curves, Pass::Polylines] {
        control.stage(pass.stage())?;
        for entity in entities
            .iter_mut()
            .filter(|entity| Pass::of(&entity.kind) == pass)
        {
            refine(entity, scale, options)?;
        }
    }

    control.stage(ParseStage::LayerResolution)?;
    let layers = resolve_layers(table, &entities);
    let bounds = entities
        .iter()
        .filter_map(CadEntity::bounds)
        .fold(BoundingBox::empty(), |mut acc, bounds| {
            acc.include_bounds(&bounds);
            acc
        })
        .or_default_view();

    let metadata = CadMetadata {
        file_name: source.file_name.clone(),
        file_size: source.file_size,
        entity_count: entities.len(),
        parse_time_ms: 0.0,
    };
    Ok(Normalized {
        data: CadData {
            entities,
            layers,
            bounds,
            units,
            metadata,
        },
        warnings,
    })
}

/// 单位换算、取整、去重，最后校验数值有限。
fn refine(entity: &mut CadEntity, scale: Option<f64>, options: &ParseOptions) -> Result<(), DxfError> {
    if let Some(factor) = scale {
        entity.kind.transform_lengths(|value| value * factor);
    }
    if let Some(precision) = options.precision {
        let step = 10f64.powi(precision.min(MAX_PRECISION) as i32);
        entity
            .kind
            .transform_lengths(|value| (value * step).round() / step);
    }
    if options.simplify {
        simplify(&mut entity.kind);
    }
    if !entity.kind.is_finite() {
        return Err(DxfError::invalid(format!(
            "{}（{}）包含非有限数值",
            entity.id,
            entity.kind.type_name()
        )));
    }
    Ok(())
}

/// 去掉多段线与样条中相邻的重复点；闭合多段线末点与首点重合时去掉末点。
fn simplify(kind: &mut EntityKind) {
    match kind {
        EntityKind::Polyline(polyline) => {
            // 被合并的重复点若带凸度，它才是下一段的起点，凸度转移到保留的点上
            polyline.vertices.dedup_by(|next, kept| {
                let duplicate = next.position == kept.position;
                if duplicate && next.bulge != 0.0 {
                    kept.bulge = next.bulge;
                }
                duplicate
            });
            let duplicated_tail = match (polyline.vertices.first(), polyline.vertices.last()) {
                (Some(first), Some(last)) => {
                    polyline.vertices.len() > 2 && first.position == last.position
                }
                _ => false,
            };
            if polyline.closed && duplicated_tail {
                polyline.vertices.pop();
            }
        }
        EntityKind::Spline(spline) => spline.control_points.dedup(),
        _ => {}
    }
}

/// 以 LAYER 表为起点（同名后写覆盖），再为实体引用的未知图层补建默认条目。
fn resolve_layers(table: Vec<LayerEntry>, entities: &[CadEntity]) -> Vec<LayerInfo> {
    let mut layers: Vec<LayerInfo> = Vec::with_capacity(table.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for entry in table {
        let info = LayerInfo {
            color: resolve_layer_color(entry.true_color, entry.color_index),
            // 组码 62 的负号（图层关闭）只保留在 LayerEntry 中，不影响可见性
            visible: !entry.frozen,
            entity_count: 0,
            name: entry.name,
        };
        match index.get(&info.name) {
            Some(&slot) => layers[slot] = info,
            None => {
                index.insert(info.name.clone(), layers.len());
                layers.push(info);
            }
        }
    }

    for entity in entities {
        let slot = match index.get(&entity.layer) {
            Some(&slot) => slot,
            None => {
                let slot = layers.len();
                layers.push(LayerInfo {
                    name: entity.layer.clone(),
                    color: DEFAULT_LAYER_COLOR.to_string(),
                    visible: true,
                    entity_count: 0,
                });
                index.insert(entity.layer.clone(), slot);
                slot
            }
        };
        layers[slot].entity_count += 1;
    }
    layers
}
