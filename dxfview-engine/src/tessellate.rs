use std::f64::consts::TAU;

use dxfview_core::color::DEFAULT_LAYER_COLOR;
use dxfview_core::document::{Arc, CadData, Circle, Ellipse, EntityKind, Polyline, Spline};
use dxfview_core::geometry::{BoundingBox, Point3};
use glam::DVec3;
use tracing::debug;

use crate::lod::LodPolicy;

/// 样条每个控制点对应的采样数。
const SPLINE_SAMPLES_PER_POINT: usize = 10;
const CATMULL_ROM_TENSION: f64 = 0.5;

/// 线段顶点缓冲：`segments` 中相邻两个顶点组成一条线段，`points` 为独立的点图元。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    pub segments: Vec<Point3>,
    pub points: Vec<Point3>,
}

impl VertexBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len() / 2
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.points.is_empty()
    }

    pub fn push_segment(&mut self, start: Point3, end: Point3) {
        self.segments.push(start);
        self.segments.push(end);
    }

    /// 把折线路径拆成相邻线段对。少于两个点时不产生任何线段。
    pub fn push_path(&mut self, path: &[Point3]) {
        for pair in path.windows(2) {
            self.push_segment(pair[0], pair[1]);
        }
    }

    pub fn push_point(&mut self, point: Point3) {
        self.points.push(point);
    }

    pub fn append(&mut self, other: &mut VertexBuffer) {
        self.segments.append(&mut other.segments);
        self.points.append(&mut other.points);
    }

    /// 线段顶点的扁平 `f32` 坐标（x, y, z 交错），供 GPU 直接上传。
    pub fn positions(&self) -> Vec<f32> {
        flatten(&self.segments)
    }

    pub fn point_positions(&self) -> Vec<f32> {
        flatten(&self.points)
    }

    /// 缓冲中所有顶点的包围盒，空缓冲返回 `None`。
    pub fn bounds(&self) -> Option<BoundingBox> {
        let mut bounds = BoundingBox::empty();
        for point in self.segments.iter().chain(&self.points) {
            bounds.include_point(*point);
        }
        if bounds.is_empty() { None } else { Some(bounds) }
    }

    /// 整体平移，使 `center` 落在原点。
    pub fn recentered(&self, center: Point3) -> Self {
        let offset = center.as_vec3();
        let shift = |point: &Point3| Point3(point.as_vec3() - offset);
        Self {
            segments: self.segments.iter().map(shift).collect(),
            points: self.points.iter().map(shift).collect(),
        }
    }

    /// 以自身包围盒中心为基准居中。
    pub fn centered(&self) -> Self {
        match self.bounds() {
            Some(bounds) => self.recentered(bounds.center()),
            None => self.clone(),
        }
    }
}

fn flatten(points: &[Point3]) -> Vec<f32> {
    points
        .iter()
        .flat_map(|point| point.as_vec3().as_vec3().to_array())
        .collect()
}

/// 按图层分组的几何，颜色与可见性取自图层信息。
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGeometry {
    pub layer: String,
    pub color: String,
    pub visible: bool,
    pub buffer: VertexBuffer,
}

/// 使用默认 LOD 策略，把全部实体合并到一个缓冲。
pub fn to_geometry(data: &CadData, segments_override: Option<usize>) -> VertexBuffer {
    to_geometry_with(data, &LodPolicy::default(), segments_override)
}

pub fn to_geometry_with(
    data: &CadData,
    policy: &LodPolicy,
    segments_override: Option<usize>,
) -> VertexBuffer {
    let segments = policy.resolve(data.entities.len(), segments_override);
    let mut buffer = VertexBuffer::new();
    for entity in &data.entities {
        tessellate_entity(&entity.kind, segments, &mut buffer);
    }
    debug!(
        entities = data.entities.len(),
        segments = buffer.segment_count(),
        points = buffer.points.len(),
        "几何转换完成"
    );
    buffer
}

pub fn to_layer_geometry(data: &CadData, segments_override: Option<usize>) -> Vec<LayerGeometry> {
    to_layer_geometry_with(data, &LodPolicy::default(), segments_override)
}

/// 每个图层一个缓冲，顺序与 `data.layers` 一致。未登记图层上的实体追加到末尾。
pub fn to_layer_geometry_with(
    data: &CadData,
    policy: &LodPolicy,
    segments_override: Option<usize>,
) -> Vec<LayerGeometry> {
    let segments = policy.resolve(data.entities.len(), segments_override);
    let mut groups: Vec<LayerGeometry> = data
        .layers
        .iter()
        .map(|layer| LayerGeometry {
            layer: layer.name.clone(),
            color: layer.color.clone(),
            visible: layer.visible,
            buffer: VertexBuffer::new(),
        })
        .collect();

    for entity in &data.entities {
        let index = match groups.iter().position(|group| group.layer == entity.layer) {
            Some(index) => index,
            None => {
                groups.push(LayerGeometry {
                    layer: entity.layer.clone(),
                    color: DEFAULT_LAYER_COLOR.to_string(),
                    visible: true,
                    buffer: VertexBuffer::new(),
                });
                groups.len() - 1
            }
        };
        tessellate_entity(&entity.kind, segments, &mut groups[index].buffer);
    }
    groups
}

/// 单个实体的离散化。`segments` 只影响曲线类实体。
pub fn tessellate_entity(kind: &EntityKind, segments: usize, buffer: &mut VertexBuffer) {
    match kind {
        EntityKind::Line(line) => buffer.push_segment(line.start, line.end),
        EntityKind::Circle(circle) => tessellate_circle(circle, segments, buffer),
        EntityKind::Arc(arc) => tessellate_arc(arc, segments, buffer),
        EntityKind::Polyline(polyline) => tessellate_polyline(polyline, segments, buffer),
        EntityKind::Point(point) => buffer.push_point(point.position),
        EntityKind::Spline(spline) => tessellate_spline(spline, buffer),
        EntityKind::Ellipse(ellipse) => tessellate_ellipse(ellipse, segments, buffer),
        // 文字只保留锚点数据，不产生线框
        EntityKind::Text(_) => {}
    }
}

fn tessellate_circle(circle: &Circle, segments: usize, buffer: &mut VertexBuffer) {
    let samples = sample_circle(circle.center, circle.radius, 0.0, TAU, segments);
    buffer.push_path(&samples);
    // 显式闭合，避免浮点误差在接缝处留下缺口
    if let (Some(last), Some(first)) = (samples.last(), samples.first()) {
        buffer.push_segment(*last, *first);
    }
}

fn tessellate_arc(arc: &Arc, segments: usize, buffer: &mut VertexBuffer) {
    let start = arc.start_angle.to_radians();
    let mut end = arc.end_angle.to_radians();
    if end < start {
        end += TAU;
    }
    let samples = sample_circle(arc.center, arc.radius, start, end, segments);
    buffer.push_path(&samples);
}

fn sample_circle(
    center: Point3,
    radius: f64,
    start: f64,
    end: f64,
    steps: usize,
) -> Vec<Point3> {
    let sweep = end - start;
    (0..=steps)
        .map(|i| {
            let angle = start + sweep * i as f64 / steps as f64;
            Point3::new(
                center.x() + radius * angle.cos(),
                center.y() + radius * angle.sin(),
                center.z(),
            )
        })
        .collect()
}

fn tessellate_polyline(polyline: &Polyline, segments: usize, buffer: &mut VertexBuffer) {
    let vertices = &polyline.vertices;
    let count = vertices.len();
    if count < 2 {
        return;
    }
    let edges = if polyline.closed { count } else { count - 1 };
    let mut path = Vec::with_capacity(count + 1);
    path.push(vertices[0].position);
    for index in 0..edges {
        let from = &vertices[index];
        let to = &vertices[(index + 1) % count];
        if from.bulge != 0.0 {
            path.extend(bulge_arc(from.position, to.position, from.bulge, segments));
        }
        path.push(to.position);
    }
    buffer.push_path(&path);
}

/// 凸度弧的中间点（不含两端）。正凸度为逆时针。
pub fn bulge_arc(start: Point3, end: Point3, bulge: f64, segments: usize) -> Vec<Point3> {
    let included = 4.0 * bulge.abs().atan();
    let dx = end.x() - start.x();
    let dy = end.y() - start.y();
    let chord = (dx * dx + dy * dy).sqrt();
    if chord == 0.0 || included == 0.0 {
        return Vec::new();
    }
    let radius = chord / (2.0 * (included / 2.0).sin());
    let half = chord / 2.0;
    let offset = (radius * radius - half * half).max(0.0).sqrt();

    // 圆心位于弦的左侧（正凸度小弧）或右侧；凸度绝对值超过 1 时为大弧，圆心换到另一侧
    let mut side = bulge.signum();
    if bulge.abs() > 1.0 {
        side = -side;
    }
    let (nx, ny) = (-dy / chord, dx / chord);
    let cx = (start.x() + end.x()) / 2.0 + side * offset * nx;
    let cy = (start.y() + end.y()) / 2.0 + side * offset * ny;

    let start_angle = (start.y() - cy).atan2(start.x() - cx);
    let mut end_angle = (end.y() - cy).atan2(end.x() - cx);
    if bulge > 0.0 && end_angle < start_angle {
        end_angle += TAU;
    } else if bulge < 0.0 && end_angle > start_angle {
        end_angle -= TAU;
    }
    let sweep = end_angle - start_angle;
    let steps = arc_steps(sweep.abs(), segments);
    let z = (start.z() + end.z()) / 2.0;

    (1..steps)
        .map(|i| {
            let angle = start_angle + sweep * i as f64 / steps as f64;
            Point3::new(cx + radius * angle.cos(), cy + radius * angle.sin(), z)
        })
        .collect()
}

/// 按扫掠角占整圆的比例分配分段，至少两段。
fn arc_steps(sweep: f64, segments: usize) -> usize {
    let steps = (sweep / TAU * segments as f64).ceil();
    if steps.is_finite() && steps > 2.0 {
        steps as usize
    } else {
        2
    }
}

fn tessellate_spline(spline: &Spline, buffer: &mut VertexBuffer) {
    let controls: Vec<DVec3> = spline
        .control_points
        .iter()
        .map(|point| point.as_vec3())
        .collect();
    if controls.len() < 2 {
        // 不足两个控制点时退化为直连
        buffer.push_path(&spline.control_points);
        return;
    }
    let divisions = controls.len() * SPLINE_SAMPLES_PER_POINT;
    let samples: Vec<Point3> = (0..=divisions)
        .map(|i| Point3(catmull_rom(&controls, spline.closed, i as f64 / divisions as f64)))
        .collect();
    buffer.push_path(&samples);
}

/// 均匀参数化的 Catmull-Rom 曲线，`t` ∈ [0, 1] 覆盖整条曲线。
/// 开放曲线在两端外推一个虚拟控制点，闭合曲线首尾循环。
fn catmull_rom(points: &[DVec3], closed: bool, t: f64) -> DVec3 {
    let len = points.len();
    let spans = if closed { len } else { len - 1 };
    let position = spans as f64 * t;
    let mut index = position.floor() as usize;
    let mut weight = position - index as f64;
    if !closed && index >= len - 1 {
        index = len - 2;
        weight = 1.0;
    }

    let at = |i: usize| points[i % len];
    let p0 = if closed || index > 0 {
        at(index + len - 1)
    } else {
        points[0] * 2.0 - points[1]
    };
    let p1 = at(index);
    let p2 = at(index + 1);
    let p3 = if closed || index + 2 < len {
        at(index + 2)
    } else {
        points[len - 1] * 2.0 - points[len - 2]
    };

    let t0 = (p2 - p0) * CATMULL_ROM_TENSION;
    let t1 = (p3 - p1) * CATMULL_ROM_TENSION;
    let c2 = p1 * -3.0 + p2 * 3.0 - t0 * 2.0 - t1;
    let c3 = p1 * 2.0 - p2 * 2.0 + t0 + t1;
    p1 + t0 * weight + c2 * (weight * weight) + c3 * (weight * weight * weight)
}

fn tessellate_ellipse(ellipse: &Ellipse, segments: usize, buffer: &mut VertexBuffer) {
    let axis = ellipse.major_axis.as_vec3();
    let major = axis.length();
    let minor = major * ellipse.ratio;
    let rotation = axis.y.atan2(axis.x);
    let (sin_r, cos_r) = rotation.sin_cos();

    let start = ellipse.start_parameter;
    let mut end = ellipse.end_parameter;
    if end < start {
        end += TAU;
    }
    let sweep = end - start;
    let steps = arc_steps(sweep, segments);
    let center = ellipse.center;

    let samples: Vec<Point3> = (0..=steps)
        .map(|i| {
            let t = start + sweep * i as f64 / steps as f64;
            let local_x = t.cos() * major;
            let local_y = t.sin() * minor;
            Point3::new(
                center.x() + local_x * cos_r - local_y * sin_r,
                center.y() + local_x * sin_r + local_y * cos_r,
                center.z(),
            )
        })
        .collect();
    buffer.push_path(&samples);
}
