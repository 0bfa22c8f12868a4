pub mod geometry {
    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 三维点，内部以 `glam::DVec3` 表示。DXF 中的 2D 实体以 z = 0 存放。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Point3 = Point3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        /// 对每个坐标分量应用同一个变换（缩放、取整等）。
        #[inline]
        pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
            Self::new(f(self.0.x), f(self.0.y), f(self.0.z))
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，目前用于椭圆主轴。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
            Self::new(f(self.0.x), f(self.0.y), f(self.0.z))
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct BoundingBox {
        min: Point3,
        max: Point3,
    }

    impl BoundingBox {
        #[inline]
        pub fn new(min: Point3, max: Point3) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 没有任何实体时使用的默认视图范围 (0,0,0)-(100,100,0)。
        #[inline]
        pub fn default_view() -> Self {
            Self {
                min: Point3::ORIGIN,
                max: Point3::new(100.0, 100.0, 0.0),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y() || self.min.z() > self.max.z()
        }

        #[inline]
        pub fn min(&self) -> Point3 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point3 {
            self.max
        }

        pub fn include_point(&mut self, point: Point3) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Point3(self.min.as_vec3().min(point.as_vec3()));
            self.max = Point3(self.max.as_vec3().max(point.as_vec3()));
        }

        pub fn include_bounds(&mut self, other: &BoundingBox) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 空边界框退化为默认视图范围。
        #[inline]
        pub fn or_default_view(self) -> Self {
            if self.is_empty() {
                Self::default_view()
            } else {
                self
            }
        }

        #[inline]
        pub fn center(&self) -> Point3 {
            debug_assert!(!self.is_empty());
            Point3((self.min.as_vec3() + self.max.as_vec3()) * 0.5)
        }

        #[inline]
        pub fn size(&self) -> DVec3 {
            if self.is_empty() {
                DVec3::ZERO
            } else {
                self.max.as_vec3() - self.min.as_vec3()
            }
        }
    }

}

pub mod color {
    /// ACI 缺失或不在映射表中时使用的图层颜色。
    pub const DEFAULT_LAYER_COLOR: &str = "#00ff00";

    /// 仅覆盖 AutoCAD 标准索引 0-9 与 ByLayer(256)，其余索引回退为默认颜色。
    const ACI_TABLE: [(i32, &str); 11] = [
        (0, "#ffffff"),
        (1, "#ff0000"),
        (2, "#ffff00"),
        (3, "#00ff00"),
        (4, "#00ffff"),
        (5, "#0000ff"),
        (6, "#ff00ff"),
        (7, "#ffffff"),
        (8, "#808080"),
        (9, "#c0c0c0"),
        (256, "#ffffff"),
    ];

    pub fn aci_to_hex(index: Option<i32>) -> &'static str {
        index
            .and_then(|index| {
                ACI_TABLE
                    .iter()
                    .find_map(|(aci, hex)| (*aci == index).then_some(*hex))
            })
            .unwrap_or(DEFAULT_LAYER_COLOR)
    }

    /// 24 位 RGB 整数转为六位小写十六进制。
    pub fn rgb_to_hex(rgb: u32) -> String {
        format!("#{:06x}", rgb & 0x00ff_ffff)
    }

    /// 图层颜色优先级：真彩色 > ACI 索引 > 默认颜色。
    pub fn resolve_layer_color(true_color: Option<u32>, color_index: Option<i32>) -> String {
        match true_color {
            Some(rgb) => rgb_to_hex(rgb),
            None => aci_to_hex(color_index).to_string(),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn aci_lookup_and_fallback() {
            assert_eq!(aci_to_hex(Some(1)), "#ff0000");
            assert_eq!(aci_to_hex(Some(256)), "#ffffff");
            assert_eq!(aci_to_hex(Some(42)), DEFAULT_LAYER_COLOR);
            assert_eq!(aci_to_hex(None), DEFAULT_LAYER_COLOR);
        }

        #[test]
        fn true_color_wins_over_index() {
            assert_eq!(resolve_layer_color(Some(0x12ab34), Some(1)), "#12ab34");
            assert_eq!(resolve_layer_color(Some(0xff), None), "#0000ff");
            assert_eq!(resolve_layer_color(None, Some(1)), "#ff0000");
            assert_eq!(resolve_layer_color(None, None), "#00ff00");
        }
    }
}

pub mod document {
    use std::fmt;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::geometry::{BoundingBox, Point3, Vector3};

    /// 单次解析内单调递增的实体编号，对外表现为 `entity_<n>`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for EntityId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "entity_{}", self.0)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct InvalidEntityId(pub String);

    impl fmt::Display for InvalidEntityId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "无效的实体编号：{}", self.0)
        }
    }

    impl std::error::Error for InvalidEntityId {}

    impl FromStr for EntityId {
        type Err = InvalidEntityId;

        fn from_str(raw: &str) -> Result<Self, Self::Err> {
            raw.strip_prefix("entity_")
                .and_then(|digits| digits.parse::<u64>().ok())
                .map(Self)
                .ok_or_else(|| InvalidEntityId(raw.to_string()))
        }
    }

    impl Serialize for EntityId {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for EntityId {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(serde::de::Error::custom)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point3,
        pub end: Point3,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point3,
        pub radius: f64,
    }

    /// 圆弧实体，角度以度储存（与 DXF 组码 50/51 一致），逆时针为正。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point3,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point3,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point3) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point3, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// `lightweight` 区分 LWPOLYLINE 与经典 POLYLINE/VERTEX 序列。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub closed: bool,
        pub lightweight: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Point {
        pub position: Point3,
    }

    /// TEXT 与 MTEXT 共用，`multiline` 标记 MTEXT。旋转角以度表示。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub position: Point3,
        pub content: String,
        pub height: f64,
        pub rotation: Option<f64>,
        pub multiline: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Spline {
        pub control_points: Vec<Point3>,
        pub degree: i32,
        pub closed: bool,
    }

    /// 椭圆实体，主轴为相对圆心的向量，参数范围以弧度表示。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point3,
        pub major_axis: Vector3,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum EntityKind {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        Point(Point),
        Text(Text),
        Spline(Spline),
        Ellipse(Ellipse),
    }

    impl EntityKind {
        /// 对应的 DXF 实体名称。
        pub fn type_name(&self) -> &'static str {
            match self {
                EntityKind::Line(_) => "LINE",
                EntityKind::Circle(_) => "CIRCLE",
                EntityKind::Arc(_) => "ARC",
                EntityKind::Polyline(polyline) if polyline.lightweight => "LWPOLYLINE",
                EntityKind::Polyline(_) => "POLYLINE",
                EntityKind::Point(_) => "POINT",
                EntityKind::Text(text) if text.multiline => "MTEXT",
                EntityKind::Text(_) => "TEXT",
                EntityKind::Spline(_) => "SPLINE",
                EntityKind::Ellipse(_) => "ELLIPSE",
            }
        }

        /// 计算实体的轴对齐范围。圆弧与椭圆取完整包络，不按扫掠角裁剪。
        pub fn bounds(&self) -> Option<BoundingBox> {
            let mut bounds = BoundingBox::empty();
            match self {
                EntityKind::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                EntityKind::Circle(Circle { center, radius })
                | EntityKind::Arc(Arc { center, radius, .. }) => {
                    include_square(&mut bounds, *center, radius.abs());
                }
                EntityKind::Ellipse(ellipse) => {
                    include_square(&mut bounds, ellipse.center, ellipse.major_axis.length());
                }
                EntityKind::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                }
                EntityKind::Point(point) => bounds.include_point(point.position),
                EntityKind::Text(text) => bounds.include_point(text.position),
                EntityKind::Spline(spline) => {
                    for point in &spline.control_points {
                        bounds.include_point(*point);
                    }
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        /// 对所有坐标与长度量（半径、字高、主轴）应用同一个变换；角度、比例与 bulge 不受影响。
        pub fn transform_lengths(&mut self, f: impl Fn(f64) -> f64) {
            match self {
                EntityKind::Line(line) => {
                    line.start = line.start.map(&f);
                    line.end = line.end.map(&f);
                }
                EntityKind::Circle(circle) => {
                    circle.center = circle.center.map(&f);
                    circle.radius = f(circle.radius);
                }
                EntityKind::Arc(arc) => {
                    arc.center = arc.center.map(&f);
                    arc.radius = f(arc.radius);
                }
                EntityKind::Polyline(polyline) => {
                    for vertex in &mut polyline.vertices {
                        vertex.position = vertex.position.map(&f);
                    }
                }
                EntityKind::Point(point) => point.position = point.position.map(&f),
                EntityKind::Text(text) => {
                    text.position = text.position.map(&f);
                    text.height = f(text.height);
                }
                EntityKind::Spline(spline) => {
                    for point in &mut spline.control_points {
                        *point = point.map(&f);
                    }
                }
                EntityKind::Ellipse(ellipse) => {
                    ellipse.center = ellipse.center.map(&f);
                    ellipse.major_axis = ellipse.major_axis.map(&f);
                }
            }
        }

        /// 所有数值字段均为有限值。
        pub fn is_finite(&self) -> bool {
            match self {
                EntityKind::Line(line) => line.start.is_finite() && line.end.is_finite(),
                EntityKind::Circle(circle) => circle.center.is_finite() && circle.radius.is_finite(),
                EntityKind::Arc(arc) => {
                    arc.center.is_finite()
                        && arc.radius.is_finite()
                        && arc.start_angle.is_finite()
                        && arc.end_angle.is_finite()
                }
                EntityKind::Polyline(polyline) => polyline
                    .vertices
                    .iter()
                    .all(|vertex| vertex.position.is_finite() && vertex.bulge.is_finite()),
                EntityKind::Point(point) => point.position.is_finite(),
                EntityKind::Text(text) => {
                    text.position.is_finite()
                        && text.height.is_finite()
                        && text.rotation.is_none_or(f64::is_finite)
                }
                EntityKind::Spline(spline) => spline.control_points.iter().all(|p| p.is_finite()),
                EntityKind::Ellipse(ellipse) => {
                    ellipse.center.is_finite()
                        && ellipse.major_axis.as_vec3().is_finite()
                        && ellipse.ratio.is_finite()
                        && ellipse.start_parameter.is_finite()
                        && ellipse.end_parameter.is_finite()
                }
            }
        }
    }

    fn include_square(bounds: &mut BoundingBox, center: Point3, half: f64) {
        bounds.include_point(Point3::new(center.x() - half, center.y() - half, center.z()));
        bounds.include_point(Point3::new(center.x() + half, center.y() + half, center.z()));
    }

    /// 规范化后的实体。`color` 为 `None` 表示继承图层颜色。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CadEntity {
        pub id: EntityId,
        pub layer: String,
        pub color: Option<i32>,
        #[serde(flatten)]
        pub kind: EntityKind,
    }

    impl CadEntity {
        #[inline]
        pub fn bounds(&self) -> Option<BoundingBox> {
            self.kind.bounds()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LayerInfo {
        pub name: String,
        pub color: String,
        pub visible: bool,
        pub entity_count: usize,
    }

    /// 图纸单位，来自 `$INSUNITS`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum Units {
        #[default]
        #[serde(rename = "mm")]
        Millimeter,
        #[serde(rename = "cm")]
        Centimeter,
        #[serde(rename = "m")]
        Meter,
        #[serde(rename = "inch")]
        Inch,
        #[serde(rename = "ft")]
        Foot,
    }

    impl Units {
        /// 未识别的代码一律按毫米处理。
        pub fn from_insunits(code: i64) -> Self {
            match code {
                1 => Units::Inch,
                2 => Units::Foot,
                4 => Units::Millimeter,
                5 => Units::Centimeter,
                6 => Units::Meter,
                _ => Units::Millimeter,
            }
        }

        pub fn millimetres(self) -> f64 {
            match self {
                Units::Millimeter => 1.0,
                Units::Centimeter => 10.0,
                Units::Meter => 1000.0,
                Units::Inch => 25.4,
                Units::Foot => 304.8,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Units::Millimeter => "mm",
                Units::Centimeter => "cm",
                Units::Meter => "m",
                Units::Inch => "inch",
                Units::Foot => "ft",
            }
        }
    }

    impl FromStr for Units {
        type Err = String;

        fn from_str(raw: &str) -> Result<Self, Self::Err> {
            match raw.trim().to_ascii_lowercase().as_str() {
                "mm" => Ok(Units::Millimeter),
                "cm" => Ok(Units::Centimeter),
                "m" => Ok(Units::Meter),
                "inch" | "in" => Ok(Units::Inch),
                "ft" => Ok(Units::Foot),
                other => Err(format!("未知的单位：{other}")),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CadMetadata {
        pub file_name: String,
        pub file_size: u64,
        pub entity_count: usize,
        pub parse_time_ms: f64,
    }

    /// 一次解析的完整结果。图层按 LAYER 表顺序排列，实体引用的未登记图层依首次出现顺序追加。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CadData {
        pub entities: Vec<CadEntity>,
        pub layers: Vec<LayerInfo>,
        pub bounds: BoundingBox,
        pub units: Units,
        pub metadata: CadMetadata,
    }

    impl CadData {
        pub fn layer(&self, name: &str) -> Option<&LayerInfo> {
            self.layers.iter().find(|layer| layer.name == name)
        }

        pub fn entity(&self, id: EntityId) -> Option<&CadEntity> {
            self.entities.iter().find(|entity| entity.id == id)
        }

        pub fn entities_on_layer<'a>(
            &'a self,
            layer: &'a str,
        ) -> impl Iterator<Item = &'a CadEntity> + 'a {
            self.entities.iter().filter(move |entity| entity.layer == layer)
        }
    }

}
