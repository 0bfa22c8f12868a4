//! 基于段的 DXF 状态机：HEADER、TABLES（仅 LAYER）、ENTITIES，其余段整体跳过。

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use dxfview_core::document::{
    Arc, Circle, Ellipse, EntityKind, Line, Point, Polyline, PolylineVertex, Spline, Text, Units,
};
use dxfview_core::geometry::{Point3, Vector3};
use tracing::debug;

use crate::error::{Cancelled, DxfError};
use crate::progress::CancelToken;
use crate::scanner::{DxfScanner, DxfValue, INVALID_GROUP_CODE};

const CANCEL_CHECK_INTERVAL: usize = 256;

/// LAYER 表中的一条记录。
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub name: String,
    /// 组码 62，已去掉表示“关闭”的负号。
    pub color_index: Option<i32>,
    /// 组码 420，24 位 RGB。
    pub true_color: Option<u32>,
    pub line_type: String,
    /// 组码 62 为负数表示图层关闭。
    pub off: bool,
    pub frozen: bool,
    pub locked: bool,
}

/// 文档解析阶段得到的实体，图层与颜色尚未规范化。
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity {
    pub layer: Option<String>,
    pub color: Option<i32>,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfDocument {
    pub header: HashMap<String, DxfValue>,
    pub layers: Vec<LayerEntry>,
    pub entities: Vec<RawEntity>,
    /// 未支持的实体类型及其出现次数。
    pub skipped: BTreeMap<String, usize>,
}

impl DxfDocument {
    pub fn header_value(&self, name: &str) -> Option<&DxfValue> {
        self.header.get(name)
    }

    pub fn units(&self) -> Units {
        self.header_value("$INSUNITS")
            .and_then(DxfValue::as_i64)
            .map(Units::from_insunits)
            .unwrap_or_default()
    }
}

/// 解析整份 DXF 文本。未知实体被跳过，只有组码错乱或数值字段非法时才会失败。
pub fn parse_document(source: &str) -> Result<DxfDocument, DxfError> {
    DxfParser::new(source, None).parse()
}

pub(crate) struct DxfParser<'a, 'c> {
    scanner: DxfScanner<'a>,
    cancel: Option<&'c CancelToken>,
    records: usize,
}

#[derive(Default)]
struct Common {
    layer: Option<String>,
    color: Option<i32>,
}

impl Common {
    fn accept(&mut self, code: i32, value: &DxfValue, line: usize) -> Result<(), DxfError> {
        match code {
            8 => self.layer = Some(value.as_str().to_string()),
            62 => self.color = Some(integer(value, "实体颜色（组码 62）", line)?),
            _ => {}
        }
        Ok(())
    }

    fn finish(self, kind: EntityKind) -> RawEntity {
        RawEntity {
            layer: self.layer,
            color: self.color,
            kind,
        }
    }
}

impl<'a, 'c> DxfParser<'a, 'c> {
    pub(crate) fn new(source: &'a str, cancel: Option<&'c CancelToken>) -> Self {
        Self {
            scanner: DxfScanner::new(source),
            cancel,
            records: 0,
        }
    }

    pub(crate) fn parse(mut self) -> Result<DxfDocument, DxfError> {
        let mut document = DxfDocument::default();
        while !self.scanner.is_exhausted() {
            let code = self.read_code()?;
            let value = self.scanner.read_value();
            if code != 0 {
                continue;
            }
            match value.as_str() {
                "SECTION" => {
                    self.checkpoint()?;
                    self.read_code()?;
                    let name = self.scanner.read_value();
                    debug!(
                        section = name.as_str(),
                        line = self.scanner.line_number(),
                        "进入 DXF 段"
                    );
                    match name.as_str() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "TABLES" => self.parse_tables(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                _ => {}
            }
        }
        debug!(
            entities = document.entities.len(),
            layers = document.layers.len(),
            header_vars = document.header.len(),
            "DXF 文档解析完成"
        );
        Ok(document)
    }

    fn checkpoint(&self) -> Result<(), Cancelled> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(Cancelled),
            _ => Ok(()),
        }
    }

    fn tick(&mut self) -> Result<(), Cancelled> {
        self.records += 1;
        if self.records % CANCEL_CHECK_INTERVAL == 0 {
            self.checkpoint()?;
        }
        Ok(())
    }

    fn read_code(&mut self) -> Result<i32, DxfError> {
        let code = self.scanner.read_code();
        if code == INVALID_GROUP_CODE {
            let line = self.scanner.line_number();
            let text = self.scanner.previous_line().unwrap_or_default();
            return Err(DxfError::invalid_at(
                format!("第 {line} 行的组码 \"{text}\" 无法解析为整数"),
                line,
            ));
        }
        Ok(code)
    }

    /// 读取当前实体的下一个字段；遇到组码 0 或文件结束时返回 `None`，不消耗该组码。
    fn next_field(&mut self) -> Result<Option<(i32, DxfValue)>, DxfError> {
        if self.scanner.is_exhausted() || self.scanner.peek_code() == 0 {
            return Ok(None);
        }
        let code = self.read_code()?;
        if self.scanner.is_exhausted() {
            // 文件在值行之前截断，丢弃这个孤立的组码
            return Ok(None);
        }
        Ok(Some((code, self.scanner.read_value())))
    }

    #[inline]
    fn number(&self, value: &DxfValue, context: &str) -> Result<f64, DxfError> {
        number(value, context, self.scanner.line_number())
    }

    #[inline]
    fn integer(&self, value: &DxfValue, context: &str) -> Result<i32, DxfError> {
        integer(value, context, self.scanner.line_number())
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        while !self.scanner.is_exhausted() {
            let code = self.read_code()?;
            let value = self.scanner.read_value();
            if code == 0 && value.as_str() == "ENDSEC" {
                break;
            }
        }
        Ok(())
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        while self.next_field()?.is_some() {}
        Ok(())
    }

    fn parse_header(&mut self, document: &mut DxfDocument) -> Result<(), DxfError> {
        while !self.scanner.is_exhausted() {
            let code = self.read_code()?;
            if code == 0 {
                if self.scanner.read_value().as_str() == "ENDSEC" {
                    break;
                }
                continue;
            }
            if code == 9 {
                let name = self.scanner.read_value().as_str().to_string();
                self.read_code()?;
                let value = self.scanner.read_value();
                document.header.insert(name, value);
            } else {
                // 多分量变量（如 $EXTMIN）只保留第一个值
                self.scanner.read_value();
            }
        }
        Ok(())
    }

    fn parse_tables(&mut self, document: &mut DxfDocument) -> Result<(), DxfError> {
        while !self.scanner.is_exhausted() {
            let code = self.read_code()?;
            let value = self.scanner.read_value();
            if code != 0 {
                continue;
            }
            match value.as_str() {
                "ENDSEC" => break,
                "LAYER" => {
                    if let Some(layer) = self.parse_layer()? {
                        document.layers.push(layer);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_layer(&mut self) -> Result<Option<LayerEntry>, DxfError> {
        let mut name: Option<String> = None;
        let mut color_index = None;
        let mut off = false;
        let mut true_color = None;
        let mut line_type = "CONTINUOUS".to_string();
        let mut flags = 0;
        while let Some((code, value)) = self.next_field()? {
            match code {
                2 => name = Some(value.as_str().to_string()),
                62 => {
                    let index = self.integer(&value, "LAYER 颜色（组码 62）")?;
                    off = index < 0;
                    color_index = Some(index.abs());
                }
                6 => line_type = value.as_str().to_string(),
                70 => flags = self.integer(&value, "LAYER 标志（组码 70）")?,
                420 => {
                    let rgb = self.integer(&value, "LAYER 真彩色（组码 420）")?;
                    true_color = Some(rgb as u32 & 0x00ff_ffff);
                }
                _ => {}
            }
        }

        Ok(name.filter(|name| !name.is_empty()).map(|name| LayerEntry {
            name,
            color_index,
            true_color,
            line_type,
            off,
            frozen: flags & 0x01 != 0,
            locked: flags & 0x04 != 0,
        }))
    }

    fn parse_entities(&mut self, document: &mut DxfDocument) -> Result<(), DxfError> {
        while !self.scanner.is_exhausted() {
            let code = self.read_code()?;
            let value = self.scanner.read_value();
            if code != 0 {
                continue;
            }
            let name = value.as_str();
            // 缺少 ENDSEC 时 EOF 同样结束实体段
            if name == "ENDSEC" || name == "EOF" {
                break;
            }
            self.tick()?;
            match self.parse_entity(name)? {
                Some(entity) => document.entities.push(entity),
                None => {
                    self.skip_entity_body()?;
                    *document.skipped.entry(name.to_string()).or_default() += 1;
                }
            }
        }
        Ok(())
    }

    fn parse_entity(&mut self, name: &str) -> Result<Option<RawEntity>, DxfError> {
        let entity = match name {
            "LINE" => self.parse_line()?,
            "CIRCLE" => self.parse_circle()?,
            "ARC" => self.parse_arc()?,
            "LWPOLYLINE" => self.parse_polyline(true)?,
            "POLYLINE" => self.parse_polyline(false)?,
            "POINT" => self.parse_point()?,
            "TEXT" => self.parse_text(false)?,
            "MTEXT" => self.parse_text(true)?,
            "SPLINE" => self.parse_spline()?,
            "ELLIPSE" => self.parse_ellipse()?,
            _ => return Ok(None),
        };
        Ok(Some(entity))
    }

    fn parse_line(&mut self) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut start = Point3::ORIGIN;
        let mut end = Point3::ORIGIN;
        while let Some((code, value)) = self.next_field()? {
            match code {
                10 => start.0.x = self.number(&value, "LINE 起点 X")?,
                20 => start.0.y = self.number(&value, "LINE 起点 Y")?,
                30 => start.0.z = self.number(&value, "LINE 起点 Z")?,
                11 => end.0.x = self.number(&value, "LINE 终点 X")?,
                21 => end.0.y = self.number(&value, "LINE 终点 Y")?,
                31 => end.0.z = self.number(&value, "LINE 终点 Z")?,
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        Ok(common.finish(EntityKind::Line(Line { start, end })))
    }

    fn parse_circle(&mut self) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut center = Point3::ORIGIN;
        let mut radius = 1.0;
        while let Some((code, value)) = self.next_field()? {
            match code {
                10 => center.0.x = self.number(&value, "CIRCLE 圆心 X")?,
                20 => center.0.y = self.number(&value, "CIRCLE 圆心 Y")?,
                30 => center.0.z = self.number(&value, "CIRCLE 圆心 Z")?,
                40 => radius = self.number(&value, "CIRCLE 半径")?,
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        Ok(common.finish(EntityKind::Circle(Circle { center, radius })))
    }

    fn parse_arc(&mut self) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut center = Point3::ORIGIN;
        let mut radius = 1.0;
        let mut start_angle = 0.0;
        let mut end_angle = 360.0;
        while let Some((code, value)) = self.next_field()? {
            match code {
                10 => center.0.x = self.number(&value, "ARC 圆心 X")?,
                20 => center.0.y = self.number(&value, "ARC 圆心 Y")?,
                30 => center.0.z = self.number(&value, "ARC 圆心 Z")?,
                40 => radius = self.number(&value, "ARC 半径")?,
                50 => start_angle = self.number(&value, "ARC 起始角")?,
                51 => end_angle = self.number(&value, "ARC 终止角")?,
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        Ok(common.finish(EntityKind::Arc(Arc {
            center,
            radius,
            start_angle,
            end_angle,
        })))
    }

    /// 组码 10 先收尾当前顶点再开启新顶点，20/30/42 写入当前顶点。
    fn parse_polyline(&mut self, lightweight: bool) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut current: Option<PolylineVertex> = None;
        while let Some((code, value)) = self.next_field()? {
            match code {
                70 => closed = self.integer(&value, "多段线标志（组码 70）")? & 0x01 != 0,
                10 => {
                    let x = self.number(&value, "多段线顶点 X")?;
                    if let Some(vertex) = current.take() {
                        vertices.push(vertex);
                    }
                    current = Some(PolylineVertex::new(Point3::new(x, 0.0, 0.0)));
                }
                20 => {
                    let y = self.number(&value, "多段线顶点 Y")?;
                    if let Some(vertex) = current.as_mut() {
                        vertex.position.0.y = y;
                    }
                }
                30 => {
                    let z = self.number(&value, "多段线顶点 Z")?;
                    if let Some(vertex) = current.as_mut() {
                        vertex.position.0.z = z;
                    }
                }
                42 => {
                    let bulge = self.number(&value, "多段线顶点 bulge")?;
                    if let Some(vertex) = current.as_mut() {
                        vertex.bulge = bulge;
                    }
                }
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        if let Some(vertex) = current.take() {
            vertices.push(vertex);
        }

        if !lightweight {
            // 经典 POLYLINE 头部的 10/20/30 只是标高占位，存在 VERTEX 序列时以序列为准
            let sequence = self.parse_vertex_sequence()?;
            if !sequence.is_empty() {
                vertices = sequence;
            }
        }

        Ok(common.finish(EntityKind::Polyline(Polyline {
            vertices,
            closed,
            lightweight,
        })))
    }

    fn parse_vertex_sequence(&mut self) -> Result<Vec<PolylineVertex>, DxfError> {
        let mut vertices = Vec::new();
        while !self.scanner.is_exhausted() && self.scanner.peek_code() == 0 {
            match self.scanner.peek_value() {
                Some("VERTEX") => {
                    self.consume_record();
                    self.tick()?;
                    vertices.push(self.parse_vertex()?);
                }
                Some("SEQEND") => {
                    self.consume_record();
                    self.skip_entity_body()?;
                    break;
                }
                _ => break,
            }
        }
        Ok(vertices)
    }

    fn parse_vertex(&mut self) -> Result<PolylineVertex, DxfError> {
        let mut vertex = PolylineVertex::new(Point3::ORIGIN);
        while let Some((code, value)) = self.next_field()? {
            match code {
                10 => vertex.position.0.x = self.number(&value, "VERTEX X")?,
                20 => vertex.position.0.y = self.number(&value, "VERTEX Y")?,
                30 => vertex.position.0.z = self.number(&value, "VERTEX Z")?,
                42 => vertex.bulge = self.number(&value, "VERTEX bulge")?,
                _ => {}
            }
        }
        Ok(vertex)
    }

    fn consume_record(&mut self) {
        self.scanner.read_code();
        self.scanner.read_value();
    }

    fn parse_point(&mut self) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut position = Point3::ORIGIN;
        while let Some((code, value)) = self.next_field()? {
            match code {
                10 => position.0.x = self.number(&value, "POINT X")?,
                20 => position.0.y = self.number(&value, "POINT Y")?,
                30 => position.0.z = self.number(&value, "POINT Z")?,
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        Ok(common.finish(EntityKind::Point(Point { position })))
    }

    fn parse_text(&mut self, multiline: bool) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut position = Point3::ORIGIN;
        let mut content = String::new();
        let mut leading_chunks = String::new();
        let mut height = 1.0;
        let mut rotation = None;
        while let Some((code, value)) = self.next_field()? {
            match code {
                10 => position.0.x = self.number(&value, "文字插入点 X")?,
                20 => position.0.y = self.number(&value, "文字插入点 Y")?,
                30 => position.0.z = self.number(&value, "文字插入点 Z")?,
                1 => content = value.as_str().to_string(),
                3 if multiline => leading_chunks.push_str(value.as_str()),
                40 => height = self.number(&value, "文字高度")?,
                50 => rotation = Some(self.number(&value, "文字旋转角")?),
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        let content = if multiline {
            leading_chunks.push_str(&content);
            decode_mtext(&leading_chunks)
        } else {
            content
        };
        Ok(common.finish(EntityKind::Text(Text {
            position,
            content,
            height,
            rotation,
            multiline,
        })))
    }

    fn parse_spline(&mut self) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut closed = false;
        let mut degree = 3;
        let mut control_points: Vec<Point3> = Vec::new();
        let mut current: Option<Point3> = None;
        while let Some((code, value)) = self.next_field()? {
            match code {
                70 => closed = self.integer(&value, "SPLINE 标志（组码 70）")? & 0x01 != 0,
                71 => degree = self.integer(&value, "SPLINE 阶数（组码 71）")?,
                10 => {
                    let x = self.number(&value, "SPLINE 控制点 X")?;
                    if let Some(point) = current.take() {
                        control_points.push(point);
                    }
                    current = Some(Point3::new(x, 0.0, 0.0));
                }
                20 => {
                    let y = self.number(&value, "SPLINE 控制点 Y")?;
                    if let Some(point) = current.as_mut() {
                        point.0.y = y;
                    }
                }
                30 => {
                    let z = self.number(&value, "SPLINE 控制点 Z")?;
                    if let Some(point) = current.as_mut() {
                        point.0.z = z;
                    }
                }
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        if let Some(point) = current.take() {
            control_points.push(point);
        }
        Ok(common.finish(EntityKind::Spline(Spline {
            control_points,
            degree,
            closed,
        })))
    }

    fn parse_ellipse(&mut self) -> Result<RawEntity, DxfError> {
        let mut common = Common::default();
        let mut center = Point3::ORIGIN;
        let mut major_axis = Vector3::new(1.0, 0.0, 0.0);
        let mut ratio = 0.5;
        let mut start_parameter = 0.0;
        let mut end_parameter = TAU;
        while let Some((code, value)) = self.next_field()? {
            match code {
                10 => center.0.x = self.number(&value, "ELLIPSE 圆心 X")?,
                20 => center.0.y = self.number(&value, "ELLIPSE 圆心 Y")?,
                30 => center.0.z = self.number(&value, "ELLIPSE 圆心 Z")?,
                11 => major_axis.0.x = self.number(&value, "ELLIPSE 主轴 X")?,
                21 => major_axis.0.y = self.number(&value, "ELLIPSE 主轴 Y")?,
                31 => major_axis.0.z = self.number(&value, "ELLIPSE 主轴 Z")?,
                40 => ratio = self.number(&value, "ELLIPSE 短长轴比")?,
                41 => start_parameter = self.number(&value, "ELLIPSE 起始参数")?,
                42 => end_parameter = self.number(&value, "ELLIPSE 终止参数")?,
                _ => common.accept(code, &value, self.scanner.line_number())?,
            }
        }
        Ok(common.finish(EntityKind::Ellipse(Ellipse {
            center,
            major_axis,
            ratio,
            start_parameter,
            end_parameter,
        })))
    }
}

fn number(value: &DxfValue, context: &str, line: usize) -> Result<f64, DxfError> {
    value.as_f64().ok_or_else(|| {
        DxfError::invalid_at(
            format!("{context} 不是有效数值（值：\"{}\"）", value.as_str()),
            line,
        )
    })
}

fn integer(value: &DxfValue, context: &str, line: usize) -> Result<i32, DxfError> {
    value
        .as_i64()
        .and_then(|raw| i32::try_from(raw).ok())
        .ok_or_else(|| {
            DxfError::invalid_at(
                format!("{context} 不是有效整数（值：\"{}\"）", value.as_str()),
                line,
            )
        })
}

/// 处理 MTEXT 的常用转义：`\P` 换行，`\~` 不换行空格，`\\` 反斜杠。
fn decode_mtext(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('P') | Some('p') => result.push('\n'),
            Some('~') => result.push(' '),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    fn dxf(records: &[(i32, &str)]) -> String {
        let mut text = String::new();
        for (code, value) in records {
            text.push_str(&format!("{code}\n{value}\n"));
        }
        text
    }

    fn entities_section(body: &[(i32, &str)]) -> String {
        let mut records = vec![(0, "SECTION"), (2, "ENTITIES")];
        records.extend_from_slice(body);
        records.extend_from_slice(&[(0, "ENDSEC"), (0, "EOF")]);
        dxf(&records)
    }

    fn only_kind(text: &str) -> EntityKind {
        let document = parse_document(text).expect("解析 DXF 失败");
        assert_eq!(document.entities.len(), 1, "期望仅有一个实体");
        document.entities[0].kind.clone()
    }

    #[test]
    fn header_units_are_read() {
        let text = dxf(&[
            (0, "SECTION"),
            (2, "HEADER"),
            (9, "$ACADVER"),
            (1, "AC1015"),
            (9, "$EXTMIN"),
            (10, "0.0"),
            (20, "0.0"),
            (9, "$INSUNITS"),
            (70, "1"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let document = parse_document(&text).expect("解析 HEADER 失败");
        assert_eq!(document.units(), Units::Inch);
        assert_eq!(
            document.header_value("$ACADVER").map(DxfValue::as_str),
            Some("AC1015")
        );
        assert!(document.entities.is_empty());
    }

    #[test]
    fn layer_table_records() {
        let text = dxf(&[
            (0, "SECTION"),
            (2, "TABLES"),
            (0, "TABLE"),
            (2, "LAYER"),
            (70, "3"),
            (0, "LAYER"),
            (2, "WALLS"),
            (70, "5"),
            (62, "-1"),
            (6, "DASHED"),
            (0, "LAYER"),
            (2, "GLASS"),
            (420, "16777215"),
            (0, "LAYER"),
            (62, "3"),
            (0, "ENDTAB"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let document = parse_document(&text).expect("解析 TABLES 失败");
        assert_eq!(document.layers.len(), 2, "缺少名称的图层应被丢弃");

        let walls = &document.layers[0];
        assert_eq!(walls.name, "WALLS");
        assert_eq!(walls.color_index, Some(1));
        assert_eq!(walls.line_type, "DASHED");
        assert!(walls.off);
        assert!(walls.frozen);
        assert!(walls.locked);

        let glass = &document.layers[1];
        assert_eq!(glass.true_color, Some(0xffffff));
        assert_eq!(glass.color_index, None);
        assert_eq!(glass.line_type, "CONTINUOUS");
        assert!(!glass.frozen);
        assert!(!glass.off);
    }

    #[test]
    fn line_with_layer_and_color() {
        let text = entities_section(&[
            (0, "LINE"),
            (8, "WALLS"),
            (62, "1"),
            (10, "1.5"),
            (20, "2.5"),
            (30, "0"),
            (11, "10"),
            (21, "0"),
            (31, "0"),
        ]);
        let document = parse_document(&text).expect("解析 LINE 失败");
        let entity = &document.entities[0];
        assert_eq!(entity.layer.as_deref(), Some("WALLS"));
        assert_eq!(entity.color, Some(1));
        match &entity.kind {
            EntityKind::Line(line) => {
                assert_eq!(line.start, Point3::new(1.5, 2.5, 0.0));
                assert_eq!(line.end, Point3::new(10.0, 0.0, 0.0));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn numeric_layer_name_stays_text() {
        let text = entities_section(&[(0, "POINT"), (8, "0"), (10, "1"), (20, "2")]);
        let document = parse_document(&text).expect("解析 POINT 失败");
        assert_eq!(document.entities[0].layer.as_deref(), Some("0"));
    }

    #[test]
    fn arc_and_circle_defaults() {
        match only_kind(&entities_section(&[(0, "ARC"), (10, "1"), (20, "1")])) {
            EntityKind::Arc(arc) => {
                assert!((arc.radius - 1.0).abs() < 1e-9);
                assert!(arc.start_angle.abs() < 1e-9);
                assert!((arc.end_angle - 360.0).abs() < 1e-9);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        match only_kind(&entities_section(&[(0, "CIRCLE"), (10, "3")])) {
            EntityKind::Circle(circle) => {
                assert_eq!(circle.center, Point3::new(3.0, 0.0, 0.0));
                assert!((circle.radius - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn lwpolyline_vertices_with_bulge() {
        let kind = only_kind(&entities_section(&[
            (0, "LWPOLYLINE"),
            (90, "3"),
            (70, "1"),
            (10, "0"),
            (20, "0"),
            (42, "1"),
            (10, "10"),
            (20, "0"),
            (10, "10"),
            (20, "10"),
        ]));
        match kind {
            EntityKind::Polyline(polyline) => {
                assert!(polyline.closed);
                assert!(polyline.lightweight);
                assert_eq!(polyline.vertices.len(), 3);
                assert!((polyline.vertices[0].bulge - 1.0).abs() < 1e-9);
                assert!(polyline.vertices[1].bulge.abs() < 1e-9);
                assert_eq!(polyline.vertices[2].position, Point3::new(10.0, 10.0, 0.0));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn classic_polyline_reads_vertex_sequence() {
        let text = entities_section(&[
            (0, "POLYLINE"),
            (8, "PIPES"),
            (66, "1"),
            (10, "0"),
            (20, "0"),
            (30, "0"),
            (70, "0"),
            (0, "VERTEX"),
            (8, "PIPES"),
            (10, "1"),
            (20, "2"),
            (0, "VERTEX"),
            (8, "PIPES"),
            (10, "3"),
            (20, "4"),
            (42, "-0.5"),
            (0, "SEQEND"),
            (8, "PIPES"),
            (0, "LINE"),
            (11, "1"),
        ]);
        let document = parse_document(&text).expect("解析 POLYLINE 失败");
        assert_eq!(document.entities.len(), 2);
        assert!(document.skipped.is_empty(), "VERTEX/SEQEND 不应计为未支持实体");
        match &document.entities[0].kind {
            EntityKind::Polyline(polyline) => {
                assert!(!polyline.lightweight);
                assert_eq!(polyline.vertices.len(), 2);
                assert_eq!(polyline.vertices[0].position, Point3::new(1.0, 2.0, 0.0));
                assert!((polyline.vertices[1].bulge + 0.5).abs() < 1e-9);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(matches!(document.entities[1].kind, EntityKind::Line(_)));
    }

    #[test]
    fn text_and_mtext() {
        match only_kind(&entities_section(&[
            (0, "TEXT"),
            (10, "5"),
            (20, "6"),
            (40, "2.5"),
            (1, "123"),
        ])) {
            EntityKind::Text(text) => {
                assert_eq!(text.content, "123");
                assert!((text.height - 2.5).abs() < 1e-9);
                assert!(text.rotation.is_none());
                assert!(!text.multiline);
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        match only_kind(&entities_section(&[
            (0, "MTEXT"),
            (3, "Line1\\P"),
            (1, "Line2"),
            (50, "90"),
        ])) {
            EntityKind::Text(text) => {
                assert!(text.multiline);
                assert_eq!(text.content, "Line1\nLine2");
                assert_eq!(text.rotation, Some(90.0));
                assert!((text.height - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn spline_control_points_and_ellipse_defaults() {
        match only_kind(&entities_section(&[
            (0, "SPLINE"),
            (70, "1"),
            (10, "0"),
            (20, "0"),
            (10, "1"),
            (20, "1"),
            (30, "2"),
            (10, "2"),
            (20, "0"),
        ])) {
            EntityKind::Spline(spline) => {
                assert!(spline.closed);
                assert_eq!(spline.degree, 3);
                assert_eq!(spline.control_points.len(), 3);
                assert_eq!(spline.control_points[1], Point3::new(1.0, 1.0, 2.0));
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        match only_kind(&entities_section(&[(0, "ELLIPSE"), (10, "1"), (20, "1")])) {
            EntityKind::Ellipse(ellipse) => {
                assert_eq!(ellipse.major_axis, Vector3::new(1.0, 0.0, 0.0));
                assert!((ellipse.ratio - 0.5).abs() < 1e-9);
                assert!(ellipse.start_parameter.abs() < 1e-9);
                assert!((ellipse.end_parameter - TAU).abs() < 1e-9);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_entities_are_skipped_and_tallied() {
        let text = entities_section(&[
            (0, "INSERT"),
            (2, "BLOCK_A"),
            (10, "5"),
            (0, "LINE"),
            (10, "0"),
            (11, "1"),
            (0, "INSERT"),
            (2, "BLOCK_B"),
        ]);
        let document = parse_document(&text).expect("解析失败");
        assert_eq!(document.entities.len(), 1);
        assert_eq!(document.skipped.get("INSERT"), Some(&2));
    }

    #[test]
    fn eof_closes_entities_without_endsec() {
        let text = dxf(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "LINE"),
            (10, "0"),
            (11, "1"),
            (0, "EOF"),
        ]);
        let document = parse_document(&text).expect("解析失败");
        assert_eq!(document.entities.len(), 1);
        assert!(document.skipped.is_empty());
    }

    #[test]
    fn blocks_and_objects_are_skipped() {
        let text = dxf(&[
            (0, "SECTION"),
            (2, "BLOCKS"),
            (0, "BLOCK"),
            (0, "LINE"),
            (10, "99"),
            (0, "ENDBLK"),
            (0, "ENDSEC"),
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "POINT"),
            (10, "1"),
            (0, "ENDSEC"),
            (0, "SECTION"),
            (2, "OBJECTS"),
            (0, "DICTIONARY"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let document = parse_document(&text).expect("解析失败");
        assert_eq!(document.entities.len(), 1);
        assert!(matches!(document.entities[0].kind, EntityKind::Point(_)));
    }

    #[test]
    fn truncated_input_is_tolerated() {
        let text = "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\n1\n20";
        let document = parse_document(text).expect("截断文件应被容忍");
        match &document.entities[0].kind {
            EntityKind::Line(line) => assert_eq!(line.start, Point3::new(1.0, 0.0, 0.0)),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    fn parse_error_of(text: &str) -> ParseError {
        parse_document(text)
            .expect_err("应解析失败")
            .into_parse_error()
            .expect("不应是取消")
    }

    #[test]
    fn garbled_group_code_reports_line() {
        let text = "0\nSECTION\n2\nENTITIES\n0\nLINE\nnot-a-code\n1\n0\nENDSEC\n";
        let error = parse_error_of(text);
        assert_eq!(error.line, Some(7));
        assert!(error.message.contains("not-a-code"));
    }

    #[test]
    fn non_numeric_coordinate_is_rejected() {
        let error = parse_error_of(&entities_section(&[(0, "LINE"), (10, "abc")]));
        assert_eq!(error.line, Some(8));
        assert!(error.message.contains("LINE 起点 X"));
    }

    #[test]
    fn cancelled_token_stops_parser() {
        let token = CancelToken::new();
        token.cancel();
        let text = entities_section(&[(0, "LINE")]);
        let result = DxfParser::new(&text, Some(&token)).parse();
        assert!(matches!(result, Err(DxfError::Cancelled(_))));
    }
}
