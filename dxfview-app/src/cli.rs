use std::path::PathBuf;

use clap::Parser;
use dxfview_config::ParseConfig;
use dxfview_core::document::Units;
use dxfview_io::ParseOptions;

/// 解析 DXF 文件并输出几何概览。
#[derive(Debug, Parser)]
#[command(name = "dxfview", version, about = "解析 DXF 文件并输出几何概览")]
pub struct Cli {
    /// 待解析的 .dxf 文件
    pub file: PathBuf,

    /// 配置文件路径，缺省时读取 DXFVIEW_CONFIG 或 ./config/default.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 固定曲线分段数，忽略 LOD 策略
    #[arg(long, value_name = "N")]
    pub segments: Option<usize>,

    /// 只保留指定图层，可重复
    #[arg(long = "layer", value_name = "NAME")]
    pub layers: Vec<String>,

    #[arg(long, value_name = "N")]
    pub max_entities: Option<usize>,

    /// 坐标保留的小数位数
    #[arg(long, value_name = "N")]
    pub precision: Option<u32>,

    /// 换算到指定单位（mm、cm、m、inch、ft）
    #[arg(long, value_name = "UNIT")]
    pub unit: Option<Units>,

    /// 去除重复顶点
    #[arg(long)]
    pub simplify: bool,

    /// 按图层输出几何统计
    #[arg(long)]
    pub per_layer: bool,

    /// 以 JSON 输出完整解析结果
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// 命令行参数优先，其余取配置文件中的默认值。
    pub fn parse_options(&self, defaults: &ParseConfig) -> ParseOptions {
        ParseOptions {
            precision: self.precision.or(defaults.precision),
            layer_filter: if self.layers.is_empty() {
                defaults.layer_filter.clone()
            } else {
                self.layers.clone()
            },
            scale_to_unit: self.unit,
            simplify: self.simplify || defaults.simplify,
            max_entities: self.max_entities.or(defaults.max_entities),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::parse_from([
            "dxfview",
            "plan.dxf",
            "--layer",
            "WALLS",
            "--layer",
            "DOORS",
            "--precision",
            "2",
            "--unit",
            "m",
        ]);
        let defaults = ParseConfig {
            max_entities: Some(10),
            layer_filter: vec!["IGNORED".to_string()],
            precision: Some(5),
            simplify: true,
        };
        let options = cli.parse_options(&defaults);
        assert_eq!(options.layer_filter, vec!["WALLS", "DOORS"]);
        assert_eq!(options.precision, Some(2));
        assert_eq!(options.max_entities, Some(10));
        assert_eq!(options.scale_to_unit, Some(Units::Meter));
        assert!(options.simplify);
    }

    #[test]
    fn defaults_apply_without_flags() {
        let cli = Cli::parse_from(["dxfview", "plan.dxf"]);
        let options = cli.parse_options(&ParseConfig::default());
        assert_eq!(options, ParseOptions::default());
        assert!(!cli.json);
        assert!(cli.segments.is_none());
    }
}
