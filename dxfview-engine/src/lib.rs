pub mod tessellate;
pub mod view;

pub use lod::LodPolicy;
pub use tessellate::{
    LayerGeometry, VertexBuffer, to_geometry, to_geometry_with, to_layer_geometry,
    to_layer_geometry_with,
};
pub use view::{DEFAULT_FOV_DEGREES, ViewFit, camera_distance};

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum EngineError {
        #[error("{tier} 档位的分段数 {segments} 过小，至少需要 {minimum}")]
        SegmentsTooFew {
            tier: &'static str,
            segments: usize,
            minimum: usize,
        },
        #[error("LOD 阈值必须递增：高质量阈值 {high} 不小于中等质量阈值 {medium}")]
        ThresholdsOutOfOrder { high: usize, medium: usize },
    }
}

pub mod lod {
    use serde::{Deserialize, Serialize};
    use tracing::debug;

    use crate::errors::EngineError;

    /// 曲线离散化允许的最小分段数。
    pub const MIN_SEGMENTS: usize = 3;

    /// 按实体总数选择圆、圆弧与椭圆的分段数。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LodPolicy {
        high_segments: usize,
        medium_segments: usize,
        low_segments: usize,
        high_threshold: usize,
        medium_threshold: usize,
    }

    impl LodPolicy {
        pub fn new(
            high_segments: usize,
            medium_segments: usize,
            low_segments: usize,
            high_threshold: usize,
            medium_threshold: usize,
        ) -> Result<Self, EngineError> {
            for (tier, segments) in [
                ("high", high_segments),
                ("medium", medium_segments),
                ("low", low_segments),
            ] {
                if segments < MIN_SEGMENTS {
                    return Err(EngineError::SegmentsTooFew {
                        tier,
                        segments,
                        minimum: MIN_SEGMENTS,
                    });
                }
            }
            if high_threshold >= medium_threshold {
                return Err(EngineError::ThresholdsOutOfOrder {
                    high: high_threshold,
                    medium: medium_threshold,
                });
            }
            Ok(Self {
                high_segments,
                medium_segments,
                low_segments,
                high_threshold,
                medium_threshold,
            })
        }

        /// 实体数少于高质量阈值用高精度，少于中等阈值用中等精度，否则用低精度。
        pub fn segments_for(&self, entity_count: usize) -> usize {
            if entity_count < self.high_threshold {
                self.high_segments
            } else if entity_count < self.medium_threshold {
                self.medium_segments
            } else {
                self.low_segments
            }
        }

        /// 显式指定的分段数总是优先，但不低于 [`MIN_SEGMENTS`]。
        pub fn resolve(&self, entity_count: usize, segments_override: Option<usize>) -> usize {
            let segments = match segments_override {
                Some(segments) => segments.max(MIN_SEGMENTS),
                None => self.segments_for(entity_count),
            };
            debug!(
                entity_count,
                overridden = segments_override.is_some(),
                segments,
                "已选择曲线分段数"
            );
            segments
        }
    }

    impl Default for LodPolicy {
        fn default() -> Self {
            Self {
                high_segments: 64,
                medium_segments: 32,
                low_segments: 16,
                high_threshold: 1_000,
                medium_threshold: 5_000,
            }
        }
    }

}
