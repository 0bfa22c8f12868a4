use dxfview_core::geometry::{BoundingBox, Point3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FOV_DEGREES: f64 = 45.0;
/// 适配视图时在包围盒外留出的余量倍数。
const FIT_MARGIN: f64 = 1.5;

/// 让整个包围盒落入视野所需的相机距离。
pub fn camera_distance(bounds: &BoundingBox, fov_degrees: f64) -> f64 {
    let size = bounds.size();
    let max_dimension = size.x.max(size.y).max(size.z);
    let half_fov = fov_degrees.to_radians() / 2.0;
    max_dimension / 2.0 / half_fov.tan() * FIT_MARGIN
}

/// 相机对准的中心点与距离。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewFit {
    pub center: Point3,
    pub distance: f64,
}

impl ViewFit {
    /// 空包围盒按默认视图处理。
    pub fn from_bounds(bounds: &BoundingBox, fov_degrees: f64) -> Self {
        let bounds = bounds.or_default_view();
        Self {
            center: bounds.center(),
            distance: camera_distance(&bounds, fov_degrees),
        }
    }
}
