//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ImageConfig`，保证运行时行为可观测、可调整、可测试。
//! 校验阈值（类型、体积、尺寸范围）与缩放参数（阈值、质量、滤镜）放在同一处，
//! 校验器与缩放器共用同一份配置快照。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的配置（10MB / 1920px / 质量 90）。
//! - 支持从 JSON 文件加载，缺省字段回落到默认值。
//! - `ImagePerformanceProfile` 作为高层语义，映射到底层缩放滤镜。

use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::ImageError;
use crate::error::AppError;

/// 默认允许的媒体类型。
pub const DEFAULT_ACCEPTED_MEDIA_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// 图片上传与处理配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// 允许上传的声明媒体类型。
    pub accepted_media_types: Vec<String>,
    /// 允许的最大文件体积（字节，含边界）。
    pub max_file_size: u64,
    /// 缩放阈值：任一边超过该值即按比例缩小。
    pub max_dimension: u32,
    /// 单边最小像素。
    pub min_dimension: u32,
    /// 尺寸校验上限倍数（上限 = `max_dimension * dimension_limit_multiplier`）。
    pub dimension_limit_multiplier: u32,
    /// 有损格式重新编码质量（1~100）。
    pub encode_quality: u8,
    /// 完整解码前允许的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 性能档位。
    pub performance_profile: ImagePerformanceProfile,
    /// 缩放滤镜，由性能档位推导。
    #[serde(skip, default = "default_resize_filter")]
    pub resize_filter: FilterType,
}

fn default_resize_filter() -> FilterType {
    FilterType::Triangle
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            accepted_media_types: DEFAULT_ACCEPTED_MEDIA_TYPES
                .iter()
                .map(|media_type| media_type.to_string())
                .collect(),
            max_file_size: 10 * 1024 * 1024,
            max_dimension: 1920,
            min_dimension: 1,
            dimension_limit_multiplier: 2,
            encode_quality: 90,
            max_decoded_pixels: 40_000_000,
            performance_profile: ImagePerformanceProfile::Balanced,
            resize_filter: default_resize_filter(),
        }
    }
}

/// 图片性能档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先处理速度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl ImagePerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use fashion_upload::image_handler::ImagePerformanceProfile;
    ///
    /// let p = ImagePerformanceProfile::from_str("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), fashion_upload::image_handler::ImageError>(())
    /// ```
    pub fn from_str(profile: &str) -> Result<Self, ImageError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(ImageError::Validation(format!(
                "Unknown performance profile: {} (expected quality / balanced / speed)",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }

    fn resize_filter(self) -> FilterType {
        match self {
            Self::Quality => FilterType::CatmullRom,
            Self::Balanced => FilterType::Triangle,
            Self::Speed => FilterType::Nearest,
        }
    }
}

impl ImageConfig {
    /// 从 JSON 配置文件加载，缺省字段使用默认值。
    pub fn load_from_path(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, AppError> {
        let mut config: Self = serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("failed to parse image config: {}", e)))?;
        config.apply_performance_profile(config.performance_profile);
        config.check()?;
        Ok(config)
    }

    /// 尺寸校验上限（默认 3840）。
    pub fn dimension_upper_bound(&self) -> u32 {
        self.max_dimension.saturating_mul(self.dimension_limit_multiplier)
    }

    /// 应用指定性能档位到实际参数。
    pub(crate) fn apply_performance_profile(&mut self, profile: ImagePerformanceProfile) {
        self.performance_profile = profile;
        self.resize_filter = profile.resize_filter();
    }

    fn check(&self) -> Result<(), AppError> {
        if self.max_dimension == 0 {
            return Err(AppError::Config("max_dimension must be positive".to_string()));
        }
        if self.dimension_limit_multiplier < 1 {
            return Err(AppError::Config(
                "dimension_limit_multiplier must be at least 1".to_string(),
            ));
        }
        if self.min_dimension > self.max_dimension {
            return Err(AppError::Config(
                "min_dimension must not exceed max_dimension".to_string(),
            ));
        }
        if !(1..=100).contains(&self.encode_quality) {
            return Err(AppError::Config(
                "encode_quality must be within 1~100".to_string(),
            ));
        }
        if self.accepted_media_types.is_empty() {
            return Err(AppError::Config(
                "accepted_media_types must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
