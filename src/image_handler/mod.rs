//! # 图片处理模块（image_handler）
//!
//! ## 设计思路
//!
//! 该模块将“文件选择 → 校验 → 尺寸探测 → 按比例缩放 → 重新编码”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `session`：上传状态机，最新一次选择优先
//! - `handler`：编排探测与处理两段异步流水线
//! - `validation`：类型 / 体积 / 尺寸范围校验与展示格式化
//! - `pipeline`：目标尺寸计算、像素预算、降采样
//! - `codec`：可注入的编解码能力
//! - `object_url`：探测 / 处理期间的临时句柄（RAII 释放）
//! - `config/error/source`：配置、错误、数据模型
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 拖拽 / 文件选择器
//!    ↓
//! session.rs（状态机 + 序号比对）
//!    ├─ validation.rs（类型 / 体积）
//!    ├─ handler.rs::probe_with（临时句柄 + 解码 header）
//!    ├─ validation.rs（尺寸范围）
//!    └─ handler.rs::process_with（解码 → pipeline 缩放 → codec 编码）
//!    ↓
//! ProcessingResult / UploadError 交给展示层
//! ```

mod codec;
mod config;
mod error;
mod handler;
mod object_url;
mod pipeline;
mod session;
mod source;
mod validation;

pub use codec::{ImageCodec, OutputFormat, RasterCodec};
pub use config::{DEFAULT_ACCEPTED_MEDIA_TYPES, ImageConfig, ImagePerformanceProfile};
pub use error::ImageError;
pub use handler::ImageHandler;
pub use object_url::{ObjectUrl, ObjectUrlStore};
pub use pipeline::{TargetDimensions, calculate_target_dimensions};
pub use session::{SelectionOutcome, UploadError, UploadPhase, UploadSession, UploadSnapshot};
pub use source::{EncodedImage, PixelDimensions, ProcessingResult, SourceFile, ValidationOutcome};
pub use validation::{
    compression_ratio, format_dimensions, format_file_size, validate_dimensions, validate_file,
};
