//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，承载图片流水线之外的错误来源
//! （读取本地文件、加载配置），替代分散的 `.map_err(|e| e.to_string())`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageError` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于展示层直接消费。

use serde::Serialize;

use crate::image_handler::ImageError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片处理流水线错误（校验 / 解码 / 编码）
    #[error("{}", .0.user_message())]
    Image(#[from] ImageError),

    /// 文件系统 I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 配置无效
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_errors_serialize_as_user_messages() {
        let error = AppError::from(ImageError::Processing("Canvas context not available".to_string()));
        let json = serde_json::to_string(&error).expect("serialize error");
        assert_eq!(json, "\"Canvas context not available. Please try again.\"");
    }
}
