//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载上传链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! - `Validation`：类型 / 体积 / 空文件 / 尺寸范围，原样展示给用户
//! - `Decode`：字节无法解码为图片
//! - `Processing`：编码或绘制能力不可用 / 失败
//! - `ResourceLimit`：像素预算超限
//!
//! 错误只描述“哪类失败”；发生在哪个阶段由会话层按当前阶段记录。

/// 图片处理统一错误类型。
///
/// 该类型会在会话层被写入“当前错误”槽位，或在二进制入口上转为 `AppError`。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Processing(String),

    #[error("{0}")]
    ResourceLimit(String),
}

impl ImageError {
    /// 稳定错误码，供展示层分支判断。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Decode(_) => "decode",
            Self::Processing(_) => "processing",
            Self::ResourceLimit(_) => "resource_limit",
        }
    }

    /// 面向用户的提示文案。
    ///
    /// 校验错误原样展示；其余错误统一追加重试提示。
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            other => format!("{}. Please try again.", other),
        }
    }
}

impl From<ImageError> for String {
    fn from(error: ImageError) -> Self {
        error.user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_shown_verbatim() {
        let error = ImageError::Validation("Please upload a PNG or JPG image.".to_string());
        assert_eq!(error.user_message(), "Please upload a PNG or JPG image.");
        assert_eq!(error.code(), "validation");
    }

    #[test]
    fn decode_message_asks_for_retry() {
        let error = ImageError::Decode("Failed to load image".to_string());
        assert_eq!(error.user_message(), "Failed to load image. Please try again.");
        assert_eq!(error.code(), "decode");
    }
}
