//! # 时尚图片上传预处理 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            展示层（上传表单 / 预览 / 风格与提示词）        │
//! │        拖拽 · 文件选择器          ProcessingResult 预览    │
//! └───────┬──────────────────────────────────▲───────────────┘
//!         ↓ SourceFile                       │ Done / Failed
//! ┌───────┼──────────────────────────────────┼───────────────┐
//! │       ↓            后端 (Rust)           │               │
//! │                                                          │
//! │  ┌─ error ────────── AppError (统一错误类型)              │
//! │  │                                                       │
//! │  └─ image_handler ── 上传状态机 · 校验 · 探测 · 缩放编码  │
//! │      ├─ session        最新选择优先（序号比对）           │
//! │      ├─ handler        spawn_blocking 编解码              │
//! │      └─ codec          可注入的 decode / encode 能力      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`image_handler`] | 校验上传文件、探测尺寸、按比例缩放并重新编码 |

pub mod error;
pub mod image_handler;
