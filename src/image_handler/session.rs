//! # 上传会话（状态机）
//!
//! ## 设计思路
//!
//! 每次选择文件（拖拽或文件选择器）都会启动一次流水线：
//!
//! ```text
//! Idle ─select→ Validating ─→ ProbingDimensions ─→ Processing ─→ Done
//!                   │                 │                  │
//!                   └─────────────────┴──────────────────┴──→ Failed
//! ```
//!
//! 同一时刻只认“最新一次”尝试：旧尝试的结果晚到时直接丢弃，不写入可见状态。
//!
//! ## 实现思路
//!
//! - 每次尝试从 `AtomicU64` 领取单调递增的序号。
//! - 每个阶段写状态前比对序号，落后即放弃后续阶段（无需显式取消原语）。
//! - 状态锁只在同步区间内持有，不跨 `await`。
//! - 当前错误槽位只有一个：新尝试开始时清空，失败时写入。

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::codec::{ImageCodec, RasterCodec};
use super::source::{ProcessingResult, SourceFile};
use super::validation::{validate_dimensions, validate_file};
use super::{ImageError, ImageHandler};

/// 面向展示层的错误信息。
///
/// `stage` 为失败发生时所处的阶段（`UploadPhase::as_str`），`code` 为错误类别。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl UploadError {
    pub fn at(phase: &UploadPhase, error: ImageError) -> Self {
        Self {
            code: error.code(),
            stage: phase.as_str(),
            message: error.user_message(),
        }
    }
}

/// 单次上传所处阶段。
#[derive(Debug, Clone)]
pub enum UploadPhase {
    Idle,
    Validating,
    ProbingDimensions,
    Processing,
    Done(ProcessingResult),
    Failed(UploadError),
}

impl UploadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::ProbingDimensions => "probing_dimensions",
            Self::Processing => "processing",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }

    /// 是否有流水线正在运行。
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::ProbingDimensions | Self::Processing)
    }
}

/// 会话可见状态快照。
#[derive(Debug, Clone)]
pub struct UploadSnapshot {
    pub attempt: u64,
    pub file_name: Option<String>,
    pub phase: UploadPhase,
    pub error: Option<UploadError>,
}

/// 单次选择的结果。
#[derive(Debug, Clone)]
pub enum SelectionOutcome {
    Completed(ProcessingResult),
    Rejected(UploadError),
    /// 已被更新的选择取代，结果未写入可见状态。
    Superseded,
}

/// 上传会话。
pub struct UploadSession<C: ImageCodec = RasterCodec> {
    handler: ImageHandler<C>,
    latest_attempt: AtomicU64,
    state: Mutex<UploadSnapshot>,
}

impl<C: ImageCodec> UploadSession<C> {
    pub fn new(handler: ImageHandler<C>) -> Self {
        Self {
            handler,
            latest_attempt: AtomicU64::new(0),
            state: Mutex::new(UploadSnapshot {
                attempt: 0,
                file_name: None,
                phase: UploadPhase::Idle,
                error: None,
            }),
        }
    }

    pub fn handler(&self) -> &ImageHandler<C> {
        &self.handler
    }

    /// 当前可见状态。
    pub fn state(&self) -> UploadSnapshot {
        self.lock_state().clone()
    }

    /// 当前错误槽位。
    pub fn current_error(&self) -> Option<UploadError> {
        self.lock_state().error.clone()
    }

    /// 文件选择器选中文件。
    pub async fn select_from_picker(&self, file: SourceFile) -> SelectionOutcome {
        self.select_file(file).await
    }

    /// 拖拽释放文件列表，仅处理第一个文件；空列表不触发任何状态变化。
    pub async fn select_from_drop(&self, files: Vec<SourceFile>) -> Option<SelectionOutcome> {
        let file = files.into_iter().next()?;
        Some(self.select_file(file).await)
    }

    /// 移除当前图片，回到 `Idle`；在途尝试的结果将被丢弃。
    pub fn clear(&self) {
        let mut state = self.lock_state();
        let attempt = self.latest_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        *state = UploadSnapshot {
            attempt,
            file_name: None,
            phase: UploadPhase::Idle,
            error: None,
        };
    }

    /// 执行一次完整上传流水线：校验 → 探测尺寸 → 处理。
    pub async fn select_file(&self, file: SourceFile) -> SelectionOutcome {
        let attempt = self.begin_attempt(&file);

        log::info!(
            "📥 开始处理上传 #{} - {} ({}, {} bytes)",
            attempt,
            file.name(),
            file.media_type(),
            file.size()
        );

        match self.run_pipeline(attempt, &file).await {
            Ok(Some(result)) => {
                if self.commit(attempt, UploadPhase::Done(result.clone()), None) {
                    SelectionOutcome::Completed(result)
                } else {
                    self.log_superseded(attempt);
                    SelectionOutcome::Superseded
                }
            }
            Ok(None) => {
                self.log_superseded(attempt);
                SelectionOutcome::Superseded
            }
            Err(failure) => {
                log::warn!(
                    "❌ 上传 #{} 失败 - stage={} code={} message={}",
                    attempt,
                    failure.stage,
                    failure.code,
                    failure.message
                );
                if self.commit(attempt, UploadPhase::Failed(failure.clone()), Some(failure.clone())) {
                    SelectionOutcome::Rejected(failure)
                } else {
                    self.log_superseded(attempt);
                    SelectionOutcome::Superseded
                }
            }
        }
    }

    /// 返回 `Ok(None)` 表示中途已被更新的尝试取代。
    async fn run_pipeline(
        &self,
        attempt: u64,
        file: &SourceFile,
    ) -> Result<Option<ProcessingResult>, UploadError> {
        let failed_at = |phase: UploadPhase| move |error: ImageError| UploadError::at(&phase, error);

        let config = self
            .handler
            .config_snapshot()
            .map_err(failed_at(UploadPhase::Validating))?;

        validate_file(file, &config)
            .into_result()
            .map_err(failed_at(UploadPhase::Validating))?;

        if !self.advance(attempt, UploadPhase::ProbingDimensions) {
            return Ok(None);
        }
        let dimensions = self
            .handler
            .probe_with(file, &config)
            .await
            .map_err(failed_at(UploadPhase::ProbingDimensions))?;
        validate_dimensions(dimensions, &config)
            .into_result()
            .map_err(failed_at(UploadPhase::ProbingDimensions))?;

        if !self.advance(attempt, UploadPhase::Processing) {
            return Ok(None);
        }
        let result = self
            .handler
            .process_with(file, &config)
            .await
            .map_err(failed_at(UploadPhase::Processing))?;

        Ok(Some(result))
    }

    /// 序号在状态锁内领取，保证快照中的序号与计数器同序。
    fn begin_attempt(&self, file: &SourceFile) -> u64 {
        let mut state = self.lock_state();
        let attempt = self.latest_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        *state = UploadSnapshot {
            attempt,
            file_name: Some(file.name().to_string()),
            phase: UploadPhase::Validating,
            error: None,
        };
        attempt
    }

    fn is_latest(&self, attempt: u64) -> bool {
        self.latest_attempt.load(Ordering::SeqCst) == attempt
    }

    fn advance(&self, attempt: u64, phase: UploadPhase) -> bool {
        self.commit(attempt, phase, None)
    }

    /// 仅当 `attempt` 仍是最新尝试时写入状态。
    fn commit(&self, attempt: u64, phase: UploadPhase, error: Option<UploadError>) -> bool {
        let mut state = self.lock_state();
        // 比对与写入在同一把锁内完成
        if !self.is_latest(attempt) || state.attempt != attempt {
            return false;
        }
        log::debug!("🔁 上传 #{} -> {}", attempt, phase.as_str());
        state.phase = phase;
        state.error = error;
        true
    }

    fn log_superseded(&self, attempt: u64) {
        log::info!("⏭️ 上传 #{} 已被更新的选择取代，结果已丢弃", attempt);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, UploadSnapshot> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
