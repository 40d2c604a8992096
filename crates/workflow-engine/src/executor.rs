//! Step dispatch and loop execution
//!
//! Every await-adjacent path re-checks the stop flag and the pause gate
//! through [`checkpoint`](crate::control::Controls::checkpoint): before each
//! step, before each DOM action, inside sliced sleeps, and at every loop
//! iteration. Cancellation unwinds through every error-handling policy to
//! `execute`.

use crate::engine::WorkflowEngine;
use crate::errors::EngineError;
use crate::events::LogLevel;
use crate::handlers::HandlerContext;
use crate::types::{
    AutoLoopOp, ElementAction, ErrorHandling, LoopMode, LoopStep, Step, StepKind, SubOperation,
    SubOperationKind, DEFAULT_SMART_WAIT_INTERVAL_MS,
};
use dom_adapter::{DomError, ElementHandle, Locator, Strategy};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Clamp a loop's requested [start, end] to the matched element count.
///
/// `end < 0` means the last element; anything past the end clamps to it.
/// Returns `None` when the clamped range is empty.
fn clamp_range(start: usize, end: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let last = if end < 0 {
        len - 1
    } else {
        (end as usize).min(len - 1)
    };
    if start > last {
        return None;
    }
    Some((start, last))
}

impl WorkflowEngine {
    /// Execute an ordered step sequence, applying each step's own failure
    /// policy. Cancellation propagates regardless of policy.
    pub(crate) async fn execute_steps(&self, steps: &[Step]) -> Result<(), EngineError> {
        let total = steps.len();
        for (index, step) in steps.iter().enumerate() {
            self.controls.checkpoint().await?;

            let label = step.label().to_string();
            self.update_stats(|s| {
                s.current_operation = format!("step {}/{}: {}", index + 1, total, label);
            });
            self.emit_progress();
            self.log(
                LogLevel::Info,
                format!("step {}/{} '{}' started", index + 1, total, label),
            );

            match self.run_step(step).await {
                Ok(()) => {
                    self.update_stats(|s| {
                        s.success_count += 1;
                        s.completed_steps += 1;
                    });
                    self.log(
                        LogLevel::Success,
                        format!("step {}/{} '{}' completed", index + 1, total, label),
                    );
                    self.emit_progress();
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    self.update_stats(|s| {
                        s.error_count += 1;
                        s.completed_steps += 1;
                    });
                    self.log(
                        LogLevel::Error,
                        format!("step {}/{} '{}' failed: {err}", index + 1, total, label),
                    );
                    self.emit_progress();
                    match step.error_handling {
                        ErrorHandling::Stop => return Err(err),
                        ErrorHandling::Skip => {
                            self.log(
                                LogLevel::Warning,
                                format!(
                                    "step {}/{} '{}' skipped after failure",
                                    index + 1,
                                    total,
                                    label
                                ),
                            );
                        }
                        ErrorHandling::Continue => {}
                    }
                }
            }

            if let Some(delay) = step.post_delay {
                if self.config.pause_aware_post_delay {
                    self.controls
                        .sleep_pausable(delay, self.config.wait_slice_ms)
                        .await?;
                } else {
                    // Trailing delays do not observe pause; a stop lands at
                    // the next suspension point instead.
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
        Ok(())
    }

    async fn run_step(&self, step: &Step) -> Result<(), EngineError> {
        match &step.kind {
            StepKind::Click { locator } => {
                let element = self.dom.resolve_one(locator).await?;
                self.click_element(&element).await
            }
            StepKind::Input {
                locator,
                text,
                clear_first,
            } => {
                let element = self.dom.resolve_one(locator).await?;
                self.controls.checkpoint().await?;
                self.dom.set_value(&element, text, *clear_first).await?;
                Ok(())
            }
            StepKind::Wait { duration } => {
                debug!(duration, "wait step");
                self.controls
                    .sleep_pausable(*duration, self.config.wait_slice_ms)
                    .await
            }
            StepKind::SmartWait {
                locator,
                timeout,
                interval,
                description,
            } => self
                .smart_wait(locator, *timeout, *interval, description.as_deref())
                .await
                .map(|_| ()),
            StepKind::Loop(loop_step) => self.run_loop(step.error_handling, loop_step).await,
            StepKind::Custom { handler } => self.run_custom(handler).await,
        }
    }

    /// Scroll into view, settle, click, settle.
    pub(crate) async fn click_element(&self, element: &ElementHandle) -> Result<(), EngineError> {
        self.controls.checkpoint().await?;
        self.dom.scroll_into_view(element).await?;
        self.settle().await?;
        self.dom.click(element).await?;
        self.settle().await
    }

    async fn settle(&self) -> Result<(), EngineError> {
        self.controls
            .sleep_pausable(self.config.settle_delay_ms, self.config.wait_slice_ms)
            .await
    }

    /// Poll until the locator resolves or the timeout elapses.
    pub(crate) async fn smart_wait(
        &self,
        locator: &Locator,
        timeout: u64,
        interval: u64,
        description: Option<&str>,
    ) -> Result<ElementHandle, EngineError> {
        let description = description
            .map(str::to_string)
            .unwrap_or_else(|| locator.to_string());
        let started = Instant::now();
        self.log(
            LogLevel::Info,
            format!("waiting for {description} (up to {timeout}ms)"),
        );

        loop {
            self.controls.checkpoint().await?;
            match self.dom.resolve_one(locator).await {
                Ok(element) => {
                    self.log(
                        LogLevel::Success,
                        format!(
                            "{description} appeared after {}ms",
                            started.elapsed().as_millis()
                        ),
                    );
                    return Ok(element);
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
            if started.elapsed() >= Duration::from_millis(timeout) {
                return Err(EngineError::Timeout {
                    description,
                    timeout_ms: timeout,
                });
            }
            self.controls
                .sleep_pausable(interval.max(1), self.config.wait_slice_ms)
                .await?;
        }
    }

    async fn run_loop(
        &self,
        error_handling: ErrorHandling,
        loop_step: &LoopStep,
    ) -> Result<(), EngineError> {
        let elements = self.dom.resolve_all(&loop_step.locator).await?;
        if elements.is_empty() {
            return Err(DomError::not_found(&loop_step.locator).into());
        }
        let Some((start, last)) = clamp_range(loop_step.start_index, loop_step.end_index, elements.len())
        else {
            self.log(
                LogLevel::Warning,
                format!(
                    "loop over {}: empty range {}..{} for {} elements",
                    loop_step.locator,
                    loop_step.start_index,
                    loop_step.end_index,
                    elements.len()
                ),
            );
            return Ok(());
        };

        match loop_step.mode()? {
            LoopMode::Simple {
                action,
                input_text,
                action_delay,
            } => {
                self.run_simple_loop(
                    &elements,
                    start,
                    last,
                    action,
                    input_text,
                    action_delay,
                    error_handling,
                )
                .await
            }
            LoopMode::Parent {
                wait_after_click,
                sub_operations,
                return_operation,
            } => {
                self.run_parent_loop(
                    &elements,
                    start,
                    last,
                    loop_step.loop_delay,
                    wait_after_click,
                    sub_operations,
                    return_operation,
                    error_handling,
                )
                .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_simple_loop(
        &self,
        elements: &[ElementHandle],
        start: usize,
        last: usize,
        action: ElementAction,
        input_text: Option<&str>,
        action_delay: Option<u64>,
        error_handling: ErrorHandling,
    ) -> Result<(), EngineError> {
        self.log(
            LogLevel::Info,
            format!(
                "simple loop: {} on elements {start}..={last}",
                action.name()
            ),
        );

        for index in start..=last {
            self.controls.checkpoint().await?;
            let element = &elements[index];
            self.update_stats(|s| {
                s.current_operation =
                    format!("{} element {}/{}", action.name(), index + 1, last + 1);
            });
            self.emit_progress();

            match self.apply_element_action(element, action, input_text).await {
                Ok(()) => {
                    self.update_stats(|s| s.success_count += 1);
                    self.log(
                        LogLevel::Success,
                        format!("element {index} ({element}): {} done", action.name()),
                    );
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    self.update_stats(|s| s.error_count += 1);
                    self.log(
                        LogLevel::Error,
                        format!("element {index} ({element}) failed: {err}"),
                    );
                    if error_handling == ErrorHandling::Stop {
                        return Err(err);
                    }
                }
            }

            if index < last {
                if let Some(delay) = action_delay {
                    self.controls
                        .sleep_pausable(delay, self.config.wait_slice_ms)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn apply_element_action(
        &self,
        element: &ElementHandle,
        action: ElementAction,
        input_text: Option<&str>,
    ) -> Result<(), EngineError> {
        self.controls.checkpoint().await?;
        match action {
            ElementAction::Click => self.click_element(element).await,
            ElementAction::Input => {
                self.dom
                    .set_value(element, input_text.unwrap_or(""), false)
                    .await?;
                Ok(())
            }
            ElementAction::Check => {
                // Only dispatch when the state actually changes.
                if !self.dom.is_checked(element).await? {
                    self.dom.set_checked(element, true).await?;
                }
                Ok(())
            }
            ElementAction::Uncheck => {
                if self.dom.is_checked(element).await? {
                    self.dom.set_checked(element, false).await?;
                }
                Ok(())
            }
            ElementAction::Hover => Ok(self.dom.dispatch_hover(element).await?),
            ElementAction::Focus => Ok(self.dom.dispatch_focus(element).await?),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_parent_loop(
        &self,
        elements: &[ElementHandle],
        start: usize,
        last: usize,
        loop_delay: Option<u64>,
        wait_after_click: Option<u64>,
        sub_operations: &[SubOperation],
        return_operation: Option<&SubOperation>,
        error_handling: ErrorHandling,
    ) -> Result<(), EngineError> {
        self.update_stats(|s| {
            s.total_main_loops = last - start + 1;
            s.current_main_loop = 0;
        });
        self.emit_progress();
        self.log(
            LogLevel::Info,
            format!("parent loop over {} elements", last - start + 1),
        );

        for index in start..=last {
            self.controls.checkpoint().await?;
            let parent = &elements[index];
            self.update_stats(|s| {
                s.current_main_loop = index - start + 1;
                s.current_operation = format!(
                    "parent element {}/{} ({parent})",
                    index - start + 1,
                    last - start + 1
                );
            });
            self.emit_progress();

            match self
                .run_parent_iteration(
                    parent,
                    wait_after_click,
                    sub_operations,
                    return_operation,
                    error_handling,
                )
                .await
            {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    self.log(
                        LogLevel::Error,
                        format!("parent element {index} ({parent}) failed: {err}"),
                    );
                    if error_handling == ErrorHandling::Stop {
                        return Err(err);
                    }
                }
            }

            if index < last {
                if let Some(delay) = loop_delay {
                    self.controls
                        .sleep_pausable(delay, self.config.wait_slice_ms)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// One parent element: click it, wait, run the sub-operation sequence
    /// scoped to it, then the unscoped return operation.
    async fn run_parent_iteration(
        &self,
        parent: &ElementHandle,
        wait_after_click: Option<u64>,
        sub_operations: &[SubOperation],
        return_operation: Option<&SubOperation>,
        error_handling: ErrorHandling,
    ) -> Result<(), EngineError> {
        self.click_element(parent).await?;
        if let Some(delay) = wait_after_click {
            self.controls
                .sleep_pausable(delay, self.config.wait_slice_ms)
                .await?;
        }

        if !sub_operations.is_empty() {
            self.update_stats(|s| {
                s.total_sub_operations = sub_operations.len();
                s.current_sub_operation = 0;
            });
            self.emit_progress();

            for (op_index, op) in sub_operations.iter().enumerate() {
                self.controls.checkpoint().await?;
                self.update_stats(|s| {
                    s.current_sub_operation = op_index + 1;
                    s.current_operation = format!(
                        "sub-operation {}/{}: {}",
                        op_index + 1,
                        sub_operations.len(),
                        op.label()
                    );
                });
                self.emit_progress();

                match self.run_sub_operation(op, Some(parent)).await {
                    Ok(()) => {
                        self.update_stats(|s| s.success_count += 1);
                        self.log(
                            LogLevel::Success,
                            format!("sub-operation '{}' completed", op.label()),
                        );
                    }
                    Err(err) if err.is_cancelled() => return Err(err),
                    Err(err) => {
                        self.update_stats(|s| s.error_count += 1);
                        self.log(
                            LogLevel::Error,
                            format!("sub-operation '{}' failed: {err}", op.label()),
                        );
                        if error_handling == ErrorHandling::Stop {
                            return Err(err);
                        }
                    }
                }

                if let Some(delay) = op.delay {
                    self.controls
                        .sleep_pausable(delay, self.config.wait_slice_ms)
                        .await?;
                }
            }

            self.update_stats(|s| {
                s.current_sub_operation = 0;
                s.total_sub_operations = 0;
            });
            self.emit_progress();
        }

        if let Some(op) = return_operation {
            // Return operations run unscoped; no parent context applies.
            self.run_sub_operation(op, None).await?;
            if let Some(delay) = op.delay {
                self.controls
                    .sleep_pausable(delay, self.config.wait_slice_ms)
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_sub_operation(
        &self,
        op: &SubOperation,
        parent: Option<&ElementHandle>,
    ) -> Result<(), EngineError> {
        debug!(operation = op.label(), scoped = parent.is_some(), "sub-operation");
        match &op.kind {
            SubOperationKind::Click { locator } => {
                let element = self.resolve_scoped_one(locator, parent).await?;
                self.click_element(&element).await
            }
            SubOperationKind::Input { locator, text } => {
                let element = self.resolve_scoped_one(locator, parent).await?;
                self.controls.checkpoint().await?;
                self.dom.set_value(&element, text, false).await?;
                Ok(())
            }
            SubOperationKind::Wait { duration } => {
                // Plain sleep; a pause lands at the next checkpoint.
                sleep(Duration::from_millis(*duration)).await;
                Ok(())
            }
            SubOperationKind::WaitForElement { locator, timeout } => self
                .smart_wait(
                    locator,
                    *timeout,
                    DEFAULT_SMART_WAIT_INTERVAL_MS,
                    Some(op.label()),
                )
                .await
                .map(|_| ()),
            SubOperationKind::Check { locator } => {
                let element = self.resolve_scoped_one(locator, parent).await?;
                self.controls.checkpoint().await?;
                if !self.dom.is_checked(&element).await? {
                    self.dom.set_checked(&element, true).await?;
                }
                Ok(())
            }
            SubOperationKind::Select { locator, text } => {
                let element = self.resolve_scoped_one(locator, parent).await?;
                self.controls.checkpoint().await?;
                self.dom.select_option(&element, text).await?;
                Ok(())
            }
            SubOperationKind::AutoLoop(auto) => self.run_auto_loop(auto, parent).await,
        }
    }

    /// Parent-scoped lookup for CSS locators, falling back to a page-wide
    /// search when nothing matches inside the parent. Non-CSS strategies
    /// always resolve page-wide.
    async fn resolve_scoped_one(
        &self,
        locator: &Locator,
        parent: Option<&ElementHandle>,
    ) -> Result<ElementHandle, EngineError> {
        if let Some(parent) = parent {
            if locator.strategy == Strategy::Css {
                let mut scoped = self.dom.query_within(parent, &locator.value).await?;
                if !scoped.is_empty() {
                    return Ok(scoped.remove(0));
                }
                self.log(
                    LogLevel::Warning,
                    format!(
                        "'{}' not found inside {parent}, falling back to page-wide lookup",
                        locator.value
                    ),
                );
            }
        }
        Ok(self.dom.resolve_one(locator).await?)
    }

    async fn resolve_scoped_all(
        &self,
        locator: &Locator,
        parent: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, EngineError> {
        if let Some(parent) = parent {
            if locator.strategy == Strategy::Css {
                let scoped = self.dom.query_within(parent, &locator.value).await?;
                if !scoped.is_empty() {
                    return Ok(scoped);
                }
                self.log(
                    LogLevel::Warning,
                    format!(
                        "'{}' matched nothing inside {parent}, falling back to page-wide lookup",
                        locator.value
                    ),
                );
            }
        }
        Ok(self.dom.resolve_all(locator).await?)
    }

    /// Simple-loop-like sweep nested inside a parent loop's sub-operations.
    async fn run_auto_loop(
        &self,
        auto: &AutoLoopOp,
        parent: Option<&ElementHandle>,
    ) -> Result<(), EngineError> {
        let elements = self.resolve_scoped_all(&auto.locator, parent).await?;
        if elements.is_empty() {
            return Err(DomError::not_found(&auto.locator).into());
        }
        let Some((start, last)) = clamp_range(auto.start_index, auto.end_index, elements.len())
        else {
            self.log(
                LogLevel::Warning,
                format!(
                    "auto loop over {}: empty range {}..{} for {} elements",
                    auto.locator,
                    auto.start_index,
                    auto.end_index,
                    elements.len()
                ),
            );
            return Ok(());
        };

        self.log(
            LogLevel::Info,
            format!(
                "auto loop: {} on elements {start}..={last}",
                auto.action_type.name()
            ),
        );

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for index in start..=last {
            self.controls.checkpoint().await?;
            let element = &elements[index];
            let result = match auto.action_type {
                ElementAction::Click | ElementAction::Input => {
                    self.apply_element_action(element, auto.action_type, auto.input_text.as_deref())
                        .await
                }
                other => {
                    return Err(EngineError::UnsupportedActionType(other.name().to_string()))
                }
            };
            match result {
                Ok(()) => {
                    succeeded += 1;
                    self.update_stats(|s| s.success_count += 1);
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    failed += 1;
                    self.update_stats(|s| s.error_count += 1);
                    self.log(
                        LogLevel::Error,
                        format!("auto loop element {index} ({element}) failed: {err}"),
                    );
                    if auto.error_handling == ErrorHandling::Stop {
                        return Err(err);
                    }
                }
            }

            if index < last {
                if let Some(delay) = auto.action_delay {
                    self.controls
                        .sleep_pausable(delay, self.config.wait_slice_ms)
                        .await?;
                }
            }
        }

        self.log(
            LogLevel::Info,
            format!("auto loop finished: {succeeded} succeeded, {failed} failed"),
        );
        Ok(())
    }

    async fn run_custom(&self, name: &str) -> Result<(), EngineError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| EngineError::UnknownHandler(name.to_string()))?;
        let ctx = HandlerContext {
            dom: self.dom.clone(),
            stats: self.stats(),
        };
        handler.run(&ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::clamp_range;

    #[test]
    fn end_index_minus_one_means_last() {
        assert_eq!(clamp_range(0, -1, 7), Some((0, 6)));
        assert_eq!(clamp_range(2, -1, 7), Some((2, 6)));
    }

    #[test]
    fn end_index_past_len_clamps() {
        assert_eq!(clamp_range(0, 100, 7), Some((0, 6)));
        assert_eq!(clamp_range(3, 3, 7), Some((3, 3)));
    }

    #[test]
    fn empty_ranges_yield_none() {
        assert_eq!(clamp_range(5, 2, 7), None);
        assert_eq!(clamp_range(9, -1, 7), None);
        assert_eq!(clamp_range(0, -1, 0), None);
    }
}
