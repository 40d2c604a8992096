//! Workflow program model and execution statistics
//!
//! The step model deserializes the JSON the designer UI saves: internally
//! tagged unions discriminated by `type`, camelCase fields, and permissive
//! defaults. Loop steps keep the designer's flat field layout and are resolved
//! into a checked [`LoopMode`] at execution time.

use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use dom_adapter::Locator;
use serde::{Deserialize, Serialize};

/// Default smart-wait timeout in milliseconds.
pub const DEFAULT_SMART_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default smart-wait poll interval in milliseconds.
pub const DEFAULT_SMART_WAIT_INTERVAL_MS: u64 = 500;

fn default_smart_wait_timeout() -> u64 {
    DEFAULT_SMART_WAIT_TIMEOUT_MS
}

fn default_smart_wait_interval() -> u64 {
    DEFAULT_SMART_WAIT_INTERVAL_MS
}

fn default_end_index() -> i64 {
    -1
}

/// A saved workflow: a name plus an ordered step program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Rough progress denominator: one per step, plus three per sub-operation
    /// of each loop step. Only progress reporting reads this.
    pub fn estimated_total_steps(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match &step.kind {
                StepKind::Loop(loop_step) => 1 + 3 * loop_step.sub_operations.len(),
                _ => 1,
            })
            .sum()
    }
}

/// How a failure is handled by the enclosing sequence or loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorHandling {
    /// Absorb the failure and move on
    Continue,

    /// Re-raise, aborting the enclosing sequence or loop
    Stop,

    /// Absorb the failure, log a skip notice, move on
    Skip,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        ErrorHandling::Continue
    }
}

/// One instruction in a workflow's top-level sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Display label used in progress and log output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Failure policy for this step
    #[serde(default)]
    pub error_handling: ErrorHandling,

    /// Trailing wait after the step body, in ms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_delay: Option<u64>,

    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            name: None,
            error_handling: ErrorHandling::default(),
            post_delay: None,
            kind,
        }
    }

    /// Click step.
    pub fn click(locator: Locator) -> Self {
        Self::new(StepKind::Click { locator })
    }

    /// Input step.
    pub fn input(locator: Locator, text: impl Into<String>) -> Self {
        Self::new(StepKind::Input {
            locator,
            text: text.into(),
            clear_first: false,
        })
    }

    /// Fixed wait step.
    pub fn wait(duration: u64) -> Self {
        Self::new(StepKind::Wait { duration })
    }

    /// Smart-wait step with default timeout and interval.
    pub fn smart_wait(locator: Locator) -> Self {
        Self::new(StepKind::SmartWait {
            locator,
            timeout: DEFAULT_SMART_WAIT_TIMEOUT_MS,
            interval: DEFAULT_SMART_WAIT_INTERVAL_MS,
            description: None,
        })
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the failure policy.
    pub fn with_error_handling(mut self, handling: ErrorHandling) -> Self {
        self.error_handling = handling;
        self
    }

    /// Set the trailing delay.
    pub fn with_post_delay(mut self, ms: u64) -> Self {
        self.post_delay = Some(ms);
        self
    }

    /// Label used in logs when the step has no name.
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.kind.label(),
        }
    }
}

/// Step payload, discriminated by `type` in the designer JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StepKind {
    /// Click one located element
    Click { locator: Locator },

    /// Set a located element's value
    Input {
        locator: Locator,
        #[serde(default)]
        text: String,
        #[serde(default)]
        clear_first: bool,
    },

    /// Sleep for a fixed duration (pause-aware)
    Wait { duration: u64 },

    /// Poll until the locator resolves or the timeout elapses
    SmartWait {
        locator: Locator,
        #[serde(default = "default_smart_wait_timeout")]
        timeout: u64,
        #[serde(default = "default_smart_wait_interval")]
        interval: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// Iterate over a matched element set
    Loop(LoopStep),

    /// Invoke a registered custom handler by name
    Custom { handler: String },
}

impl StepKind {
    /// Stable lowercase label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Click { .. } => "click",
            StepKind::Input { .. } => "input",
            StepKind::Wait { .. } => "wait",
            StepKind::SmartWait { .. } => "smartWait",
            StepKind::Loop(_) => "loop",
            StepKind::Custom { .. } => "custom",
        }
    }
}

/// Loop flavor selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopType {
    /// One action applied to every matched element
    SimpleLoop,

    /// Click each matched parent, then run sub-operations per parent
    ParentLoop,
}

impl Default for LoopType {
    fn default() -> Self {
        LoopType::ParentLoop
    }
}

/// Per-element action used by simple loops and auto-loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementAction {
    Click,
    Input,
    Check,
    Uncheck,
    Hover,
    Focus,
}

impl Default for ElementAction {
    fn default() -> Self {
        ElementAction::Click
    }
}

impl ElementAction {
    /// Stable lowercase name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ElementAction::Click => "click",
            ElementAction::Input => "input",
            ElementAction::Check => "check",
            ElementAction::Uncheck => "uncheck",
            ElementAction::Hover => "hover",
            ElementAction::Focus => "focus",
        }
    }
}

/// Loop step configuration.
///
/// Keeps the designer's flat layout: simple-loop and parent-loop fields sit
/// side by side and [`LoopStep::mode`] checks coherence against `loop_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStep {
    /// Selects the candidate element set
    pub locator: Locator,

    #[serde(default)]
    pub loop_type: LoopType,

    /// First index to process
    #[serde(default)]
    pub start_index: usize,

    /// Last index to process; -1 means "last matched element"
    #[serde(default = "default_end_index")]
    pub end_index: i64,

    /// Delay between iterations, in ms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_delay: Option<u64>,

    // simpleLoop fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ElementAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_delay: Option<u64>,

    // parentLoop fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after_click: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_operations: Vec<SubOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_operation: Option<Box<SubOperation>>,
}

impl LoopStep {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            loop_type: LoopType::default(),
            start_index: 0,
            end_index: -1,
            loop_delay: None,
            action_type: None,
            input_text: None,
            action_delay: None,
            wait_after_click: None,
            sub_operations: Vec::new(),
            return_operation: None,
        }
    }

    /// Resolve the flat field layout into a checked loop mode.
    pub fn mode(&self) -> Result<LoopMode<'_>, EngineError> {
        match self.loop_type {
            LoopType::SimpleLoop => {
                let action = self.action_type.ok_or_else(|| {
                    EngineError::InvalidWorkflow(
                        "simpleLoop requires an actionType".to_string(),
                    )
                })?;
                Ok(LoopMode::Simple {
                    action,
                    input_text: self.input_text.as_deref(),
                    action_delay: self.action_delay,
                })
            }
            LoopType::ParentLoop => Ok(LoopMode::Parent {
                wait_after_click: self.wait_after_click,
                sub_operations: &self.sub_operations,
                return_operation: self.return_operation.as_deref(),
            }),
        }
    }
}

/// Checked view of a [`LoopStep`], dispatched exhaustively by the executor.
#[derive(Debug)]
pub enum LoopMode<'a> {
    Simple {
        action: ElementAction,
        input_text: Option<&'a str>,
        action_delay: Option<u64>,
    },
    Parent {
        wait_after_click: Option<u64>,
        sub_operations: &'a [SubOperation],
        return_operation: Option<&'a SubOperation>,
    },
}

/// An instruction nested inside a parent loop's per-element sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubOperation {
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Wait after this operation, in ms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    #[serde(flatten)]
    pub kind: SubOperationKind,
}

impl SubOperation {
    pub fn new(kind: SubOperationKind) -> Self {
        Self {
            name: None,
            delay: None,
            kind,
        }
    }

    /// Set the post-operation delay.
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay = Some(ms);
        self
    }

    /// Label used in logs when the operation has no name.
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.kind.label(),
        }
    }
}

/// Sub-operation payload, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SubOperationKind {
    /// Click, parent-scoped lookup first for CSS locators
    Click { locator: Locator },

    /// Set a value, parent-scoped lookup first for CSS locators
    Input {
        locator: Locator,
        #[serde(default)]
        text: String,
    },

    /// Plain sleep; does not observe pause
    Wait { duration: u64 },

    /// Poll until the locator resolves
    WaitForElement {
        locator: Locator,
        #[serde(default = "default_smart_wait_timeout")]
        timeout: u64,
    },

    /// Check a checkbox if it is not already checked
    Check { locator: Locator },

    /// Select a dropdown option by option value
    Select {
        locator: Locator,
        #[serde(default)]
        text: String,
    },

    /// Sweep an element set with a click or input action
    AutoLoop(AutoLoopOp),
}

impl SubOperationKind {
    /// Stable lowercase label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            SubOperationKind::Click { .. } => "click",
            SubOperationKind::Input { .. } => "input",
            SubOperationKind::Wait { .. } => "wait",
            SubOperationKind::WaitForElement { .. } => "waitForElement",
            SubOperationKind::Check { .. } => "check",
            SubOperationKind::Select { .. } => "select",
            SubOperationKind::AutoLoop(_) => "autoLoop",
        }
    }
}

/// Auto-loop configuration: a simple-loop-like sweep nested inside a parent
/// loop's sub-operations. The element set is searched within the current
/// parent element first (CSS locators), falling back to a page-global search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLoopOp {
    pub locator: Locator,

    #[serde(default)]
    pub start_index: usize,

    #[serde(default = "default_end_index")]
    pub end_index: i64,

    /// Only click and input are supported here
    #[serde(default)]
    pub action_type: ElementAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_delay: Option<u64>,

    #[serde(default)]
    pub error_handling: ErrorHandling,
}

/// Mutable run statistics; one instance per engine, reset on every execute.
///
/// Progress callbacks receive snapshot clones; external UI reads the same
/// snapshots between callbacks.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    /// Unique id stamped on each run
    pub run_id: String,

    /// Heuristic denominator for progress bars
    pub total_steps: usize,

    /// Top-level steps attempted so far
    pub completed_steps: usize,

    pub success_count: usize,
    pub error_count: usize,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// 1-based parent-loop position, 0 when no loop is active
    pub current_main_loop: usize,
    pub total_main_loops: usize,

    /// 1-based sub-operation position, 0 when none is active
    pub current_sub_operation: usize,
    pub total_sub_operations: usize,

    /// Human-readable status line
    pub current_operation: String,
}

impl ExecutionStats {
    /// Reset every counter for a fresh run.
    pub fn reset(&mut self, run_id: String) {
        *self = ExecutionStats {
            run_id,
            ..ExecutionStats::default()
        };
    }

    /// Milliseconds between start and finish, when both are recorded.
    pub fn elapsed_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_adapter::Strategy;

    #[test]
    fn step_json_round_trips_with_defaults() {
        let step: Step = serde_json::from_str(
            r##"{"type":"input","locator":{"strategy":"css","value":"#q"},"text":"rust"}"##,
        )
        .unwrap();
        assert_eq!(step.error_handling, ErrorHandling::Continue);
        assert!(step.post_delay.is_none());
        match &step.kind {
            StepKind::Input {
                locator,
                text,
                clear_first,
            } => {
                assert_eq!(locator.strategy, Strategy::Css);
                assert_eq!(text, "rust");
                assert!(!clear_first);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn smart_wait_defaults_apply() {
        let step: Step = serde_json::from_str(
            r#"{"type":"smartWait","locator":{"strategy":"id","value":"done"}}"#,
        )
        .unwrap();
        match step.kind {
            StepKind::SmartWait {
                timeout, interval, ..
            } => {
                assert_eq!(timeout, DEFAULT_SMART_WAIT_TIMEOUT_MS);
                assert_eq!(interval, DEFAULT_SMART_WAIT_INTERVAL_MS);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn loop_defaults_to_parent_mode() {
        let step: Step = serde_json::from_str(
            r#"{"type":"loop","locator":{"strategy":"className","value":"row"},
                "subOperations":[{"type":"click","locator":{"strategy":"css","value":".open"}}]}"#,
        )
        .unwrap();
        let StepKind::Loop(loop_step) = &step.kind else {
            panic!("expected loop step");
        };
        assert_eq!(loop_step.loop_type, LoopType::ParentLoop);
        assert_eq!(loop_step.start_index, 0);
        assert_eq!(loop_step.end_index, -1);
        assert!(matches!(loop_step.mode().unwrap(), LoopMode::Parent { .. }));
        assert_eq!(loop_step.sub_operations.len(), 1);
    }

    #[test]
    fn simple_loop_without_action_is_rejected() {
        let loop_step = LoopStep {
            loop_type: LoopType::SimpleLoop,
            ..LoopStep::new(Locator::class_name("item"))
        };
        assert!(matches!(
            loop_step.mode(),
            Err(EngineError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let result: Result<Step, _> =
            serde_json::from_str(r#"{"type":"teleport","locator":{"strategy":"id","value":"x"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn auto_loop_sub_operation_parses() {
        let op: SubOperation = serde_json::from_str(
            r#"{"type":"autoLoop","locator":{"strategy":"css","value":".opt"},
                "actionType":"input","inputText":"7","endIndex":3,"errorHandling":"stop"}"#,
        )
        .unwrap();
        let SubOperationKind::AutoLoop(auto) = &op.kind else {
            panic!("expected autoLoop");
        };
        assert_eq!(auto.action_type, ElementAction::Input);
        assert_eq!(auto.input_text.as_deref(), Some("7"));
        assert_eq!(auto.end_index, 3);
        assert_eq!(auto.error_handling, ErrorHandling::Stop);
    }

    #[test]
    fn estimate_counts_sub_operations_triple() {
        let loop_step = LoopStep {
            sub_operations: vec![
                SubOperation::new(SubOperationKind::Wait { duration: 1 }),
                SubOperation::new(SubOperationKind::Wait { duration: 1 }),
            ],
            ..LoopStep::new(Locator::class_name("row"))
        };
        let workflow = Workflow::new("demo")
            .with_step(Step::wait(10))
            .with_step(Step::new(StepKind::Loop(loop_step)));
        assert_eq!(workflow.estimated_total_steps(), 1 + 1 + 3 * 2);
    }
}
