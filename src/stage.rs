//! Migration pipeline stage tracking.
//!
//! Folds node-keyed state deltas into a [`MigrationData`] snapshot: the
//! current stage plus whatever typed data each node has produced so far.
//! Stage transitions are direct assignments from the transition table, not
//! a monotonic ratchet - if the server replays an earlier node the stage
//! moves back with it, which keeps the display honest about what the
//! pipeline is actually doing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{
    extract_checker, extract_integrator, extract_paster, extract_planner, extract_source,
    extract_target, CheckerData, IntegratorData, PasterData, PlannerData, SourceData, TargetData,
};
use crate::sse::END_NODE;

/// Where the migration pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MigrationStage {
    #[default]
    Idle,
    Planning,
    Analyzing,
    Pasting,
    Integrating,
    Checking,
    Cleanup,
    Complete,
}

impl MigrationStage {
    /// Short human label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Analyzing => "analyzing",
            Self::Pasting => "pasting",
            Self::Integrating => "integrating",
            Self::Checking => "checking",
            Self::Cleanup => "cleaning up",
            Self::Complete => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Outcome of folding one node update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Stage and/or data changed
    Changed,
    /// Update carried nothing new
    Unchanged,
    /// The end-of-graph sentinel arrived; the snapshot is now frozen
    Finished,
}

/// Nodes that only appear in some graph configurations. They move the
/// stage when it differs but never carry extractable data.
const AUXILIARY_STAGES: &[(&str, MigrationStage)] = &[
    ("check_revisor_agent", MigrationStage::Cleanup),
    ("validator_agent", MigrationStage::Checking),
    ("revisor_agent", MigrationStage::Cleanup),
];

/// Accumulated migration state for one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MigrationData {
    pub stage: MigrationStage,
    pub planner: Option<PlannerData>,
    pub source: Option<SourceData>,
    pub target: Option<TargetData>,
    pub paster: Option<PasterData>,
    pub integrator: Option<IntegratorData>,
    pub checker: Option<CheckerData>,
    /// Set once the end sentinel is seen; later updates are ignored
    pub finished: bool,
}

impl MigrationData {
    /// Fold one node's state delta into the snapshot.
    ///
    /// Idempotent after the end sentinel: once `finished` is set every
    /// further update is a no-op.
    pub fn apply_update(&mut self, node: &str, payload: &Value) -> StageOutcome {
        if self.finished {
            return StageOutcome::Unchanged;
        }

        match node {
            "splicer_setup" => self.set_stage(MigrationStage::Planning),
            // A planner delta without a plan regresses the stage on purpose
            "planner_api" => match extract_planner(payload) {
                Some(extracted) => {
                    let changed = self.replace_planner(extracted);
                    let stage = self.set_stage(MigrationStage::Analyzing);
                    merge(changed, stage)
                }
                None => self.set_stage(MigrationStage::Planning),
            },
            // Pasting needs both halves of the analysis
            "source_agent" => match extract_source(payload) {
                Some(extracted) => {
                    let changed = self.replace_source(extracted);
                    let next = if self.target.is_some() {
                        MigrationStage::Pasting
                    } else {
                        MigrationStage::Analyzing
                    };
                    let stage = self.set_stage(next);
                    merge(changed, stage)
                }
                None => StageOutcome::Unchanged,
            },
            "target_agent" => match extract_target(payload) {
                Some(extracted) => {
                    let changed = self.replace_target(extracted);
                    let next = if self.source.is_some() {
                        MigrationStage::Pasting
                    } else {
                        MigrationStage::Analyzing
                    };
                    let stage = self.set_stage(next);
                    merge(changed, stage)
                }
                None => StageOutcome::Unchanged,
            },
            "paster_agent" => match extract_paster(payload) {
                Some(extracted) => {
                    let changed = self.replace_paster(extracted);
                    let stage = self.set_stage(MigrationStage::Integrating);
                    merge(changed, stage)
                }
                None => StageOutcome::Unchanged,
            },
            "integrator_agent" => match extract_integrator(payload) {
                Some(extracted) => {
                    let changed = self.replace_integrator(extracted);
                    let stage = self.set_stage(MigrationStage::Checking);
                    merge(changed, stage)
                }
                None => StageOutcome::Unchanged,
            },
            "check_node" => match extract_checker(payload) {
                Some(extracted) => {
                    let changed = self.replace_checker(extracted);
                    let stage = self.set_stage(MigrationStage::Cleanup);
                    merge(changed, stage)
                }
                None => StageOutcome::Unchanged,
            },
            "clean_up" => self.set_stage(MigrationStage::Complete),
            END_NODE => {
                self.stage = MigrationStage::Complete;
                self.finished = true;
                StageOutcome::Finished
            }
            other => self.auxiliary_stage(other),
        }
    }

    fn set_stage(&mut self, next: MigrationStage) -> StageOutcome {
        if self.stage == next {
            StageOutcome::Unchanged
        } else {
            self.stage = next;
            StageOutcome::Changed
        }
    }

    /// Unknown nodes move the stage via the auxiliary table, and only when
    /// the mapped stage differs from the current one. Truly unknown node
    /// ids are ignored.
    fn auxiliary_stage(&mut self, node: &str) -> StageOutcome {
        for (name, stage) in AUXILIARY_STAGES {
            if *name == node {
                return self.set_stage(*stage);
            }
        }
        StageOutcome::Unchanged
    }

    // Overwrite-on-arrival: a later payload for the same node replaces the
    // earlier record. Returns whether anything actually changed.
    fn replace_planner(&mut self, extracted: PlannerData) -> bool {
        if self.planner.as_ref() == Some(&extracted) {
            return false;
        }
        self.planner = Some(extracted);
        true
    }

    fn replace_source(&mut self, extracted: SourceData) -> bool {
        if self.source.as_ref() == Some(&extracted) {
            return false;
        }
        self.source = Some(extracted);
        true
    }

    fn replace_target(&mut self, extracted: TargetData) -> bool {
        if self.target.as_ref() == Some(&extracted) {
            return false;
        }
        self.target = Some(extracted);
        true
    }

    fn replace_paster(&mut self, extracted: PasterData) -> bool {
        if self.paster.as_ref() == Some(&extracted) {
            return false;
        }
        self.paster = Some(extracted);
        true
    }

    fn replace_integrator(&mut self, extracted: IntegratorData) -> bool {
        if self.integrator.as_ref() == Some(&extracted) {
            return false;
        }
        self.integrator = Some(extracted);
        true
    }

    fn replace_checker(&mut self, extracted: CheckerData) -> bool {
        if self.checker.as_ref() == Some(&extracted) {
            return false;
        }
        self.checker = Some(extracted);
        true
    }
}

fn merge(data_changed: bool, stage: StageOutcome) -> StageOutcome {
    if data_changed || stage == StageOutcome::Changed {
        StageOutcome::Changed
    } else {
        StageOutcome::Unchanged
    }
}
