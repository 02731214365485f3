//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in the processing pipeline.
///
/// Happy path:
/// ```text
/// Pending/OcrPending ──► ProcessingOcr ──► OcrSuccessfulCreditPending
///     ──► AiSolutionPending ──► AssemblingFinalPending ──► Completed
/// ```
///
/// Each stage has a terminal failure status. Failure statuses are not
/// retried automatically; an operator re-enters the pipeline explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been created and not yet picked up.
    #[default]
    Pending,

    /// Queued for OCR extraction.
    OcrPending,

    /// OCR extraction in progress (written before the provider call).
    ProcessingOcr,

    /// OCR succeeded; credits have not been deducted yet.
    OcrSuccessfulCreditPending,

    /// Credits deducted; awaiting AI solution generation.
    AiSolutionPending,

    /// Solution generated; audio narration assembly pending.
    GeneratingAudioPending,

    /// Audio done; animation rendering pending.
    RenderingAnimationPending,

    /// Final video assembly pending.
    AssemblingFinalPending,

    /// Pipeline finished successfully (terminal state).
    Completed,

    /// OCR extraction failed (terminal until retried).
    OcrFailed,

    /// Credit deduction failed, typically insufficient balance (terminal).
    CreditDeductionFailed,

    /// AI solution generation failed (terminal until retried).
    AiSolutionFailed,

    /// Audio generation failed (terminal until retried).
    AudioFailed,

    /// Animation rendering failed (terminal until retried).
    AnimationFailed,

    /// Final assembly failed (terminal until retried).
    AssemblyFailed,

    /// Failure outside any specific stage (terminal until retried).
    FailedGeneral,
}

impl OrderStatus {
    /// Statuses from which the OCR stage may run. `ProcessingOcr` is
    /// included so a crashed in-flight extraction can be re-driven.
    pub const OCR_ENTRY: &'static [OrderStatus] = &[
        OrderStatus::Pending,
        OrderStatus::OcrPending,
        OrderStatus::ProcessingOcr,
    ];

    /// Statuses from which the assembly stage may run. The audio and
    /// animation statuses exist for operator visibility; assembly owns both
    /// sub-steps and accepts re-entry from any of them.
    pub const ASSEMBLY_ENTRY: &'static [OrderStatus] = &[
        OrderStatus::GeneratingAudioPending,
        OrderStatus::RenderingAnimationPending,
        OrderStatus::AssemblingFinalPending,
    ];

    /// Returns true if this status marks a failed stage.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OrderStatus::OcrFailed
                | OrderStatus::CreditDeductionFailed
                | OrderStatus::AiSolutionFailed
                | OrderStatus::AudioFailed
                | OrderStatus::AnimationFailed
                | OrderStatus::AssemblyFailed
                | OrderStatus::FailedGeneral
        )
    }

    /// Returns true if the orchestrator will not advance past this status
    /// on its own.
    pub fn is_terminal(&self) -> bool {
        *self == OrderStatus::Completed || self.is_failure()
    }

    /// For a failure status, the pending status the stage re-enters from.
    pub fn reentry_status(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::OcrFailed => Some(OrderStatus::OcrPending),
            OrderStatus::CreditDeductionFailed => Some(OrderStatus::OcrSuccessfulCreditPending),
            OrderStatus::AiSolutionFailed => Some(OrderStatus::AiSolutionPending),
            OrderStatus::AudioFailed => Some(OrderStatus::GeneratingAudioPending),
            OrderStatus::AnimationFailed => Some(OrderStatus::RenderingAnimationPending),
            OrderStatus::AssemblyFailed => Some(OrderStatus::AssemblingFinalPending),
            OrderStatus::FailedGeneral => Some(OrderStatus::Pending),
            _ => None,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::OcrPending => "OcrPending",
            OrderStatus::ProcessingOcr => "ProcessingOcr",
            OrderStatus::OcrSuccessfulCreditPending => "OcrSuccessfulCreditPending",
            OrderStatus::AiSolutionPending => "AiSolutionPending",
            OrderStatus::GeneratingAudioPending => "GeneratingAudioPending",
            OrderStatus::RenderingAnimationPending => "RenderingAnimationPending",
            OrderStatus::AssemblingFinalPending => "AssemblingFinalPending",
            OrderStatus::Completed => "Completed",
            OrderStatus::OcrFailed => "OcrFailed",
            OrderStatus::CreditDeductionFailed => "CreditDeductionFailed",
            OrderStatus::AiSolutionFailed => "AiSolutionFailed",
            OrderStatus::AudioFailed => "AudioFailed",
            OrderStatus::AnimationFailed => "AnimationFailed",
            OrderStatus::AssemblyFailed => "AssemblyFailed",
            OrderStatus::FailedGeneral => "FailedGeneral",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "OcrPending" => Ok(OrderStatus::OcrPending),
            "ProcessingOcr" => Ok(OrderStatus::ProcessingOcr),
            "OcrSuccessfulCreditPending" => Ok(OrderStatus::OcrSuccessfulCreditPending),
            "AiSolutionPending" => Ok(OrderStatus::AiSolutionPending),
            "GeneratingAudioPending" => Ok(OrderStatus::GeneratingAudioPending),
            "RenderingAnimationPending" => Ok(OrderStatus::RenderingAnimationPending),
            "AssemblingFinalPending" => Ok(OrderStatus::AssemblingFinalPending),
            "Completed" => Ok(OrderStatus::Completed),
            "OcrFailed" => Ok(OrderStatus::OcrFailed),
            "CreditDeductionFailed" => Ok(OrderStatus::CreditDeductionFailed),
            "AiSolutionFailed" => Ok(OrderStatus::AiSolutionFailed),
            "AudioFailed" => Ok(OrderStatus::AudioFailed),
            "AnimationFailed" => Ok(OrderStatus::AnimationFailed),
            "AssemblyFailed" => Ok(OrderStatus::AssemblyFailed),
            "FailedGeneral" => Ok(OrderStatus::FailedGeneral),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
