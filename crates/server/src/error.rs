//! Session failure taxonomy.
//!
//! Every failure the pipeline can hit maps to one of these kinds,
//! each with a defined containment policy: re-ask, degrade, retry
//! once, or terminate the session with a user-legible message.
//! Nothing propagates past the orchestrator boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("utterance is not a dining query")]
    InputIrrelevant,

    #[error("extracted constraints are incomplete")]
    InputIncomplete,

    #[error("location area spans {span} degrees")]
    LocationTooLarge { span: f64 },

    #[error("provider quota exceeded")]
    ProviderQuotaExceeded,

    #[error("no venues matched the query")]
    NoCandidatesFound,

    #[error("session pipeline deadline exceeded")]
    PipelineDeadline,
}

impl SessionError {
    /// The message surfaced to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::InputIrrelevant => {
                "這裡只能幫你找餐廳喔，試著說「信義區火鍋」這樣的需求吧。"
            }
            SessionError::InputIncomplete => "再多告訴我一點你想吃什麼、在哪裡吃吧。",
            SessionError::LocationTooLarge { .. } => {
                "這個範圍有點大，可以說得更精確一點嗎？（例如：信義區）"
            }
            SessionError::ProviderQuotaExceeded => "搜尋服務目前繁忙，請稍後再試。",
            SessionError::NoCandidatesFound => {
                "找不到符合條件的餐廳，要不要換個地點或類型試試？"
            }
            SessionError::PipelineDeadline => "這次處理逾時了，請再試一次。",
        }
    }
}
