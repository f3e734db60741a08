//! Core types for tutorlens

mod action;
mod conversation;
mod generation;
mod grammar;
mod report;

pub use action::{decode_flags, encode_flags, ActionLabel, StudentAction, TutorAction};
pub use conversation::{
    Conversation, ConversationContext, Exchange, TargetPhrase, Turn, TutorResponse,
};
pub use generation::{CachedResponse, GenerationOutcome, GenerationReason, ResponseEntry};
pub use grammar::{GrammarReason, GrammarRules};
pub use report::{
    ActionsPerResponse, AgreementReport, AnalysisReport, ChiSquareResult,
    ConditionalDistribution, Distribution, ReportMeta, SourceComparison,
};
