//! Core modules for Tutorlens

pub mod agreement;
pub mod chi_square;
pub mod distribution;
pub mod grammar;
pub mod normalizer;
pub mod provenance;
pub mod responses;

pub use agreement::AgreementEngine;
pub use chi_square::{chi_square_sf, chi_square_test};
pub use distribution::DistributionEngine;
pub use grammar::GrammarRuleParser;
pub use normalizer::{
    decode_flag, DatasetNormalization, NormalizerConfig, PhraseComponent, RecordFailure,
    RecordNormalizer,
};
pub use provenance::{dataset_digest, stamp};
pub use responses::{
    build_request, collect_responses, export_human_responses, load_response_file,
    parse_generation_payload, write_json_atomic, CollectionSummary, OpenRouterClient,
    ResponseGenerator, ResponseStore,
};
