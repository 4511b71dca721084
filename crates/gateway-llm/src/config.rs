pub use gateway_shared::model::{
    LlmConfig, PdfConfig, PdfEngine, ReasoningConfig, ReasoningEffort, WebSearchConfig,
    WebSearchContextSize,
};
