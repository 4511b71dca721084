pub use gateway_shared::model::{AttachedFile, LlmMessage, Role, StreamedChunk};
