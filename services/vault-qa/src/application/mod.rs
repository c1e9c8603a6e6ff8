//! Application layer: request orchestration and dependency wiring.

mod container;
mod requests;

pub use container::ServiceContainer;
pub use requests::{
    AskRequest, AskResponse, DebugInfo, FolderSelectionDebug, IndexRequest, IndexResponse,
    LatencyDebug, StatusResponse,
};
