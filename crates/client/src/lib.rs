pub mod api;
pub mod controller;
pub mod http;
pub mod memory;
mod wire;

pub use api::{ClientError, WorkflowApi};
pub use controller::{
    ActionOutcome, ActionRequest, Banner, BannerTone, DetailController, DetailState,
};
pub use http::{HttpWorkflowClient, CORRELATION_HEADER};
pub use memory::InMemoryWorkflowApi;
