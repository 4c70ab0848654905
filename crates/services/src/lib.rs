pub mod argilla;
pub mod error;
pub mod hub;

pub use argilla::{ArgillaClient, DatasetHandle, RemoteDataset, Workspace};
pub use error::ServiceError;
pub use hub::{AudioPayload, HubClient, HubRequest, DEFAULT_HUB_ENDPOINT};

