use std::sync::Arc;

pub mod error;
pub mod http_client;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;

pub use error::{LinkError, LinkResult};
pub use http_client::HttpLink;
pub use models::{
    Ack, CommandPayload, LastPosition, NextPosition, SavePositionPayload, SequencePosition, Status,
};

/// Transport to the backend bridge that owns the serial link to the arm.
///
/// A motion request only confirms that the backend *accepted* the command.
/// Completion is observed through [`RemoteLink::get_status`]. Implementations
/// never retry.
#[async_trait::async_trait]
pub trait RemoteLink: Send + Sync {
    async fn send_command(&self, payload: &CommandPayload) -> LinkResult<Ack>;
    async fn home(&self) -> LinkResult<Ack>;
    async fn save_position(&self, payload: &SavePositionPayload) -> LinkResult<Ack>;

    async fn run_sequence(&self) -> LinkResult<Ack>;
    async fn stop_sequence(&self) -> LinkResult<Ack>;
    async fn clear_sequence(&self) -> LinkResult<Ack>;
    async fn next_position(&self) -> LinkResult<NextPosition>;

    async fn get_status(&self) -> LinkResult<Status>;
}

#[async_trait::async_trait]
impl<T: RemoteLink + ?Sized> RemoteLink for Arc<T> {
    async fn send_command(&self, payload: &CommandPayload) -> LinkResult<Ack> {
        (**self).send_command(payload).await
    }

    async fn home(&self) -> LinkResult<Ack> {
        (**self).home().await
    }

    async fn save_position(&self, payload: &SavePositionPayload) -> LinkResult<Ack> {
        (**self).save_position(payload).await
    }

    async fn run_sequence(&self) -> LinkResult<Ack> {
        (**self).run_sequence().await
    }

    async fn stop_sequence(&self) -> LinkResult<Ack> {
        (**self).stop_sequence().await
    }

    async fn clear_sequence(&self) -> LinkResult<Ack> {
        (**self).clear_sequence().await
    }

    async fn next_position(&self) -> LinkResult<NextPosition> {
        (**self).next_position().await
    }

    async fn get_status(&self) -> LinkResult<Status> {
        (**self).get_status().await
    }
}
