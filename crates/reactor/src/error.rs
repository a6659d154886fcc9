use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("the reactor has stopped")]
    Stopped,
}
