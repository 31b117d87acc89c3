use thiserror::Error;

#[derive(Error, Debug)]
pub enum StanceGraphError {
    #[error("Configuration error: {0}")]
    Config(String),
}
