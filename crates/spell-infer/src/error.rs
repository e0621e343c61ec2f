use std::fmt;

#[derive(Debug)]
pub enum InferError {
    /// Tensor or model failure reported by candle.
    Candle(String),
    Io(String),
    Tokenizer(String),
    /// The model/tokenizer pair could not be located, fetched or parsed.
    Config(String),
    Download(String),
    /// Decoding parameters were rejected or a decoding step failed.
    Generation(String),
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, InferError>;

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::Candle(msg) => write!(f, "candle error: {msg}"),
            InferError::Io(msg) => write!(f, "io error: {msg}"),
            InferError::Tokenizer(msg) => write!(f, "tokenizer error: {msg}"),
            InferError::Config(msg) => write!(f, "configuration error: {msg}"),
            InferError::Download(msg) => write!(f, "download error: {msg}"),
            InferError::Generation(msg) => write!(f, "generation error: {msg}"),
            InferError::Runtime(msg) => write!(f, "runtime error: {msg}"),
        }
    }
}

impl std::error::Error for InferError {}

impl InferError {
    /// True for failures that happen while locating or loading a model.
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            InferError::Config(_) | InferError::Download(_) | InferError::Io(_)
        )
    }
}

impl From<candle_core::Error> for InferError {
    fn from(err: candle_core::Error) -> Self {
        InferError::Candle(err.to_string())
    }
}

impl From<std::io::Error> for InferError {
    fn from(err: std::io::Error) -> Self {
        InferError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for InferError {
    fn from(err: serde_json::Error) -> Self {
        InferError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for InferError {
    fn from(err: reqwest::Error) -> Self {
        InferError::Download(err.to_string())
    }
}
