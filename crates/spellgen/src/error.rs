use spell_infer::InferError;
use std::fmt;

#[derive(Debug)]
pub enum SpellError {
    Infer(InferError),
    /// An environment setting could not be understood.
    Settings(String),
}

pub type Result<T> = std::result::Result<T, SpellError>;

impl fmt::Display for SpellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpellError::Infer(err) => write!(f, "{err}"),
            SpellError::Settings(msg) => write!(f, "settings error: {msg}"),
        }
    }
}

impl std::error::Error for SpellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpellError::Infer(err) => Some(err),
            SpellError::Settings(_) => None,
        }
    }
}

impl From<InferError> for SpellError {
    fn from(err: InferError) -> Self {
        SpellError::Infer(err)
    }
}
