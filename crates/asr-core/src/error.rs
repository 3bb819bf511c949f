//! Error types for the adversarial ASR core.

use thiserror::Error;

/// Main error type for decoding and training operations.
#[derive(Error, Debug)]
pub enum AsrError {
    /// Нарушение предусловий декодирования (длины, пустые гипотезы).
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Ошибки шага обучения (формы батча, градиенты, оптимизаторы).
    #[error("Training error: {0}")]
    Training(String),

    /// В батче нет ни одного валидного кадра — среднее не определено.
    #[error("Degenerate batch: {0}")]
    DegenerateBatch(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for ASR operations.
pub type AsrResult<T> = Result<T, AsrError>;
