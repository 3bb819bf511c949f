//! # asr-core
//!
//! Базовые определения для состязательного ASR-ядра.
//!
//! Этот крейт предоставляет общие абстракции для остальных крейтов workspace:
//!
//! - Конфигурационные структуры beam search и состязательного обучения
//! - Унифицированная обработка ошибок через `AsrError`
//! - Переключатель подробного отладочного вывода

pub mod config;
pub mod debug;
pub mod error;

pub use config::{AdversarialConfig, BeamSearchConfig, ExperimentConfig, OptimizerConfig};
pub use error::{AsrError, AsrResult};
