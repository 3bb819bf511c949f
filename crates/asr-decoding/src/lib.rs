//! # asr-decoding
//!
//! Декодирование выходов seq2seq ASR-модели.
//!
//! - [`Hypothesis`] — кандидат-последовательность с историей log-вероятностей
//! - [`BeamSearch`] — поиск по лучу поверх любого [`StepDecoder`]
//! - [`topk`] — выбор кандидатов из распределения декодера
//! - [`metrics`] — посимвольная точность, WER, обрезка по `<eos>`

pub mod beam;
pub mod hypothesis;
pub mod metrics;
pub mod topk;

pub use beam::{BeamSearch, BeamSearchOutput, StepDecoder, StepOutput, StopReason};
pub use hypothesis::{rank_by_average, Expansion, Hypothesis, SpecialTokens};
pub use topk::{top_k, top_k_from_logits};
