//! Выбор top-K кандидатов из распределения декодера.

use candle_core::{DType, Result, Tensor, D};

/// Top-`k` по 1D тензору log-вероятностей `[num_classes]`.
///
/// Возвращает `(ids, log_probs)` по убыванию; при равенстве меньший id первым.
pub fn top_k(log_probs: &Tensor, k: usize) -> Result<(Vec<u32>, Vec<f32>)> {
    let values: Vec<f32> = log_probs.flatten_all()?.to_dtype(DType::F32)?.to_vec1()?;

    let mut indexed: Vec<(usize, f32)> = values.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);

    Ok(indexed.into_iter().map(|(i, v)| (i as u32, v)).unzip())
}

/// log_softmax по последнему измерению и top-`k`.
///
/// `logits` — `[num_classes]` или `[1, num_classes]`.
pub fn top_k_from_logits(logits: &Tensor, k: usize) -> Result<(Vec<u32>, Vec<f32>)> {
    let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    top_k(&log_probs, k)
}
