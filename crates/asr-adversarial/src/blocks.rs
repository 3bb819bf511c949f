//! Контракты функциональных блоков состязательной схемы.
//!
//! Генератор (энкодер речи) и дискриминатор обучаются; референсный
//! энкодер (энкодер текста) заморожен и задаёт «настоящее» распределение.

use candle_core::{Result, Tensor, Var};

/// Генератор: признаки речи → последовательность эмбеддингов.
pub trait Generator {
    /// `(features [batch, time, feat], lengths)` → `([batch, time', dim], lengths')`.
    fn forward(&self, features: &Tensor, lengths: &[usize]) -> Result<(Tensor, Vec<usize>)>;

    /// Длины выхода для входных длин (без прямого прохода).
    fn output_lengths(&self, lengths: &[usize]) -> Vec<usize>;

    /// Обучаемые параметры.
    fn trainable_vars(&self) -> Vec<Var>;
}

/// Замороженный референсный энкодер: метки → эмбеддинги `[batch, time, dim]`.
pub trait ReferenceEncoder {
    fn forward(&self, labels: &Tensor) -> Result<Tensor>;
}

/// Покадровый дискриминатор: эмбеддинги → оценки `[batch, time, 1]` в `[0, 1]`.
pub trait Discriminator {
    fn forward(&self, embeddings: &Tensor) -> Result<Tensor>;

    /// Обучаемые параметры.
    fn trainable_vars(&self) -> Vec<Var>;
}
