//! Обучаемые слои на `Var`.

use candle_core::{Device, Module, Result, Tensor, Var};

use crate::init::SeededInit;

/// `candle_nn::Linear` поверх параметров из [`SeededInit`].
///
/// Тензоры слоя разделяют хранилище с `Var`, поэтому `backward()` отдаёт
/// градиенты именно этим параметрам.
pub struct TrainableLinear {
    inner: candle_nn::Linear,
    weight: Var, // [out_dim, in_dim]
    bias: Var,   // [out_dim]
}

impl TrainableLinear {
    /// Инициализация как в PyTorch: U(-1/sqrt(in_dim), 1/sqrt(in_dim)).
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        init: &mut SeededInit,
        device: &Device,
    ) -> Result<Self> {
        let bound = 1.0 / (in_dim as f32).sqrt();
        let weight = init.uniform_var((out_dim, in_dim), bound, device)?;
        let bias = init.uniform_var(out_dim, bound, device)?;
        let inner = candle_nn::Linear::new(
            weight.as_tensor().clone(),
            Some(bias.as_tensor().clone()),
        );
        Ok(Self {
            inner,
            weight,
            bias,
        })
    }

    pub fn vars(&self) -> Vec<Var> {
        vec![self.weight.clone(), self.bias.clone()]
    }
}

impl Module for TrainableLinear {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.inner.forward(x)
    }
}
