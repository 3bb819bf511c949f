//! Замороженный референсный энкодер текста.
//!
//! Таблица эмбеддингов хранится обычным тензором (не `Var`), поэтому
//! backprop её не отслеживает, а оптимизаторы о ней не знают.

use candle_core::{Device, Result, Tensor};

use crate::blocks::ReferenceEncoder;
use crate::init::SeededInit;

pub struct FrozenTextEncoder {
    table: Tensor, // [vocab_size, dim]
    dim: usize,
}

impl FrozenTextEncoder {
    pub fn new(
        vocab_size: usize,
        dim: usize,
        init: &mut SeededInit,
        device: &Device,
    ) -> Result<Self> {
        let table = init.uniform((vocab_size, dim), 1.0, device)?;
        Ok(Self { table, dim })
    }

    /// Обернуть готовую таблицу `[vocab_size, dim]`.
    pub fn from_table(table: Tensor) -> Result<Self> {
        let (_, dim) = table.dims2()?;
        Ok(Self {
            table: table.detach(),
            dim,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.table.dims()[0]
    }
}

impl ReferenceEncoder for FrozenTextEncoder {
    fn forward(&self, labels: &Tensor) -> Result<Tensor> {
        let (batch, time) = labels.dims2()?;
        let flat = labels.flatten_all()?;
        self.table
            .embedding(&flat)?
            .reshape((batch, time, self.dim))?
            .tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_shape() {
        let device = Device::Cpu;
        let mut init = SeededInit::new(9);
        let encoder = FrozenTextEncoder::new(10, 4, &mut init, &device).unwrap();
        let labels = Tensor::new(&[[2u32, 3, 0], [7, 0, 0]], &device).unwrap();

        let out = encoder.forward(&labels).unwrap();
        assert_eq!(out.dims(), &[2, 3, 4]);
        assert_eq!(encoder.vocab_size(), 10);
    }

    #[test]
    fn test_same_id_same_embedding() {
        let device = Device::Cpu;
        let table = Tensor::new(&[[0.0f32, 0.0], [0.5, -0.5]], &device).unwrap();
        let encoder = FrozenTextEncoder::from_table(table).unwrap();
        let labels = Tensor::new(&[[1u32, 1]], &device).unwrap();
        let out = encoder.forward(&labels).unwrap().squeeze(0).unwrap();
        let out: Vec<Vec<f32>> = out.to_vec2().unwrap();
        assert_eq!(out[0], out[1]);
        assert!((out[0][0] - 0.5f32.tanh()).abs() < 1e-6);
    }
}
