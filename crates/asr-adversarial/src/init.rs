//! Детерминированная инициализация параметров.
//!
//! CPU-генератор candle не принимает seed, поэтому параметры и синтетические
//! данные генерируются через `StdRng` с фиксированным seed.

use candle_core::{Device, Result, Shape, Tensor, Var};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Источник воспроизводимых случайных тензоров.
pub struct SeededInit {
    rng: StdRng,
}

impl SeededInit {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Тензор из U(-bound, bound).
    pub fn uniform<S: Into<Shape>>(
        &mut self,
        shape: S,
        bound: f32,
        device: &Device,
    ) -> Result<Tensor> {
        let shape = shape.into();
        let n = shape.elem_count();
        let data: Vec<f32> = if bound > 0.0 {
            (0..n).map(|_| self.rng.gen_range(-bound..bound)).collect()
        } else {
            vec![0.0; n]
        };
        Tensor::from_vec(data, shape, device)
    }

    /// Обучаемый параметр из U(-bound, bound).
    pub fn uniform_var<S: Into<Shape>>(
        &mut self,
        shape: S,
        bound: f32,
        device: &Device,
    ) -> Result<Var> {
        let t = self.uniform(shape, bound, device)?;
        Var::from_tensor(&t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let a: Vec<f32> = SeededInit::new(3)
            .uniform(16, 0.5, &Device::Cpu)
            .unwrap()
            .to_vec1()
            .unwrap();
        let b: Vec<f32> = SeededInit::new(3)
            .uniform(16, 0.5, &Device::Cpu)
            .unwrap()
            .to_vec1()
            .unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() < 0.5));
    }

    #[test]
    fn test_zero_bound() {
        let t: Vec<f32> = SeededInit::new(0)
            .uniform(4, 0.0, &Device::Cpu)
            .unwrap()
            .to_vec1()
            .unwrap();
        assert_eq!(t, vec![0.0; 4]);
    }
}
