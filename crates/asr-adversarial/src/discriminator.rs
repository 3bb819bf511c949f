//! Покадровый дискриминатор.
//!
//! Двухслойная feed-forward сеть: Linear(in, hidden) → ReLU → Linear(hidden, 1) → sigmoid.
//! Каждый временной кадр оценивается независимо: на вход `[batch, time, in_dim]`,
//! на выход `[batch, time, 1]` — вероятность того, что кадр получен от
//! референсного (текстового) энкодера, а не от генератора.

use candle_core::{Device, Module, Result, Tensor, Var};
use tracing::debug;

use crate::blocks::Discriminator;
use crate::init::SeededInit;
use crate::layers::TrainableLinear;

pub struct FrameDiscriminator {
    input: TrainableLinear,
    output: TrainableLinear,
    in_dim: usize,
}

impl FrameDiscriminator {
    pub fn new(
        in_dim: usize,
        hidden_dim: usize,
        init: &mut SeededInit,
        device: &Device,
    ) -> Result<Self> {
        let input = TrainableLinear::new(in_dim, hidden_dim, init, device)?;
        let output = TrainableLinear::new(hidden_dim, 1, init, device)?;

        debug!("FrameDiscriminator: {} → {} → 1", in_dim, hidden_dim);

        Ok(Self {
            input,
            output,
            in_dim,
        })
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }
}

impl Discriminator for FrameDiscriminator {
    fn forward(&self, embeddings: &Tensor) -> Result<Tensor> {
        let hidden = self.input.forward(embeddings)?.relu()?;
        let logits = self.output.forward(&hidden)?;
        candle_nn::ops::sigmoid(&logits)
    }

    fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = self.input.vars();
        vars.extend(self.output.vars());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_shape_and_range() {
        let device = Device::Cpu;
        let mut init = SeededInit::new(5);
        let disc = FrameDiscriminator::new(6, 8, &mut init, &device).unwrap();
        let x = init.uniform((3, 7, 6), 2.0, &device).unwrap();

        let scores = disc.forward(&x).unwrap();
        assert_eq!(scores.dims(), &[3, 7, 1]);

        let values: Vec<f32> = scores.flatten_all().unwrap().to_vec1().unwrap();
        assert!(values.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert_eq!(disc.trainable_vars().len(), 4);
    }

    #[test]
    fn test_scores_are_logistic_and_differentiable() {
        let device = Device::Cpu;
        let mut init = SeededInit::new(6);
        let disc = FrameDiscriminator::new(3, 4, &mut init, &device).unwrap();
        let x = init.uniform((1, 2, 3), 1.0, &device).unwrap();

        let hidden = disc.input.forward(&x).unwrap().relu().unwrap();
        let logits: Vec<f32> = disc
            .output
            .forward(&hidden)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        let scores = disc.forward(&x).unwrap();
        let values: Vec<f32> = scores.flatten_all().unwrap().to_vec1().unwrap();
        for (p, z) in values.iter().zip(&logits) {
            assert!((p - 1.0 / (1.0 + (-z).exp())).abs() < 1e-6);
        }

        let grads = scores.sum_all().unwrap().backward().unwrap();
        for var in disc.trainable_vars() {
            assert!(grads.get(var.as_tensor()).is_some());
        }
    }
}
