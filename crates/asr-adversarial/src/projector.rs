//! Простой генератор: пирамидальное сжатие по времени + проекция.
//!
//! `stack` соседних кадров склеиваются в один вектор (как в пирамидальном
//! listener), затем Linear → tanh. Длина выхода: `len / stack`.

use candle_core::{bail, Device, Module, Result, Tensor, Var};

use crate::blocks::Generator;
use crate::init::SeededInit;
use crate::layers::TrainableLinear;

pub struct FrameStackProjector {
    proj: TrainableLinear,
    stack: usize,
    feat_dim: usize,
}

impl FrameStackProjector {
    pub fn new(
        feat_dim: usize,
        out_dim: usize,
        stack: usize,
        init: &mut SeededInit,
        device: &Device,
    ) -> Result<Self> {
        if stack == 0 {
            bail!("FrameStackProjector: stack должен быть >= 1");
        }
        let proj = TrainableLinear::new(feat_dim * stack, out_dim, init, device)?;
        Ok(Self {
            proj,
            stack,
            feat_dim,
        })
    }

    pub fn stack(&self) -> usize {
        self.stack
    }
}

impl Generator for FrameStackProjector {
    fn forward(&self, features: &Tensor, lengths: &[usize]) -> Result<(Tensor, Vec<usize>)> {
        let (batch, time, feat) = features.dims3()?;
        if feat != self.feat_dim {
            bail!(
                "FrameStackProjector: ожидалось {} признаков, получено {}",
                self.feat_dim,
                feat
            );
        }
        let out_time = time / self.stack;
        if out_time == 0 {
            bail!(
                "FrameStackProjector: {} кадров меньше шага сжатия {}",
                time,
                self.stack
            );
        }

        // [B, T, F] → [B, T/stack, F*stack]
        let stacked = features
            .narrow(1, 0, out_time * self.stack)?
            .reshape((batch, out_time, feat * self.stack))?;
        let out = self.proj.forward(&stacked)?.tanh()?;

        Ok((out, self.output_lengths(lengths)))
    }

    fn output_lengths(&self, lengths: &[usize]) -> Vec<usize> {
        lengths.iter().map(|&l| l / self.stack).collect()
    }

    fn trainable_vars(&self) -> Vec<Var> {
        self.proj.vars()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsampled_shape() {
        let device = Device::Cpu;
        let mut init = SeededInit::new(2);
        let generator = FrameStackProjector::new(4, 6, 2, &mut init, &device).unwrap();
        let x = init.uniform((2, 9, 4), 1.0, &device).unwrap();

        let (out, lens) = generator.forward(&x, &[9, 5]).unwrap();
        assert_eq!(out.dims(), &[2, 4, 6]);
        assert_eq!(lens, vec![4, 2]);
    }

    #[test]
    fn test_too_short_input() {
        let device = Device::Cpu;
        let mut init = SeededInit::new(2);
        let generator = FrameStackProjector::new(4, 6, 4, &mut init, &device).unwrap();
        let x = init.uniform((1, 3, 4), 1.0, &device).unwrap();
        assert!(generator.forward(&x, &[3]).is_err());
        assert_eq!(generator.output_lengths(&[3]), vec![0]);
    }
}
