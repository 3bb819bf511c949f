//! Цикл состязательного обучения.
//!
//! На каждый батч две фазы, строго по порядку:
//!
//! **Фаза D** (дискриминатор, максимизирует `log D(x) + log(1 - D(G(z)))`):
//! 1. Обнулить буфер градиентов дискриминатора
//! 2. `real = R(labels)`, BCE против `1 - label_smoothing`, backward
//! 3. `fake = G(features).detach()`, BCE против `0`, backward
//! 4. Шаг оптимизатора дискриминатора по сумме градиентов
//!
//! **Фаза G** (генератор, максимизирует `log D(G(z))`):
//! 1. Обнулить буфер градиентов генератора
//! 2. `fake = G(features)` без detach — граф тянется через D до параметров G
//! 3. BCE против `1`, backward
//! 4. Шаг оптимизатора генератора; градиенты D копятся в его буфер,
//!    но не применяются и обнуляются в начале следующей фазы D

use asr_core::{AdversarialConfig, AsrError, AsrResult, OptimizerConfig};
use candle_core::Tensor;
use candle_nn::optim::{AdamW, Optimizer, ParamsAdamW};
use tracing::{debug, warn};

use crate::blocks::{Discriminator, Generator, ReferenceEncoder};
use crate::grads::GradBuffer;
use crate::loss::{frame_targets, masked_frame_bce};

/// Батч для состязательного шага.
#[derive(Debug, Clone)]
pub struct AdversarialBatch {
    /// Признаки речи `[batch, time, feat]`.
    pub features: Tensor,
    /// Длины признаков.
    pub feature_lens: Vec<usize>,
    /// Метки `[batch, label_time]` (u32).
    pub labels: Tensor,
    /// Длины меток.
    pub label_lens: Vec<usize>,
}

impl AdversarialBatch {
    /// Собрать батч и проверить согласованность форм.
    pub fn new(
        features: Tensor,
        feature_lens: Vec<usize>,
        labels: Tensor,
        label_lens: Vec<usize>,
    ) -> AsrResult<Self> {
        let (batch, _, _) = features.dims3()?;
        let (label_batch, _) = labels.dims2()?;
        if label_batch != batch || feature_lens.len() != batch || label_lens.len() != batch {
            return Err(AsrError::Training(format!(
                "несогласованный батч: features={}, labels={}, feature_lens={}, label_lens={}",
                batch,
                label_batch,
                feature_lens.len(),
                label_lens.len()
            )));
        }
        Ok(Self {
            features,
            feature_lens,
            labels,
            label_lens,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.feature_lens.len()
    }
}

/// Потери фазы D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscriminatorLosses {
    /// BCE на кадрах референсного энкодера.
    pub real: f32,
    /// BCE на кадрах генератора.
    pub fake: f32,
}

impl DiscriminatorLosses {
    pub fn total(&self) -> f32 {
        self.real + self.fake
    }
}

/// Потери полного шага.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    /// Номер шага (с 1).
    pub step: usize,
    pub discriminator: DiscriminatorLosses,
    pub generator: f32,
}

/// Итог шага обучения.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Обе фазы выполнены.
    Trained(StepLosses),
    /// Батч пропущен без изменения параметров.
    Skipped { reason: String },
}

fn adamw_params(config: &OptimizerConfig) -> ParamsAdamW {
    ParamsAdamW {
        lr: config.lr,
        beta1: config.beta1,
        beta2: config.beta2,
        eps: config.eps,
        weight_decay: config.weight_decay,
    }
}

/// Тренер: генератор `G`, замороженный референсный энкодер `R`, дискриминатор `D`.
pub struct AdversarialTrainer<G, R, D> {
    generator: G,
    reference: R,
    discriminator: D,
    generator_optim: AdamW,
    discriminator_optim: AdamW,
    generator_grads: GradBuffer,
    discriminator_grads: GradBuffer,
    real_target: f64,
    steps: usize,
}

impl<G, R, D> AdversarialTrainer<G, R, D>
where
    G: Generator,
    R: ReferenceEncoder,
    D: Discriminator,
{
    pub fn new(
        generator: G,
        reference: R,
        discriminator: D,
        config: &AdversarialConfig,
    ) -> AsrResult<Self> {
        config.validate()?;

        let generator_vars = generator.trainable_vars();
        let discriminator_vars = discriminator.trainable_vars();
        if generator_vars.is_empty() || discriminator_vars.is_empty() {
            return Err(AsrError::Training(
                "у генератора и дискриминатора должны быть обучаемые параметры".into(),
            ));
        }
        let shared = generator_vars
            .iter()
            .any(|g| discriminator_vars.iter().any(|d| d.id() == g.id()));
        if shared {
            return Err(AsrError::Training(
                "генератор и дискриминатор не могут делить параметры".into(),
            ));
        }

        let generator_optim =
            AdamW::new(generator_vars.clone(), adamw_params(&config.generator_optim))?;
        let discriminator_optim = AdamW::new(
            discriminator_vars.clone(),
            adamw_params(&config.discriminator_optim),
        )?;

        debug!(
            "AdversarialTrainer: G={} параметров-тензоров, D={}, real_target={:.3}",
            generator_vars.len(),
            discriminator_vars.len(),
            config.real_target()
        );

        Ok(Self {
            generator,
            reference,
            discriminator,
            generator_optim,
            discriminator_optim,
            generator_grads: GradBuffer::new("generator", generator_vars),
            discriminator_grads: GradBuffer::new("discriminator", discriminator_vars),
            real_target: config.real_target(),
            steps: 0,
        })
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    pub fn discriminator(&self) -> &D {
        &self.discriminator
    }

    pub fn generator_grads(&self) -> &GradBuffer {
        &self.generator_grads
    }

    pub fn discriminator_grads(&self) -> &GradBuffer {
        &self.discriminator_grads
    }

    /// Цель BCE для «настоящих» кадров (`1 - label_smoothing`).
    pub fn real_target(&self) -> f64 {
        self.real_target
    }

    /// Количество выполненных (не пропущенных) шагов.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Проверить, что у обеих веток есть валидные кадры.
    ///
    /// # Ошибки
    /// `AsrError::DegenerateBatch` для батча без валидных кадров.
    pub fn check_batch(&self, batch: &AdversarialBatch) -> AsrResult<()> {
        let label_time = batch.labels.dim(1)?;
        let real_frames: usize = batch.label_lens.iter().map(|&l| l.min(label_time)).sum();
        if real_frames == 0 {
            return Err(AsrError::DegenerateBatch(format!(
                "все метки пустые (длины {:?})",
                batch.label_lens
            )));
        }

        let fake_frames: usize = self
            .generator
            .output_lengths(&batch.feature_lens)
            .iter()
            .sum();
        if fake_frames == 0 {
            return Err(AsrError::DegenerateBatch(format!(
                "генератор не выдаёт кадров для длин {:?}",
                batch.feature_lens
            )));
        }
        Ok(())
    }

    /// Полный шаг: фаза D, затем фаза G.
    ///
    /// Вырожденный батч пропускается с предупреждением; любые другие ошибки
    /// прерывают обучение.
    pub fn train_step(&mut self, batch: &AdversarialBatch) -> AsrResult<StepOutcome> {
        match self.check_batch(batch) {
            Ok(()) => {}
            Err(AsrError::DegenerateBatch(reason)) => {
                warn!("батч пропущен: {}", reason);
                return Ok(StepOutcome::Skipped { reason });
            }
            Err(e) => return Err(e),
        }

        let discriminator = self.discriminator_phase(batch)?;
        let generator = self.generator_phase(batch)?;
        self.steps += 1;

        let losses = StepLosses {
            step: self.steps,
            discriminator,
            generator,
        };
        debug!(
            "шаг {}: D_real={:.4} D_fake={:.4} G={:.4}",
            losses.step, discriminator.real, discriminator.fake, generator
        );
        Ok(StepOutcome::Trained(losses))
    }

    /// Фаза D: обновляет только параметры дискриминатора.
    pub fn discriminator_phase(
        &mut self,
        batch: &AdversarialBatch,
    ) -> AsrResult<DiscriminatorLosses> {
        self.discriminator_grads.zero();

        // Настоящие кадры: референсный энкодер заморожен.
        let real = self.reference.forward(&batch.labels)?.detach();
        let d_real = self.discriminator.forward(&real)?;
        let (b, t_real) = (d_real.dim(0)?, d_real.dim(1)?);
        let real_targets = frame_targets(self.real_target, b, t_real, d_real.device())?;
        let real_loss = masked_frame_bce(&d_real, &real_targets, &batch.label_lens)?;
        let real_store = real_loss.backward()?;
        self.discriminator_grads.accumulate(&real_store)?;

        // Поддельные кадры: выход генератора отрезан от графа.
        let (fake, fake_lens) = self.generator.forward(&batch.features, &batch.feature_lens)?;
        let fake = fake.detach();
        let d_fake = self.discriminator.forward(&fake)?;
        let (b, t_fake) = (d_fake.dim(0)?, d_fake.dim(1)?);
        let fake_targets = frame_targets(0.0, b, t_fake, d_fake.device())?;
        let fake_loss = masked_frame_bce(&d_fake, &fake_targets, &fake_lens)?;
        let fake_store = fake_loss.backward()?;

        if self
            .generator_grads
            .vars()
            .iter()
            .any(|v| fake_store.get(v.as_tensor()).is_some())
        {
            return Err(AsrError::Training(
                "градиент фазы D дошёл до параметров генератора".into(),
            ));
        }
        self.discriminator_grads.accumulate(&fake_store)?;

        let grads = self.discriminator_grads.fill_store(fake_store);
        self.discriminator_optim.step(&grads)?;

        let losses = DiscriminatorLosses {
            real: real_loss.to_scalar::<f32>()?,
            fake: fake_loss.to_scalar::<f32>()?,
        };
        debug!(
            "фаза D: real={:.4} ({} кадров), fake={:.4} ({} кадров)",
            losses.real, t_real, losses.fake, t_fake
        );
        Ok(losses)
    }

    /// Фаза G: обновляет только параметры генератора.
    pub fn generator_phase(&mut self, batch: &AdversarialBatch) -> AsrResult<f32> {
        self.generator_grads.zero();

        // Без detach: backward должен пройти через D в параметры G.
        let (fake, fake_lens) = self.generator.forward(&batch.features, &batch.feature_lens)?;
        let d_fake = self.discriminator.forward(&fake)?;
        let (b, t_fake) = (d_fake.dim(0)?, d_fake.dim(1)?);
        let targets = frame_targets(1.0, b, t_fake, d_fake.device())?;
        let loss = masked_frame_bce(&d_fake, &targets, &fake_lens)?;
        let store = loss.backward()?;

        let touched = self.generator_grads.accumulate(&store)?;
        if touched == 0 {
            return Err(AsrError::Training(
                "фаза G: генератор не получил градиентов".into(),
            ));
        }
        // Градиенты D заполняются, но шаг оптимизатора D здесь не делается.
        self.discriminator_grads.accumulate(&store)?;

        let grads = self.generator_grads.fill_store(store);
        self.generator_optim.step(&grads)?;

        let loss = loss.to_scalar::<f32>()?;
        debug!("фаза G: loss={:.4}", loss);
        Ok(loss)
    }
}
