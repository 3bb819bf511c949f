//! Синтетические данные для CLI: воспроизводимые батчи и биграммный декодер.

use asr_adversarial::{AdversarialBatch, SeededInit};
use asr_core::{AsrError, AsrResult};
use asr_decoding::{top_k_from_logits, StepDecoder, StepOutput};
use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Генератор батчей: случайные признаки и метки с паддингом `0`.
pub struct SyntheticBatches {
    init: SeededInit,
    rng: StdRng,
    feat_dim: usize,
    max_frames: usize,
    min_frames: usize,
    max_label_len: usize,
    vocab_size: usize,
    device: Device,
}

impl SyntheticBatches {
    /// `min_frames` — минимальная длина речи (обычно шаг сжатия генератора).
    pub fn new(
        seed: u64,
        feat_dim: usize,
        max_frames: usize,
        min_frames: usize,
        max_label_len: usize,
        vocab_size: usize,
        device: &Device,
    ) -> AsrResult<Self> {
        if min_frames == 0 || min_frames > max_frames {
            return Err(AsrError::Config(format!(
                "некорректные длины кадров: min={min_frames}, max={max_frames}"
            )));
        }
        if max_label_len == 0 || vocab_size < 3 {
            return Err(AsrError::Config(format!(
                "нужны метки длины >= 1 и словарь >= 3 (получено {max_label_len}, {vocab_size})"
            )));
        }
        Ok(Self {
            init: SeededInit::new(seed),
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            feat_dim,
            max_frames,
            min_frames,
            max_label_len,
            vocab_size,
            device: device.clone(),
        })
    }

    pub fn next_batch(&mut self, batch_size: usize) -> AsrResult<AdversarialBatch> {
        let features = self
            .init
            .uniform((batch_size, self.max_frames, self.feat_dim), 1.0, &self.device)?;
        let feature_lens: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.gen_range(self.min_frames..=self.max_frames))
            .collect();

        let mut labels = vec![0u32; batch_size * self.max_label_len];
        let mut label_lens = Vec::with_capacity(batch_size);
        for row in labels.chunks_mut(self.max_label_len) {
            let len = self.rng.gen_range(1..=self.max_label_len);
            // 0 и 1 зарезервированы под <sos>/<eos> и паддинг.
            for id in row.iter_mut().take(len) {
                *id = self.rng.gen_range(2..self.vocab_size as u32);
            }
            label_lens.push(len);
        }
        let labels = Tensor::from_vec(labels, (batch_size, self.max_label_len), &self.device)?;

        AdversarialBatch::new(features, feature_lens, labels, label_lens)
    }
}

/// Биграммный декодер со случайными логитами `[vocab, vocab]`.
///
/// Строка `prev` задаёт распределение следующего токена. Столбец `<sos>`
/// подавлен, `<eos>` получает бонус, чтобы гипотезы завершались.
pub struct BigramDecoder {
    logits: Tensor,
    vocab_size: usize,
}

impl BigramDecoder {
    pub fn random(
        vocab_size: usize,
        sos_id: u32,
        eos_id: u32,
        eos_bias: f32,
        seed: u64,
        device: &Device,
    ) -> AsrResult<Self> {
        let max_special = sos_id.max(eos_id) as usize;
        if vocab_size < 3 || max_special >= vocab_size {
            return Err(AsrError::Config(format!(
                "словарь {vocab_size} не вмещает <sos>={sos_id} и <eos>={eos_id}"
            )));
        }

        let mut init = SeededInit::new(seed);
        let table = init.uniform((vocab_size, vocab_size), 2.0, device)?;

        let mut bias = vec![0f32; vocab_size];
        bias[sos_id as usize] = -1e4;
        bias[eos_id as usize] = eos_bias;
        let bias = Tensor::from_vec(bias, (1, vocab_size), device)?;

        Ok(Self {
            logits: table.broadcast_add(&bias)?,
            vocab_size,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

impl StepDecoder for BigramDecoder {
    /// Количество сделанных шагов.
    type State = usize;
    type LmState = ();

    fn step(
        &mut self,
        last_token: u32,
        state: &usize,
        _lm_state: Option<&()>,
        k: usize,
    ) -> AsrResult<StepOutput<usize>> {
        let prev = last_token as usize;
        if prev >= self.vocab_size {
            return Err(AsrError::Decoding(format!(
                "токен {prev} вне словаря {}",
                self.vocab_size
            )));
        }
        let row = self.logits.get(prev)?;
        let (top_ids, top_log_probs) = top_k_from_logits(&row, k)?;
        Ok(StepOutput {
            top_ids,
            top_log_probs,
            state: state + 1,
            lm_state: None,
        })
    }
}
