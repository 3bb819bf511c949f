//! Конфигурационные структуры для декодирования и состязательного обучения.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AsrError, AsrResult};

/// Корневая конфигурация эксперимента.
///
/// Все секции опциональны в JSON: отсутствующие поля берутся из `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Параметры состязательного обучения.
    pub adversarial: AdversarialConfig,

    /// Параметры beam search.
    pub beam_search: BeamSearchConfig,
}

impl ExperimentConfig {
    /// Загрузить конфигурацию из JSON-файла и проверить её.
    pub fn from_json_file(path: impl AsRef<Path>) -> AsrResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AsrError::Config(format!("Не удалось прочитать конфиг {:?}: {e}", path))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Проверить все секции.
    pub fn validate(&self) -> AsrResult<()> {
        self.adversarial.validate()?;
        self.beam_search.validate()
    }
}

/// Конфигурация beam search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamSearchConfig {
    /// Максимальное количество живых гипотез между шагами.
    pub beam_width: usize,

    /// Лимит шагов декодирования.
    pub max_steps: usize,

    /// Сколько лучших завершённых гипотез вернуть.
    pub n_best: usize,

    /// Сколько завершённых гипотез нужно накопить до остановки.
    /// `None` — равно `beam_width`.
    pub results_target: Option<usize>,

    /// ID стартового токена (`<sos>`), используется для пустой гипотезы.
    pub sos_id: u32,

    /// ID токена конца последовательности (`<eos>`).
    pub eos_id: u32,
}

impl Default for BeamSearchConfig {
    fn default() -> Self {
        Self {
            beam_width: 5,
            max_steps: 100,
            n_best: 1,
            results_target: None,
            sos_id: 0,
            eos_id: 1,
        }
    }
}

impl BeamSearchConfig {
    /// Жадное декодирование: ширина луча 1.
    pub fn greedy() -> Self {
        Self {
            beam_width: 1,
            ..Self::default()
        }
    }

    /// Задать ширину луча.
    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = beam_width;
        self
    }

    /// Задать лимит шагов.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Задать количество возвращаемых гипотез.
    pub fn with_n_best(mut self, n_best: usize) -> Self {
        self.n_best = n_best;
        self
    }

    /// Эффективная цель по количеству завершённых гипотез.
    pub fn effective_results_target(&self) -> usize {
        self.results_target.unwrap_or(self.beam_width)
    }

    /// Проверить параметры.
    pub fn validate(&self) -> AsrResult<()> {
        if self.beam_width == 0 {
            return Err(AsrError::Config("beam_width должен быть >= 1".into()));
        }
        if self.max_steps == 0 {
            return Err(AsrError::Config("max_steps должен быть >= 1".into()));
        }
        if self.n_best == 0 {
            return Err(AsrError::Config("n_best должен быть >= 1".into()));
        }
        if self.effective_results_target() == 0 {
            return Err(AsrError::Config("results_target должен быть >= 1".into()));
        }
        if self.sos_id == self.eos_id {
            return Err(AsrError::Config(format!(
                "sos_id и eos_id совпадают ({})",
                self.eos_id
            )));
        }
        Ok(())
    }
}

/// Гиперпараметры оптимизатора Adam(W).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Learning rate.
    pub lr: f64,

    /// Коэффициент первого момента.
    pub beta1: f64,

    /// Коэффициент второго момента.
    pub beta2: f64,

    /// Epsilon в знаменателе.
    pub eps: f64,

    /// Decoupled weight decay (0.0 — обычный Adam).
    pub weight_decay: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        // Adam(lr=0.01, betas=(0.5, 0.999)) — стандартная настройка для GAN.
        Self {
            lr: 0.01,
            beta1: 0.5,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }
}

impl OptimizerConfig {
    fn validate(&self, name: &str) -> AsrResult<()> {
        if !(self.lr > 0.0) {
            return Err(AsrError::Config(format!("{name}: lr должен быть > 0")));
        }
        for (beta, label) in [(self.beta1, "beta1"), (self.beta2, "beta2")] {
            if !(0.0..1.0).contains(&beta) {
                return Err(AsrError::Config(format!(
                    "{name}: {label}={beta} вне диапазона [0, 1)"
                )));
            }
        }
        Ok(())
    }
}

/// Конфигурация состязательного обучения (генератор против дискриминатора).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdversarialConfig {
    /// Label smoothing: цель для «настоящих» кадров равна `1 - label_smoothing`.
    pub label_smoothing: f64,

    /// Размер скрытого слоя дискриминатора.
    pub discriminator_hidden: usize,

    /// Оптимизатор генератора.
    pub generator_optim: OptimizerConfig,

    /// Оптимизатор дискриминатора.
    pub discriminator_optim: OptimizerConfig,

    /// Seed для инициализации параметров и синтетических данных.
    pub seed: u64,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            label_smoothing: 0.1,
            discriminator_hidden: 256,
            generator_optim: OptimizerConfig::default(),
            discriminator_optim: OptimizerConfig::default(),
            seed: 1,
        }
    }
}

impl AdversarialConfig {
    /// Цель BCE для кадров референсного энкодера.
    pub fn real_target(&self) -> f64 {
        1.0 - self.label_smoothing
    }

    /// Проверить параметры.
    pub fn validate(&self) -> AsrResult<()> {
        if !(0.0..1.0).contains(&self.label_smoothing) {
            return Err(AsrError::Config(format!(
                "label_smoothing={} вне диапазона [0, 1)",
                self.label_smoothing
            )));
        }
        if self.discriminator_hidden == 0 {
            return Err(AsrError::Config(
                "discriminator_hidden должен быть >= 1".into(),
            ));
        }
        self.generator_optim.validate("generator_optim")?;
        self.discriminator_optim.validate("discriminator_optim")
    }
}
