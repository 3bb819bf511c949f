//! Beam search поверх пошагового декодера.
//!
//! Алгоритм:
//! 1. Начать с одной пустой гипотезы (последний токен = `<sos>`)
//! 2. На каждом шаге для каждой живой гипотезы запросить у декодера top-K
//!    кандидатов (K = ширина луча) по её последнему токену и состоянию
//! 3. Расширить гипотезы; завершённые (`<eos>`) уходят в накопитель результатов
//! 4. Отсортировать потомков по средней log-вероятности, оставить `beam_width`
//! 5. Остановиться по лимиту шагов, по накоплению `results_target`
//!    завершённых гипотез или когда живых гипотез не осталось

use asr_core::{AsrError, AsrResult, BeamSearchConfig};
use tracing::debug;

use crate::hypothesis::{rank_by_average, Hypothesis, SpecialTokens};

/// Выход декодера за один шаг.
#[derive(Debug, Clone)]
pub struct StepOutput<S, L = ()> {
    /// ID кандидатов, по убыванию вероятности.
    pub top_ids: Vec<u32>,
    /// Log-вероятности кандидатов.
    pub top_log_probs: Vec<f32>,
    /// Состояние декодера после шага.
    pub state: S,
    /// Состояние языковой модели после шага.
    pub lm_state: Option<L>,
}

/// Пошаговый декодер, которым управляет beam search.
///
/// Реализация сама отвечает за эмбеддинг предыдущего токена.
pub trait StepDecoder {
    /// Снимок рекуррентного состояния декодера.
    type State: Clone;
    /// Снимок состояния внешней языковой модели.
    type LmState: Clone;

    /// Один шаг: `(last_token, state, lm_state)` → top-`k` кандидатов и новые состояния.
    fn step(
        &mut self,
        last_token: u32,
        state: &Self::State,
        lm_state: Option<&Self::LmState>,
        k: usize,
    ) -> AsrResult<StepOutput<Self::State, Self::LmState>>;
}

/// Причина остановки beam search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Накоплено нужное количество завершённых гипотез.
    Completed,
    /// Достигнут лимит `max_steps`.
    MaxSteps,
    /// Живых гипотез не осталось.
    Exhausted,
}

/// Результат beam search.
#[derive(Debug)]
pub struct BeamSearchOutput<S, L = ()> {
    /// Лучшие гипотезы по убыванию средней log-вероятности (не более `n_best`).
    ///
    /// Если ни одна гипотеза не завершилась, здесь лучшие живые гипотезы
    /// (`is_terminal() == false`).
    pub hypotheses: Vec<Hypothesis<S, L>>,
    /// Причина остановки.
    pub stop_reason: StopReason,
    /// Выполнено шагов декодирования.
    pub steps: usize,
    /// Максимальный размер луча после отсечения.
    pub peak_live: usize,
}

impl<S, L> BeamSearchOutput<S, L> {
    /// Лучшая гипотеза.
    pub fn best(&self) -> Option<&Hypothesis<S, L>> {
        self.hypotheses.first()
    }

    /// Есть ли среди результатов завершённые гипотезы.
    pub fn is_complete(&self) -> bool {
        self.hypotheses.first().is_some_and(|h| h.is_terminal())
    }
}

/// Beam search декодер.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    config: BeamSearchConfig,
}

impl BeamSearch {
    /// Создать декодер; конфигурация проверяется.
    pub fn new(config: BeamSearchConfig) -> AsrResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BeamSearchConfig {
        &self.config
    }

    fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            sos: self.config.sos_id,
            eos: self.config.eos_id,
        }
    }

    /// Запустить поиск из начального состояния декодера.
    pub fn search<D: StepDecoder>(
        &self,
        decoder: &mut D,
        initial_state: D::State,
        initial_lm_state: Option<D::LmState>,
    ) -> AsrResult<BeamSearchOutput<D::State, D::LmState>> {
        let beam_width = self.config.beam_width;
        let target = self.config.effective_results_target();

        let mut live = vec![Hypothesis::new(
            initial_state,
            initial_lm_state,
            self.special_tokens(),
        )];
        let mut finished: Vec<Hypothesis<D::State, D::LmState>> = Vec::new();
        let mut steps = 0;
        let mut peak_live = live.len();

        let stop_reason = loop {
            if finished.len() >= target {
                break StopReason::Completed;
            }
            if live.is_empty() {
                break StopReason::Exhausted;
            }
            if steps >= self.config.max_steps {
                break StopReason::MaxSteps;
            }

            let mut candidates = Vec::with_capacity(live.len() * beam_width);
            for hyp in live.drain(..) {
                let out = decoder.step(
                    hyp.last_token(),
                    hyp.decoder_state(),
                    hyp.lm_state(),
                    beam_width,
                )?;
                if out.top_ids.len() > beam_width {
                    return Err(AsrError::Decoding(format!(
                        "декодер вернул {} кандидатов при k={}",
                        out.top_ids.len(),
                        beam_width
                    )));
                }
                let expansion =
                    hyp.expand(&out.top_ids, &out.top_log_probs, out.state, out.lm_state)?;
                if let Some(done) = expansion.finished {
                    finished.push(done);
                }
                candidates.extend(expansion.children);
            }

            rank_by_average(&mut candidates)?;
            candidates.truncate(beam_width);
            live = candidates;
            steps += 1;
            peak_live = peak_live.max(live.len());

            debug!(
                "beam step {}: живых {}, завершённых {}",
                steps,
                live.len(),
                finished.len()
            );
            if asr_core::debug::enabled() {
                for (i, h) in live.iter().enumerate() {
                    debug!(
                        "  #{i}: avg={:.4} seq={:?}",
                        h.average_score().unwrap_or(f32::NAN),
                        h.output_seq()
                    );
                }
            }
        };

        let mut hypotheses = if finished.is_empty() { live } else { finished };
        rank_by_average(&mut hypotheses)?;
        hypotheses.truncate(self.config.n_best);

        debug!(
            "beam search остановлен ({:?}) после {} шагов, гипотез: {}",
            stop_reason,
            steps,
            hypotheses.len()
        );

        Ok(BeamSearchOutput {
            hypotheses,
            stop_reason,
            steps,
            peak_live,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Биграммная таблица: log P(next | prev), без рекуррентного состояния.
    /// Состояние — номер шага, чтобы проверять передачу снимков.
    struct TableDecoder {
        table: Vec<Vec<f32>>,
        calls: usize,
    }

    impl TableDecoder {
        fn new(probs: Vec<Vec<f32>>) -> Self {
            let table = probs
                .into_iter()
                .map(|row| row.into_iter().map(f32::ln).collect())
                .collect();
            Self { table, calls: 0 }
        }
    }

    impl StepDecoder for TableDecoder {
        type State = usize;
        type LmState = ();

        fn step(
            &mut self,
            last_token: u32,
            state: &usize,
            _lm_state: Option<&()>,
            k: usize,
        ) -> AsrResult<StepOutput<usize>> {
            self.calls += 1;
            let row = &self.table[last_token as usize];
            let mut idx: Vec<usize> = (0..row.len()).collect();
            idx.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
            idx.truncate(k);
            Ok(StepOutput {
                top_ids: idx.iter().map(|&i| i as u32).collect(),
                top_log_probs: idx.iter().map(|&i| row[i]).collect(),
                state: state + 1,
                lm_state: None,
            })
        }
    }

    // Токены: 0 = <sos>, 1 = <eos>, 2..=3 — символы.
    fn peaked_table() -> Vec<Vec<f32>> {
        vec![
            vec![0.01, 0.01, 0.9, 0.08],
            vec![0.25, 0.25, 0.25, 0.25],
            vec![0.01, 0.6, 0.09, 0.3],
            vec![0.01, 0.7, 0.2, 0.09],
        ]
    }

    #[test]
    fn test_beam_search_finds_best_sequence() {
        let mut decoder = TableDecoder::new(peaked_table());
        let config = BeamSearchConfig::default().with_beam_width(2).with_n_best(2);
        let search = BeamSearch::new(config).unwrap();

        let out = search.search(&mut decoder, 0, None).unwrap();
        assert!(out.is_complete());
        let best = out.best().unwrap();
        // <sos> → 2 (0.9) → <eos> (0.6): среднее ln(0.9), ln(0.6)
        assert_eq!(best.output_seq(), &[2, 1]);
        assert_eq!(out.hypotheses.len(), 2);

        let scores: Vec<f32> = out
            .hypotheses
            .iter()
            .map(|h| h.average_score().unwrap())
            .collect();
        assert!(scores[0] >= scores[1]);
        for h in &out.hypotheses {
            assert_eq!(h.output_seq().len(), h.output_scores().len());
            assert_eq!(*h.output_seq().last().unwrap(), 1);
        }
    }

    #[test]
    fn test_beam_width_respected() {
        let uniform = vec![vec![0.2; 5]; 5];
        let mut decoder = TableDecoder::new(uniform);
        let config = BeamSearchConfig {
            results_target: Some(1000),
            ..BeamSearchConfig::default().with_beam_width(3).with_max_steps(6)
        };
        let search = BeamSearch::new(config).unwrap();

        let out = search.search(&mut decoder, 0, None).unwrap();
        assert!(out.peak_live <= 3);
        // Шаг 1: одна гипотеза, далее не более трёх за шаг.
        assert!(decoder.calls <= 1 + 3 * 5);
    }

    #[test]
    fn test_stops_at_max_steps_without_eos() {
        // <eos> никогда не попадает в top-1.
        let table = vec![
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0, 0.0],
        ];
        let mut decoder = TableDecoder::new(table);
        let config = BeamSearchConfig::greedy().with_max_steps(4);
        let search = BeamSearch::new(config).unwrap();

        let out = search.search(&mut decoder, 0, None).unwrap();
        assert_eq!(out.stop_reason, StopReason::MaxSteps);
        assert_eq!(out.steps, 4);
        assert_eq!(decoder.calls, 4);
        assert!(!out.is_complete());
        let best = out.best().unwrap();
        assert_eq!(best.output_seq(), &[2, 3, 2, 3]);
        assert_eq!(*best.decoder_state(), 4);
    }

    #[test]
    fn test_completed_stop_reason() {
        let mut decoder = TableDecoder::new(peaked_table());
        let config = BeamSearchConfig {
            results_target: Some(1),
            ..BeamSearchConfig::default().with_beam_width(2)
        };
        let search = BeamSearch::new(config).unwrap();
        let out = search.search(&mut decoder, 0, None).unwrap();
        assert_eq!(out.stop_reason, StopReason::Completed);
        assert_eq!(out.hypotheses.len(), 1);
    }

    #[test]
    fn test_exhausted_when_only_eos() {
        // С шириной 1 единственный кандидат после <sos> — <eos>.
        let table = vec![vec![0.1, 0.9], vec![0.5, 0.5]];
        let mut decoder = TableDecoder::new(table);
        let config = BeamSearchConfig {
            results_target: Some(5),
            ..BeamSearchConfig::greedy()
        };
        let search = BeamSearch::new(config).unwrap();
        let out = search.search(&mut decoder, 0, None).unwrap();
        assert_eq!(out.stop_reason, StopReason::Exhausted);
        assert_eq!(out.best().unwrap().output_seq(), &[1]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(BeamSearch::new(BeamSearchConfig::default().with_beam_width(0)).is_err());
    }
}
