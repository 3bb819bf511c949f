//! Гипотеза beam search.
//!
//! Хранит историю токенов и их log-вероятностей, а также снимки состояния
//! декодера и (опционально) внешней языковой модели. Каждая ветка владеет
//! собственной копией истории и состояний: при расширении история клонируется,
//! состояния клонируются для каждого потомка.

use asr_core::{AsrError, AsrResult};

/// Специальные токены, нужные гипотезе.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    /// Стартовый токен (`last_token` пустой гипотезы).
    pub sos: u32,
    /// Токен конца последовательности.
    pub eos: u32,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self { sos: 0, eos: 1 }
    }
}

/// Гипотеза декодирования.
///
/// Инвариант: `output_seq.len() == output_scores.len()`.
#[derive(Debug, Clone)]
pub struct Hypothesis<S, L = ()> {
    decoder_state: S,
    lm_state: Option<L>,
    output_seq: Vec<u32>,
    output_scores: Vec<f32>,
    tokens: SpecialTokens,
    terminal: bool,
}

/// Результат расширения гипотезы.
#[derive(Debug)]
pub struct Expansion<S, L = ()> {
    /// Родительская гипотеза, если среди кандидатов был `<eos>`.
    /// К ней уже дописан `<eos>` и его log-вероятность.
    pub finished: Option<Hypothesis<S, L>>,
    /// Новые незавершённые гипотезы (по одной на каждый не-`<eos>` кандидат).
    pub children: Vec<Hypothesis<S, L>>,
}

impl<S, L> Hypothesis<S, L> {
    /// Пустая гипотеза в начале декодирования.
    pub fn new(decoder_state: S, lm_state: Option<L>, tokens: SpecialTokens) -> Self {
        Self {
            decoder_state,
            lm_state,
            output_seq: Vec::new(),
            output_scores: Vec::new(),
            tokens,
            terminal: false,
        }
    }

    /// Гипотеза с заданной историей.
    ///
    /// # Ошибки
    /// `AsrError::Decoding`, если длины `output_seq` и `output_scores` различаются.
    pub fn with_history(
        decoder_state: S,
        lm_state: Option<L>,
        output_seq: Vec<u32>,
        output_scores: Vec<f32>,
        tokens: SpecialTokens,
    ) -> AsrResult<Self> {
        if output_seq.len() != output_scores.len() {
            return Err(AsrError::Decoding(format!(
                "длина output_seq ({}) не совпадает с output_scores ({})",
                output_seq.len(),
                output_scores.len()
            )));
        }
        let terminal = output_seq.last() == Some(&tokens.eos);
        Ok(Self {
            decoder_state,
            lm_state,
            output_seq,
            output_scores,
            tokens,
            terminal,
        })
    }

    /// Средняя log-вероятность гипотезы — единственный ключ ранжирования.
    ///
    /// # Ошибки
    /// `AsrError::Decoding` для гипотезы без токенов.
    pub fn average_score(&self) -> AsrResult<f32> {
        if self.output_scores.is_empty() {
            return Err(AsrError::Decoding(
                "average_score для пустой гипотезы не определён".into(),
            ));
        }
        let sum: f32 = self.output_scores.iter().sum();
        Ok(sum / self.output_scores.len() as f32)
    }

    /// Последний выданный токен, либо `<sos>` для пустой гипотезы.
    pub fn last_token(&self) -> u32 {
        self.output_seq.last().copied().unwrap_or(self.tokens.sos)
    }

    /// Завершена ли гипотеза токеном `<eos>`.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn output_seq(&self) -> &[u32] {
        &self.output_seq
    }

    pub fn output_scores(&self) -> &[f32] {
        &self.output_scores
    }

    pub fn decoder_state(&self) -> &S {
        &self.decoder_state
    }

    pub fn lm_state(&self) -> Option<&L> {
        self.lm_state.as_ref()
    }

    pub fn tokens(&self) -> SpecialTokens {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.output_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output_seq.is_empty()
    }

    /// Забрать историю токенов.
    pub fn into_output_seq(self) -> Vec<u32> {
        self.output_seq
    }
}

impl<S: Clone, L: Clone> Hypothesis<S, L> {
    /// Расширить гипотезу top-K кандидатами текущего шага.
    ///
    /// Для каждого кандидата, отличного от `<eos>`, создаётся потомок с
    /// копией истории и собственной копией `decoder_state`/`lm_state`.
    /// Если среди кандидатов есть `<eos>`, родитель завершается (к нему
    /// дописываются `<eos>` и его log-вероятность) и возвращается в
    /// [`Expansion::finished`]. Учитывается только первое вхождение `<eos>`.
    ///
    /// Гипотеза передаётся по значению: без `<eos>` и при ошибке она
    /// отбрасывается, потомки несут её историю. Вызывающий код, которому
    /// родитель нужен и дальше, расширяет его копию (`clone()`); исходная
    /// гипотеза при этом не меняется.
    ///
    /// # Ошибки
    /// `AsrError::Decoding`, если длины `top_ids` и `top_log_probs` различаются
    /// или гипотеза уже завершена.
    pub fn expand(
        mut self,
        top_ids: &[u32],
        top_log_probs: &[f32],
        decoder_state: S,
        lm_state: Option<L>,
    ) -> AsrResult<Expansion<S, L>> {
        if top_ids.len() != top_log_probs.len() {
            return Err(AsrError::Decoding(format!(
                "кандидатов {}, а log-вероятностей {}",
                top_ids.len(),
                top_log_probs.len()
            )));
        }
        if self.terminal {
            return Err(AsrError::Decoding(
                "нельзя расширять завершённую гипотезу".into(),
            ));
        }

        let eos = self.tokens.eos;
        let mut term_score: Option<f32> = None;
        let mut children = Vec::with_capacity(top_ids.len());

        for (&id, &score) in top_ids.iter().zip(top_log_probs) {
            if id == eos {
                term_score.get_or_insert(score);
                continue;
            }

            let mut output_seq = Vec::with_capacity(self.output_seq.len() + 1);
            output_seq.extend_from_slice(&self.output_seq);
            output_seq.push(id);

            let mut output_scores = Vec::with_capacity(self.output_scores.len() + 1);
            output_scores.extend_from_slice(&self.output_scores);
            output_scores.push(score);

            children.push(Hypothesis {
                decoder_state: decoder_state.clone(),
                lm_state: lm_state.clone(),
                output_seq,
                output_scores,
                tokens: self.tokens,
                terminal: false,
            });
        }

        let finished = term_score.map(|score| {
            self.output_seq.push(eos);
            self.output_scores.push(score);
            self.terminal = true;
            self
        });

        Ok(Expansion { finished, children })
    }
}

/// Отсортировать гипотезы по убыванию средней log-вероятности.
///
/// Сортировка стабильная: при равных оценках сохраняется исходный порядок.
pub fn rank_by_average<S, L>(hyps: &mut [Hypothesis<S, L>]) -> AsrResult<()> {
    for h in hyps.iter() {
        h.average_score()?;
    }
    hyps.sort_by(|a, b| {
        let sa = a.average_score().unwrap_or(f32::NEG_INFINITY);
        let sb = b.average_score().unwrap_or(f32::NEG_INFINITY);
        sb.total_cmp(&sa)
    });
    Ok(())
}
