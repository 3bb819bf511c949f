//! Метрики качества распознавания и постобработка последовательностей.

use candle_core::{Result, Tensor, D};

/// Обрезать последовательность после первого `<eos>` (включительно).
pub fn trim_eos(seq: &[u32], eos: u32) -> Vec<u32> {
    match seq.iter().position(|&t| t == eos) {
        Some(pos) => seq[..=pos].to_vec(),
        None => seq.to_vec(),
    }
}

/// Argmax по классам: `[batch, seq, classes]` → id для каждого кадра.
pub fn argmax_ids(predictions: &Tensor) -> Result<Vec<Vec<u32>>> {
    predictions.argmax(D::Minus1)?.to_vec2()
}

/// Посимвольная точность предсказания.
///
/// Для каждого высказывания сравниваются позиции до первого `pad_id` в метке.
/// Возвращает среднее по высказываниям, у которых есть хотя бы один символ;
/// `None`, если таких нет.
pub fn char_accuracy(
    predictions: &[Vec<u32>],
    labels: &[Vec<u32>],
    pad_id: u32,
) -> Option<f64> {
    let mut accs = Vec::with_capacity(labels.len());
    for (pred, label) in predictions.iter().zip(labels) {
        let mut correct = 0usize;
        let mut total = 0usize;
        for (i, &l) in label.iter().enumerate() {
            if l == pad_id {
                break;
            }
            if pred.get(i) == Some(&l) {
                correct += 1;
            }
            total += 1;
        }
        if total > 0 {
            accs.push(correct as f64 / total as f64);
        }
    }
    if accs.is_empty() {
        return None;
    }
    Some(accs.iter().sum::<f64>() / accs.len() as f64)
}

/// Расстояние Левенштейна между двумя последовательностями.
pub fn edit_distance<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, x) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let subst = prev[j] + usize::from(x != y);
            cur[j + 1] = subst.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Word error rate: пословное расстояние редактирования, делённое на число
/// слов эталона, усреднённое по батчу.
///
/// Пустые эталоны пропускаются; `None`, если оценивать нечего.
pub fn word_error_rate<P: AsRef<str>, R: AsRef<str>>(
    predictions: &[P],
    references: &[R],
) -> Option<f64> {
    let mut rates = Vec::with_capacity(references.len());
    for (pred, reference) in predictions.iter().zip(references) {
        let ref_words: Vec<&str> = reference.as_ref().split_whitespace().collect();
        if ref_words.is_empty() {
            continue;
        }
        let pred_words: Vec<&str> = pred.as_ref().split_whitespace().collect();
        rates.push(edit_distance(&pred_words, &ref_words) as f64 / ref_words.len() as f64);
    }
    if rates.is_empty() {
        return None;
    }
    Some(rates.iter().sum::<f64>() / rates.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_trim_eos() {
        assert_eq!(trim_eos(&[3, 4, 1, 5, 1], 1), vec![3, 4, 1]);
        assert_eq!(trim_eos(&[3, 4], 1), vec![3, 4]);
        assert!(trim_eos(&[], 1).is_empty());
    }

    #[test]
    fn test_char_accuracy_stops_at_padding() {
        let preds = vec![vec![5, 6, 7, 9], vec![2, 2, 2, 2]];
        let labels = vec![vec![5, 6, 8, 0], vec![2, 3, 0, 0]];
        // (2/3 + 1/2) / 2
        let acc = char_accuracy(&preds, &labels, 0).unwrap();
        assert!((acc - (2.0 / 3.0 + 0.5) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_char_accuracy_all_padding() {
        assert!(char_accuracy(&[vec![1]], &[vec![0]], 0).is_none());
    }

    #[test]
    fn test_argmax_ids() {
        let t = Tensor::new(
            &[[[0.1f32, 0.9], [0.8, 0.2]], [[0.3, 0.7], [0.6, 0.4]]],
            &Device::Cpu,
        )
        .unwrap();
        assert_eq!(argmax_ids(&t).unwrap(), vec![vec![1, 0], vec![1, 0]]);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance(b"kitten", b"sitting"), 3);
        assert_eq!(edit_distance::<u8>(b"", b"abc"), 3);
        assert_eq!(edit_distance(b"abc", b""), 3);
        assert_eq!(edit_distance(b"same", b"same"), 0);
    }

    #[test]
    fn test_word_error_rate() {
        let preds = ["the cat sat", "hello"];
        let refs = ["the cat sat down", "hello world"];
        // (1/4 + 1/2) / 2
        let wer = word_error_rate(&preds, &refs).unwrap();
        assert!((wer - 0.375).abs() < 1e-9);
        assert!(word_error_rate(&["x"], &[""]).is_none());
    }
}
