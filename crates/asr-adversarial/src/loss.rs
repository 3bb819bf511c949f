//! Покадровая бинарная кросс-энтропия с маской по длинам.
//!
//! BCE считается для каждого валидного кадра каждого элемента батча и
//! усредняется по валидным кадрам. Ветки генератора и референсного
//! энкодера используют каждая свои длины, выравнивания между ними нет.

use asr_core::{AsrError, AsrResult};
use candle_core::{Device, Result, Tensor};

/// Ограничение вероятностей перед логарифмом.
pub const PROB_EPS: f64 = 1e-7;

/// Маска валидных кадров `[batch, time]` (1.0 / 0.0) и число валидных кадров.
///
/// Длины больше `time` обрезаются.
pub fn frame_mask(lengths: &[usize], time: usize, device: &Device) -> Result<(Tensor, usize)> {
    let mut mask = Vec::with_capacity(lengths.len() * time);
    let mut valid = 0;
    for &len in lengths {
        let len = len.min(time);
        valid += len;
        mask.extend((0..time).map(|t| if t < len { 1.0f32 } else { 0.0 }));
    }
    let mask = Tensor::from_vec(mask, (lengths.len(), time), device)?;
    Ok((mask, valid))
}

/// Одинаковая цель для всех кадров `[batch, time]`.
pub fn frame_targets(value: f64, batch: usize, time: usize, device: &Device) -> Result<Tensor> {
    Tensor::full(value as f32, (batch, time), device)
}

/// Средняя BCE по валидным кадрам.
///
/// `scores` — `[batch, time, 1]` или `[batch, time]`, вероятности в `[0, 1]`;
/// `targets` — `[batch, time]`.
///
/// # Ошибки
/// - `AsrError::Training`, если число длин не совпадает с размером батча
/// - `AsrError::DegenerateBatch`, если валидных кадров нет
pub fn masked_frame_bce(scores: &Tensor, targets: &Tensor, lengths: &[usize]) -> AsrResult<Tensor> {
    let scores = if scores.rank() == 3 {
        scores.squeeze(2)?
    } else {
        scores.clone()
    };
    let (batch, time) = scores.dims2()?;
    if lengths.len() != batch {
        return Err(AsrError::Training(format!(
            "длин {} при размере батча {}",
            lengths.len(),
            batch
        )));
    }
    if targets.dims() != scores.dims() {
        return Err(AsrError::Training(format!(
            "форма целей {:?} не совпадает с оценками {:?}",
            targets.dims(),
            scores.dims()
        )));
    }

    let (mask, valid) = frame_mask(lengths, time, scores.device())?;
    if valid == 0 {
        return Err(AsrError::DegenerateBatch(format!(
            "нет валидных кадров (длины {:?})",
            lengths
        )));
    }

    let p = scores.clamp(PROB_EPS as f32, (1.0 - PROB_EPS) as f32)?;
    let log_p = p.log()?;
    let log_not_p = p.affine(-1.0, 1.0)?.log()?;
    let not_targets = targets.affine(-1.0, 1.0)?;

    // -(y·ln p + (1 - y)·ln(1 - p))
    let bce = ((targets * &log_p)? + (&not_targets * &log_not_p)?)?.neg()?;
    let loss = (bce * mask)?.sum_all()?.affine(1.0 / valid as f64, 0.0)?;
    Ok(loss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_targets_use_label_smoothing() {
        let label_smoothing = 0.1;
        let targets = frame_targets(1.0 - label_smoothing, 2, 3, &Device::Cpu).unwrap();
        let values: Vec<Vec<f32>> = targets.to_vec2().unwrap();
        assert_eq!(values.len(), 2);
        for row in values {
            assert_eq!(row.len(), 3);
            assert!(row.iter().all(|&v| (v - 0.9).abs() < 1e-6));
        }
    }

    #[test]
    fn test_frame_mask() {
        let (mask, valid) = frame_mask(&[2, 0, 5], 3, &Device::Cpu).unwrap();
        assert_eq!(valid, 5);
        let values: Vec<Vec<f32>> = mask.to_vec2().unwrap();
        assert_eq!(values, vec![vec![1.0, 1.0, 0.0], vec![0.0; 3], vec![1.0; 3]]);
    }

    #[test]
    fn test_bce_ignores_padding() {
        let device = Device::Cpu;
        // Валидны первые два кадра (p = 0.5), третий — паддинг с «плохой» оценкой.
        let scores = Tensor::new(&[[[0.5f32], [0.5], [0.001]]], &device).unwrap();
        let targets = frame_targets(1.0, 1, 3, &device).unwrap();
        let loss: f32 = masked_frame_bce(&scores, &targets, &[2])
            .unwrap()
            .to_scalar()
            .unwrap();
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_bce_smoothed_target() {
        let device = Device::Cpu;
        let scores = Tensor::new(&[[0.9f32, 0.9], [0.9, 0.9]], &device).unwrap();
        let targets = frame_targets(0.9, 2, 2, &device).unwrap();
        let loss: f32 = masked_frame_bce(&scores, &targets, &[2, 1])
            .unwrap()
            .to_scalar()
            .unwrap();
        let expected = -(0.9f32 * 0.9f32.ln() + 0.1 * 0.1f32.ln());
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_bce_zero_valid_frames() {
        let device = Device::Cpu;
        let scores = Tensor::new(&[[0.3f32, 0.7]], &device).unwrap();
        let targets = frame_targets(0.0, 1, 2, &device).unwrap();
        let err = masked_frame_bce(&scores, &targets, &[0]).unwrap_err();
        assert!(matches!(err, AsrError::DegenerateBatch(_)));
    }

    #[test]
    fn test_bce_lengths_mismatch() {
        let device = Device::Cpu;
        let scores = Tensor::new(&[[0.3f32, 0.7]], &device).unwrap();
        let targets = frame_targets(0.0, 1, 2, &device).unwrap();
        let err = masked_frame_bce(&scores, &targets, &[1, 1]).unwrap_err();
        assert!(matches!(err, AsrError::Training(_)));
    }
}
