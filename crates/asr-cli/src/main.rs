//!
//! CLI: состязательное обучение энкодера речи и beam search на синтетических данных.

mod synthetic;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use asr_adversarial::{
    AdversarialTrainer, FrameDiscriminator, FrameStackProjector, FrozenTextEncoder, SeededInit,
    StepOutcome,
};
use asr_core::ExperimentConfig;
use asr_decoding::metrics::trim_eos;
use asr_decoding::{BeamSearch, StopReason};

use synthetic::{BigramDecoder, SyntheticBatches};

/// Размерность входных признаков (fbank).
const FEAT_DIM: usize = 40;
/// Размерность общего пространства эмбеддингов.
const EMB_DIM: usize = 32;
/// Шаг пирамидального сжатия генератора.
const STACK: usize = 2;
/// Размер словаря символов.
const VOCAB_SIZE: usize = 32;
const MAX_FRAMES: usize = 64;
const MAX_LABEL_LEN: usize = 24;

#[derive(Parser)]
#[command(name = "advasr")]
#[command(author, version, about = "Adversarial ASR: beam search + GAN-style encoder training", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Состязательное обучение на синтетических батчах
    Adv {
        /// JSON-конфиг эксперимента (по умолчанию встроенные значения)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Количество шагов обучения
        #[arg(long, default_value_t = 10)]
        steps: usize,

        /// Размер батча
        #[arg(long, default_value_t = 4)]
        batch_size: usize,

        /// Переопределить seed из конфига
        #[arg(long)]
        seed: Option<u64>,

        /// Device to use (cpu, metal, cuda)
        #[arg(long, default_value = "cpu")]
        device: String,
    },

    /// Beam search по случайному биграммному декодеру
    Decode {
        /// JSON-конфиг эксперимента (по умолчанию встроенные значения)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Размер словаря декодера
        #[arg(long, default_value_t = 16)]
        vocab: usize,

        /// Seed для логитов декодера
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Бонус к логиту <eos>
        #[arg(long, default_value_t = 1.0)]
        eos_bias: f32,
    },

    /// Показать итоговую конфигурацию в JSON
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Adv {
            config,
            steps,
            batch_size,
            seed,
            device,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(seed) = seed {
                config.adversarial.seed = seed;
            }
            run_adversarial(&config, steps, batch_size, &device).map(|_| ())
        }

        Commands::Decode {
            config,
            vocab,
            seed,
            eos_bias,
        } => {
            let config = load_config(config.as_deref())?;
            run_decode(&config, vocab, seed, eos_bias).map(|_| ())
        }

        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    match path {
        Some(path) => Ok(ExperimentConfig::from_json_file(path)?),
        None => Ok(ExperimentConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Состязательное обучение
// ---------------------------------------------------------------------------

/// Итог прогона `adv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    trained: usize,
    skipped: usize,
}

fn run_adversarial(
    config: &ExperimentConfig,
    steps: usize,
    batch_size: usize,
    device: &str,
) -> Result<RunSummary> {
    if batch_size == 0 {
        anyhow::bail!("--batch-size должен быть >= 1");
    }
    let adv = &config.adversarial;

    println!("⚔️  Adversarial training");
    println!("================================");
    println!("Steps: {}, batch size: {}", steps, batch_size);
    println!("Seed: {}, label smoothing: {}", adv.seed, adv.label_smoothing);
    println!("Device: {}", device);
    println!();

    let start = Instant::now();
    let device = create_device(device)?;

    let mut init = SeededInit::new(adv.seed);
    let generator = FrameStackProjector::new(FEAT_DIM, EMB_DIM, STACK, &mut init, &device)?;
    let reference = FrozenTextEncoder::new(VOCAB_SIZE, EMB_DIM, &mut init, &device)?;
    let discriminator =
        FrameDiscriminator::new(EMB_DIM, adv.discriminator_hidden, &mut init, &device)?;
    let mut trainer = AdversarialTrainer::new(generator, reference, discriminator, adv)?;
    info!(
        "adv: старт, {} шагов, батч {}, seed {}",
        steps, batch_size, adv.seed
    );

    let mut data = SyntheticBatches::new(
        adv.seed,
        FEAT_DIM,
        MAX_FRAMES,
        STACK,
        MAX_LABEL_LEN,
        VOCAB_SIZE,
        &device,
    )?;

    println!("🎯 Training...");
    let mut skipped = 0usize;
    for _ in 0..steps {
        let batch = data.next_batch(batch_size)?;
        match trainer.train_step(&batch)? {
            StepOutcome::Trained(losses) => println!(
                "   step {:>4}: D_real={:.4} D_fake={:.4} D={:.4} G={:.4}",
                losses.step,
                losses.discriminator.real,
                losses.discriminator.fake,
                losses.discriminator.total(),
                losses.generator
            ),
            StepOutcome::Skipped { reason } => {
                skipped += 1;
                println!("   skipped: {}", reason);
            }
        }
    }

    let summary = RunSummary {
        trained: trainer.steps(),
        skipped,
    };
    info!(
        "adv: завершено за {:.2}s, обучено шагов {}, пропущено {}",
        start.elapsed().as_secs_f32(),
        summary.trained,
        summary.skipped
    );

    println!();
    println!(
        "✅ Done: {} steps trained, {} skipped",
        summary.trained, summary.skipped
    );
    println!("⏱️  Total time: {:.2}s", start.elapsed().as_secs_f32());
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Beam search
// ---------------------------------------------------------------------------

fn run_decode(
    config: &ExperimentConfig,
    vocab: usize,
    seed: u64,
    eos_bias: f32,
) -> Result<StopReason> {
    let beam = &config.beam_search;

    println!("🔎 Beam search");
    println!("================================");
    println!(
        "Vocab: {}, beam width: {}, n-best: {}, max steps: {}",
        vocab, beam.beam_width, beam.n_best, beam.max_steps
    );
    println!();

    let start = Instant::now();
    let mut decoder = BigramDecoder::random(
        vocab,
        beam.sos_id,
        beam.eos_id,
        eos_bias,
        seed,
        &candle_core::Device::Cpu,
    )?;
    let search = BeamSearch::new(beam.clone())?;
    let out = search.search(&mut decoder, 0, None)?;
    info!(
        "decode: остановка {:?} после {} шагов, гипотез {}",
        out.stop_reason,
        out.steps,
        out.hypotheses.len()
    );

    println!(
        "Stopped: {:?} after {} steps (peak beam {})",
        out.stop_reason, out.steps, out.peak_live
    );
    if !out.is_complete() {
        println!("⚠️  No hypothesis reached <eos>, showing live hypotheses");
    }
    println!();
    for (rank, hyp) in out.hypotheses.iter().enumerate() {
        println!(
            "   #{:<2} avg={:.4} tokens={:?}",
            rank + 1,
            hyp.average_score()?,
            trim_eos(hyp.output_seq(), beam.eos_id)
        );
    }

    println!();
    println!("⏱️  Decode time: {:.3}s", start.elapsed().as_secs_f32());
    Ok(out.stop_reason)
}

fn create_device(device: &str) -> Result<candle_core::Device> {
    match device {
        "metal" => {
            // candle может panic при инициализации Metal, если устройство недоступно.
            let prev_hook = std::panic::take_hook();
            std::panic::set_hook(Box::new(|_| {}));
            let res = std::panic::catch_unwind(|| candle_core::Device::new_metal(0));
            std::panic::set_hook(prev_hook);

            match res {
                Ok(Ok(dev)) => Ok(dev),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!(
                    "Инициализация Metal недоступна в этом окружении. Попробуйте --device cpu."
                )),
            }
        }
        "cuda" => Ok(candle_core::Device::new_cuda(0)?),
        _ => Ok(candle_core::Device::Cpu),
    }
}
