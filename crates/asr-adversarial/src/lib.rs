//! # asr-adversarial
//!
//! Состязательное обучение энкодера речи.
//!
//! Генератор (энкодер речи) отображает признаки в общее пространство
//! эмбеддингов; замороженный энкодер текста задаёт «настоящее» распределение;
//! покадровый дискриминатор учится их различать. [`AdversarialTrainer`]
//! чередует шаг дискриминатора и шаг генератора с явной изоляцией градиентов.
//!
//! # Пример
//!
//! ```ignore
//! use asr_adversarial::{AdversarialTrainer, FrameDiscriminator, FrameStackProjector,
//!     FrozenTextEncoder, SeededInit};
//!
//! let mut init = SeededInit::new(config.seed);
//! let generator = FrameStackProjector::new(40, 64, 2, &mut init, &device)?;
//! let reference = FrozenTextEncoder::new(32, 64, &mut init, &device)?;
//! let discriminator = FrameDiscriminator::new(64, 256, &mut init, &device)?;
//! let mut trainer = AdversarialTrainer::new(generator, reference, discriminator, &config)?;
//! let outcome = trainer.train_step(&batch)?;
//! ```

pub mod blocks;
pub mod discriminator;
pub mod grads;
pub mod init;
pub mod layers;
pub mod loss;
pub mod projector;
pub mod reference;
pub mod trainer;

pub use blocks::{Discriminator, Generator, ReferenceEncoder};
pub use discriminator::FrameDiscriminator;
pub use grads::GradBuffer;
pub use init::SeededInit;
pub use projector::FrameStackProjector;
pub use reference::FrozenTextEncoder;
pub use trainer::{
    AdversarialBatch, AdversarialTrainer, DiscriminatorLosses, StepLosses, StepOutcome,
};
