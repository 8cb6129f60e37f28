//! LLM provider implementations for the cascade described in spec §4.4
//! (OpenRouter -> HuggingFace -> GigaChat -> YandexGPT). Each file here
//! implements [`vigil_core::traits::LlmProvider`] against one vendor's real
//! wire format; the cascade's ordering, skip-if-unconfigured, and
//! single-repair-attempt logic live in `vigil_core::agents::analyzer`, which
//! is handed a `Vec<Box<dyn LlmProvider>>` built from this crate's
//! `*::from_env()` constructors.

pub mod gigachat;
pub mod huggingface;
pub mod jsonmode;
pub mod openrouter;
pub mod yandexgpt;

pub use gigachat::GigaChatProvider;
pub use huggingface::HuggingFaceProvider;
pub use openrouter::OpenRouterProvider;
pub use yandexgpt::YandexGptProvider;
