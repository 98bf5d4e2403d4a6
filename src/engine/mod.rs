pub mod llama;
pub(crate) mod process;
pub mod types;

use crate::error::Result;

pub use llama::LlamaRunner;
pub use types::InferenceParams;

/// A local model behind a process boundary: prompt in, raw text out.
pub trait Inference {
    /// `on_percent` receives monotonically increasing 0-100 values; 100 only once the run is over.
    fn run(&self, prompt: &str, on_percent: &mut dyn FnMut(u8)) -> Result<String>;
}
