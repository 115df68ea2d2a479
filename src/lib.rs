//! Binnenmarkt Preisdetektiv: upload a product photo, get the model's estimate of
//! what it costs with and without the EU internal market.

pub mod analysis;
pub mod config;
pub mod model;
pub mod normalize;
pub mod page;
pub mod relay;
pub mod uploader;

pub use analysis::{AnalysisReply, AnalysisResult};
pub use config::Config;
pub use model::{OpenAiAnalyzer, ProductAnalyzer};
pub use relay::{router, AppState};
