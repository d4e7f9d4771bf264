pub mod forecast;

pub use forecast::{ForecastPipeline, FuturePriceResponse, HealthReport};
