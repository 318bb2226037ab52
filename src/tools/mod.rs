//! Built-in tools: arithmetic functions, the weather stub and retrieval
//! tools over query engines.

pub mod math;
pub mod retrieval;
pub mod weather;

pub use math::{MathOp, MathTool, math_tools};
pub use retrieval::QueryEngineTool;
pub use weather::WeatherTool;
