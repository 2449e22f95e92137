pub mod common_cpu;

mod args;
pub use args::Args;

crate::op_trait!(RmsNorm);
