//! 归一化层。
//!
//! 每种层有两个精度变体，共享状态和核心计算：
//!
//! - [`Standard`]：标准精度；
//! - [`LowPrecision`]：先按自动混合精度策略转换输入和参数，再关闭自动混合精度完成计算。

mod config;
mod layer_norm;
mod registry;
mod rms_norm;

pub use config::NormConfig;
pub use layer_norm::LayerNormLayer;
pub use registry::{norm_class, NormCtor, NormLayer, NORM_CLASS_REGISTRY};
pub use rms_norm::RmsNormLayer;

use crate::{LaunchError, Tensor};

/// 归一化层的公共接口。
pub trait Norm {
    fn forward(&self, x: &Tensor) -> Result<Tensor, LaunchError>;
    /// 可学习的缩放参数。
    fn weight(&self) -> Option<&Tensor>;
    /// 可学习的偏置参数。
    fn bias(&self) -> Option<&Tensor> {
        None
    }
}

/// 精度策略标记。
pub trait Precision: Send + Sync + 'static {
    const NAME: &'static str;
}

#[derive(Clone, Copy, Debug)]
pub struct Standard;

#[derive(Clone, Copy, Debug)]
pub struct LowPrecision;

impl Precision for Standard {
    const NAME: &'static str = "standard";
}

impl Precision for LowPrecision {
    const NAME: &'static str = "low precision";
}

pub type LayerNorm = LayerNormLayer<Standard>;
pub type LPLayerNorm = LayerNormLayer<LowPrecision>;
pub type RmsNorm = RmsNormLayer<Standard>;
pub type LPRmsNorm = RmsNormLayer<LowPrecision>;
