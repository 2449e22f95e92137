use super::{LPLayerNorm, LPRmsNorm, LayerNorm, Norm, NormConfig, RmsNorm};
use crate::{LaunchError, Tensor};

/// 由注册表构造出的归一化层。
pub enum NormLayer {
    LayerNorm(LayerNorm),
    LPLayerNorm(LPLayerNorm),
    RmsNorm(RmsNorm),
    LPRmsNorm(LPRmsNorm),
}

macro_rules! dispatch {
    ($self:expr, $layer:ident => $body:expr) => {
        match $self {
            Self::LayerNorm($layer) => $body,
            Self::LPLayerNorm($layer) => $body,
            Self::RmsNorm($layer) => $body,
            Self::LPRmsNorm($layer) => $body,
        }
    };
}

impl Norm for NormLayer {
    fn forward(&self, x: &Tensor) -> Result<Tensor, LaunchError> {
        dispatch!(self, layer => layer.forward(x))
    }

    fn weight(&self) -> Option<&Tensor> {
        dispatch!(self, layer => layer.weight())
    }

    fn bias(&self) -> Option<&Tensor> {
        dispatch!(self, layer => layer.bias())
    }
}

pub type NormCtor = fn(&NormConfig) -> Result<NormLayer, LaunchError>;

/// 归一化类型名到构造函数的映射。
pub static NORM_CLASS_REGISTRY: [(&str, NormCtor); 4] = [
    ("layernorm", |config| {
        LayerNorm::new(config).map(NormLayer::LayerNorm)
    }),
    ("low_precision_layernorm", |config| {
        LPLayerNorm::new(config).map(NormLayer::LPLayerNorm)
    }),
    ("rmsnorm", |config| RmsNorm::new(config).map(NormLayer::RmsNorm)),
    ("low_precision_rmsnorm", |config| {
        LPRmsNorm::new(config).map(NormLayer::LPRmsNorm)
    }),
];

/// 按名字查找构造函数，未注册的名字返回 [`None`]。
pub fn norm_class(name: &str) -> Option<NormCtor> {
    NORM_CLASS_REGISTRY
        .iter()
        .find(|(key, _)| *key == name)
        .map(|&(_, ctor)| ctor)
}
