use super::{LowPrecision, Norm, NormConfig, Precision, Standard};
use crate::{
    autocast::{cast_if_autocast_enabled, Autocast},
    functional, LaunchError, Tensor,
};
use std::marker::PhantomData;

/// 层归一化。
///
/// [`Standard`] 变体即通常的层归一化，遵守自动混合精度的全精度策略；
/// [`LowPrecision`] 变体把输入、缩放和偏置分别转换到自动混合精度的目标精度，
/// 然后在关闭自动混合精度的情况下计算，输出保持转换后的精度。
pub struct LayerNormLayer<P> {
    normalized_shape: Vec<usize>,
    eps: f32,
    weight: Option<Tensor>,
    bias: Option<Tensor>,
    _precision: PhantomData<P>,
}

impl<P: Precision> LayerNormLayer<P> {
    pub fn new(config: &NormConfig) -> Result<Self, LaunchError> {
        let NormConfig {
            normalized_shape,
            eps,
            elementwise_affine,
            device,
            dtype,
        } = config;
        let (weight, bias) = if *elementwise_affine {
            (
                Some(Tensor::ones(*dtype, normalized_shape, *device)?),
                Some(Tensor::zeros(*dtype, normalized_shape, *device)?),
            )
        } else {
            (None, None)
        };
        log::debug!(
            "{} layer norm {normalized_shape:?} eps={eps} affine={elementwise_affine} on {device}",
            P::NAME
        );
        Ok(Self {
            normalized_shape: normalized_shape.clone(),
            eps: *eps,
            weight,
            bias,
            _precision: PhantomData,
        })
    }

    #[inline]
    pub fn normalized_shape(&self) -> &[usize] {
        &self.normalized_shape
    }

    #[inline]
    pub fn eps(&self) -> f32 {
        self.eps
    }

    #[inline]
    pub fn weight_mut(&mut self) -> Option<&mut Tensor> {
        self.weight.as_mut()
    }

    #[inline]
    pub fn bias_mut(&mut self) -> Option<&mut Tensor> {
        self.bias.as_mut()
    }
}

impl Norm for LayerNormLayer<Standard> {
    fn forward(&self, x: &Tensor) -> Result<Tensor, LaunchError> {
        functional::layer_norm(
            x,
            &self.normalized_shape,
            self.weight.as_ref(),
            self.bias.as_ref(),
            self.eps,
        )
    }

    #[inline]
    fn weight(&self) -> Option<&Tensor> {
        self.weight.as_ref()
    }

    #[inline]
    fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}

impl Norm for LayerNormLayer<LowPrecision> {
    fn forward(&self, x: &Tensor) -> Result<Tensor, LaunchError> {
        let downcast_x = cast_if_autocast_enabled(x)?;
        let weight = self.weight.as_ref().map(cast_if_autocast_enabled).transpose()?;
        let bias = self.bias.as_ref().map(cast_if_autocast_enabled).transpose()?;

        let _autocast = Autocast::new(x.device().ty, false);
        functional::layer_norm(
            &downcast_x,
            &self.normalized_shape,
            weight.as_deref(),
            bias.as_deref(),
            self.eps,
        )
    }

    #[inline]
    fn weight(&self) -> Option<&Tensor> {
        self.weight.as_ref()
    }

    #[inline]
    fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}
