use super::{LowPrecision, Norm, NormConfig, Precision, Standard};
use crate::{
    autocast::{cast_if_autocast_enabled, Autocast},
    functional,
    utils::split_trailing,
    LaunchError, Tensor,
};
use std::marker::PhantomData;

/// 均方根归一化。
///
/// 两个变体都在 F32 下完成核心计算，并把结果转换回输入的数据类型。
/// [`LowPrecision`] 变体先把输入和权重转换到自动混合精度的目标精度。
pub struct RmsNormLayer<P> {
    normalized_shape: Vec<usize>,
    eps: f32,
    weight: Option<Tensor>,
    _precision: PhantomData<P>,
}

impl<P: Precision> RmsNormLayer<P> {
    pub fn new(config: &NormConfig) -> Result<Self, LaunchError> {
        let NormConfig {
            normalized_shape,
            eps,
            elementwise_affine,
            device,
            dtype,
        } = config;
        let weight = if *elementwise_affine {
            Some(Tensor::ones(*dtype, normalized_shape, *device)?)
        } else {
            None
        };
        log::debug!(
            "{} rms norm {normalized_shape:?} eps={eps} weight={elementwise_affine} on {device}",
            P::NAME
        );
        Ok(Self {
            normalized_shape: normalized_shape.clone(),
            eps: *eps,
            weight,
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
}

impl Norm for RmsNormLayer<Standard> {
    fn forward(&self, x: &Tensor) -> Result<Tensor, LaunchError> {
        split_trailing(x.shape(), &self.normalized_shape)?;
        functional::rms_norm(x, self.weight.as_ref(), self.eps)?.to_dt(x.dt())
    }

    #[inline]
    fn weight(&self) -> Option<&Tensor> {
        self.weight.as_ref()
    }
}

impl Norm for RmsNormLayer<LowPrecision> {
    fn forward(&self, x: &Tensor) -> Result<Tensor, LaunchError> {
        split_trailing(x.shape(), &self.normalized_shape)?;
        let downcast_x = cast_if_autocast_enabled(x)?;
        let weight = self.weight.as_ref().map(cast_if_autocast_enabled).transpose()?;

        let _autocast = Autocast::new(x.device().ty, false);
        functional::rms_norm(&downcast_x, weight.as_deref(), self.eps)?.to_dt(x.dt())
    }

    #[inline]
    fn weight(&self) -> Option<&Tensor> {
        self.weight.as_ref()
    }
}
