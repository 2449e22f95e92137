use crate::Device;
use digit_layout::{types::F32, DigitLayout};

/// 归一化层的构造参数。
#[derive(Clone, PartialEq, Debug)]
pub struct NormConfig {
    /// 归一化覆盖的尾部维度。
    pub normalized_shape: Vec<usize>,
    pub eps: f32,
    /// 是否有可学习参数。层归一化包括缩放和偏置，均方根归一化只有缩放。
    pub elementwise_affine: bool,
    /// 参数存放的设备。
    pub device: Device,
    /// 参数的数据类型。
    pub dtype: DigitLayout,
}

impl NormConfig {
    pub fn new(normalized_shape: &[usize]) -> Self {
        Self {
            normalized_shape: normalized_shape.to_vec(),
            eps: 1e-5,
            elementwise_affine: true,
            device: Device::CPU,
            dtype: F32,
        }
    }

    #[inline]
    pub fn eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    #[inline]
    pub fn elementwise_affine(mut self, affine: bool) -> Self {
        self.elementwise_affine = affine;
        self
    }

    /// 均方根归一化对 [`elementwise_affine`](Self::elementwise_affine) 的称呼。
    #[inline]
    pub fn weight(self, weight: bool) -> Self {
        self.elementwise_affine(weight)
    }

    #[inline]
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    #[inline]
    pub fn dtype(mut self, dtype: DigitLayout) -> Self {
        self.dtype = dtype;
        self
    }
}
