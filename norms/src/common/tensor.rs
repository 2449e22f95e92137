use super::{element::nbytes, LaunchError};
use digit_layout::DigitLayout;
use ndarray_layout::ArrayLayout;

/// 张量的数据类型、形状和字节步长。
#[derive(Clone)]
pub struct TensorLayout {
    pub dt: DigitLayout,
    pub layout: ArrayLayout<4>,
}

impl TensorLayout {
    pub fn new(dt: DigitLayout, shape: &[usize], strides: &[isize]) -> Self {
        Self {
            dt,
            layout: ArrayLayout::new(shape, strides, 0),
        }
    }

    pub fn new_contiguous(dt: DigitLayout, shape: &[usize]) -> Result<Self, LaunchError> {
        let mut strides = shape
            .iter()
            .rev()
            .scan(nbytes(dt)? as isize, |mul, &d| {
                let stride = *mul;
                *mul *= d as isize;
                Some(stride)
            })
            .collect::<Vec<_>>();
        strides.reverse();
        Ok(Self::new(dt, shape, &strides))
    }

    #[inline]
    pub fn dt(&self) -> DigitLayout {
        self.dt
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }
}
