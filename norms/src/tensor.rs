//! 主机上连续存储的张量。

use crate::{nbytes, shape_mismatch, type_not_support, Blob, Device, Element, LaunchError, TensorLayout};
use digit_layout::DigitLayout;
use std::fmt;

macro_rules! with_float {
    ($dt:expr, $t:ident => $body:expr) => {{
        use digit_layout::types as ty;
        match $dt {
            ty::F16 => {
                type $t = half::f16;
                $body
            }
            ty::BF16 => {
                type $t = half::bf16;
                $body
            }
            ty::F32 => {
                type $t = f32;
                $body
            }
            ty::F64 => {
                type $t = f64;
                $body
            }
            dt => return Err(type_not_support(format!("{dt:?} is not a floating type"))),
        }
    }};
}

/// 行优先连续存储的浮点张量，带有数据类型和设备标记。
#[derive(Clone)]
pub struct Tensor {
    dt: DigitLayout,
    shape: Vec<usize>,
    device: Device,
    blob: Blob,
}

impl Tensor {
    pub fn zeros(dt: DigitLayout, shape: &[usize], device: Device) -> Result<Self, LaunchError> {
        let numel = shape.iter().product::<usize>();
        Ok(Self {
            dt,
            shape: shape.to_vec(),
            device,
            blob: Blob::new(numel * nbytes(dt)?),
        })
    }

    pub fn full(
        dt: DigitLayout,
        shape: &[usize],
        device: Device,
        value: f64,
    ) -> Result<Self, LaunchError> {
        let mut ans = Self::zeros(dt, shape, device)?;
        with_float!(dt, T => ans.as_mut_slice::<T>().fill(T::cast_from(value)));
        Ok(ans)
    }

    #[inline]
    pub fn ones(dt: DigitLayout, shape: &[usize], device: Device) -> Result<Self, LaunchError> {
        Self::full(dt, shape, device, 1.)
    }

    pub fn from_slice<T: Element>(
        data: &[T],
        shape: &[usize],
        device: Device,
    ) -> Result<Self, LaunchError> {
        let numel = shape.iter().product::<usize>();
        if numel != data.len() {
            return Err(shape_mismatch(format!(
                "{} elements can not fill shape {shape:?}",
                data.len()
            )));
        }
        let mut ans = Self::zeros(T::DT, shape, device)?;
        ans.as_mut_slice::<T>().copy_from_slice(data);
        Ok(ans)
    }

    #[inline]
    pub fn dt(&self) -> DigitLayout {
        self.dt
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// 转换数据类型，类型相同时复制。
    pub fn to_dt(&self, dt: DigitLayout) -> Result<Self, LaunchError> {
        if dt == self.dt {
            return Ok(self.clone());
        }
        let mut ans = Self::zeros(dt, &self.shape, self.device)?;
        with_float!(self.dt, S => with_float!(dt, D => {
            let src = self.as_slice::<S>();
            let dst = ans.as_mut_slice::<D>();
            for (y, x) in dst.iter_mut().zip(src) {
                *y = D::cast_from(x.as_f64())
            }
        }));
        log::trace!("cast {:?} {:?} -> {dt:?}", self.shape, self.dt);
        Ok(ans)
    }

    /// 按元素读出并转换到 `T`。
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, LaunchError> {
        Ok(with_float!(self.dt, S => self
            .as_slice::<S>()
            .iter()
            .map(|x| T::cast_from(x.as_f64()))
            .collect()))
    }

    /// 把张量看作 `[n, d]` 矩阵。
    pub(crate) fn matrix(&self, n: usize, d: usize) -> Result<TensorLayout, LaunchError> {
        debug_assert_eq!(n * d, self.numel());
        TensorLayout::new_contiguous(self.dt, &[n, d])
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.blob.as_ptr()
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.blob.as_mut_ptr()
    }

    fn as_slice<T: Element>(&self) -> &[T] {
        debug_assert_eq!(T::DT, self.dt);
        unsafe { std::slice::from_raw_parts(self.blob.as_ptr().cast(), self.numel()) }
    }

    fn as_mut_slice<T: Element>(&mut self) -> &mut [T] {
        debug_assert_eq!(T::DT, self.dt);
        let len = self.numel();
        unsafe { std::slice::from_raw_parts_mut(self.blob.as_mut_ptr().cast(), len) }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dt", &self.dt)
            .field("shape", &self.shape)
            .field("device", &self.device)
            .finish()
    }
}
