use super::{autocast_dtype, is_autocast_enabled};
use crate::{LaunchError, Tensor};
use std::borrow::Cow;

/// 加速器自动混合精度启用时，把张量转换到其设备类型的目标精度。
///
/// 是否转换只看加速器的状态（[`is_autocast_enabled`]），目标精度则按张量自身的设备类型选择，
/// 因此只启用 CPU 自动混合精度时原样返回。张量所在的设备类型没有定义策略时返回
/// [`DeviceNotSupport`](crate::LaunchErrorKind::DeviceNotSupport)。
pub fn cast_if_autocast_enabled(tensor: &Tensor) -> Result<Cow<'_, Tensor>, LaunchError> {
    if !is_autocast_enabled() {
        return Ok(Cow::Borrowed(tensor));
    }
    let dt = autocast_dtype(tensor.device().ty)?;
    if dt == tensor.dt() {
        Ok(Cow::Borrowed(tensor))
    } else {
        tensor.to_dt(dt).map(Cow::Owned)
    }
}
