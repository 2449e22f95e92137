mod blob;
mod element;
mod error;
mod tensor;

pub use blob::Blob;
pub use element::{nbytes, Element};
pub use error::{functions::*, LaunchError, LaunchErrorKind};
pub use tensor::TensorLayout;

pub type SchemeError = LaunchError;

pub mod utils {
    use super::{rank_not_support, shape_mismatch, type_mismatch, LaunchError};
    use digit_layout::DigitLayout;

    #[inline]
    pub(crate) fn type_distinct(pairs: &[DigitLayout]) -> Result<DigitLayout, LaunchError> {
        let [dt, tail @ ..] = pairs else {
            unreachable!("pairs empty");
        };
        if tail.iter().all(|it| it == dt) {
            Ok(*dt)
        } else {
            Err(type_mismatch(format!("{pairs:?} are not distinct")))
        }
    }

    #[inline]
    pub(crate) fn rank_error(arg: &str, expected: usize, actual: usize) -> LaunchError {
        rank_not_support(format!("{arg}.ndim = {actual}, {expected} expected"))
    }

    #[inline]
    pub(crate) fn dim_distinct(args: &[usize]) -> Result<usize, LaunchError> {
        let [d, tail @ ..] = args else {
            unreachable!("args empty");
        };
        if tail.iter().all(|it| it == d) {
            Ok(*d)
        } else {
            Err(shape_mismatch(format!("{args:?} are not distinct")))
        }
    }

    /// 按 `normalized_shape` 把形状切成 `[n, d]`，要求尾部维度完全一致。
    pub(crate) fn split_trailing(
        shape: &[usize],
        normalized_shape: &[usize],
    ) -> Result<(usize, usize), LaunchError> {
        match shape.len().checked_sub(normalized_shape.len()) {
            Some(lead) if shape[lead..] == *normalized_shape => Ok((
                shape[..lead].iter().product(),
                normalized_shape.iter().product(),
            )),
            _ => Err(shape_mismatch(format!(
                "input shape {shape:?} does not end with {normalized_shape:?}"
            ))),
        }
    }
}
