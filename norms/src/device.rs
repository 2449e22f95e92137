use std::fmt;

/// 张量存放的设备类型。
///
/// 计算总是在主机上完成，设备类型只决定自动混合精度采用的策略。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DeviceType {
    Cpu,
    /// 加速卡。
    Cuda,
    Mps,
    Xpu,
    Meta,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Device {
    pub ty: DeviceType,
    pub index: usize,
}

impl Device {
    pub const CPU: Self = Self::new(DeviceType::Cpu, 0);

    #[inline]
    pub const fn new(ty: DeviceType, index: usize) -> Self {
        Self { ty, index }
    }

    #[inline]
    pub const fn cuda(index: usize) -> Self {
        Self::new(DeviceType::Cuda, index)
    }
}

impl Default for Device {
    #[inline]
    fn default() -> Self {
        Self::CPU
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Mps => "mps",
            Self::Xpu => "xpu",
            Self::Meta => "meta",
        })
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.ty {
            DeviceType::Cpu => write!(f, "{}", self.ty),
            ty => write!(f, "{ty}:{}", self.index),
        }
    }
}
