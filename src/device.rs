/// Residency flag for a tensor's buffer.
///
/// The dense kernels run on the host; the flag records where a value is
/// meant to live so that every tensor produced from it (operation outputs,
/// detached copies, gradients read back through `grad()`) is placed on the
/// same device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Host,
    Accelerator,
}

impl Device {
    pub fn is_accelerator(self) -> bool {
        self == Device::Accelerator
    }

    /// Device for the output of an operation over two operands: the
    /// accelerator wins if either side is resident there.
    pub fn merge(self, other: Device) -> Device {
        if self.is_accelerator() || other.is_accelerator() {
            Device::Accelerator
        } else {
            Device::Host
        }
    }
}
