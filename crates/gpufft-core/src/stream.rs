use crate::backend::{BufferHandle, KernelHandle};
use crate::config::{BufferShape, ElementLayout};

// Command stream — What the Execution Engine records
//
// A CommandStream is an ordered list of commands handed to
// `DeviceBackend::submit`. Recording never touches the device; a stream can
// hold the work of several `append` calls and several applications.

/// One buffer as seen by a dispatch: where it starts, how elements are laid
/// out and which extents the kernel addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferBinding {
    pub buffer: BufferHandle,
    /// Byte offset of the first element.
    pub offset: usize,
    pub layout: ElementLayout,
    pub shape: BufferShape,
}

/// Launch constants of one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassParams {
    /// Axis the pass transforms.
    pub axis: usize,
    /// Product of the radices already applied in this butterfly run.
    pub span: usize,
    /// Factor applied to every output element.
    pub scale: f64,
}

impl Default for PassParams {
    fn default() -> Self {
        Self {
            axis: 0,
            span: 1,
            scale: 1.0,
        }
    }
}

/// One kernel launch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub kernel: KernelHandle,
    pub src: BufferBinding,
    pub dst: BufferBinding,
    /// Table buffer: twiddle LUT, chirp or Bluestein spectrum.
    pub aux: Option<BufferHandle>,
    pub params: PassParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Dispatch(Dispatch),
    /// Every earlier command completes before any later one starts.
    Barrier,
    Copy {
        src: BufferHandle,
        dst: BufferHandle,
        bytes: usize,
    },
}

/// An ordered list of recorded commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandStream {
    commands: Vec<Command>,
}

impl CommandStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, dispatch: Dispatch) {
        self.commands.push(Command::Dispatch(dispatch));
    }

    pub fn barrier(&mut self) {
        self.commands.push(Command::Barrier);
    }

    pub fn copy(&mut self, src: BufferHandle, dst: BufferHandle, bytes: usize) {
        self.commands.push(Command::Copy { src, dst, bytes });
    }

    /// Append every command of `other`, keeping their order.
    pub fn extend(&mut self, other: CommandStream) {
        self.commands.extend(other.commands);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn dispatch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Dispatch(_)))
            .count()
    }

    pub fn barrier_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Barrier))
            .count()
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
