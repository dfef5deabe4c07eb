use gpufft_core::BufferHandle;

/// Buffers of one `append` call.
///
/// `input == None` means in-place: the transform reads and writes `output`.
/// `temp` replaces the application's internal scratch for this call; it
/// must hold at least `Application::scratch_bytes()` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchParams {
    pub input: Option<BufferHandle>,
    pub output: BufferHandle,
    pub temp: Option<BufferHandle>,
}

impl LaunchParams {
    pub fn in_place(buffer: BufferHandle) -> Self {
        Self {
            input: None,
            output: buffer,
            temp: None,
        }
    }

    pub fn out_of_place(input: BufferHandle, output: BufferHandle) -> Self {
        Self {
            input: Some(input),
            output,
            temp: None,
        }
    }

    pub fn with_temp(mut self, temp: BufferHandle) -> Self {
        self.temp = Some(temp);
        self
    }

    /// Buffer the first pass reads.
    pub fn input_buffer(&self) -> BufferHandle {
        self.input.unwrap_or(self.output)
    }

    pub fn is_in_place(&self) -> bool {
        self.input_buffer() == self.output
    }
}
