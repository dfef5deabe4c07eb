use gpufft_core::{BufferBinding, BufferHandle, CommandStream, Direction, Dispatch, RuntimeError};

use super::launch::LaunchParams;
use crate::app::Application;

impl Application {
    /// Record one transform in `direction` into `stream`.
    ///
    /// On error nothing has been recorded.
    pub fn append(
        &mut self,
        direction: Direction,
        launch: &LaunchParams,
        stream: &mut CommandStream,
    ) -> Result<(), RuntimeError> {
        self.lifecycle.check_usable()?;
        if self.plan.passes(direction).is_none() {
            return Err(RuntimeError::UnsupportedDirection(direction));
        }
        let config = self.plan.config();
        if config.is_real() && launch.is_in_place() {
            return Err(RuntimeError::InvalidLaunch(
                "real-to-complex transforms must run out of place".into(),
            ));
        }

        let input = launch.input_buffer();
        let input_bytes = config.input_bytes(direction);
        let output_bytes = config.output_bytes(direction);
        self.check_size("input", input, input_bytes)?;
        self.check_size("output", launch.output, output_bytes)?;

        // Earlier commands in `stream` may write our input or use the same scratch.
        let ordered = !stream.is_empty();
        let pass_count = self.plan.passes(direction).map_or(0, |p| p.len());
        if pass_count == 0 {
            if !launch.is_in_place() {
                if ordered {
                    stream.barrier();
                }
                stream.copy(input, launch.output, input_bytes.min(output_bytes));
                self.lifecycle.mark_pending();
            }
            log::debug!("append {direction}: identity transform");
            return Ok(());
        }

        let scratch = self.scratch_for(launch)?;

        let mut recorded = CommandStream::new();
        if ordered {
            recorded.barrier();
        }
        let passes = self.plan.passes(direction).unwrap_or_default();
        for (i, pass) in passes.iter().enumerate() {
            // every pass after the first reads what the previous one wrote
            if i > 0 {
                recorded.barrier();
            }

            let (src_buffer, src_offset) = if i == 0 {
                (input, 0)
            } else {
                (scratch.unwrap_or(launch.output), self.plan.region_offset(i - 1))
            };
            let (dst_buffer, dst_offset) = if i + 1 == pass_count {
                (launch.output, 0)
            } else {
                (scratch.unwrap_or(launch.output), self.plan.region_offset(i))
            };

            recorded.dispatch(Dispatch {
                kernel: pass.kernel.handle(),
                src: BufferBinding {
                    buffer: src_buffer,
                    offset: src_offset,
                    layout: pass.variant.src_layout,
                    shape: pass.src_shape.clone(),
                },
                dst: BufferBinding {
                    buffer: dst_buffer,
                    offset: dst_offset,
                    layout: pass.variant.dst_layout,
                    shape: pass.dst_shape.clone(),
                },
                aux: self.resources.aux(direction, i),
                params: pass.params,
            });
        }

        log::debug!(
            "append {direction}: {} dispatches, {} barriers",
            recorded.dispatch_count(),
            recorded.barrier_count()
        );
        stream.extend(recorded);
        self.lifecycle.mark_pending();
        Ok(())
    }

    fn check_size(
        &mut self,
        role: &'static str,
        buffer: BufferHandle,
        required: usize,
    ) -> Result<(), RuntimeError> {
        let actual = self
            .device
            .buffer_len(buffer)
            .map_err(|err| self.lifecycle.device_error(err))?;
        if actual < required {
            return Err(RuntimeError::BufferTooSmall {
                role,
                required,
                actual,
            });
        }
        Ok(())
    }

    /// Scratch buffer for this launch, or `None` when the plan needs none.
    fn scratch_for(&mut self, launch: &LaunchParams) -> Result<Option<BufferHandle>, RuntimeError> {
        let required = self.plan.scratch_bytes();
        if required == 0 {
            return Ok(None);
        }
        match launch.temp {
            Some(temp) => {
                self.check_size("temp", temp, required)?;
                Ok(Some(temp))
            }
            None => self.ensure_scratch().map(Some),
        }
    }
}
