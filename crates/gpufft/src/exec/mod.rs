// Execution — Record a transform into a command stream
//
// The engine turns the bound passes of a Plan into dispatches:
//
//   input → pass 0 → scratch[0] → pass 1 → scratch[1] → … → pass n-1 → output
//
// Intermediate results ping-pong between two scratch regions. Every pass reads
// what the previous one wrote, so a barrier separates consecutive dispatches.
// An append into a stream that already holds work starts with a barrier.
//
// Nothing runs here. The caller submits the stream to the device and calls
// `Application::sync` when it needs the results.
//
// USAGE:
//   let mut stream = CommandStream::new();
//   app.append(Direction::Forward, &LaunchParams::out_of_place(x, y), &mut stream)?;
//   device.submit(stream)?;
//   app.sync()?;

mod engine;
pub mod launch;

pub use launch::LaunchParams;
