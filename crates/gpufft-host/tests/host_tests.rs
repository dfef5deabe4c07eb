// Host Device Tests — Command streams interpreted on host memory
//
// These drive the reference device directly with hand-recorded streams, the
// way the Execution Engine would, and check results against a naive DFT.

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use gpufft_core::{
        BufferBinding, BufferHandle, BufferShape, CommandStream, DeviceBackend, DeviceError,
        Dispatch, ElementLayout, KernelCompiler, KernelHandle, KernelVariant, PassKind,
        PassParams, Precision,
    };
    use gpufft_host::{HostDevice, HostDeviceConfig};
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn dft(x: &[Complex64], sign: f64) -> Vec<Complex64> {
        let n = x.len();
        (0..n)
            .map(|k| {
                x.iter()
                    .enumerate()
                    .map(|(j, v)| {
                        v * Complex64::from_polar(1.0, sign * 2.0 * PI * (j * k) as f64 / n as f64)
                    })
                    .sum()
            })
            .collect()
    }

    fn random_complex(n: usize, seed: u64) -> Vec<Complex64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect()
    }

    fn assert_close(actual: &[Complex64], expected: &[Complex64], tol: f64) {
        assert_eq!(actual.len(), expected.len(), "length mismatch");
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).norm() < tol, "index {i}: {a} != {e} (tol={tol})");
        }
    }

    fn variant(radix: usize, src: ElementLayout, dst: ElementLayout) -> KernelVariant {
        KernelVariant {
            kind: PassKind::Butterfly { radix },
            inverse: false,
            precision: Precision::Double,
            src_layout: src,
            dst_layout: dst,
            half_spectrum: false,
            lut: false,
        }
    }

    fn binding(buffer: BufferHandle, layout: ElementLayout, shape: BufferShape) -> BufferBinding {
        BufferBinding {
            buffer,
            offset: 0,
            layout,
            shape,
        }
    }

    fn dispatch(
        kernel: KernelHandle,
        src: BufferBinding,
        dst: BufferBinding,
        span: usize,
        scale: f64,
    ) -> Dispatch {
        Dispatch {
            kernel,
            src,
            dst,
            aux: None,
            params: PassParams {
                axis: 0,
                span,
                scale,
            },
        }
    }

    #[test]
    fn test_two_pass_dispatch_matches_dft() {
        init();
        let dev = HostDevice::default();
        let x = random_complex(12, 1);
        let p = Precision::Double;
        let il = ElementLayout::Interleaved;
        let shape = BufferShape::new(&[12], 1);

        let k4 = dev.compile(&variant(4, il, il)).unwrap();
        let k3 = dev.compile(&variant(3, il, il)).unwrap();
        let input = dev.upload(&p.encode_complex(&x)).unwrap();
        let scratch = dev.allocate(12 * 16).unwrap();
        let output = dev.allocate(12 * 16).unwrap();

        let mut stream = CommandStream::new();
        stream.dispatch(dispatch(
            k4,
            binding(input, il, shape.clone()),
            binding(scratch, il, shape.clone()),
            1,
            1.0,
        ));
        stream.dispatch(dispatch(
            k3,
            binding(scratch, il, shape.clone()),
            binding(output, il, shape),
            4,
            1.0,
        ));
        dev.submit(stream).unwrap();
        dev.wait_idle().unwrap();

        let got = p.decode_complex(&dev.download(output).unwrap());
        assert_close(&got, &dft(&x, -1.0), 1e-10);
        assert_eq!(dev.stats().dispatches, 2);
    }

    #[test]
    fn test_work_runs_on_wait() {
        let dev = HostDevice::default();
        let p = Precision::Single;
        let src = dev.upload(&p.encode_complex(&[Complex64::new(1.0, 0.0); 4])).unwrap();
        let dst = dev.allocate(32).unwrap();
        let mut stream = CommandStream::new();
        stream.copy(src, dst, 32);
        stream.barrier();
        dev.submit(stream).unwrap();
        assert_eq!(dev.pending_streams(), 1);
        assert!(dev.download(dst).unwrap().iter().all(|&b| b == 0));
        dev.wait_idle().unwrap();
        assert_eq!(dev.pending_streams(), 0);
        assert_eq!(dev.download(dst).unwrap(), dev.download(src).unwrap());
        let stats = dev.stats();
        assert_eq!((stats.copies, stats.barriers, stats.waits), (1, 1, 1));
    }

    #[test]
    fn test_real_input_writes_half_spectrum() {
        let dev = HostDevice::default();
        let p = Precision::Double;
        let x: Vec<f64> = (0..8).map(|i| (i as f64 * 0.7).sin() + 0.25).collect();
        let mut v = variant(8, ElementLayout::Real, ElementLayout::Interleaved);
        v.half_spectrum = true;
        let kernel = dev.compile(&v).unwrap();
        let input = dev.upload(&p.encode_real(&x)).unwrap();
        let output = dev.allocate(5 * 16).unwrap();

        let mut stream = CommandStream::new();
        stream.dispatch(dispatch(
            kernel,
            binding(input, ElementLayout::Real, BufferShape::new(&[8], 1)),
            binding(output, ElementLayout::Interleaved, BufferShape::half_spectrum(&[8], 1)),
            1,
            1.0,
        ));
        dev.submit(stream).unwrap();
        dev.wait_idle().unwrap();

        let complex: Vec<Complex64> = x.iter().map(|&r| Complex64::new(r, 0.0)).collect();
        let full = dft(&complex, -1.0);
        let got = p.decode_complex(&dev.download(output).unwrap());
        assert_close(&got, &full[..5], 1e-10);
    }

    #[test]
    fn test_half_spectrum_read_reconstructs_signal() {
        let dev = HostDevice::default();
        let p = Precision::Double;
        let x: Vec<f64> = (0..7).map(|i| (i as f64 * 1.3).cos() - 0.5).collect();
        let complex: Vec<Complex64> = x.iter().map(|&r| Complex64::new(r, 0.0)).collect();
        let spectrum = dft(&complex, -1.0);

        let mut v = variant(7, ElementLayout::Interleaved, ElementLayout::Real);
        v.inverse = true;
        v.half_spectrum = true;
        let kernel = dev.compile(&v).unwrap();
        let input = dev.upload(&p.encode_complex(&spectrum[..4])).unwrap();
        let output = dev.allocate(7 * 8).unwrap();

        let mut stream = CommandStream::new();
        stream.dispatch(dispatch(
            kernel,
            binding(input, ElementLayout::Interleaved, BufferShape::half_spectrum(&[7], 1)),
            binding(output, ElementLayout::Real, BufferShape::new(&[7], 1)),
            1,
            1.0 / 7.0,
        ));
        dev.submit(stream).unwrap();
        dev.wait_idle().unwrap();

        let got = p.decode_real(&dev.download(output).unwrap());
        for (a, e) in got.iter().zip(&x) {
            assert!((a - e).abs() < 1e-10, "{a} != {e}");
        }
    }

    #[test]
    fn test_planar_layout() {
        let dev = HostDevice::default();
        let p = Precision::Double;
        let x = random_complex(4, 7);
        let mut planar: Vec<f64> = x.iter().map(|c| c.re).collect();
        planar.extend(x.iter().map(|c| c.im));

        let kernel = dev
            .compile(&variant(4, ElementLayout::Planar, ElementLayout::Planar))
            .unwrap();
        let buffer = dev.upload(&p.encode_real(&planar)).unwrap();
        let shape = BufferShape::new(&[4], 1);
        let mut stream = CommandStream::new();
        stream.dispatch(dispatch(
            kernel,
            binding(buffer, ElementLayout::Planar, shape.clone()),
            binding(buffer, ElementLayout::Planar, shape),
            1,
            1.0,
        ));
        dev.submit(stream).unwrap();
        dev.wait_idle().unwrap();

        let raw = p.decode_real(&dev.download(buffer).unwrap());
        let got: Vec<Complex64> = (0..4).map(|i| Complex64::new(raw[i], raw[4 + i])).collect();
        assert_close(&got, &dft(&x, -1.0), 1e-10);
    }

    #[test]
    fn test_unknown_kernel_fails_wait() {
        let dev = HostDevice::default();
        let buffer = dev.allocate(32).unwrap();
        let il = ElementLayout::Interleaved;
        let shape = BufferShape::new(&[4], 1);
        let mut stream = CommandStream::new();
        stream.dispatch(dispatch(
            KernelHandle(999),
            binding(buffer, il, shape.clone()),
            binding(buffer, il, shape),
            1,
            1.0,
        ));
        dev.submit(stream).unwrap();
        assert_eq!(dev.wait_idle(), Err(DeviceError::InvalidKernel(999)));
    }

    #[test]
    fn test_undersized_binding_fails() {
        let dev = HostDevice::default();
        let il = ElementLayout::Interleaved;
        let kernel = dev.compile(&variant(4, il, il)).unwrap();
        let small = dev.allocate(16).unwrap();
        let shape = BufferShape::new(&[4], 1);
        let mut stream = CommandStream::new();
        stream.dispatch(dispatch(
            kernel,
            binding(small, il, shape.clone()),
            binding(small, il, shape),
            1,
            1.0,
        ));
        dev.submit(stream).unwrap();
        assert!(matches!(dev.wait_idle(), Err(DeviceError::Backend(_))));
    }

    #[test]
    fn test_unsupported_radix_and_release() {
        let dev = HostDevice::new(HostDeviceConfig::default().with_unsupported_radix(7));
        let il = ElementLayout::Interleaved;
        assert!(dev.compile(&variant(7, il, il)).is_err());
        let kernel = dev.compile(&variant(5, il, il)).unwrap();
        assert_eq!(dev.stats().live_kernels, 1);
        dev.release(kernel);
        assert_eq!(dev.stats().live_kernels, 0);
        assert_eq!(dev.stats().compiles, 1);
    }
}
