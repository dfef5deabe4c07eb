// C ABI Tests — The exported functions driven the way a C caller would

#[cfg(test)]
mod tests {
    use std::ffi::{c_char, CStr};
    use std::ptr;

    use gpufft_capi::*;
    use gpufft_core::Precision;

    fn last_error() -> String {
        let len = gpufft_last_error_length();
        let mut buffer = vec![0 as c_char; len + 1];
        let written = unsafe { gpufft_last_error_message(buffer.as_mut_ptr(), buffer.len()) };
        assert_eq!(written, len);
        unsafe { CStr::from_ptr(buffer.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    fn device() -> *mut GpufftDevice {
        let mut device = ptr::null_mut();
        let code = unsafe { gpufft_device_create_host(0, 0, &mut device) };
        assert_eq!(code, GPUFFT_SUCCESS);
        assert!(!device.is_null());
        device
    }

    fn config_1d(n: u64) -> GpufftConfiguration {
        let mut config = GpufftConfiguration::default();
        unsafe { assert_eq!(gpufft_default_configuration(&mut config), GPUFFT_SUCCESS) };
        config.size[0] = n;
        config
    }

    fn initialize(
        device: *mut GpufftDevice,
        config: &GpufftConfiguration,
    ) -> (i32, *mut GpufftApplication) {
        let mut app = ptr::null_mut();
        let code = unsafe { gpufft_initialize(device, config, &mut app) };
        (code, app)
    }

    fn allocate(device: *mut GpufftDevice, bytes: usize) -> u64 {
        let mut buffer = 0;
        unsafe { assert_eq!(gpufft_buffer_allocate(device, bytes, &mut buffer), GPUFFT_SUCCESS) };
        assert_ne!(buffer, 0);
        buffer
    }

    #[test]
    fn test_version() {
        let version: i32 = gpufft_get_version();
        assert_eq!(version, 10304);
        assert_eq!(version / 10000, gpufft::VERSION_MAJOR as i32);
    }

    #[test]
    fn test_forward_inverse_roundtrip() {
        let device = device();
        let (code, app) = initialize(device, &config_1d(60));
        assert_eq!(code, GPUFFT_SUCCESS, "{}", last_error());

        // interleaved single precision: 60 complex values = 120 floats
        let values: Vec<f64> = (0..120).map(|i| ((i * 7) % 13) as f64 / 13.0 - 0.5).collect();
        let input = Precision::Single.encode_real(&values);
        let x = allocate(device, input.len());
        let y = allocate(device, input.len());
        let z = allocate(device, input.len());
        unsafe {
            assert_eq!(
                gpufft_buffer_write(device, x, 0, input.as_ptr(), input.len()),
                GPUFFT_SUCCESS
            );
            let stream = gpufft_stream_create();
            let forward = GpufftLaunchParams { input: x, output: y, temp: 0 };
            let inverse = GpufftLaunchParams { input: y, output: z, temp: 0 };
            assert_eq!(gpufft_append(app, 0, &forward, stream), GPUFFT_SUCCESS);
            assert_eq!(gpufft_append(app, 1, &inverse, stream), GPUFFT_SUCCESS);
            assert!(gpufft_stream_len(stream) > 0);
            assert_eq!(gpufft_stream_submit(device, stream), GPUFFT_SUCCESS);
            assert_eq!(gpufft_stream_len(stream), 0);
            assert_eq!(gpufft_sync(app), GPUFFT_SUCCESS);
            gpufft_stream_destroy(stream);

            let mut output = vec![0u8; input.len()];
            assert_eq!(
                gpufft_buffer_read(device, z, 0, output.as_mut_ptr(), output.len()),
                GPUFFT_SUCCESS
            );
            let back = Precision::Single.decode_real(&output);
            for (a, e) in back.iter().zip(&values) {
                assert!((a - e).abs() < 1e-4, "{a} != {e}");
            }

            // DC bin of the forward result is the sum of the input
            let mut spectrum = vec![0u8; 8];
            assert_eq!(
                gpufft_buffer_read(device, y, 0, spectrum.as_mut_ptr(), 8),
                GPUFFT_SUCCESS
            );
            let dc = Precision::Single.decode_real(&spectrum);
            let re: f64 = values.iter().step_by(2).sum();
            assert!((dc[0] - re).abs() < 1e-3);

            gpufft_delete(app);
            for buffer in [x, y, z] {
                assert_eq!(gpufft_buffer_free(device, buffer), GPUFFT_SUCCESS);
            }
            gpufft_device_destroy(device);
        }
    }

    #[test]
    fn test_unsupported_length_reports_message() {
        let device = device();
        let mut config = config_1d(97);
        config.bluestein = 0;
        let (code, app) = initialize(device, &config);
        assert_eq!(code, GPUFFT_ERROR_UNSUPPORTED_LENGTH);
        assert!(app.is_null());
        assert!(last_error().contains("97"));
        unsafe { gpufft_device_destroy(device) };
    }

    #[test]
    fn test_invalid_configuration_codes() {
        let device = device();
        let mut config = config_1d(16);
        config.dimensions = 0;
        assert_eq!(initialize(device, &config).0, GPUFFT_ERROR_INVALID_CONFIG);
        config.dimensions = 1;
        config.layout = 9;
        assert_eq!(initialize(device, &config).0, GPUFFT_ERROR_INVALID_ARGUMENT);
        config.layout = GPUFFT_LAYOUT_INTERLEAVED;
        config.directions = 0;
        assert_eq!(initialize(device, &config).0, GPUFFT_ERROR_INVALID_CONFIG);
        unsafe { gpufft_device_destroy(device) };
    }

    #[test]
    fn test_null_pointers() {
        let config = config_1d(16);
        let mut app = ptr::null_mut();
        let code = unsafe { gpufft_initialize(ptr::null(), &config, &mut app) };
        assert_eq!(code, GPUFFT_ERROR_NULL_POINTER);
        assert!(last_error().contains("device"));
        assert_eq!(unsafe { gpufft_sync(ptr::null_mut()) }, GPUFFT_ERROR_NULL_POINTER);
        assert_eq!(
            unsafe { gpufft_default_configuration(ptr::null_mut()) },
            GPUFFT_ERROR_NULL_POINTER
        );
        unsafe {
            gpufft_delete(ptr::null_mut());
            gpufft_stream_destroy(ptr::null_mut());
            gpufft_device_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_runtime_error_codes() {
        let device = device();
        let mut config = config_1d(32);
        config.directions = GPUFFT_DIRECTION_FORWARD;
        let (code, app) = initialize(device, &config);
        assert_eq!(code, GPUFFT_SUCCESS);
        let small = allocate(device, 16);
        let good = allocate(device, 256);
        unsafe {
            let stream = gpufft_stream_create();
            let launch = GpufftLaunchParams { input: 0, output: good, temp: 0 };
            assert_eq!(
                gpufft_append(app, 1, &launch, stream),
                GPUFFT_ERROR_UNSUPPORTED_DIRECTION
            );
            let launch = GpufftLaunchParams { input: small, output: good, temp: 0 };
            assert_eq!(
                gpufft_append(app, 0, &launch, stream),
                GPUFFT_ERROR_BUFFER_TOO_SMALL
            );
            assert!(last_error().contains("input"));
            let launch = GpufftLaunchParams { input: 0, output: 999_999, temp: 0 };
            assert_eq!(gpufft_append(app, 0, &launch, stream), GPUFFT_ERROR_INVALID_LAUNCH);
            assert_eq!(gpufft_stream_len(stream), 0);
            // nothing pending: sync succeeds immediately
            assert_eq!(gpufft_sync(app), GPUFFT_SUCCESS);
            gpufft_stream_destroy(stream);
            gpufft_delete(app);
            gpufft_device_destroy(device);
        }
    }

    #[test]
    fn test_out_of_memory_code() {
        let mut device = ptr::null_mut();
        unsafe { assert_eq!(gpufft_device_create_host(0, 64, &mut device), GPUFFT_SUCCESS) };
        let mut config = config_1d(33);
        config.use_lut = 1;
        let (code, app) = initialize(device, &config);
        assert_eq!(code, GPUFFT_ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(app.is_null());
        unsafe { gpufft_device_destroy(device) };
    }

    #[test]
    fn test_plan_axis() {
        let device = device();
        let (code, app) = initialize(device, &config_1d(1024));
        assert_eq!(code, GPUFFT_SUCCESS);
        unsafe {
            let mut plan = GpufftAxisPlan::default();
            assert_eq!(gpufft_plan_axis(app, 0, 0, 0, 0, &mut plan), GPUFFT_SUCCESS);
            assert_eq!(plan.passes, 2);
            assert_eq!(plan.uploads, 1);
            assert_eq!(&plan.radices[..2], &[32, 32]);
            assert_eq!(&plan.kinds[..2], &[GPUFFT_PASS_BUTTERFLY; 2]);
            assert_eq!(&plan.spans[..2], &[1, 32]);
            assert_eq!(plan.scratch_bytes as usize, gpufft_scratch_bytes(app));

            assert_eq!(
                gpufft_plan_axis(app, 0, 1, 0, 0, &mut plan),
                GPUFFT_ERROR_INVALID_CONFIG
            );
            gpufft_delete(app);
        }

        let (code, app) = initialize(device, &config_1d(17));
        assert_eq!(code, GPUFFT_SUCCESS);
        unsafe {
            let mut plan = GpufftAxisPlan::default();
            assert_eq!(gpufft_plan_axis(app, 0, 0, 0, 0, &mut plan), GPUFFT_SUCCESS);
            assert_eq!(plan.kinds[0], GPUFFT_PASS_CHIRP_IN);
            assert_eq!(plan.radices[0], 0);
            assert_eq!(plan.uploads, 5);
            assert_eq!(gpufft_plan_axis(app, 0, 3, 0, 1, &mut plan), GPUFFT_SUCCESS);
            assert_eq!(plan.passes, 2);
            gpufft_delete(app);
            gpufft_device_destroy(device);
        }
    }
}
