//! The optional `wgpu` acceleration path (§4.4: `setup`/`init`/`run`/
//! `finish`). Plays the role the original C host fills with Direct3D 12
//! (`D12Effect`) or EGL compute shaders (`client/renderers/EGL/
//! postprocess.c`); every stage also has a CPU reference used by the
//! unit tests and as the fallback when no adapter is available.

use wgpu::util::DeviceExt;

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Requests a high-performance adapter and device. Returns `None`
    /// rather than erroring when no adapter is available (headless CI,
    /// a machine with no GPU) — the chain falls back to the CPU path.
    pub fn new() -> Option<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok()?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()?;
        Some(Self { device, queue })
    }

    /// Runs a single compute-shader pass over a byte buffer, 4 bytes
    /// (one `u32`) at a time, with a small uniform parameter block. Every
    /// stage's GPU path shares this shape: upload input + params,
    /// dispatch one workgroup per `wg_count` groups of 64 invocations,
    /// read back the output buffer.
    pub fn run_compute(
        &self,
        shader_src: &str,
        entry_point: &str,
        input: &[u8],
        output_len: usize,
        params: &[u32],
        wg_count: u32,
    ) -> Vec<u8> {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lg-postprocess-stage"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let input_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pp-input"),
            contents: input,
            usage: wgpu::BufferUsages::STORAGE,
        });
        let output_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pp-output"),
            size: output_len as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let params_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pp-params"),
            contents: bytemuck::cast_slice(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let readback_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pp-readback"),
            size: output_len as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("lg-postprocess-pipeline"),
            layout: None,
            module: &module,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        });
        let bind_group_layout = pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lg-postprocess-bind-group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: input_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: output_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(wg_count, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buf, 0, &readback_buf, 0, output_len as u64);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv().ok();
        let data = slice.get_mapped_range().to_vec();
        readback_buf.unmap();
        data
    }
}
