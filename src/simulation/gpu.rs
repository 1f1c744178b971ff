//! GPU fluid solver
//!
//! The six passes as compute dispatches over storage-buffer ping-pong pairs.
//! Every tick is recorded into one command encoder and submitted once. The
//! projected field ends in velocity slot A, which the composite pass binds
//! directly, so no field data crosses the bus.

use std::{
    iter,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use bytemuck::Zeroable;
use wgpu::{BindGroup, Buffer, ComputePipeline, Device, Queue};

use super::{
    buffers::Slot,
    field::GridSize,
    fluid::ForceKernel,
    params::SimulationParams,
    schedule::{tick_schedule, Dispatch, VelocitySource},
    traits::{FieldView, GpuField, Simulation},
};
use crate::input::PointerSample;
use crate::wgpu_utils::{self, UniformBuffer};

/// Threads per workgroup along each grid axis
pub const WORKGROUP_SIZE: u32 = 8;

const COMMON_SHADER: &str = include_str!("shaders/common.wgsl");

/// Source and binding table of one compute pass
///
/// Binding 0 is always the solver uniform; `storage` gives the read-only flag
/// of bindings 1, 2, ... in order.
pub struct StageLayout {
    pub label: &'static str,
    pub source: &'static str,
    pub storage: &'static [bool],
}

pub const ADVECTION: StageLayout = StageLayout {
    label: "Advection",
    source: include_str!("shaders/advection.wgsl"),
    storage: &[true, false],
};
pub const EXTERNAL_FORCE: StageLayout = StageLayout {
    label: "External Force",
    source: include_str!("shaders/external_force.wgsl"),
    storage: &[false],
};
pub const VISCOUS: StageLayout = StageLayout {
    label: "Viscous",
    source: include_str!("shaders/viscous.wgsl"),
    storage: &[true, true, false],
};
pub const DIVERGENCE: StageLayout = StageLayout {
    label: "Divergence",
    source: include_str!("shaders/divergence.wgsl"),
    storage: &[true, false],
};
pub const POISSON: StageLayout = StageLayout {
    label: "Poisson",
    source: include_str!("shaders/poisson.wgsl"),
    storage: &[true, true, false],
};
pub const PRESSURE: StageLayout = StageLayout {
    label: "Pressure",
    source: include_str!("shaders/pressure.wgsl"),
    storage: &[true, true, false],
};

const SLOTS: [Slot; 2] = [Slot::First, Slot::Second];
const SOURCES: [VelocitySource; 3] = [
    VelocitySource::Advected,
    VelocitySource::Viscous(Slot::First),
    VelocitySource::Viscous(Slot::Second),
];

static NEXT_ALLOCATION: AtomicU64 = AtomicU64::new(1);

/// Unique id for a newly allocated field buffer
pub fn next_allocation_id() -> u64 {
    NEXT_ALLOCATION.fetch_add(1, Ordering::Relaxed)
}

/// Workgroups needed to cover `size`
pub fn workgroup_count(size: GridSize) -> (u32, u32) {
    let (width, height) = (size.width as u32, size.height as u32);
    (
        (width + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
        (height + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
    )
}

/// Uniforms of one tick, shared by every pass. Mirrors `Params` in `common.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SolverUniform {
    pub size: [u32; 2],
    pub cell: [f32; 2],
    pub margin: [f32; 2],
    pub ratio: [f32; 2],
    pub force: [f32; 2],
    pub center: [f32; 2],
    pub radius: [f32; 2],
    pub dt: f32,
    pub viscosity: f32,
    pub bfecc: u32,
    pub _pad: [u32; 3],
}

impl SolverUniform {
    pub fn new(params: &SimulationParams, size: GridSize, kernel: &ForceKernel, dt: f32) -> Self {
        let cell = size.cell_scale();
        let margin = params.margin(size);
        let ratio = size.aspect_ratio();
        Self {
            size: [size.width as u32, size.height as u32],
            cell: [cell.x, cell.y],
            margin: [margin.x, margin.y],
            ratio: [ratio.x, ratio.y],
            force: [kernel.force.x, kernel.force.y],
            center: [kernel.center.x, kernel.center.y],
            radius: [kernel.radius.x, kernel.radius.y],
            dt,
            viscosity: params.viscous,
            bfecc: params.bfecc as u32,
            _pad: [0; 3],
        }
    }
}

/// A compute pipeline and the layout its bind groups follow
struct ComputeStage {
    pipeline: ComputePipeline,
    layout: wgpu::BindGroupLayout,
    label: &'static str,
}

impl ComputeStage {
    fn new(device: &Device, stage: &StageLayout) -> Self {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu_utils::uniform(),
            count: None,
        }];
        entries.extend(stage.storage.iter().enumerate().map(|(i, read_only)| {
            wgpu::BindGroupLayoutEntry {
                binding: i as u32 + 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu_utils::storage_buffer(*read_only),
                count: None,
            }
        }));
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(stage.label),
            entries: &entries,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage.label),
            source: wgpu::ShaderSource::Wgsl(format!("{}\n{}", COMMON_SHADER, stage.source).into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(stage.label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(stage.label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            layout,
            label: stage.label,
        }
    }

    fn bind(
        &self,
        device: &Device,
        uniform: &UniformBuffer<SolverUniform>,
        buffers: &[&Buffer],
    ) -> BindGroup {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.binding_resource(),
        }];
        entries.extend(buffers.iter().enumerate().map(|(i, buffer)| wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: buffer.as_entire_binding(),
        }));
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        })
    }
}

struct SolverStages {
    advection: ComputeStage,
    external_force: ComputeStage,
    viscous: ComputeStage,
    divergence: ComputeStage,
    poisson: ComputeStage,
    pressure: ComputeStage,
}

impl SolverStages {
    fn new(device: &Device) -> Self {
        Self {
            advection: ComputeStage::new(device, &ADVECTION),
            external_force: ComputeStage::new(device, &EXTERNAL_FORCE),
            viscous: ComputeStage::new(device, &VISCOUS),
            divergence: ComputeStage::new(device, &DIVERGENCE),
            poisson: ComputeStage::new(device, &POISSON),
            pressure: ComputeStage::new(device, &PRESSURE),
        }
    }
}

/// Storage buffer usable by the passes, cleared and copied by the queue
fn create_storage_buffer(device: &Device, size: u64, label: &str) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

/// The seven field buffers, plus one bind group per pass and slot combination
struct GpuFieldSet {
    size: GridSize,
    allocation: u64,
    velocity: [Buffer; 2],
    viscous: [Buffer; 2],
    divergence: Buffer,
    pressure: [Buffer; 2],
    advection: BindGroup,
    external_force: BindGroup,
    viscous_groups: [BindGroup; 2],
    divergence_groups: [BindGroup; 3],
    poisson_groups: [BindGroup; 2],
    /// Indexed by velocity source, then pressure slot
    pressure_groups: [[BindGroup; 2]; 3],
}

impl GpuFieldSet {
    /// Allocate zeroed buffers at `size`
    fn new(
        device: &Device,
        stages: &SolverStages,
        uniform: &UniformBuffer<SolverUniform>,
        size: GridSize,
    ) -> Self {
        let cells = size.cells() as u64;
        let vector = |label: &str| create_storage_buffer(device, cells * 8, label);
        let scalar = |label: &str| create_storage_buffer(device, cells * 4, label);

        let velocity = [vector("Velocity A"), vector("Velocity B")];
        let viscous = [vector("Viscous A"), vector("Viscous B")];
        let divergence = scalar("Divergence");
        let pressure = [scalar("Pressure A"), scalar("Pressure B")];

        let source = |source: VelocitySource| match source {
            VelocitySource::Advected => &velocity[1],
            VelocitySource::Viscous(slot) => &viscous[slot as usize],
        };
        let advection = stages
            .advection
            .bind(device, uniform, &[&velocity[0], &velocity[1]]);
        let external_force = stages.external_force.bind(device, uniform, &[&velocity[1]]);
        let viscous_groups = SLOTS.map(|src| {
            stages.viscous.bind(
                device,
                uniform,
                &[&velocity[1], &viscous[src as usize], &viscous[src.other() as usize]],
            )
        });
        let divergence_groups = SOURCES.map(|from| {
            stages
                .divergence
                .bind(device, uniform, &[source(from), &divergence])
        });
        let poisson_groups = SLOTS.map(|src| {
            stages.poisson.bind(
                device,
                uniform,
                &[&pressure[src as usize], &divergence, &pressure[src.other() as usize]],
            )
        });
        let pressure_groups = SOURCES.map(|from| {
            SLOTS.map(|slot| {
                stages.pressure.bind(
                    device,
                    uniform,
                    &[source(from), &pressure[slot as usize], &velocity[0]],
                )
            })
        });

        Self {
            size,
            allocation: next_allocation_id(),
            velocity,
            viscous,
            divergence,
            pressure,
            advection,
            external_force,
            viscous_groups,
            divergence_groups,
            poisson_groups,
            pressure_groups,
        }
    }

    fn buffers(&self) -> [&Buffer; 7] {
        [
            &self.velocity[0],
            &self.velocity[1],
            &self.viscous[0],
            &self.viscous[1],
            &self.divergence,
            &self.pressure[0],
            &self.pressure[1],
        ]
    }
}

pub struct GpuFluidSimulation {
    name: String,
    device: Arc<Device>,
    queue: Arc<Queue>,
    params: SimulationParams,
    container: (f32, f32),
    stages: SolverStages,
    uniform: UniformBuffer<SolverUniform>,
    fields: GpuFieldSet,
    running: bool,
    step_count: u64,
}

impl GpuFluidSimulation {
    /// Build the pipelines and a zeroed grid for a container in logical pixels
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        params: SimulationParams,
        container: (f32, f32),
    ) -> Self {
        let size = GridSize::for_container(params.resolution, container);
        let stages = SolverStages::new(&device);
        let uniform = UniformBuffer::new_with_data(&device, &SolverUniform::zeroed());
        let fields = GpuFieldSet::new(&device, &stages, &uniform, size);
        log::info!(
            "GPU fluid grid {}x{} for container {:.0}x{:.0}",
            size.width,
            size.height,
            container.0,
            container.1
        );

        Self {
            name: "Liquid (GPU)".to_string(),
            device,
            queue,
            params,
            container,
            stages,
            uniform,
            fields,
            running: true,
            step_count: 0,
        }
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    fn select(&self, dispatch: Dispatch) -> (&ComputeStage, &BindGroup) {
        let fields = &self.fields;
        match dispatch {
            Dispatch::Advection => (&self.stages.advection, &fields.advection),
            Dispatch::ExternalForce => (&self.stages.external_force, &fields.external_force),
            Dispatch::Viscous(src) => (&self.stages.viscous, &fields.viscous_groups[src as usize]),
            Dispatch::Divergence(source) => (
                &self.stages.divergence,
                &fields.divergence_groups[source.index()],
            ),
            Dispatch::Poisson(src) => (&self.stages.poisson, &fields.poisson_groups[src as usize]),
            Dispatch::Pressure(source, slot) => (
                &self.stages.pressure,
                &fields.pressure_groups[source.index()][slot as usize],
            ),
        }
    }

    fn reallocate(&mut self, size: GridSize) {
        self.fields = GpuFieldSet::new(&self.device, &self.stages, &self.uniform, size);
    }
}

impl Simulation for GpuFluidSimulation {
    fn update(&mut self, pointer: &PointerSample, delta_time: f32) {
        if !self.running {
            return;
        }
        let size = self.fields.size;
        let kernel = ForceKernel::new(&self.params, size, pointer);
        self.uniform.update_content(
            &self.queue,
            SolverUniform::new(&self.params, size, &kernel, delta_time),
        );

        let (groups_x, groups_y) = workgroup_count(size);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluid Step Encoder"),
            });
        for dispatch in tick_schedule(&self.params) {
            let (stage, bind_group) = self.select(dispatch);
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(dispatch.name()),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&stage.pipeline);
            compute_pass.set_bind_group(0, bind_group, &[]);
            compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        self.queue.submit(iter::once(encoder.finish()));
        self.step_count += 1;
    }

    fn resize(&mut self, container: (f32, f32)) {
        self.container = container;
        let size = GridSize::for_container(self.params.resolution, container);
        log::debug!("GPU fluid grid resized to {}x{}", size.width, size.height);
        self.reallocate(size);
    }

    fn reset(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluid Reset Encoder"),
            });
        for buffer in self.fields.buffers() {
            encoder.clear_buffer(buffer, 0, None);
        }
        self.queue.submit(iter::once(encoder.finish()));
        self.step_count = 0;
    }

    fn params(&self) -> &SimulationParams {
        &self.params
    }

    fn set_params(&mut self, params: SimulationParams) {
        let resolution_changed = params.resolution != self.params.resolution;
        self.params = params;
        if resolution_changed {
            self.resize(self.container);
        }
    }

    fn grid_size(&self) -> GridSize {
        self.fields.size
    }

    fn output(&self) -> FieldView<'_> {
        FieldView::Gpu(GpuField {
            buffer: &self.fields.velocity[Slot::First as usize],
            size: self.fields.size,
            allocation: self.fields.allocation,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    fn cleanup(&mut self) {
        self.reallocate(GridSize::new(1, 1));
    }
}
