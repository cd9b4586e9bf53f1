//! Camera-facing ribbon geometry and the seams to the batch renderer.
//!
//! Each visible trail section gets a top/bottom vertex pair perpendicular to
//! both the view direction and the trail's local tangent. Consecutive pairs
//! are joined into quads; on trails with three or more visible sections the
//! two end pieces collapse to a triangle whose apex is the end section's
//! centre, so the ribbon tapers instead of ending on a hard edge.
//!
//! Geometry goes out as a triangle list of [`TrailVertex`] through a
//! [`TrailBatcher`]. [`VertexBatch`] is a batcher that groups vertices by
//! texture and can upload them to the GPU.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::camera::RenderView;
use crate::trail::{Trail, TRAIL_SECTIONS};

/// Integer bitmap id as stored in effect definitions.
pub type TextureId = i32;

/// One ribbon vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TrailVertex {
    /// World position.
    pub position: [f32; 3],
    /// Texture coordinate. `u` flows along the ribbon, `v` spans its width.
    pub uv: [f32; 2],
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

impl TrailVertex {
    fn new(position: Vec3, u: f32, v: f32, alpha: f32) -> Self {
        Self {
            position: position.to_array(),
            uv: [u, v],
            alpha,
        }
    }

    /// Attribute layout: position at 0, uv at 1, alpha at 2.
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: 12,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x2,
        },
        wgpu::VertexAttribute {
            offset: 20,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32,
        },
    ];

    /// Vertex buffer layout for a render pipeline.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TrailVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Resolves bitmap ids to renderer handles.
///
/// A handle `<= 0` means the bitmap is not loaded; trails using it are
/// skipped for the frame but kept alive.
pub trait TextureLookup {
    /// Renderer handle for `texture`.
    fn bitmap_handle(&self, texture: TextureId) -> i32;
}

/// Atmospheric attenuation.
pub trait FogModel {
    /// Visibility of a point seen from `eye`, `1.0` = unobscured.
    fn visibility(&self, pos: Vec3, eye: Vec3) -> f32;

    /// Distance beyond which nothing is visible.
    fn visibility_distance(&self) -> f32;
}

/// Exponential fog with a hard cutoff at the visibility distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpFog {
    /// Extinction per world unit.
    pub density: f32,
    /// Hard visibility limit.
    pub visibility_distance: f32,
}

impl FogModel for ExpFog {
    fn visibility(&self, pos: Vec3, eye: Vec3) -> f32 {
        let dist = pos.distance(eye);
        if dist >= self.visibility_distance {
            return 0.0;
        }
        (-self.density * dist).exp()
    }

    fn visibility_distance(&self) -> f32 {
        self.visibility_distance
    }
}

/// Receives finished triangle lists.
pub trait TrailBatcher {
    /// Queue `vertices` (a triangle list) for drawing with `bitmap_handle`.
    fn submit(&mut self, bitmap_handle: i32, vertices: &[TrailVertex]);
}

/// How a ribbon was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryCounts {
    /// Visible sections used.
    pub sections: usize,
    /// Four-cornered pieces (two triangles each).
    pub quads: usize,
    /// Tapered end pieces.
    pub triangles: usize,
}

impl GeometryCounts {
    /// Pieces joining consecutive sections.
    #[inline]
    pub fn pieces(&self) -> usize {
        self.quads + self.triangles
    }

    /// Vertices written to the triangle list.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.quads * 6 + self.triangles * 3
    }
}

/// Resolved per-section ribbon cross-section.
#[derive(Clone, Copy, Default)]
struct Cross {
    center: Vec3,
    top: Vec3,
    bot: Vec3,
    u: f32,
    alpha: f32,
}

/// Append the triangle list for `trail` to `out`.
///
/// Sections are walked from the newest backwards and the walk stops at the
/// first one whose age has passed 1.0. Fewer than two visible sections
/// draw nothing.
pub fn build_trail_geometry(
    trail: &Trail,
    view: &RenderView,
    min_pixels: f32,
    fog: Option<&dyn FogModel>,
    out: &mut Vec<TrailVertex>,
) -> GeometryCounts {
    let mut order = [0usize; TRAIL_SECTIONS];
    let mut count = 0;
    for idx in trail.indices_newest_first() {
        if trail.age_at(idx) > 1.0 {
            break;
        }
        order[count] = idx;
        count += 1;
    }
    if count < 2 {
        return GeometryCounts::default();
    }

    let info = trail.info();
    let mut total_length = 0.0;
    for pair in order[..count].windows(2) {
        total_length += trail.position_at(pair[0]).distance(trail.position_at(pair[1]));
    }
    let u_scale = total_length / info.texture_stretch;

    let mut cross = [Cross::default(); TRAIL_SECTIONS];
    let mut tangent = Vec3::Z;
    let mut right = Vec3::X;
    for i in 0..count {
        let center = trail.position_at(order[i]);
        let age = trail.age_at(order[i]).max(0.0);

        let toward_newer = (i > 0)
            .then(|| (trail.position_at(order[i - 1]) - center).try_normalize())
            .flatten();
        let toward_older = (i + 1 < count)
            .then(|| (center - trail.position_at(order[i + 1])).try_normalize())
            .flatten();
        tangent = match (toward_newer, toward_older) {
            (Some(f), Some(b)) => (f + b).try_normalize().unwrap_or(b),
            (Some(f), None) => f,
            (None, Some(b)) => b,
            (None, None) => tangent,
        };

        let to_eye = view.eye - center;
        if let Some(r) = tangent.cross(to_eye).try_normalize() {
            right = r;
        }

        let mut width = info.w_start + (info.w_end - info.w_start) * age;
        width = width.max(view.world_units_per_pixel(to_eye.length()) * min_pixels);

        let mut alpha = info.a_start + (info.a_end - info.a_start) * age.powf(info.a_decay_exponent);
        let fade = info.fade_out_sections as usize;
        if fade > 0 && i < fade {
            let ramp = i as f32 / fade as f32;
            alpha *= ramp * ramp;
        }
        if let Some(fog) = fog {
            alpha *= fog.visibility(center, view.eye);
        }

        let half = right * (width * 0.5);
        cross[i] = Cross {
            center,
            top: center + half,
            bot: center - half,
            u: age * u_scale,
            alpha: alpha.clamp(0.0, 1.0),
        };
    }

    let mut counts = GeometryCounts {
        sections: count,
        ..Default::default()
    };

    if count == 2 {
        push_quad(out, &cross[0], &cross[1]);
        counts.quads = 1;
        return counts;
    }

    for i in 0..count - 1 {
        let (a, b) = (&cross[i], &cross[i + 1]);
        if i == 0 {
            out.push(TrailVertex::new(a.center, a.u, 0.5, a.alpha));
            out.push(TrailVertex::new(b.top, b.u, 0.0, b.alpha));
            out.push(TrailVertex::new(b.bot, b.u, 1.0, b.alpha));
            counts.triangles += 1;
        } else if i == count - 2 {
            out.push(TrailVertex::new(a.top, a.u, 0.0, a.alpha));
            out.push(TrailVertex::new(a.bot, a.u, 1.0, a.alpha));
            out.push(TrailVertex::new(b.center, b.u, 0.5, b.alpha));
            counts.triangles += 1;
        } else {
            push_quad(out, a, b);
            counts.quads += 1;
        }
    }
    counts
}

fn push_quad(out: &mut Vec<TrailVertex>, a: &Cross, b: &Cross) {
    let a_top = TrailVertex::new(a.top, a.u, 0.0, a.alpha);
    let a_bot = TrailVertex::new(a.bot, a.u, 1.0, a.alpha);
    let b_top = TrailVertex::new(b.top, b.u, 0.0, b.alpha);
    let b_bot = TrailVertex::new(b.bot, b.u, 1.0, b.alpha);
    out.extend_from_slice(&[a_top, a_bot, b_top, b_top, a_bot, b_bot]);
}

/// Vertices grouped by renderer handle, ready for upload.
#[derive(Debug, Default)]
pub struct VertexBatch {
    batches: Vec<(i32, Vec<TrailVertex>)>,
}

impl VertexBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all queued vertices, keeping allocations for the next frame.
    pub fn clear(&mut self) {
        for (_, verts) in &mut self.batches {
            verts.clear();
        }
    }

    /// Queued vertices per handle, skipping empty groups.
    pub fn batches(&self) -> impl Iterator<Item = (i32, &[TrailVertex])> {
        self.batches
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, v)| (*h, v.as_slice()))
    }

    /// Total queued vertices.
    pub fn vertex_count(&self) -> usize {
        self.batches.iter().map(|(_, v)| v.len()).sum()
    }

    /// Create one vertex buffer per non-empty group.
    ///
    /// Returns `(bitmap_handle, buffer, vertex_count)` triples.
    pub fn upload(&self, device: &wgpu::Device) -> Vec<(i32, wgpu::Buffer, u32)> {
        self.batches()
            .map(|(handle, verts)| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Trail Vertex Buffer"),
                    contents: bytemuck::cast_slice(verts),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                (handle, buffer, verts.len() as u32)
            })
            .collect()
    }
}

impl TrailBatcher for VertexBatch {
    fn submit(&mut self, bitmap_handle: i32, vertices: &[TrailVertex]) {
        match self.batches.iter_mut().find(|(h, _)| *h == bitmap_handle) {
            Some((_, verts)) => verts.extend_from_slice(vertices),
            None => self.batches.push((bitmap_handle, vertices.to_vec())),
        }
    }
}
