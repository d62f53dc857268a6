//! GPU pick surface.
//!
//! Renders the pick scene's flat-colored triangles offscreen against the
//! white background and reads back the queried pixel. Shares the surface
//! pipeline and readback path with the offscreen renderer.

use crate::error::{ViewError, ViewResult};
use crate::render::offscreen::{self, GpuContext, SurfaceRenderer, SurfaceVertex};

use super::{PickScene, PickSurface, PICK_BACKGROUND};

pub struct GpuPickSurface {
    gpu: &'static GpuContext,
    renderer: SurfaceRenderer,
    width: u32,
    height: u32,
}

impl GpuPickSurface {
    pub fn new(width: u32, height: u32) -> ViewResult<Self> {
        let gpu = offscreen::ctx()?;
        Ok(Self {
            gpu,
            renderer: SurfaceRenderer::new(gpu, width, height),
            width,
            height,
        })
    }
}

impl PickSurface for GpuPickSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn read_pixel(&mut self, scene: &PickScene, xpixel: u32, ypixel: u32) -> ViewResult<[f32; 3]> {
        if xpixel >= self.width || ypixel >= self.height {
            return Err(ViewError::readback(format!(
                "pixel ({}, {}) outside {}x{} viewport",
                xpixel, ypixel, self.width, self.height
            )));
        }

        let mut vertices = Vec::new();
        scene.for_each_triangle(|tri| {
            for p in tri.positions {
                vertices.push(SurfaceVertex {
                    position: [p.x as f32, p.y as f32, p.z as f32],
                    color: tri.color,
                });
            }
        });
        if vertices.is_empty() {
            return Ok(PICK_BACKGROUND);
        }

        let view_proj = scene.view_proj.as_mat4().to_cols_array_2d();
        let pixels = self.renderer.render_frame(
            self.gpu,
            &vertices,
            view_proj,
            [1.0, 1.0, 1.0, 1.0],
        )?;

        // read-back rows are bottom-up, matching pick pixel coordinates
        let idx = ((ypixel * self.width + xpixel) * 4) as usize;
        Ok([
            pixels[idx] as f32 / 255.0,
            pixels[idx + 1] as f32 / 255.0,
            pixels[idx + 2] as f32 / 255.0,
        ])
    }
}
