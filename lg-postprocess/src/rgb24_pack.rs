//! RGB24-pack stage (§4.4): drops the alpha byte from each RGBA8/BGRA8
//! source pixel and repacks the remaining bytes tightly into a BGR_32
//! transport container whose logical width is aligned to 64 pixels so
//! the receiver can import it as a dma-buf without breaking alignment.
//! Grounded in `original_source/host/platform/Windows/capture/DXGI/src/
//! pp/rgb24.c` (`rgb24_configure`) and `D12/effect/rgb24.c`
//! (`d12_effect_rgb24Run`'s damage-rect adjustment).

use lg_common::{DamageRect, PixelFormat};

use crate::desc::{FrameDescription, PixelBuffer, StageConfig};
use crate::error::{PostProcessError, PostProcessResult};
use crate::gpu::GpuContext;
use crate::stage::PostProcessStage;

fn align_up(v: u32, align: u32) -> u32 {
    v.div_ceil(align) * align
}

/// Computes the packed container's sizing for a `width` x `height`
/// RGBA8 source (`rgb24_configure`'s math): `packed_pitch` is the tight
/// pitch in 4-byte words (reported as the published `frame_width`),
/// `cols` is that pitch aligned up to 64 words (the real row stride of
/// the backing storage, sized for dma-buf import), and `rows` is how
/// many `cols`-wide rows are needed to hold every packed byte.
pub fn packed_container_dims(width: u32, height: u32) -> (u32, u32, u32) {
    let packed_pitch_bytes = align_up(width * 3, 4);
    let packed_pitch = packed_pitch_bytes / 4;
    let cols = align_up(packed_pitch, 64);
    let total_rgb_bytes = width as u64 * height as u64 * 3;
    let rows = total_rgb_bytes.div_ceil((cols as u64) * 4) as u32;
    (packed_pitch, cols, rows.max(1))
}

/// Flattens the source into an RGB-only byte stream (dropping every 4th
/// alpha byte) and repacks it into the aligned container, zero-padding
/// any trailing bytes. Equivalent to the per-output-pixel lane shuffle
/// described in `rgb24.c`'s pixel shader, expressed as a flat copy.
pub fn pack_rgb24(src: &[u8], width: u32, height: u32) -> PostProcessResult<(Vec<u8>, u32, u32, u32)> {
    let pixel_count = width as usize * height as usize;
    if src.len() < pixel_count * 4 {
        return Err(PostProcessError::ShortInput { expected: pixel_count * 4, actual: src.len(), reason: "rgb24 pack source" });
    }
    let (packed_pitch, cols, rows) = packed_container_dims(width, height);
    let container_bytes = cols as usize * 4 * rows as usize;
    let mut dst = vec![0u8; container_bytes];

    let mut write_off = 0usize;
    for i in 0..pixel_count {
        let so = i * 4;
        dst[write_off] = src[so];
        dst[write_off + 1] = src[so + 1];
        dst[write_off + 2] = src[so + 2];
        write_off += 3;
    }
    Ok((dst, packed_pitch, cols, rows))
}

/// `rect.left = (rect.left*3)/4; rect.right = rect.left + (width*3+3)/4`
/// where `width` is the rect's original width.
pub fn adjust_damage_for_rgb24(rects: &[DamageRect]) -> Vec<DamageRect> {
    rects
        .iter()
        .map(|r| {
            let width = r.width;
            let left = (r.x * 3) / 4;
            let right = left + (width * 3 + 3) / 4;
            DamageRect::new(left, r.y, right - left, r.height)
        })
        .collect()
}

#[derive(Default)]
pub struct Rgb24PackStage;

impl PostProcessStage for Rgb24PackStage {
    fn name(&self) -> &'static str {
        "rgb24-pack"
    }

    fn configure(&mut self, input: &FrameDescription) -> StageConfig {
        if input.format == PixelFormat::Rgb24 {
            return StageConfig::Bypass;
        }
        let (packed_pitch, cols, rows) = packed_container_dims(input.width, input.height);
        let mut out = FrameDescription::new(packed_pitch, rows, cols * 4, PixelFormat::Bgr32);
        out.cols = cols;
        out.rows = rows;
        StageConfig::Configured(out)
    }

    fn run(&mut self, input: &PixelBuffer, _gpu: Option<&GpuContext>) -> PostProcessResult<PixelBuffer> {
        let (data, packed_pitch, cols, rows) = pack_rgb24(&input.data, input.desc.width, input.desc.height)?;
        let mut out_desc = FrameDescription::new(packed_pitch, rows, cols * 4, PixelFormat::Bgr32);
        out_desc.cols = cols;
        out_desc.rows = rows;
        Ok(PixelBuffer::new(out_desc, data))
    }

    fn adjust_damage(&self, rects: &[DamageRect]) -> Vec<DamageRect> {
        adjust_damage_for_rgb24(rects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_width_is_aligned_to_64_pixels() {
        let (_packed_pitch, cols, _rows) = packed_container_dims(100, 10);
        assert_eq!(cols % 64, 0);
    }

    /// Scenario S6 (spec.md §8): a 12x1 RGBA8 source packs down to a
    /// published `frame_width=9`, `frame_height=1` BGR_32 texture.
    #[test]
    fn scenario_s6_packed_rgb24_dims_match() {
        let (packed_pitch, cols, rows) = packed_container_dims(12, 1);
        assert_eq!(packed_pitch, 9);
        assert_eq!(cols, 64);
        assert_eq!(rows, 1);
    }

    #[test]
    fn packing_drops_exactly_one_byte_in_four() {
        let width = 4u32;
        let height = 1u32;
        let src: Vec<u8> = (0..width).flat_map(|x| [x as u8, x as u8 + 1, x as u8 + 2, 0xff]).collect();
        let (packed, _packed_pitch, cols, rows) = pack_rgb24(&src, width, height).unwrap();
        assert_eq!(packed.len(), cols as usize * 4 * rows as usize);
        assert_eq!(&packed[0..3], &[0, 1, 2]);
        assert_eq!(&packed[3..6], &[1, 2, 3]);
    }

    #[test]
    fn damage_rect_x_axis_is_rewritten_by_three_quarters() {
        let rects = vec![DamageRect::new(8, 0, 8, 4)];
        let adjusted = adjust_damage_for_rgb24(&rects);
        assert_eq!(adjusted[0].x, 6);
        assert_eq!(adjusted[0].y, 0);
        assert_eq!(adjusted[0].height, 4);
    }

    /// The packed bytes sit in a BGRA8 container (§4.4, S6): the wire
    /// pixel format tag must read `BGR_32`, not `RGB_24`.
    #[test]
    fn packed_output_is_tagged_bgr32() {
        let mut stage = Rgb24PackStage;
        let input = FrameDescription::new(12, 1, 12 * 4, PixelFormat::Bgra);
        let StageConfig::Configured(configured) = stage.configure(&input) else {
            panic!("expected the stage to configure for a BGRA input");
        };
        assert_eq!(configured.format, PixelFormat::Bgr32);

        let pixels = vec![0u8; 12 * 4];
        let result = stage.run(&PixelBuffer::new(input, pixels), None).unwrap();
        assert_eq!(result.desc.format, PixelFormat::Bgr32);
    }
}
