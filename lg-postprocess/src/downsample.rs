//! Downsample stage (§4.4): bilinear resize to a user-declared target
//! resolution. Grounded in `original_source/host/platform/Windows/
//! capture/DXGI/src/pp/downsample.c` (rule matching, bilinear sampler)
//! and `D12/effect/downsample.c`'s `d12_effect_downsampleAdjustDamage`
//! (damage scale + 1px expand + clamp).

use lg_common::DamageRect;

use crate::desc::{FrameDescription, PixelBuffer, StageConfig};
use crate::error::{PostProcessError, PostProcessResult};
use crate::gpu::GpuContext;
use crate::stage::PostProcessStage;

/// One user-declared rule, parsed from `"[>](width)x(height):(toWidth)x(toHeight)"`
/// (`original_source/host/include/downsample_parser.h`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DownsampleRule {
    pub id: u32,
    pub greater: bool,
    pub x: u32,
    pub y: u32,
    pub target_x: u32,
    pub target_y: u32,
}

impl DownsampleRule {
    pub fn matches(&self, width: u32, height: u32) -> bool {
        if self.greater { width > self.x && height > self.y } else { width == self.x && height == self.y }
    }
}

fn sample_bilinear(src: &[u8], width: u32, height: u32, pitch: u32, fx: f32, fy: f32) -> [u8; 4] {
    let x0 = fx.floor().clamp(0.0, (width - 1) as f32) as u32;
    let y0 = fy.floor().clamp(0.0, (height - 1) as f32) as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let at = |x: u32, y: u32, c: usize| -> f32 { src[(y * pitch + x * 4) as usize + c] as f32 };

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = at(x0, y0, c) * (1.0 - tx) + at(x1, y0, c) * tx;
        let bottom = at(x0, y1, c) * (1.0 - tx) + at(x1, y1, c) * tx;
        out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Resizes an RGBA8/BGRA8 `src_width` x `src_height` buffer to
/// `dst_width` x `dst_height` with bilinear filtering.
pub fn downsample(
    src: &[u8],
    src_width: u32,
    src_height: u32,
    src_pitch: u32,
    dst_width: u32,
    dst_height: u32,
) -> PostProcessResult<Vec<u8>> {
    if (src_pitch as u64) * (src_height as u64) > src.len() as u64 {
        return Err(PostProcessError::ShortInput {
            expected: (src_pitch * src_height) as usize,
            actual: src.len(),
            reason: "downsample source buffer",
        });
    }
    let dst_pitch = dst_width * 4;
    let mut dst = vec![0u8; (dst_pitch * dst_height) as usize];
    let scale_x = src_width as f32 / dst_width as f32;
    let scale_y = src_height as f32 / dst_height as f32;

    for y in 0..dst_height {
        let fy = (y as f32 + 0.5) * scale_y - 0.5;
        for x in 0..dst_width {
            let fx = (x as f32 + 0.5) * scale_x - 0.5;
            let px = sample_bilinear(src, src_width, src_height, src_pitch, fx, fy);
            let off = (y * dst_pitch + x * 4) as usize;
            dst[off..off + 4].copy_from_slice(&px);
        }
    }
    Ok(dst)
}

/// Scale, expand by one pixel to cover the bilinear sampling footprint,
/// then clamp to the destination bounds.
pub fn adjust_damage_for_downsample(
    rects: &[DamageRect],
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
) -> Vec<DamageRect> {
    let scale_x = dst_width as f32 / src_width as f32;
    let scale_y = dst_height as f32 / src_height as f32;
    rects
        .iter()
        .map(|r| {
            let left = (r.x as f32 * scale_x).floor() as i32;
            let top = (r.y as f32 * scale_y).floor() as i32;
            let right = (r.right() as f32 * scale_x).ceil() as i32;
            let bottom = (r.bottom() as f32 * scale_y).ceil() as i32;
            DamageRect::new(left, top, right - left, bottom - top).expand(1).clamp(dst_width as i32, dst_height as i32)
        })
        .collect()
}

pub struct DownsampleStage {
    rules: Vec<DownsampleRule>,
    chosen: Option<(u32, u32, u32, u32)>, // (src_w, src_h, dst_w, dst_h)
}

impl DownsampleStage {
    pub fn new(rules: Vec<DownsampleRule>) -> Self {
        Self { rules, chosen: None }
    }
}

impl PostProcessStage for DownsampleStage {
    fn name(&self) -> &'static str {
        "downsample"
    }

    fn configure(&mut self, input: &FrameDescription) -> StageConfig {
        let rule = self.rules.iter().find(|r| r.matches(input.width, input.height));
        match rule {
            None => {
                self.chosen = None;
                StageConfig::Bypass
            }
            Some(rule) => {
                self.chosen = Some((input.width, input.height, rule.target_x, rule.target_y));
                StageConfig::Configured(FrameDescription::new(rule.target_x, rule.target_y, rule.target_x * 4, input.format))
            }
        }
    }

    fn run(&mut self, input: &PixelBuffer, _gpu: Option<&GpuContext>) -> PostProcessResult<PixelBuffer> {
        let (sw, sh, dw, dh) = self.chosen.ok_or_else(|| PostProcessError::NoMatchingRule {
            stage: "downsample",
            width: input.desc.width,
            height: input.desc.height,
        })?;
        let data = downsample(&input.data, sw, sh, input.desc.pitch, dw, dh)?;
        let out_desc = FrameDescription::new(dw, dh, dw * 4, input.desc.format);
        Ok(PixelBuffer::new(out_desc, data))
    }

    fn adjust_damage(&self, rects: &[DamageRect]) -> Vec<DamageRect> {
        match self.chosen {
            Some((sw, sh, dw, dh)) => adjust_damage_for_downsample(rects, sw, sh, dw, dh),
            None => rects.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: u32, greater: bool, x: u32, y: u32, tx: u32, ty: u32) -> DownsampleRule {
        DownsampleRule { id, greater, x, y, target_x: tx, target_y: ty }
    }

    #[test]
    fn exact_rule_matches_only_that_size() {
        let r = rule(1, false, 3840, 2160, 1920, 1080);
        assert!(r.matches(3840, 2160));
        assert!(!r.matches(1920, 1080));
    }

    #[test]
    fn greater_rule_matches_anything_above_threshold() {
        let r = rule(2, true, 1920, 1080, 1920, 1080);
        assert!(r.matches(3840, 2160));
        assert!(!r.matches(1920, 1080));
    }

    #[test]
    fn downsample_halves_uniform_color_buffer() {
        let w = 4u32;
        let h = 4u32;
        let src: Vec<u8> = (0..w * h).flat_map(|_| [10u8, 20, 30, 40]).collect();
        let out = downsample(&src, w, h, w * 4, 2, 2).unwrap();
        assert_eq!(out.len(), 2 * 2 * 4);
        assert_eq!(&out[0..4], &[10, 20, 30, 40]);
    }

    #[test]
    fn damage_is_scaled_expanded_and_clamped() {
        let rects = vec![DamageRect::new(0, 0, 4, 4)];
        let adjusted = adjust_damage_for_downsample(&rects, 8, 8, 4, 4);
        assert_eq!(adjusted.len(), 1);
        assert!(adjusted[0].x >= 0 && adjusted[0].right() <= 4);
    }
}
